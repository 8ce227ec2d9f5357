//! Async conversion requests.
//!
//! A request moves an isolation vault account's collateral through an external
//! venue: unwrap (isolation asset → liquid asset) or wrap (the reverse). The
//! venue answers later with exactly one terminal callback per accepted order,
//! possibly more than once.
//!
//! Lifecycle:
//!
//! ```text
//! Idle ──initiate──▶ Pending ──execute──▶ Executed
//!                     │   ▲
//!               cancel│   │retry (retryable only)
//!                     ▼   │
//!                   Cancelled ──non-retryable / force──▶ Unretryable
//! ```
//!
//! Live requests (Pending, or Cancelled and retryable) hold the account's
//! freeze. Terminal requests are removed from the book and leave a small
//! tombstone so redelivered callbacks can be recognised.

use crate::freeze::VaultFreezeState;
use crate::liquidation::RouteData;
use crate::types::{AccountId, Address, AssetId, Par, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Unique per request: the issuing vault plus a monotonic nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversionKey {
    pub vault: Address,
    pub nonce: u64,
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.vault.0, self.nonce)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// isolation asset → liquid asset
    Unwrap,
    /// liquid asset → isolation asset
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Pending,
    Executed,
    Cancelled,
    Unretryable,
}

impl ConversionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionStatus::Executed | ConversionStatus::Unretryable)
    }
}

/// Venue reason codes. the venue decides; we only classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Slippage,
    InsufficientLiquidity,
    Timeout,
    Delisted,
    Rejected,
}

impl CancelReason {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CancelReason::Slippage | CancelReason::InsufficientLiquidity | CancelReason::Timeout
        )
    }
}

/// Who started a request. liquidation requests skip the owner health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatedBy {
    Owner,
    Liquidation,
}

/// What a caller asks for. the isolation side comes from the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOrder {
    pub vault: Address,
    pub account_number: u64,
    pub direction: Direction,
    /// output asset of an unwrap, input asset of a wrap
    pub counter_asset: AssetId,
    pub input_amount: Wei,
    pub min_output: Wei,
    pub execution_fee: Decimal,
    pub route: RouteData,
}

impl ConversionOrder {
    pub fn unwrap_into(vault: Address, account_number: u64, output_asset: AssetId, input_amount: Wei, min_output: Wei) -> Self {
        Self::build(vault, account_number, Direction::Unwrap, output_asset, input_amount, min_output)
    }

    pub fn wrap_from(vault: Address, account_number: u64, input_asset: AssetId, input_amount: Wei, min_output: Wei) -> Self {
        Self::build(vault, account_number, Direction::Wrap, input_asset, input_amount, min_output)
    }

    fn build(
        vault: Address,
        account_number: u64,
        direction: Direction,
        counter_asset: AssetId,
        input_amount: Wei,
        min_output: Wei,
    ) -> Self {
        Self {
            vault,
            account_number,
            direction,
            counter_asset,
            input_amount,
            min_output,
            execution_fee: Decimal::ZERO,
            route: RouteData::with_min_output(min_output),
        }
    }

    pub fn with_fee(mut self, execution_fee: Decimal) -> Self {
        self.execution_fee = execution_fee;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.route.payload = payload;
        self
    }

    pub fn account(&self) -> AccountId {
        AccountId::new(self.vault, self.account_number)
    }

    /// (input, output) given the vault's isolation asset
    pub fn assets(&self, isolation_asset: AssetId) -> (AssetId, AssetId) {
        match self.direction {
            Direction::Unwrap => (isolation_asset, self.counter_asset),
            Direction::Wrap => (self.counter_asset, isolation_asset),
        }
    }
}

/// Attached by the router: distribute proceeds to repay `owed_asset` on execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationIntent {
    pub liquidator: Address,
    pub solid: AccountId,
    pub held_asset: AssetId,
    pub owed_asset: AssetId,
    /// zero for an immediate liquidation
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub key: ConversionKey,
    pub account: AccountId,
    pub direction: Direction,
    pub input_asset: AssetId,
    pub input_amount: Wei,
    pub output_asset: AssetId,
    pub min_output: Wei,
    pub status: ConversionStatus,
    pub retryable: bool,
    pub initiated_by: InitiatedBy,
    pub initiator: Address,
    pub created_at: Timestamp,
    pub submitted_at: Timestamp,
    pub attempts: u32,
    /// remaining escrowed native fee
    pub execution_fee: Decimal,
    pub fee_payer: Address,
    pub intent: Option<LiquidationIntent>,
    pub route: RouteData,
    /// par of input and output assets when the freeze was taken
    pub snapshot: Vec<(AssetId, Par)>,
}

impl ConversionRequest {
    pub fn vault(&self) -> Address {
        self.key.vault
    }

    pub fn is_live(&self) -> bool {
        match self.status {
            ConversionStatus::Pending => true,
            ConversionStatus::Cancelled => self.retryable,
            _ => false,
        }
    }

    pub fn involves(&self, asset: AssetId) -> bool {
        self.input_asset == asset || self.output_asset == asset
    }

    /// Take up to `cost` from the escrow. returns what was actually taken.
    pub fn consume_fee(&mut self, cost: Decimal) -> Decimal {
        let taken = cost.max(Decimal::ZERO).min(self.execution_fee);
        self.execution_fee -= taken;
        taken
    }
}

/// What is left of a request after it leaves the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub key: ConversionKey,
    pub account: AccountId,
    pub status: ConversionStatus,
    pub output_amount: Option<Wei>,
}

/// Where a callback lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackTarget<'a> {
    Live(&'a ConversionRequest),
    Resolved(&'a Resolution),
    Unknown,
}

/// All requests, their tombstones, the freeze state they drive, and fee refunds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionBook {
    next_nonce: u64,
    requests: HashMap<ConversionKey, ConversionRequest>,
    resolutions: HashMap<ConversionKey, Resolution>,
    resolution_order: VecDeque<ConversionKey>,
    max_resolutions: usize,
    freeze: VaultFreezeState,
    refunds: HashMap<Address, Decimal>,
    fees_paid: Decimal,
}

impl ConversionBook {
    pub fn new(max_resolutions: usize) -> Self {
        Self {
            next_nonce: 1,
            requests: HashMap::new(),
            resolutions: HashMap::new(),
            resolution_order: VecDeque::new(),
            max_resolutions,
            freeze: VaultFreezeState::new(),
            refunds: HashMap::new(),
            fees_paid: Decimal::ZERO,
        }
    }

    /// Next key for a vault. nonces never repeat, so keys never collide.
    pub fn next_key(&mut self, vault: Address) -> ConversionKey {
        let key = ConversionKey {
            vault,
            nonce: self.next_nonce,
        };
        self.next_nonce += 1;
        key
    }

    pub fn freeze_state(&self) -> &VaultFreezeState {
        &self.freeze
    }

    pub fn is_frozen(&self, account: AccountId) -> bool {
        self.freeze.is_frozen(account)
    }

    pub fn get(&self, key: ConversionKey) -> Option<&ConversionRequest> {
        self.requests.get(&key)
    }

    pub fn get_mut(&mut self, key: ConversionKey) -> Option<&mut ConversionRequest> {
        self.requests.get_mut(&key)
    }

    pub fn resolution(&self, key: ConversionKey) -> Option<&Resolution> {
        self.resolutions.get(&key)
    }

    pub fn lookup(&self, key: ConversionKey) -> CallbackTarget<'_> {
        if let Some(request) = self.requests.get(&key) {
            return CallbackTarget::Live(request);
        }
        match self.resolutions.get(&key) {
            Some(resolution) => CallbackTarget::Resolved(resolution),
            None => CallbackTarget::Unknown,
        }
    }

    /// Live requests on an account, oldest first.
    pub fn live_for(&self, account: AccountId) -> Vec<&ConversionRequest> {
        self.freeze
            .live_keys(account)
            .into_iter()
            .filter_map(|key| self.requests.get(&key))
            .collect()
    }

    pub fn pending_for(&self, account: AccountId) -> Option<&ConversionRequest> {
        self.live_for(account)
            .into_iter()
            .find(|r| r.status == ConversionStatus::Pending)
    }

    /// Every live request, for tooling that looks for stuck conversions.
    pub fn live_requests(&self) -> impl Iterator<Item = &ConversionRequest> {
        self.requests.values()
    }

    pub fn insert(&mut self, request: ConversionRequest) {
        self.freeze.freeze(request.account, request.key);
        self.requests.insert(request.key, request);
    }

    /// Move a request out of the book with its terminal status. the rest of its fee is refunded.
    pub fn resolve(
        &mut self,
        key: ConversionKey,
        status: ConversionStatus,
        output_amount: Option<Wei>,
    ) -> Option<ConversionRequest> {
        let mut request = self.requests.remove(&key)?;
        request.status = status;
        self.freeze.release(request.account, key);

        let refund = request.execution_fee;
        if refund > Decimal::ZERO {
            *self.refunds.entry(request.fee_payer).or_insert(Decimal::ZERO) += refund;
            request.execution_fee = Decimal::ZERO;
        }

        self.resolutions.insert(
            key,
            Resolution {
                key,
                account: request.account,
                status,
                output_amount,
            },
        );
        self.resolution_order.push_back(key);
        while self.resolution_order.len() > self.max_resolutions {
            if let Some(evicted) = self.resolution_order.pop_front() {
                self.resolutions.remove(&evicted);
            }
        }

        Some(request)
    }

    pub fn record_fee_paid(&mut self, amount: Decimal) {
        self.fees_paid += amount;
    }

    pub fn fees_paid(&self) -> Decimal {
        self.fees_paid
    }

    pub fn refund_balance(&self, address: Address) -> Decimal {
        self.refunds.get(&address).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn claim_refund(&mut self, address: Address) -> Decimal {
        self.refunds.remove(&address).unwrap_or(Decimal::ZERO)
    }

    pub fn live_count(&self) -> usize {
        self.requests.len()
    }

    pub fn resolution_count(&self) -> usize {
        self.resolutions.len()
    }
}
