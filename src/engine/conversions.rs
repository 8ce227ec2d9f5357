//! Async conversion lifecycle: initiate, venue callbacks, retry, force-unfreeze.
//!
//! Nothing touches the ledger at initiate. The account is frozen instead, and
//! the input/output pair is applied in one step when the venue reports execution.
//! Every callback computes its deltas first, applies them, then emits.

use super::core::{BalanceDelta, Engine};
use super::results::{CallbackOutcome, EngineError};
use crate::conversion::{
    CallbackTarget, CancelReason, ConversionKey, ConversionOrder, ConversionRequest, ConversionStatus, InitiatedBy,
    LiquidationIntent, Resolution,
};
use crate::events::{
    AccountLiquidatedEvent, ConversionCancelledEvent, ConversionExecutedEvent, ConversionForceUnfrozenEvent,
    ConversionInitiatedEvent, ConversionRetriedEvent, EventPayload,
};
use crate::liquidation::{split_proceeds, ProceedsSplit};
use crate::registry::{Capability, Vault};
use crate::types::{AccountId, Address, VenueId, Wei};
use rust_decimal::Decimal;
use tracing::{info, warn};

impl Engine {
    /// Owner path. the vault owner freezes one of the vault's accounts and asks the venue to convert.
    pub fn initiate(&mut self, caller: Address, order: ConversionOrder) -> Result<ConversionKey, EngineError> {
        let vault = *self.vaults.get(order.vault)?;
        if caller != vault.owner {
            return Err(EngineError::Unauthorized { caller });
        }
        self.open_conversion(&vault, order, caller, InitiatedBy::Owner, None)
    }

    /// Shared by the owner path and the liquidation router.
    pub(super) fn open_conversion(
        &mut self,
        vault: &Vault,
        order: ConversionOrder,
        initiator: Address,
        initiated_by: InitiatedBy,
        intent: Option<LiquidationIntent>,
    ) -> Result<ConversionKey, EngineError> {
        let account = order.account();

        if let Some(pending) = self.conversions.pending_for(account) {
            return Err(EngineError::AlreadyPending {
                account,
                key: pending.key,
            });
        }
        if self.conversions.is_frozen(account) {
            return Err(EngineError::AccountNotFrozenEligible {
                account,
                reason: "a cancelled request is awaiting retry".to_string(),
            });
        }

        let counter = self.ledger.market(order.counter_asset)?;
        if counter.config.is_isolation || order.counter_asset == vault.isolation_asset {
            return Err(EngineError::AccountNotFrozenEligible {
                account,
                reason: format!("{:?} cannot be paired with {:?}", order.counter_asset, vault.isolation_asset),
            });
        }

        let minimum = self.config.conversion.min_execution_fee;
        if order.execution_fee < minimum {
            return Err(EngineError::InsufficientFee {
                provided: order.execution_fee,
                minimum,
            });
        }
        self.venues.venue_for(vault.isolation_asset)?;

        let (input_asset, output_asset) = order.assets(vault.isolation_asset);
        self.accrue_account(account, &[input_asset, output_asset])?;
        self.ledger.require_balance(account, input_asset, order.input_amount)?;

        if initiated_by == InitiatedBy::Owner && !self.is_account_healthy(account)? {
            return Err(EngineError::Undercollateralized(account));
        }

        let key = self.conversions.next_key(vault.address);
        let now = self.current_time;
        let request = ConversionRequest {
            key,
            account,
            direction: order.direction,
            input_asset,
            input_amount: order.input_amount,
            output_asset,
            min_output: order.min_output,
            status: ConversionStatus::Pending,
            retryable: true,
            initiated_by,
            initiator,
            created_at: now,
            submitted_at: now,
            attempts: 1,
            execution_fee: order.execution_fee,
            fee_payer: initiator,
            intent,
            route: order.route,
            snapshot: self.ledger.snapshot(account, &[input_asset, output_asset]),
        };
        self.conversions.insert(request);

        info!(key = %key, account = %account, direction = ?order.direction, input = %order.input_amount, "conversion initiated");
        self.emit_event(EventPayload::ConversionInitiated(ConversionInitiatedEvent {
            key,
            vault: vault.address,
            account_number: order.account_number,
            direction: order.direction,
            input_asset,
            input_amount: order.input_amount,
            output_asset,
            min_output: order.min_output,
        }));
        Ok(key)
    }

    /// Venue reports the conversion filled with `output_amount`.
    pub fn on_execute_callback(
        &mut self,
        caller: VenueId,
        key: ConversionKey,
        output_amount: Wei,
        execution_cost: Decimal,
    ) -> Result<CallbackOutcome, EngineError> {
        if !self.authenticate_venue(caller, key)? {
            return Ok(CallbackOutcome::UnknownKey);
        }

        let request = match self.conversions.lookup(key) {
            CallbackTarget::Unknown => {
                warn!(key = %key, "execute for unknown conversion ignored");
                return Ok(CallbackOutcome::UnknownKey);
            }
            CallbackTarget::Resolved(resolution) => return replayed_execute(resolution, output_amount),
            CallbackTarget::Live(request) => request.clone(),
        };

        if request.status != ConversionStatus::Pending {
            warn!(key = %key, status = ?request.status, "execute for a request awaiting retry");
            return Err(EngineError::CallbackConflict { key });
        }
        if output_amount < request.min_output {
            return Err(EngineError::RouteAmountMismatch {
                expected: request.min_output,
                actual: output_amount,
            });
        }

        self.accrue_account(request.account, &[request.input_asset, request.output_asset])?;
        self.ledger
            .require_balance(request.account, request.input_asset, request.input_amount)?;

        // compute. a solid account frozen since phase one cannot take its reward yet; the venue redelivers
        let settlement = match request.intent {
            Some(intent) => {
                self.require_unfrozen(intent.solid)?;
                Some(self.plan_proceeds(&request, &intent, output_amount)?)
            }
            None => None,
        };
        let deltas = execute_deltas(&request, output_amount, settlement.as_ref());

        // apply
        let payloads = self.apply_deltas(&deltas)?;
        self.clear_settled_expiries(&deltas)?;
        if let Some(live) = self.conversions.get_mut(key) {
            let paid = live.consume_fee(execution_cost);
            self.conversions.record_fee_paid(paid);
        }
        self.conversions
            .resolve(key, ConversionStatus::Executed, Some(output_amount));

        // emit
        info!(key = %key, output = %output_amount, "conversion executed");
        self.emit_all(payloads);
        self.emit_event(EventPayload::ConversionExecuted(ConversionExecutedEvent { key, output_amount }));
        if let (Some(intent), Some(split)) = (request.intent, settlement) {
            info!(key = %key, liquid = %request.account, reward = %split.reward, "liquidation settled");
            self.emit_event(EventPayload::AccountLiquidated(AccountLiquidatedEvent {
                solid: intent.solid,
                liquid: request.account,
                held_asset: intent.held_asset,
                owed_asset: intent.owed_asset,
                repaid: split.repaid,
                reward: split.reward,
                expiry: intent.expiry,
            }));
        }
        Ok(CallbackOutcome::Applied)
    }

    /// Venue reports the conversion did not happen.
    pub fn on_cancel_callback(
        &mut self,
        caller: VenueId,
        key: ConversionKey,
        reason: CancelReason,
        execution_cost: Decimal,
    ) -> Result<CallbackOutcome, EngineError> {
        if !self.authenticate_venue(caller, key)? {
            return Ok(CallbackOutcome::UnknownKey);
        }

        let (status, attempts) = match self.conversions.lookup(key) {
            CallbackTarget::Unknown => {
                warn!(key = %key, "cancel for unknown conversion ignored");
                return Ok(CallbackOutcome::UnknownKey);
            }
            CallbackTarget::Resolved(resolution) => {
                if resolution.status == ConversionStatus::Executed {
                    warn!(key = %key, "cancel for an executed conversion");
                    return Err(EngineError::CallbackConflict { key });
                }
                return Ok(CallbackOutcome::Duplicate);
            }
            CallbackTarget::Live(request) => (request.status, request.attempts),
        };
        if status == ConversionStatus::Cancelled {
            // already waiting on a retry
            return Ok(CallbackOutcome::Duplicate);
        }

        let retryable = reason.is_retryable();
        if let Some(live) = self.conversions.get_mut(key) {
            let paid = live.consume_fee(execution_cost);
            if retryable {
                live.status = ConversionStatus::Cancelled;
                live.retryable = true;
            }
            self.conversions.record_fee_paid(paid);
        }
        if !retryable {
            let terminal = if attempts > 1 {
                ConversionStatus::Unretryable
            } else {
                ConversionStatus::Cancelled
            };
            self.conversions.resolve(key, terminal, None);
        }

        info!(key = %key, reason = ?reason, retryable, "conversion cancelled");
        self.emit_event(EventPayload::ConversionCancelled(ConversionCancelledEvent {
            key,
            reason,
            retryable,
        }));
        Ok(CallbackOutcome::Applied)
    }

    /// Resubmit a retryable cancelled request with a new minimum output. the freeze is kept throughout.
    pub fn retry(
        &mut self,
        caller: Address,
        key: ConversionKey,
        new_min_output: Wei,
        additional_fee: Decimal,
    ) -> Result<(), EngineError> {
        let request = match self.conversions.lookup(key) {
            CallbackTarget::Live(request) => request,
            CallbackTarget::Resolved(resolution) => {
                return Err(EngineError::InvalidState {
                    key,
                    status: resolution.status,
                })
            }
            CallbackTarget::Unknown => return Err(EngineError::ConversionNotFound(key)),
        };

        let owner = self.vaults.get(key.vault)?.owner;
        let liquidator = request.intent.is_some() && self.access.has(caller, Capability::Liquidator);
        if caller != owner && !liquidator {
            return Err(EngineError::Unauthorized { caller });
        }
        if request.status != ConversionStatus::Cancelled || !request.retryable {
            return Err(EngineError::InvalidState {
                key,
                status: request.status,
            });
        }
        if additional_fee < Decimal::ZERO {
            return Err(EngineError::InsufficientFee {
                provided: additional_fee,
                minimum: Decimal::ZERO,
            });
        }
        let minimum = self.config.conversion.min_execution_fee;
        let escrow = request.execution_fee + additional_fee;
        if escrow < minimum {
            return Err(EngineError::InsufficientFee {
                provided: escrow,
                minimum,
            });
        }

        let now = self.current_time;
        let Some(live) = self.conversions.get_mut(key) else {
            return Err(EngineError::ConversionNotFound(key));
        };
        live.status = ConversionStatus::Pending;
        live.min_output = new_min_output;
        live.route.min_output = new_min_output;
        live.execution_fee = escrow;
        live.attempts += 1;
        live.submitted_at = now;
        let attempt = live.attempts;

        info!(key = %key, attempt, min_output = %new_min_output, "conversion retried");
        self.emit_event(EventPayload::ConversionRetried(ConversionRetriedEvent {
            key,
            attempt,
            min_output: new_min_output,
        }));
        Ok(())
    }

    /// Operator escape hatch for a venue that went silent. nothing was applied at
    /// initiate, so the involved balances are already as they were; releases the freeze.
    pub fn force_unfreeze(&mut self, caller: Address, key: ConversionKey) -> Result<(), EngineError> {
        self.access.require(caller, Capability::Operator)?;
        let request = self
            .conversions
            .get(key)
            .cloned()
            .ok_or(EngineError::ConversionNotFound(key))?;

        let isolation_asset = self.vaults.get(key.vault)?.isolation_asset;
        let venue = self.venues.venue_for(isolation_asset)?;
        let last_seen = self.venues.last_seen(venue).unwrap_or_default();
        let eligible_at = request
            .submitted_at
            .max(last_seen)
            .plus(self.config.conversion.venue_timeout_secs);
        if self.current_time < eligible_at {
            return Err(EngineError::VenueStillReachable { key, eligible_at });
        }

        // the request moved nothing before execution, so undoing it leaves the ledger as it is.
        // involved balances are locked while frozen and should still equal the snapshot
        let drifted: Vec<_> = request
            .snapshot
            .iter()
            .filter(|(asset, par)| self.ledger.get_par(request.account, *asset) != *par)
            .map(|(asset, _)| asset.0)
            .collect();
        if !drifted.is_empty() {
            warn!(key = %key, assets = ?drifted, "involved balances moved while frozen, kept as they are");
        }
        self.conversions.resolve(key, ConversionStatus::Unretryable, None);

        warn!(key = %key, account = %request.account, operator = caller.0, "conversion force-unfrozen");
        self.emit_event(EventPayload::ConversionForceUnfrozen(ConversionForceUnfrozenEvent {
            key,
            operator: caller,
        }));
        Ok(())
    }

    // --- queries ---

    pub fn get_conversion_info(&self, key: ConversionKey) -> Option<&ConversionRequest> {
        self.conversions.get(key)
    }

    pub fn get_resolution(&self, key: ConversionKey) -> Option<&Resolution> {
        self.conversions.resolution(key)
    }

    /// Every live request, oldest first. what an operator scans for stuck conversions.
    pub fn pending_conversions(&self) -> Vec<&ConversionRequest> {
        let mut live: Vec<&ConversionRequest> = self.conversions.live_requests().collect();
        live.sort_by_key(|r| r.key.nonce);
        live
    }

    pub fn fee_refund_balance(&self, address: Address) -> Decimal {
        self.conversions.refund_balance(address)
    }

    pub fn claim_fee_refund(&mut self, caller: Address) -> Decimal {
        self.conversions.claim_refund(caller)
    }

    pub fn fees_paid(&self) -> Decimal {
        self.conversions.fees_paid()
    }

    // --- helpers ---

    // false when the key names no vault we know; such a key cannot have been issued
    fn authenticate_venue(&mut self, caller: VenueId, key: ConversionKey) -> Result<bool, EngineError> {
        let Ok(vault) = self.vaults.get(key.vault) else {
            return Ok(false);
        };
        self.venues.require_venue(vault.isolation_asset, caller)?;
        self.venues.record_liveness(caller, self.current_time);
        Ok(true)
    }

    // proceeds are already in the owed asset
    fn plan_proceeds(
        &self,
        request: &ConversionRequest,
        intent: &LiquidationIntent,
        proceeds: Wei,
    ) -> Result<ProceedsSplit, EngineError> {
        let debt = self.ledger.get_balance(request.account, intent.owed_asset)?.negate();
        let spread = self
            .pricing()
            .spread_for(intent.held_asset, intent.owed_asset, intent.expiry)?;
        Ok(split_proceeds(proceeds, debt, spread))
    }
}

fn replayed_execute(resolution: &Resolution, output_amount: Wei) -> Result<CallbackOutcome, EngineError> {
    if resolution.status == ConversionStatus::Executed && resolution.output_amount == Some(output_amount) {
        warn!(key = %resolution.key, "execute redelivered");
        return Ok(CallbackOutcome::Duplicate);
    }
    warn!(key = %resolution.key, status = ?resolution.status, "conflicting execute");
    Err(EngineError::CallbackConflict { key: resolution.key })
}

fn execute_deltas(
    request: &ConversionRequest,
    output_amount: Wei,
    settlement: Option<&ProceedsSplit>,
) -> Vec<BalanceDelta> {
    let account: AccountId = request.account;
    let mut deltas = vec![(account, request.input_asset, request.input_amount.negate())];
    match (settlement, request.intent) {
        (Some(split), Some(intent)) => {
            deltas.push((account, request.output_asset, split.liquid_credit()));
            deltas.push((intent.solid, request.output_asset, split.reward));
        }
        _ => deltas.push((account, request.output_asset, output_amount)),
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::market::MarketConfig;
    use crate::types::{AssetId, Timestamp};
    use rust_decimal_macros::dec;

    const ADMIN: Address = Address(1);
    const OWNER: Address = Address(10);
    const OPERATOR: Address = Address(30);
    const VAULT: Address = Address(100);
    const VENUE: VenueId = VenueId(7);
    const USDC: AssetId = AssetId(1);
    const GLP: AssetId = AssetId(5);

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default(), ADMIN);
        engine.add_market(ADMIN, MarketConfig::new(USDC, "USDC")).unwrap();
        engine.add_market(ADMIN, MarketConfig::new(GLP, "plvGLP").isolation()).unwrap();
        engine.update_price(USDC, dec!(1)).unwrap();
        engine.update_price(GLP, dec!(1)).unwrap();
        engine.set_venue(ADMIN, GLP, VENUE).unwrap();
        engine.grant(ADMIN, OPERATOR, Capability::Operator).unwrap();
        engine
            .register_vault(ADMIN, Vault {
                address: VAULT,
                owner: OWNER,
                isolation_asset: GLP,
            })
            .unwrap();
        engine.deposit(OWNER, account(), GLP, Wei::new(dec!(200))).unwrap();
        engine
    }

    fn account() -> AccountId {
        AccountId::new(VAULT, 1)
    }

    fn unwrap_order() -> ConversionOrder {
        ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(200)), Wei::new(dec!(180))).with_fee(dec!(0.01))
    }

    #[test]
    fn initiate_freezes_without_touching_ledger() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();

        assert!(engine.is_account_frozen(VAULT, 1));
        assert_eq!(engine.get_balance(account(), GLP).unwrap().value(), dec!(200));
        assert_eq!(engine.get_conversion_info(key).unwrap().status, ConversionStatus::Pending);
        assert!(matches!(
            engine.deposit(OWNER, account(), USDC, Wei::new(dec!(1))),
            Err(EngineError::AccountFrozen(_))
        ));
    }

    #[test]
    fn initiate_rejections() {
        let mut engine = engine();
        assert!(matches!(
            engine.initiate(Address(99), unwrap_order()),
            Err(EngineError::Unauthorized { .. })
        ));
        assert!(matches!(
            engine.initiate(OWNER, unwrap_order().with_fee(dec!(0))),
            Err(EngineError::InsufficientFee { .. })
        ));
        let too_much = ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(201)), Wei::zero()).with_fee(dec!(0.01));
        assert!(matches!(engine.initiate(OWNER, too_much), Err(EngineError::Ledger(_))));
        let same_asset = ConversionOrder::unwrap_into(VAULT, 1, GLP, Wei::new(dec!(1)), Wei::zero()).with_fee(dec!(0.01));
        assert!(matches!(
            engine.initiate(OWNER, same_asset),
            Err(EngineError::AccountNotFrozenEligible { .. })
        ));

        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        assert_eq!(
            engine.initiate(OWNER, unwrap_order()),
            Err(EngineError::AlreadyPending { account: account(), key })
        );
    }

    #[test]
    fn execute_applies_and_releases() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        let outcome = engine.on_execute_callback(VENUE, key, Wei::new(dec!(190)), dec!(0.004)).unwrap();

        assert_eq!(outcome, CallbackOutcome::Applied);
        assert_eq!(engine.get_balance(account(), GLP).unwrap(), Wei::zero());
        assert_eq!(engine.get_balance(account(), USDC).unwrap().value(), dec!(190));
        assert!(!engine.is_account_frozen(VAULT, 1));
        assert_eq!(engine.fee_refund_balance(OWNER), dec!(0.006));
        assert_eq!(engine.fees_paid(), dec!(0.004));
    }

    #[test]
    fn execute_below_minimum_changes_nothing() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        let err = engine.on_execute_callback(VENUE, key, Wei::new(dec!(170)), dec!(0)).unwrap_err();

        assert!(matches!(err, EngineError::RouteAmountMismatch { .. }));
        assert!(engine.is_account_frozen(VAULT, 1));
        assert_eq!(engine.get_balance(account(), GLP).unwrap().value(), dec!(200));
    }

    #[test]
    fn wrong_venue_rejected() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        assert!(matches!(
            engine.on_execute_callback(VenueId(8), key, Wei::new(dec!(190)), dec!(0)),
            Err(EngineError::Registry(_))
        ));
    }

    #[test]
    fn redelivery_and_conflict() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        engine.on_execute_callback(VENUE, key, Wei::new(dec!(190)), dec!(0)).unwrap();
        let events = engine.events().len();

        assert_eq!(
            engine.on_execute_callback(VENUE, key, Wei::new(dec!(190)), dec!(0)).unwrap(),
            CallbackOutcome::Duplicate
        );
        assert_eq!(engine.events().len(), events);
        assert_eq!(
            engine.on_execute_callback(VENUE, key, Wei::new(dec!(191)), dec!(0)),
            Err(EngineError::CallbackConflict { key })
        );
        assert_eq!(
            engine.on_cancel_callback(VENUE, key, CancelReason::Rejected, dec!(0)),
            Err(EngineError::CallbackConflict { key })
        );
    }

    #[test]
    fn non_retryable_cancel_releases() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        engine.on_cancel_callback(VENUE, key, CancelReason::Delisted, dec!(0)).unwrap();

        assert!(!engine.is_account_frozen(VAULT, 1));
        assert_eq!(engine.get_resolution(key).unwrap().status, ConversionStatus::Cancelled);
        assert_eq!(engine.get_balance(account(), GLP).unwrap().value(), dec!(200));
        assert_eq!(
            engine.on_execute_callback(VENUE, key, Wei::new(dec!(190)), dec!(0)),
            Err(EngineError::CallbackConflict { key })
        );
    }

    #[test]
    fn retry_flow() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();

        assert!(matches!(
            engine.retry(OWNER, key, Wei::new(dec!(150)), dec!(0)),
            Err(EngineError::InvalidState { .. })
        ));

        engine.on_cancel_callback(VENUE, key, CancelReason::Slippage, dec!(0.01)).unwrap();
        assert!(engine.is_account_frozen(VAULT, 1));
        assert!(matches!(
            engine.initiate(OWNER, unwrap_order()),
            Err(EngineError::AccountNotFrozenEligible { .. })
        ));
        assert!(matches!(
            engine.retry(OWNER, key, Wei::new(dec!(150)), dec!(0)),
            Err(EngineError::InsufficientFee { .. })
        ));

        assert_eq!(
            engine.retry(OWNER, key, Wei::new(dec!(150)), dec!(-0.01)),
            Err(EngineError::InsufficientFee {
                provided: dec!(-0.01),
                minimum: Decimal::ZERO,
            })
        );

        engine.retry(OWNER, key, Wei::new(dec!(150)), dec!(0.01)).unwrap();
        let request = engine.get_conversion_info(key).unwrap();
        assert_eq!(request.attempts, 2);
        assert_eq!(request.min_output.value(), dec!(150));

        // second failure is final
        engine.on_cancel_callback(VENUE, key, CancelReason::Rejected, dec!(0)).unwrap();
        assert_eq!(engine.get_resolution(key).unwrap().status, ConversionStatus::Unretryable);
        assert!(!engine.is_account_frozen(VAULT, 1));
    }

    #[test]
    fn force_unfreeze_waits_for_silence() {
        let mut engine = engine();
        let key = engine.initiate(OWNER, unwrap_order()).unwrap();
        let timeout = engine.config().conversion.venue_timeout_secs;

        assert!(matches!(
            engine.force_unfreeze(OWNER, key),
            Err(EngineError::Registry(_))
        ));

        engine.advance_time(timeout - 10);
        engine.venue_heartbeat(VENUE);
        engine.advance_time(20);
        assert!(matches!(
            engine.force_unfreeze(OPERATOR, key),
            Err(EngineError::VenueStillReachable { .. })
        ));

        engine.set_time(Timestamp::from_secs(2 * timeout));
        engine.force_unfreeze(OPERATOR, key).unwrap();
        assert!(!engine.is_account_frozen(VAULT, 1));
        assert_eq!(engine.get_resolution(key).unwrap().status, ConversionStatus::Unretryable);
        assert_eq!(engine.get_balance(account(), GLP).unwrap().value(), dec!(200));
        assert_eq!(engine.claim_fee_refund(OWNER), dec!(0.01));
    }

    #[test]
    fn unknown_key_is_noop() {
        let mut engine = engine();
        let key = ConversionKey { vault: VAULT, nonce: 999 };
        assert_eq!(
            engine.on_execute_callback(VENUE, key, Wei::new(dec!(1)), dec!(0)).unwrap(),
            CallbackOutcome::UnknownKey
        );
        assert!(engine.events().iter().all(|e| !matches!(e.payload, EventPayload::ConversionExecuted(_))));
    }

    #[test]
    fn wrap_moves_liquid_into_isolation() {
        let mut engine = engine();
        engine.transfer(OWNER, account(), AccountId::new(VAULT, 2), GLP, Wei::new(dec!(200))).unwrap();
        engine.deposit(OWNER, account(), USDC, Wei::new(dec!(100))).unwrap();

        let order = ConversionOrder::wrap_from(VAULT, 1, USDC, Wei::new(dec!(100)), Wei::new(dec!(95))).with_fee(dec!(0.01));
        let key = engine.initiate(OWNER, order).unwrap();
        engine.on_execute_callback(VENUE, key, Wei::new(dec!(98)), dec!(0)).unwrap();

        assert_eq!(engine.get_balance(account(), USDC).unwrap(), Wei::zero());
        assert_eq!(engine.get_balance(account(), GLP).unwrap().value(), dec!(98));
    }
}
