// 8.0.2: result types and errors for engine operations.

use crate::collateral::CollateralError;
use crate::config::ConfigError;
use crate::conversion::{ConversionKey, ConversionStatus};
use crate::expiry::ExpiryError;
use crate::ledger::LedgerError;
use crate::liquidation::RouterError;
use crate::oracle::OracleError;
use crate::registry::RegistryError;
use crate::types::{AccountId, Address, AssetId, Timestamp, Wei};
use rust_decimal::Decimal;

/// A synchronous liquidation that settled in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationResult {
    pub solid: AccountId,
    pub liquid: AccountId,
    pub held_asset: AssetId,
    pub owed_asset: AssetId,
    pub owed_repaid: Wei,
    pub held_seized: Wei,
    /// owed asset the solid account received from a route swap, if any
    pub swap_output: Option<Wei>,
    /// solid account's gain in owed-asset units
    pub reward: Wei,
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    /// ordinary held asset, done
    Settled(LiquidationResult),
    /// isolation held asset: unwrap requested, proceeds distributed on execute
    ConversionStarted(ConversionKey),
    /// isolation held asset already mid-unwrap: intent attached to that request
    IntentAttached(ConversionKey),
}

impl LiquidationOutcome {
    pub fn key(&self) -> Option<ConversionKey> {
        match self {
            LiquidationOutcome::Settled(_) => None,
            LiquidationOutcome::ConversionStarted(key) | LiquidationOutcome::IntentAttached(key) => Some(*key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied,
    /// redelivery of something already recorded
    Duplicate,
    /// never issued, or too old to remember
    UnknownKey,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Expiry error: {0}")]
    Expiry(#[from] ExpiryError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("{caller:?} may not act on this")]
    Unauthorized { caller: Address },

    #[error("Account {0} is frozen by a pending conversion")]
    AccountFrozen(AccountId),

    #[error("Account {0} would be undercollateralized")]
    Undercollateralized(AccountId),

    #[error("{asset:?} may not be held by {account}")]
    IsolationViolation { account: AccountId, asset: AssetId },

    #[error("Conversion {key} already pending on {account}")]
    AlreadyPending { account: AccountId, key: ConversionKey },

    #[error("Account {account} cannot be frozen: {reason}")]
    AccountNotFrozenEligible { account: AccountId, reason: String },

    #[error("Execution fee {provided} below minimum {minimum}")]
    InsufficientFee { provided: Decimal, minimum: Decimal },

    #[error("Conversion {0} not found")]
    ConversionNotFound(ConversionKey),

    #[error("Conversion {key} is {status:?}")]
    InvalidState { key: ConversionKey, status: ConversionStatus },

    #[error("Conflicting callback for conversion {key}")]
    CallbackConflict { key: ConversionKey },

    #[error("Venue for conversion {key} reachable until {eligible_at}")]
    VenueStillReachable { key: ConversionKey, eligible_at: Timestamp },

    #[error("Route returned {actual}, minimum {expected}")]
    RouteAmountMismatch { expected: Wei, actual: Wei },

    #[error("Account {0} is not liquidatable")]
    NotLiquidatable(AccountId),

    #[error("{account} has nothing to liquidate between {held:?} and {owed:?}")]
    NothingToLiquidate { account: AccountId, held: AssetId, owed: AssetId },

    #[error("Account {0} cannot liquidate itself")]
    SelfLiquidation(AccountId),

    #[error("Account {account} frozen by incompatible conversion {key}")]
    AlreadyFrozenIncompatible { account: AccountId, key: ConversionKey },

    #[error("Solid account {0} would be undercollateralized")]
    SolidUndercollateralized(AccountId),

    #[error("No liquidity router configured")]
    NoLiquidityRouter,
}

// collateral failures are ledger or oracle failures; keep one variant for each
impl From<CollateralError> for EngineError {
    fn from(err: CollateralError) -> Self {
        match err {
            CollateralError::Ledger(e) => EngineError::Ledger(e),
            CollateralError::Oracle(e) => EngineError::Oracle(e),
        }
    }
}

impl EngineError {
    pub fn is_price_stale(&self) -> bool {
        matches!(self, EngineError::Oracle(OracleError::PriceStale { .. }))
    }
}
