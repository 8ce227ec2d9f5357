//! Expiration settlement entry points. settling a matured expiry goes through `liquidate`.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, ExpirySetEvent};
use crate::expiry::{ramped_spread, ExpiryError};
use crate::types::{AccountId, Address, AssetId, Timestamp};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Give the debt in `owed` a deadline. once it passes, anyone with a solid
    /// account can settle it at a spread that ramps in over `expiry_ramp_secs`.
    pub fn set_expiry(
        &mut self,
        caller: Address,
        account: AccountId,
        owed: AssetId,
        duration_secs: u64,
    ) -> Result<Timestamp, EngineError> {
        self.require_controller(caller, account)?;
        self.accrue(&[owed])?;
        if !self.ledger.get_balance(account, owed)?.is_negative() {
            return Err(ExpiryError::NoDebt { account, asset: owed }.into());
        }

        let expiry = self.expiries.set(account, owed, duration_secs, self.current_time)?;
        info!(account = %account, asset = owed.0, expiry = expiry.as_secs(), "expiry set");
        self.emit_event(EventPayload::ExpirySet(ExpirySetEvent {
            account,
            asset: owed,
            timestamp: expiry,
        }));
        Ok(expiry)
    }

    pub fn get_expiry(&self, account: AccountId, owed: AssetId) -> Option<Timestamp> {
        self.expiries.get(account, owed)
    }

    /// Spread an expiration settlement would pay right now. zero before expiry.
    pub fn expiration_spread(&self, held: AssetId, owed: AssetId, expiry: Timestamp) -> Result<Decimal, EngineError> {
        let full = self.pricing().liquidation_spread(held, owed)?;
        Ok(ramped_spread(full, expiry, self.current_time, self.config.risk.expiry_ramp_secs))
    }
}
