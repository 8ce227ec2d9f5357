//! Ordinary balance operations: deposit, withdraw (and borrow), transfer.
//!
//! None of these may touch a frozen account. Anything that could leave an
//! account short is applied tentatively, checked, and rolled back on failure.

use super::core::{BalanceDelta, Engine};
use super::results::EngineError;
use crate::ledger::LedgerError;
use crate::types::{AccountId, Address, AssetId, Wei};
use tracing::info;

impl Engine {
    pub fn deposit(&mut self, caller: Address, account: AccountId, asset: AssetId, amount: Wei) -> Result<Wei, EngineError> {
        require_positive(amount)?;
        self.require_controller(caller, account)?;
        self.require_unfrozen(account)?;
        self.accrue(&[asset])?;

        let resulting = self.ledger.get_balance(account, asset)?.add(amount);
        self.check_isolation(account, asset, resulting)?;

        self.ledger.ensure_account(account, self.current_time);
        let deltas: [BalanceDelta; 1] = [(account, asset, amount)];
        let payloads = self.apply_deltas(&deltas)?;
        self.clear_settled_expiries(&deltas)?;
        self.emit_all(payloads);
        Ok(resulting)
    }

    /// Withdraw below zero borrows. the account has to stay healthy.
    pub fn withdraw(&mut self, caller: Address, account: AccountId, asset: AssetId, amount: Wei) -> Result<Wei, EngineError> {
        require_positive(amount)?;
        self.require_controller(caller, account)?;
        self.require_unfrozen(account)?;
        self.accrue_account(account, &[asset])?;

        let resulting = self.ledger.get_balance(account, asset)?.sub(amount);
        self.check_isolation(account, asset, resulting)?;

        let deltas: [BalanceDelta; 1] = [(account, asset, amount.negate())];
        self.apply_checked(&deltas, account)?;
        if resulting.is_negative() {
            info!(account = %account, asset = asset.0, debt = %resulting, "borrow");
        }
        Ok(resulting)
    }

    /// Move a balance between two accounts of the same controller.
    pub fn transfer(
        &mut self,
        caller: Address,
        from: AccountId,
        to: AccountId,
        asset: AssetId,
        amount: Wei,
    ) -> Result<(), EngineError> {
        require_positive(amount)?;
        self.require_controller(caller, from)?;
        self.require_controller(caller, to)?;
        self.require_unfrozen(from)?;
        self.require_unfrozen(to)?;
        self.accrue_account(from, &[asset])?;

        let from_after = self.ledger.get_balance(from, asset)?.sub(amount);
        let to_after = self.ledger.get_balance(to, asset)?.add(amount);
        self.check_isolation(from, asset, from_after)?;
        self.check_isolation(to, asset, to_after)?;

        self.ledger.ensure_account(to, self.current_time);
        let deltas: [BalanceDelta; 2] = [(from, asset, amount.negate()), (to, asset, amount)];
        self.apply_checked(&deltas, from)
    }

    // apply, then require `account` healthy. nothing changes on failure
    fn apply_checked(&mut self, deltas: &[BalanceDelta], account: AccountId) -> Result<(), EngineError> {
        let snapshot = self.snapshot_pars(deltas);
        let payloads = self.apply_deltas(deltas)?;

        let healthy = match self.is_account_healthy(account) {
            Ok(healthy) => healthy,
            Err(e) => {
                self.restore_pars(&snapshot)?;
                return Err(e);
            }
        };
        if !healthy {
            self.restore_pars(&snapshot)?;
            return Err(EngineError::Undercollateralized(account));
        }

        self.clear_settled_expiries(deltas)?;
        self.emit_all(payloads);
        Ok(())
    }
}

fn require_positive(amount: Wei) -> Result<(), EngineError> {
    if !amount.is_positive() {
        return Err(LedgerError::NonPositiveAmount(amount).into());
    }
    Ok(())
}
