// 6.2: expiration settlement. matured debt gets a forced-settlement price whose
// spread ramps in linearly, giving the borrower a grace window to repay first.

use crate::types::{AccountId, AssetId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryError {
    #[error("Expiry already set for {account} on {asset:?}")]
    ExpiryAlreadySet { account: AccountId, asset: AssetId },

    #[error("{account} has no debt in {asset:?}")]
    NoDebt { account: AccountId, asset: AssetId },

    #[error("Expiry duration must be positive")]
    ZeroDuration,
}

// fraction of the full spread earned at `now`: 0 at expiry, 1 at expiry + ramp, clamped after
pub fn ramp_fraction(expiry: Timestamp, now: Timestamp, ramp_secs: u64) -> Decimal {
    if now <= expiry {
        return Decimal::ZERO;
    }
    if ramp_secs == 0 {
        return Decimal::ONE;
    }
    let elapsed = expiry.elapsed_until(now);
    if elapsed >= ramp_secs {
        return Decimal::ONE;
    }
    Decimal::from(elapsed) / Decimal::from(ramp_secs)
}

pub fn ramped_spread(full_spread: Decimal, expiry: Timestamp, now: Timestamp, ramp_secs: u64) -> Decimal {
    full_spread * ramp_fraction(expiry, now, ramp_secs)
}

/// One expiry per (account, owed asset). cleared once the debt is repaid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiryRegistry {
    expiries: HashMap<(AccountId, AssetId), Timestamp>,
}

impl ExpiryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: AccountId, asset: AssetId) -> Option<Timestamp> {
        self.expiries.get(&(account, asset)).copied()
    }

    pub fn set(
        &mut self,
        account: AccountId,
        asset: AssetId,
        duration_secs: u64,
        now: Timestamp,
    ) -> Result<Timestamp, ExpiryError> {
        if duration_secs == 0 {
            return Err(ExpiryError::ZeroDuration);
        }
        if self.expiries.contains_key(&(account, asset)) {
            return Err(ExpiryError::ExpiryAlreadySet { account, asset });
        }
        let expiry = now.plus(duration_secs);
        self.expiries.insert((account, asset), expiry);
        Ok(expiry)
    }

    pub fn clear(&mut self, account: AccountId, asset: AssetId) -> Option<Timestamp> {
        self.expiries.remove(&(account, asset))
    }

    // matured = recorded, equal to the claimed expiry, and already reached
    pub fn is_matured(&self, account: AccountId, asset: AssetId, claimed: Timestamp, now: Timestamp) -> bool {
        match self.get(account, asset) {
            Some(expiry) => expiry == claimed && now >= expiry,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;
    use rust_decimal_macros::dec;

    fn account() -> AccountId {
        AccountId::new(Address(1), 0)
    }

    #[test]
    fn spread_ramps_then_clamps() {
        let t = Timestamp::from_secs(1_000);
        let ramp = 3_600;
        let full = dec!(0.05);

        assert_eq!(ramped_spread(full, t, t, ramp), dec!(0));
        assert_eq!(ramped_spread(full, t, t.plus(1_800), ramp), dec!(0.025));
        assert_eq!(ramped_spread(full, t, t.plus(ramp), ramp), full);
        assert_eq!(ramped_spread(full, t, t.plus(ramp + 1), ramp), full);
    }

    #[test]
    fn before_expiry_is_zero() {
        let t = Timestamp::from_secs(1_000);
        assert_eq!(ramp_fraction(t, Timestamp::from_secs(10), 60), Decimal::ZERO);
    }

    #[test]
    fn set_once_until_cleared() {
        let mut registry = ExpiryRegistry::new();
        let now = Timestamp::from_secs(100);

        let expiry = registry.set(account(), AssetId(1), 50, now).unwrap();
        assert_eq!(expiry, Timestamp::from_secs(150));
        assert_eq!(
            registry.set(account(), AssetId(1), 10, now),
            Err(ExpiryError::ExpiryAlreadySet { account: account(), asset: AssetId(1) })
        );

        registry.clear(account(), AssetId(1));
        assert!(registry.set(account(), AssetId(1), 10, now).is_ok());
    }

    #[test]
    fn maturity_requires_matching_claim() {
        let mut registry = ExpiryRegistry::new();
        let expiry = registry.set(account(), AssetId(1), 50, Timestamp::from_secs(0)).unwrap();

        assert!(!registry.is_matured(account(), AssetId(1), expiry, Timestamp::from_secs(49)));
        assert!(registry.is_matured(account(), AssetId(1), expiry, Timestamp::from_secs(50)));
        assert!(!registry.is_matured(account(), AssetId(1), Timestamp::from_secs(40), Timestamp::from_secs(60)));
        assert!(!registry.is_matured(account(), AssetId(2), expiry, Timestamp::from_secs(60)));
    }

    #[test]
    fn zero_duration_rejected() {
        let mut registry = ExpiryRegistry::new();
        assert_eq!(
            registry.set(account(), AssetId(1), 0, Timestamp::from_secs(0)),
            Err(ExpiryError::ZeroDuration)
        );
    }
}
