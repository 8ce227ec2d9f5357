// Price Oracle Client
//
// The engine only consumes spot prices; it never aggregates them. Any source
// (Chainlink, Pyth, a chain-local aggregator) plugs in through `PriceOracle`.
// A zero price is never usable: the market has to be paused instead.

use crate::types::{AssetId, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// A spot price and when it was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePrice {
    pub value: Decimal,
    pub timestamp: Timestamp,
}

impl OraclePrice {
    pub fn new(value: Decimal, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }

    pub fn is_stale(&self, now: Timestamp, max_staleness_secs: u64) -> bool {
        now > self.timestamp.plus(max_staleness_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No price for asset {0:?}")]
    NoPrice(AssetId),

    #[error("Oracle returned zero price for asset {0:?}")]
    ZeroPrice(AssetId),

    #[error("Price for asset {asset:?} is stale: updated {updated_at}, now {now}")]
    PriceStale {
        asset: AssetId,
        updated_at: Timestamp,
        now: Timestamp,
    },

    #[error("Oracle does not accept price submissions")]
    ReadOnly,
}

/// Trait for price sources the engine reads from.
pub trait PriceOracle: Debug {
    fn get_price(&self, asset: AssetId) -> Result<OraclePrice, OracleError>;

    /// Push a new observation. read-only sources keep the default.
    fn submit_price(&mut self, _asset: AssetId, _price: OraclePrice) -> Result<(), OracleError> {
        Err(OracleError::ReadOnly)
    }
}

/// In-memory oracle for tests and simulation. stores whatever it is told, zero included.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    prices: HashMap<AssetId, OraclePrice>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, asset: AssetId, value: Decimal, timestamp: Timestamp) {
        self.prices.insert(asset, OraclePrice::new(value, timestamp));
    }
}

impl PriceOracle for StaticOracle {
    fn get_price(&self, asset: AssetId) -> Result<OraclePrice, OracleError> {
        self.prices.get(&asset).copied().ok_or(OracleError::NoPrice(asset))
    }

    fn submit_price(&mut self, asset: AssetId, price: OraclePrice) -> Result<(), OracleError> {
        self.prices.insert(asset, price);
        Ok(())
    }
}

/// Read a price that is safe to value collateral with: present, non-zero, fresh.
pub fn checked_price(
    oracle: &dyn PriceOracle,
    asset: AssetId,
    now: Timestamp,
    max_staleness_secs: u64,
) -> Result<Price, OracleError> {
    let observed = oracle.get_price(asset)?;
    let Some(price) = Price::new(observed.value) else {
        return Err(OracleError::ZeroPrice(asset));
    };
    if observed.is_stale(now, max_staleness_secs) {
        return Err(OracleError::PriceStale {
            asset,
            updated_at: observed.timestamp,
            now,
        });
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn staleness_window_is_inclusive() {
        let price = OraclePrice::new(dec!(1), Timestamp::from_secs(1000));
        assert!(!price.is_stale(Timestamp::from_secs(1060), 60));
        assert!(price.is_stale(Timestamp::from_secs(1061), 60));
    }

    #[test]
    fn checked_price_happy_path() {
        let mut oracle = StaticOracle::new();
        oracle.set_price(AssetId(1), dec!(2000), Timestamp::from_secs(10));
        let price = checked_price(&oracle, AssetId(1), Timestamp::from_secs(20), 60).unwrap();
        assert_eq!(price.value(), dec!(2000));
    }

    #[test]
    fn zero_price_is_fatal() {
        let mut oracle = StaticOracle::new();
        oracle.set_price(AssetId(1), dec!(0), Timestamp::from_secs(10));
        let result = checked_price(&oracle, AssetId(1), Timestamp::from_secs(10), 60);
        assert_eq!(result, Err(OracleError::ZeroPrice(AssetId(1))));
    }

    #[test]
    fn missing_and_stale_prices() {
        let mut oracle = StaticOracle::new();
        assert_eq!(
            checked_price(&oracle, AssetId(3), Timestamp::from_secs(0), 60),
            Err(OracleError::NoPrice(AssetId(3)))
        );

        oracle.set_price(AssetId(3), dec!(5), Timestamp::from_secs(0));
        assert!(matches!(
            checked_price(&oracle, AssetId(3), Timestamp::from_secs(61), 60),
            Err(OracleError::PriceStale { .. })
        ));
    }

    #[test]
    fn submit_goes_through_trait() {
        let mut oracle: Box<dyn PriceOracle> = Box::new(StaticOracle::new());
        oracle
            .submit_price(AssetId(1), OraclePrice::new(dec!(3), Timestamp::from_secs(1)))
            .unwrap();
        assert_eq!(oracle.get_price(AssetId(1)).unwrap().value, dec!(3));
    }
}
