// 2.0: interest rates. utilization drives a two-segment linear curve, rates are per second.
// 2.0 has the curve params. 2.1 is the curve, 2.2 the per-asset setter, 2.3 index advancement.

use crate::types::{AssetId, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterestError {
    #[error("Invalid interest config: {reason}")]
    InvalidConfig { reason: String },

    #[error("No interest curve configured for asset {0:?}")]
    InvalidToken(AssetId),
}

// all three are annual fractions of one. 0.06 = 6% APR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearStepParams {
    pub lower_optimal_rate: Decimal,
    pub upper_optimal_rate: Decimal,
    pub optimal_utilization: Decimal,
}

impl Default for LinearStepParams {
    fn default() -> Self {
        Self {
            lower_optimal_rate: dec!(0.06),
            upper_optimal_rate: dec!(1.00),
            optimal_utilization: dec!(0.90),
        }
    }
}

// per-second borrow rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterestRate(Decimal);

impl InterestRate {
    pub fn per_second(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn annualized(&self) -> Decimal {
        self.0 * Decimal::from(SECONDS_PER_YEAR)
    }
}

// u = min(borrow / supply, 1). nothing supplied means fully utilized if anything is borrowed.
pub fn utilization(borrow: Decimal, supply: Decimal) -> Decimal {
    if borrow <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if supply <= Decimal::ZERO {
        return Decimal::ONE;
    }
    (borrow / supply).min(Decimal::ONE)
}

/** 2.1: the curve. only constructible from params that pass validation */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearStepFunction {
    params: LinearStepParams,
}

impl LinearStepFunction {
    pub fn new(
        lower_optimal_rate: Decimal,
        upper_optimal_rate: Decimal,
        optimal_utilization: Decimal,
    ) -> Result<Self, InterestError> {
        Self::from_params(LinearStepParams {
            lower_optimal_rate,
            upper_optimal_rate,
            optimal_utilization,
        })
    }

    pub fn from_params(params: LinearStepParams) -> Result<Self, InterestError> {
        if params.lower_optimal_rate > params.upper_optimal_rate {
            return Err(InterestError::InvalidConfig {
                reason: "lower optimal rate exceeds upper optimal rate".to_string(),
            });
        }
        if params.optimal_utilization <= Decimal::ZERO {
            return Err(InterestError::InvalidConfig {
                reason: "optimal utilization must be positive".to_string(),
            });
        }
        if params.optimal_utilization >= Decimal::ONE {
            return Err(InterestError::InvalidConfig {
                reason: "optimal utilization must be below one".to_string(),
            });
        }
        if params.lower_optimal_rate < Decimal::ZERO {
            return Err(InterestError::InvalidConfig {
                reason: "rates cannot be negative".to_string(),
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &LinearStepParams {
        &self.params
    }

    pub fn max_annual_rate(&self) -> Decimal {
        self.params.lower_optimal_rate + self.params.upper_optimal_rate
    }

    // annual rate at utilization u. clamped at L + U past full utilization.
    pub fn annual_rate(&self, u: Decimal) -> Decimal {
        let LinearStepParams {
            lower_optimal_rate: lower,
            upper_optimal_rate: upper,
            optimal_utilization: optimal,
        } = self.params;

        if u <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        if u <= optimal {
            return lower * u / optimal;
        }
        if u >= Decimal::ONE {
            return self.max_annual_rate();
        }
        lower + upper * (u - optimal) / (Decimal::ONE - optimal)
    }

    pub fn get_rate(&self, borrow: Decimal, supply: Decimal) -> InterestRate {
        let annual = self.annual_rate(utilization(borrow, supply));
        InterestRate::per_second(annual / Decimal::from(SECONDS_PER_YEAR))
    }
}

pub trait InterestSetter {
    fn get_interest_rate(
        &self,
        asset: AssetId,
        borrow_wei: Decimal,
        supply_wei: Decimal,
    ) -> Result<InterestRate, InterestError>;
}

impl InterestSetter for LinearStepFunction {
    fn get_interest_rate(
        &self,
        _asset: AssetId,
        borrow_wei: Decimal,
        supply_wei: Decimal,
    ) -> Result<InterestRate, InterestError> {
        Ok(self.get_rate(borrow_wei, supply_wei))
    }
}

/** 2.2: one curve per asset. unconfigured assets are an error, never a default */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModularInterestSetter {
    curves: HashMap<AssetId, LinearStepFunction>,
}

impl ModularInterestSetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_curve(&mut self, asset: AssetId, params: LinearStepParams) -> Result<(), InterestError> {
        let curve = LinearStepFunction::from_params(params)?;
        self.curves.insert(asset, curve);
        Ok(())
    }

    pub fn curve(&self, asset: AssetId) -> Result<&LinearStepFunction, InterestError> {
        self.curves.get(&asset).ok_or(InterestError::InvalidToken(asset))
    }
}

impl InterestSetter for ModularInterestSetter {
    fn get_interest_rate(
        &self,
        asset: AssetId,
        borrow_wei: Decimal,
        supply_wei: Decimal,
    ) -> Result<InterestRate, InterestError> {
        Ok(self.curve(asset)?.get_rate(borrow_wei, supply_wei))
    }
}

// 2.3: per-market indices. wei = par * index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestIndex {
    pub borrow: Decimal,
    pub supply: Decimal,
    pub last_update: Timestamp,
}

impl InterestIndex {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            borrow: Decimal::ONE,
            supply: Decimal::ONE,
            last_update: timestamp,
        }
    }
}

// borrowers pay r * dt. suppliers earn the same interest spread over the larger supply,
// less the protocol's earnings cut.
pub fn accrue_index(
    index: &InterestIndex,
    rate: InterestRate,
    borrow_par: Decimal,
    supply_par: Decimal,
    earnings_rate: Decimal,
    now: Timestamp,
) -> InterestIndex {
    let elapsed = index.last_update.elapsed_until(now);
    if elapsed == 0 || rate.value().is_zero() {
        return InterestIndex {
            last_update: now.max(index.last_update),
            ..*index
        };
    }

    let borrow_interest = rate.value() * Decimal::from(elapsed);
    let borrow_wei = borrow_par * index.borrow;
    let supply_wei = supply_par * index.supply;
    let supply_interest = if supply_wei.is_zero() {
        Decimal::ZERO
    } else {
        borrow_interest * utilization(borrow_wei, supply_wei) * (Decimal::ONE - earnings_rate)
    };

    InterestIndex {
        borrow: index.borrow * (Decimal::ONE + borrow_interest),
        supply: index.supply * (Decimal::ONE + supply_interest),
        last_update: now,
    }
}
