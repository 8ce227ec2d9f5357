//! Collateralization: account health and spread-adjusted pricing.
//!
//! An account is healthy while the value of its positive balances covers the
//! value of its debts times the margin ratio. Liquidations and expirations
//! price the owed asset at a premium (the spread) that sizes the settler's reward.
//!
//! Per-market premiums scale the global parameters so riskier assets demand
//! more collateral and pay liquidators more.

use crate::config::RiskParams;
use crate::expiry::ramped_spread;
use crate::ledger::{LedgerError, MarginLedger};
use crate::market::MarketError;
use crate::oracle::{checked_price, OracleError, PriceOracle};
use crate::types::{AccountId, AssetId, Price, Timestamp, Value};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

// 1.15 with a 0.2 premium → 1.18. the premium scales the buffer, not the whole ratio.
pub fn effective_margin_ratio(global: Decimal, premium: Decimal) -> Decimal {
    Decimal::ONE + (global - Decimal::ONE) * (Decimal::ONE + premium)
}

pub fn effective_spread(global: Decimal, held_premium: Decimal, owed_premium: Decimal) -> Decimal {
    global * (Decimal::ONE + held_premium) * (Decimal::ONE + owed_premium)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountValues {
    pub supply: Value,
    pub borrow: Value,
    /// borrow value scaled by each debt market's margin ratio
    pub borrow_adjusted: Value,
}

impl AccountValues {
    pub fn is_healthy(&self) -> bool {
        self.supply >= self.borrow_adjusted
    }

    pub fn has_debt(&self) -> bool {
        self.borrow.value() > Decimal::ZERO
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy { supply: Value, borrow_adjusted: Value },
    Liquidatable { shortfall: Value },
}

/// Read-only view over ledger + oracle at one instant.
pub struct PricingContext<'a> {
    pub ledger: &'a MarginLedger,
    pub oracle: &'a dyn PriceOracle,
    pub risk: &'a RiskParams,
    pub now: Timestamp,
    pub max_staleness_secs: u64,
}

impl<'a> PricingContext<'a> {
    pub fn price(&self, asset: AssetId) -> Result<Price, CollateralError> {
        let market = self.ledger.market(asset)?;
        if !market.is_active() {
            return Err(LedgerError::Market(MarketError::MarketPaused(asset)).into());
        }
        Ok(checked_price(self.oracle, asset, self.now, self.max_staleness_secs)?)
    }

    pub fn margin_ratio(&self, asset: AssetId) -> Result<Decimal, CollateralError> {
        let premium = self.ledger.market(asset)?.config.margin_premium;
        Ok(effective_margin_ratio(self.risk.margin_ratio, premium))
    }

    pub fn account_values(&self, account: AccountId) -> Result<AccountValues, CollateralError> {
        let mut supply = Value::zero();
        let mut borrow = Value::zero();
        let mut borrow_adjusted = Value::zero();

        for (asset, wei) in self.ledger.balances(account)? {
            let price = self.price(asset)?;
            let value = Value::of(wei.abs(), price);
            if wei.is_positive() {
                supply = supply.add(value);
            } else {
                borrow = borrow.add(value);
                borrow_adjusted = borrow_adjusted.add(value.mul(self.margin_ratio(asset)?));
            }
        }

        Ok(AccountValues {
            supply,
            borrow,
            borrow_adjusted,
        })
    }

    pub fn is_account_healthy(&self, account: AccountId) -> Result<bool, CollateralError> {
        Ok(self.account_values(account)?.is_healthy())
    }

    pub fn health_status(&self, account: AccountId) -> Result<HealthStatus, CollateralError> {
        let values = self.account_values(account)?;
        if values.is_healthy() {
            Ok(HealthStatus::Healthy {
                supply: values.supply,
                borrow_adjusted: values.borrow_adjusted,
            })
        } else {
            Ok(HealthStatus::Liquidatable {
                shortfall: values.borrow_adjusted.sub(values.supply),
            })
        }
    }

    pub fn liquidation_spread(&self, held: AssetId, owed: AssetId) -> Result<Decimal, CollateralError> {
        let held_premium = self.ledger.market(held)?.config.spread_premium;
        let owed_premium = self.ledger.market(owed)?.config.spread_premium;
        Ok(effective_spread(self.risk.liquidation_spread, held_premium, owed_premium))
    }

    /// Spread in effect: the full spread for immediate liquidation (expiry zero),
    /// the ramped spread for an expiration.
    pub fn spread_for(&self, held: AssetId, owed: AssetId, expiry: Timestamp) -> Result<Decimal, CollateralError> {
        let full = self.liquidation_spread(held, owed)?;
        if expiry.is_zero() {
            return Ok(full);
        }
        Ok(ramped_spread(full, expiry, self.now, self.risk.expiry_ramp_secs))
    }

    /// (held price, owed price with spread)
    pub fn get_spread_adjusted_prices(
        &self,
        held: AssetId,
        owed: AssetId,
        expiry: Timestamp,
    ) -> Result<(Price, Price), CollateralError> {
        let held_price = self.price(held)?;
        let owed_price = self.price(owed)?;
        let spread = self.spread_for(held, owed, expiry)?;
        Ok((held_price, owed_price.with_spread(spread)))
    }
}
