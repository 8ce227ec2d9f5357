//! Market configuration and state.
//!
//! A market is one lendable asset with its own interest indices, total par
//! balances and risk premiums. Isolation markets hold collateral that can only
//! live in a dedicated vault and must be converted asynchronously to be used.

use crate::interest::{utilization, InterestIndex, LinearStepParams};
use crate::types::{AssetId, Par, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarketStatus {
    /// Market can be priced and traded
    #[default]
    Active,
    /// Pricing halted (e.g., the oracle reported zero)
    Paused,
}

/// Static market configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: AssetId,
    /// Human-readable symbol (e.g., "USDC", "plvGLP")
    pub symbol: String,
    /// Scales the global margin ratio: effective = global * (1 + premium)
    pub margin_premium: Decimal,
    /// Scales the global liquidation spread the same way
    pub spread_premium: Decimal,
    /// Isolation assets may only be held by their vault's accounts
    pub is_isolation: bool,
    /// Interest curve for this market
    pub interest: LinearStepParams,
}

impl MarketConfig {
    pub fn new(id: AssetId, symbol: &str) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            margin_premium: Decimal::ZERO,
            spread_premium: Decimal::ZERO,
            is_isolation: false,
            interest: LinearStepParams::default(),
        }
    }

    pub fn isolation(mut self) -> Self {
        self.is_isolation = true;
        self
    }

    pub fn with_premiums(mut self, margin_premium: Decimal, spread_premium: Decimal) -> Self {
        self.margin_premium = margin_premium;
        self.spread_premium = spread_premium;
        self
    }

    pub fn with_interest(mut self, interest: LinearStepParams) -> Self {
        self.interest = interest;
        self
    }
}

/// Total par on each side of the market. borrow is stored as a positive magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalPar {
    pub supply: Decimal,
    pub borrow: Decimal,
}

/// Dynamic market state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub config: MarketConfig,
    pub status: MarketStatus,
    pub index: InterestIndex,
    pub total_par: TotalPar,
}

impl MarketState {
    pub fn new(config: MarketConfig, timestamp: Timestamp) -> Self {
        Self {
            config,
            status: MarketStatus::Active,
            index: InterestIndex::new(timestamp),
            total_par: TotalPar::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MarketStatus::Active
    }

    /// Positive par grows with the supply index, negative par with the borrow index.
    pub fn par_to_wei(&self, par: Par) -> Wei {
        if par.is_negative() {
            Wei::new(par.value() * self.index.borrow)
        } else {
            Wei::new(par.value() * self.index.supply)
        }
    }

    pub fn wei_to_par(&self, wei: Wei) -> Par {
        if wei.is_negative() {
            Par::new(wei.value() / self.index.borrow)
        } else {
            Par::new(wei.value() / self.index.supply)
        }
    }

    /// Move one account's contribution from `old` to `new` in the totals.
    pub fn update_total_par(&mut self, old: Par, new: Par) {
        if old.is_positive() {
            self.total_par.supply -= old.value();
        } else if old.is_negative() {
            self.total_par.borrow += old.value();
        }
        if new.is_positive() {
            self.total_par.supply += new.value();
        } else if new.is_negative() {
            self.total_par.borrow -= new.value();
        }
    }

    pub fn total_supply_wei(&self) -> Decimal {
        self.total_par.supply * self.index.supply
    }

    pub fn total_borrow_wei(&self) -> Decimal {
        self.total_par.borrow * self.index.borrow
    }

    pub fn utilization(&self) -> Decimal {
        utilization(self.total_borrow_wei(), self.total_supply_wei())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Market {0:?} not found")]
    MarketNotFound(AssetId),

    #[error("Market {0:?} is paused")]
    MarketPaused(AssetId),

    #[error("Market {0:?} is not an isolation market")]
    NotIsolation(AssetId),

    #[error("Market {0:?} already listed")]
    AlreadyListed(AssetId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state() -> MarketState {
        MarketState::new(MarketConfig::new(AssetId(1), "USDC"), Timestamp::from_secs(0))
    }

    #[test]
    fn config_builders() {
        let config = MarketConfig::new(AssetId(7), "plvGLP")
            .isolation()
            .with_premiums(dec!(0.2), dec!(0.5));
        assert!(config.is_isolation);
        assert_eq!(config.margin_premium, dec!(0.2));
        assert_eq!(config.spread_premium, dec!(0.5));
    }

    #[test]
    fn par_wei_uses_side_index() {
        let mut market = state();
        market.index.supply = dec!(1.1);
        market.index.borrow = dec!(1.2);

        assert_eq!(market.par_to_wei(Par::new(dec!(10))).value(), dec!(11));
        assert_eq!(market.par_to_wei(Par::new(dec!(-10))).value(), dec!(-12));
        assert_eq!(market.wei_to_par(Wei::new(dec!(11))).value(), dec!(10));
        assert_eq!(market.wei_to_par(Wei::new(dec!(-12))).value(), dec!(-10));
    }

    #[test]
    fn totals_follow_sign_changes() {
        let mut market = state();
        market.update_total_par(Par::zero(), Par::new(dec!(100)));
        market.update_total_par(Par::zero(), Par::new(dec!(-40)));
        assert_eq!(market.total_par.supply, dec!(100));
        assert_eq!(market.total_par.borrow, dec!(40));

        // supplier flips to a borrower
        market.update_total_par(Par::new(dec!(100)), Par::new(dec!(-5)));
        assert_eq!(market.total_par.supply, dec!(0));
        assert_eq!(market.total_par.borrow, dec!(45));
        assert_eq!(market.utilization(), Decimal::ONE);
    }

    #[test]
    fn new_market_is_active() {
        let market = state();
        assert!(market.is_active());
        assert_eq!(market.utilization(), Decimal::ZERO);
    }
}
