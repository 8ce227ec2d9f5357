//! Liquidation economics.
//!
//! Two shapes of settlement share the same spread-adjusted pricing:
//! - synchronous: the solid account repays owed debt and seizes held collateral
//!   worth the repayment at the spread-adjusted owed price.
//! - asynchronous: isolation collateral is converted by the venue first, and the
//!   proceeds (already in the owed asset) are split into repayment, the solid
//!   account's reward and the liquid account's surplus.
//!
//! Either way the solid account nets exactly the spread over the debt it covers.

use crate::types::{AccountId, AssetId, Price, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// Opaque route supplied by an external liquidity router. only `min_output` is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteData {
    pub min_output: Wei,
    pub payload: Vec<u8>,
}

impl RouteData {
    pub fn with_min_output(min_output: Wei) -> Self {
        Self {
            min_output,
            payload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("No route from {from:?} to {to:?}")]
    NoRoute { from: AssetId, to: AssetId },
}

/// External router used to swap seized collateral inside a synchronous liquidation.
pub trait LiquidityRouter: Debug {
    fn swap(
        &self,
        input_asset: AssetId,
        input_amount: Wei,
        output_asset: AssetId,
        route: &RouteData,
    ) -> Result<Wei, RouterError>;
}

/// Router quoting a fixed rate per pair. used by tests and the simulation.
#[derive(Debug, Clone, Default)]
pub struct FixedRateRouter {
    rates: HashMap<(AssetId, AssetId), Decimal>,
}

impl FixedRateRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, from: AssetId, to: AssetId, rate: Decimal) {
        self.rates.insert((from, to), rate);
    }
}

impl LiquidityRouter for FixedRateRouter {
    fn swap(
        &self,
        input_asset: AssetId,
        input_amount: Wei,
        output_asset: AssetId,
        _route: &RouteData,
    ) -> Result<Wei, RouterError> {
        let rate = self
            .rates
            .get(&(input_asset, output_asset))
            .ok_or(RouterError::NoRoute {
                from: input_asset,
                to: output_asset,
            })?;
        Ok(Wei::new(input_amount.value() * rate))
    }
}

/// A liquidation or expiration request against `liquid`, settled into `solid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOrder {
    pub solid: AccountId,
    pub liquid: AccountId,
    pub held_asset: AssetId,
    pub owed_asset: AssetId,
    /// zero for an immediate liquidation, else the recorded expiry being settled
    pub expiry: Timestamp,
    pub route: Option<RouteData>,
    /// escrowed if the held asset has to go through a conversion venue
    pub execution_fee: Decimal,
}

impl LiquidationOrder {
    pub fn immediate(solid: AccountId, liquid: AccountId, held_asset: AssetId, owed_asset: AssetId) -> Self {
        Self {
            solid,
            liquid,
            held_asset,
            owed_asset,
            expiry: Timestamp::default(),
            route: None,
            execution_fee: Decimal::ZERO,
        }
    }

    pub fn expiration(
        solid: AccountId,
        liquid: AccountId,
        held_asset: AssetId,
        owed_asset: AssetId,
        expiry: Timestamp,
    ) -> Self {
        Self {
            expiry,
            ..Self::immediate(solid, liquid, held_asset, owed_asset)
        }
    }

    pub fn with_route(mut self, route: RouteData) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_fee(mut self, execution_fee: Decimal) -> Self {
        self.execution_fee = execution_fee;
        self
    }

    pub fn min_output(&self) -> Wei {
        self.route.as_ref().map(|r| r.min_output).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLiquidation {
    /// owed asset paid by the solid account, credited to the liquid account
    pub owed_repaid: Wei,
    /// held asset moved from the liquid to the solid account
    pub held_seized: Wei,
}

/// Repay as much debt as the held collateral covers at the spread-adjusted price.
pub fn calculate_sync_liquidation(
    held_balance: Wei,
    owed_debt: Wei,
    held_price: Price,
    owed_price_adj: Price,
) -> SyncLiquidation {
    let held_value = held_balance.value() * held_price.value();
    let debt_value = owed_debt.value() * owed_price_adj.value();

    if debt_value <= held_value {
        SyncLiquidation {
            owed_repaid: owed_debt,
            held_seized: Wei::new(debt_value / held_price.value()),
        }
    } else {
        // collateral runs out first: seize all of it, repay what it is worth
        SyncLiquidation {
            owed_repaid: Wei::new(held_value / owed_price_adj.value()),
            held_seized: held_balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProceedsSplit {
    pub repaid: Wei,
    pub reward: Wei,
    pub surplus: Wei,
}

impl ProceedsSplit {
    /// what stays with the liquid account: repayment plus surplus
    pub fn liquid_credit(&self) -> Wei {
        self.repaid.add(self.surplus)
    }
}

/// Split conversion proceeds (owed asset) between debt repayment, the solid reward and surplus.
/// repaid + reward + surplus == proceeds exactly.
pub fn split_proceeds(proceeds: Wei, debt: Wei, spread: Decimal) -> ProceedsSplit {
    let debt = if debt.is_negative() { Wei::zero() } else { debt };
    let gross_up = Decimal::ONE + spread;
    let full_cost = debt.value() * gross_up;

    if full_cost <= proceeds.value() {
        let reward = debt.value() * spread;
        return ProceedsSplit {
            repaid: debt,
            reward: Wei::new(reward),
            surplus: Wei::new(proceeds.value() - debt.value() - reward),
        };
    }

    let repaid = proceeds.value() / gross_up;
    ProceedsSplit {
        repaid: Wei::new(repaid),
        reward: Wei::new(proceeds.value() - repaid),
        surplus: Wei::zero(),
    }
}
