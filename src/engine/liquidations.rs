//! Liquidation router.
//!
//! Ordinary held collateral settles synchronously. Isolation collateral has to
//! be unwrapped by its venue first: phase one freezes the liquid account and
//! requests the unwrap with a liquidation intent attached, phase two happens
//! in `on_execute_callback` when the proceeds arrive.

use super::core::{BalanceDelta, Engine};
use super::results::{EngineError, LiquidationOutcome, LiquidationResult};
use crate::conversion::{ConversionKey, ConversionOrder, Direction, InitiatedBy, LiquidationIntent};
use crate::events::{AccountLiquidatedEvent, EventPayload, LiquidationIntentAttachedEvent};
use crate::liquidation::{calculate_sync_liquidation, LiquidationOrder};
use crate::registry::Capability;
use crate::types::{AccountId, Address, Price, Wei};
use tracing::info;

impl Engine {
    /// Liquidate `order.liquid` into `order.solid`, or settle a matured expiry when `order.expiry` is set.
    pub fn liquidate(&mut self, caller: Address, order: LiquidationOrder) -> Result<LiquidationOutcome, EngineError> {
        let LiquidationOrder {
            solid,
            liquid,
            held_asset: held,
            owed_asset: owed,
            expiry,
            ..
        } = order;

        if solid == liquid {
            return Err(EngineError::SelfLiquidation(solid));
        }
        self.require_controller(caller, solid)?;
        if held == owed || self.ledger.market(owed)?.config.is_isolation {
            return Err(EngineError::NothingToLiquidate { account: liquid, held, owed });
        }
        let held_isolated = self.ledger.market(held)?.config.is_isolation;

        self.accrue_account(liquid, &[held, owed])?;
        self.accrue_account(solid, &[])?;

        let eligible = if expiry.is_zero() {
            !self.is_account_healthy(liquid)?
        } else {
            self.expiries.is_matured(liquid, owed, expiry, self.current_time)
        };
        if !eligible {
            return Err(EngineError::NotLiquidatable(liquid));
        }

        let held_balance = self.ledger.get_balance(liquid, held)?;
        let owed_balance = self.ledger.get_balance(liquid, owed)?;
        if !held_balance.is_positive() || !owed_balance.is_negative() {
            return Err(EngineError::NothingToLiquidate { account: liquid, held, owed });
        }

        let (held_price, owed_price_adj) = self.pricing().get_spread_adjusted_prices(held, owed, expiry)?;

        if held_isolated {
            self.access.require(caller, Capability::Liquidator)?;
            self.require_unfrozen(solid)?;
            let intent = LiquidationIntent {
                liquidator: caller,
                solid,
                held_asset: held,
                owed_asset: owed,
                expiry,
            };
            return self.liquidate_isolated(order, intent, held_balance);
        }

        self.liquidate_sync(order, held_balance, owed_balance.abs(), held_price, owed_price_adj)
    }

    // phase one: attach to a compatible in-flight unwrap, or start one for the whole held balance
    fn liquidate_isolated(
        &mut self,
        order: LiquidationOrder,
        intent: LiquidationIntent,
        held_balance: Wei,
    ) -> Result<LiquidationOutcome, EngineError> {
        let liquid = order.liquid;

        if self.conversions.is_frozen(liquid) {
            let live = self.conversions.live_for(liquid);
            let compatible = match live.as_slice() {
                [only] => only.direction == Direction::Unwrap
                    && only.output_asset == intent.owed_asset
                    && only.intent.is_none(),
                _ => false,
            };
            let key = live.first().map(|r| r.key);
            let Some(key) = key else {
                return Err(EngineError::AccountFrozen(liquid));
            };
            if !compatible {
                return Err(EngineError::AlreadyFrozenIncompatible { account: liquid, key });
            }

            if let Some(request) = self.conversions.get_mut(key) {
                request.intent = Some(intent);
            }
            info!(key = %key, liquid = %liquid, solid = %intent.solid, "liquidation intent attached");
            self.emit_event(EventPayload::LiquidationIntentAttached(LiquidationIntentAttachedEvent {
                key,
                solid: intent.solid,
                owed_asset: intent.owed_asset,
            }));
            return Ok(LiquidationOutcome::IntentAttached(key));
        }

        let vault = *self.vaults.get(liquid.owner)?;
        let mut conversion = ConversionOrder::unwrap_into(
            liquid.owner,
            liquid.number,
            intent.owed_asset,
            held_balance,
            order.min_output(),
        )
        .with_fee(order.execution_fee);
        if let Some(route) = order.route {
            conversion.route = route;
        }
        let key = self.open_conversion(&vault, conversion, intent.liquidator, InitiatedBy::Liquidation, Some(intent))?;
        info!(key = %key, liquid = %liquid, "liquidation unwrap requested");
        Ok(LiquidationOutcome::ConversionStarted(key))
    }

    fn liquidate_sync(
        &mut self,
        order: LiquidationOrder,
        held_balance: Wei,
        owed_debt: Wei,
        held_price: Price,
        owed_price_adj: Price,
    ) -> Result<LiquidationOutcome, EngineError> {
        let LiquidationOrder {
            solid,
            liquid,
            held_asset: held,
            owed_asset: owed,
            expiry,
            ref route,
            ..
        } = order;

        // a frozen account can still be liquidated on assets its conversion does not touch
        if let Some(request) = self
            .conversions
            .live_for(liquid)
            .into_iter()
            .find(|r| r.involves(held) || r.involves(owed))
        {
            return Err(EngineError::AlreadyFrozenIncompatible {
                account: liquid,
                key: request.key,
            });
        }
        self.require_unfrozen(solid)?;

        let plan = calculate_sync_liquidation(held_balance, owed_debt, held_price, owed_price_adj);

        // the seized collateral at oracle prices, which is repaid plus the spread
        let owed_price = self.pricing().price(owed)?;
        let seized_value = Wei::new(plan.held_seized.value() * held_price.value() / owed_price.value());

        let (credit, swap_output) = match route {
            Some(route) => {
                let router = self.router.as_ref().ok_or(EngineError::NoLiquidityRouter)?;
                let output = router.swap(held, plan.held_seized, owed, route)?;
                if output < route.min_output {
                    return Err(EngineError::RouteAmountMismatch {
                        expected: route.min_output,
                        actual: output,
                    });
                }
                (output.min(seized_value), Some(output))
            }
            None => (seized_value, None),
        };
        let reward = credit.sub(plan.owed_repaid);

        // output the route earns above the spread stays with the liquid account
        let excess = swap_output.map_or(Wei::zero(), |output| output.sub(credit));
        let mut deltas: Vec<BalanceDelta> = vec![
            (liquid, held, plan.held_seized.negate()),
            (liquid, owed, plan.owed_repaid.add(excess)),
            (solid, owed, plan.owed_repaid.negate()),
        ];
        match swap_output {
            Some(_) => deltas.push((solid, owed, credit)),
            None => deltas.push((solid, held, plan.held_seized)),
        }

        let snapshot = self.snapshot_pars(&deltas);
        let payloads = self.apply_deltas(&deltas)?;
        let solid_ok = match self.is_account_healthy(solid) {
            Ok(healthy) => healthy,
            Err(e) => {
                self.restore_pars(&snapshot)?;
                return Err(e);
            }
        };
        if !solid_ok {
            self.restore_pars(&snapshot)?;
            return Err(EngineError::SolidUndercollateralized(solid));
        }
        self.clear_settled_expiries(&deltas)?;

        info!(
            solid = %solid,
            liquid = %liquid,
            repaid = %plan.owed_repaid,
            seized = %plan.held_seized,
            "account liquidated"
        );
        self.emit_all(payloads);
        self.emit_event(EventPayload::AccountLiquidated(AccountLiquidatedEvent {
            solid,
            liquid,
            held_asset: held,
            owed_asset: owed,
            repaid: plan.owed_repaid,
            reward,
            expiry,
        }));

        Ok(LiquidationOutcome::Settled(LiquidationResult {
            solid,
            liquid,
            held_asset: held,
            owed_asset: owed,
            owed_repaid: plan.owed_repaid,
            held_seized: plan.held_seized,
            swap_output,
            reward,
            expiry,
        }))
    }

    /// Accounts the router would accept right now as immediate liquidations. frozen accounts included.
    pub fn liquidatable_accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self
            .ledger
            .accounts()
            .filter(|a| a.has_debt())
            .filter(|a| matches!(self.is_account_healthy(a.id), Ok(false)))
            .map(|a| a.id)
            .collect();
        accounts.sort();
        accounts
    }

    /// Live conversions carrying a liquidation intent, oldest first.
    pub fn pending_liquidations(&self) -> Vec<(ConversionKey, LiquidationIntent)> {
        self.pending_conversions()
            .into_iter()
            .filter_map(|r| r.intent.map(|intent| (r.key, intent)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CallbackOutcome, EngineConfig};
    use crate::liquidation::{FixedRateRouter, RouteData};
    use crate::market::MarketConfig;
    use crate::registry::Vault;
    use crate::types::{AssetId, VenueId};
    use rust_decimal_macros::dec;

    const ADMIN: Address = Address(1);
    const BORROWER: Address = Address(10);
    const KEEPER: Address = Address(20);
    const VAULT: Address = Address(100);
    const VENUE: VenueId = VenueId(7);
    const USDC: AssetId = AssetId(1);
    const WETH: AssetId = AssetId(2);
    const GLP: AssetId = AssetId(5);

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default(), ADMIN);
        engine.add_market(ADMIN, MarketConfig::new(USDC, "USDC")).unwrap();
        engine.add_market(ADMIN, MarketConfig::new(WETH, "WETH")).unwrap();
        engine.add_market(ADMIN, MarketConfig::new(GLP, "plvGLP").isolation()).unwrap();
        engine.update_price(USDC, dec!(1)).unwrap();
        engine.update_price(WETH, dec!(2000)).unwrap();
        engine.update_price(GLP, dec!(1)).unwrap();
        engine.set_venue(ADMIN, GLP, VENUE).unwrap();
        engine.grant(ADMIN, KEEPER, Capability::Liquidator).unwrap();
        engine
            .register_vault(ADMIN, Vault {
                address: VAULT,
                owner: BORROWER,
                isolation_asset: GLP,
            })
            .unwrap();
        engine.deposit(KEEPER, solid(), USDC, Wei::new(dec!(100000))).unwrap();
        engine
    }

    fn solid() -> AccountId {
        AccountId::new(KEEPER, 0)
    }

    fn borrower() -> AccountId {
        AccountId::new(BORROWER, 0)
    }

    fn vault_account() -> AccountId {
        AccountId::new(VAULT, 1)
    }

    // 1 WETH collateral, 1500 USDC debt. healthy at 2000, liquidatable at 1700
    fn underwater_borrower(engine: &mut Engine) {
        engine.deposit(BORROWER, borrower(), WETH, Wei::new(dec!(1))).unwrap();
        engine.withdraw(BORROWER, borrower(), USDC, Wei::new(dec!(1500))).unwrap();
        engine.update_price(WETH, dec!(1700)).unwrap();
    }

    // 1000 GLP collateral against 800 USDC debt, then GLP drops to 0.9
    fn underwater_vault(engine: &mut Engine) {
        engine.deposit(BORROWER, vault_account(), GLP, Wei::new(dec!(1000))).unwrap();
        engine.withdraw(BORROWER, vault_account(), USDC, Wei::new(dec!(800))).unwrap();
        engine.update_price(GLP, dec!(0.9)).unwrap();
    }

    #[test]
    fn healthy_account_not_liquidatable() {
        let mut engine = engine();
        engine.deposit(BORROWER, borrower(), WETH, Wei::new(dec!(1))).unwrap();
        engine.withdraw(BORROWER, borrower(), USDC, Wei::new(dec!(1500))).unwrap();
        let events = engine.events().len();

        let err = engine
            .liquidate(KEEPER, LiquidationOrder::immediate(solid(), borrower(), WETH, USDC))
            .unwrap_err();
        assert_eq!(err, EngineError::NotLiquidatable(borrower()));
        assert_eq!(engine.events().len(), events);
        assert_eq!(engine.get_balance(borrower(), USDC).unwrap().value(), dec!(-1500));
    }

    #[test]
    fn sync_liquidation_pays_spread() {
        let mut engine = engine();
        underwater_borrower(&mut engine);
        assert_eq!(engine.liquidatable_accounts(), vec![borrower()]);

        let outcome = engine
            .liquidate(KEEPER, LiquidationOrder::immediate(solid(), borrower(), WETH, USDC))
            .unwrap();
        let LiquidationOutcome::Settled(result) = outcome else {
            panic!("expected a synchronous settlement");
        };

        // 1500 * 1.05 = 1575 of WETH at 1700
        assert_eq!(result.owed_repaid.value(), dec!(1500));
        assert_eq!((result.held_seized.value() * dec!(1700)).round_dp(10), dec!(1575));
        assert_eq!(result.reward.value().round_dp(10), dec!(75));
        assert_eq!(engine.get_balance(borrower(), USDC).unwrap(), Wei::zero());
        assert_eq!(engine.get_balance(solid(), USDC).unwrap().value(), dec!(98500));
    }

    #[test]
    fn sync_liquidation_through_router() {
        let mut engine = engine();
        underwater_borrower(&mut engine);
        let mut router = FixedRateRouter::new();
        router.set_rate(WETH, USDC, dec!(1690));
        engine.set_router(Box::new(router));

        let too_greedy = LiquidationOrder::immediate(solid(), borrower(), WETH, USDC)
            .with_route(RouteData::with_min_output(Wei::new(dec!(1600))));
        assert!(matches!(
            engine.liquidate(KEEPER, too_greedy),
            Err(EngineError::RouteAmountMismatch { .. })
        ));
        assert_eq!(engine.get_balance(borrower(), WETH).unwrap().value(), dec!(1));

        let order = LiquidationOrder::immediate(solid(), borrower(), WETH, USDC)
            .with_route(RouteData::with_min_output(Wei::new(dec!(1500))));
        let LiquidationOutcome::Settled(result) = engine.liquidate(KEEPER, order).unwrap() else {
            panic!("expected a synchronous settlement");
        };
        let output = result.swap_output.unwrap();
        assert!(output.value() >= dec!(1500));
        assert_eq!(engine.get_balance(solid(), WETH).unwrap(), Wei::zero());

        // a fill below the spread value is all the solid gets, and the reward says so
        assert_eq!(result.reward, output.sub(result.owed_repaid));
        assert_eq!(
            engine.get_balance(solid(), USDC).unwrap().value().round_dp(10),
            (dec!(98500) + output.value()).round_dp(10)
        );
    }

    #[test]
    fn routed_fill_above_oracle_returns_excess() {
        let mut engine = engine();
        underwater_borrower(&mut engine);
        let mut router = FixedRateRouter::new();
        router.set_rate(WETH, USDC, dec!(1800));
        engine.set_router(Box::new(router));

        let order = LiquidationOrder::immediate(solid(), borrower(), WETH, USDC)
            .with_route(RouteData::with_min_output(Wei::new(dec!(1500))));
        let LiquidationOutcome::Settled(result) = engine.liquidate(KEEPER, order).unwrap() else {
            panic!("expected a synchronous settlement");
        };

        // seized 1575 worth at 1700 sells for ~1667.65 at 1800
        let output = result.swap_output.unwrap().value();
        assert!(output > dec!(1667) && output < dec!(1668));
        assert_eq!(result.reward.value().round_dp(10), dec!(75));
        assert_eq!(
            engine.get_balance(solid(), USDC).unwrap().value().round_dp(10),
            dec!(100075)
        );
        assert_eq!(
            engine.get_balance(borrower(), USDC).unwrap().value().round_dp(10),
            (output - dec!(1575)).round_dp(10)
        );
        assert!(engine.events().iter().any(|e| matches!(
            &e.payload,
            EventPayload::AccountLiquidated(ev) if ev.reward == result.reward
        )));
    }

    #[test]
    fn isolation_liquidation_is_two_phase() {
        let mut engine = engine();
        underwater_vault(&mut engine);

        let order = LiquidationOrder::immediate(solid(), vault_account(), GLP, USDC)
            .with_route(RouteData::with_min_output(Wei::new(dec!(850))))
            .with_fee(dec!(0.01));
        assert!(matches!(
            engine.liquidate(Address(77), order.clone()),
            Err(EngineError::Unauthorized { .. })
        ));

        let outcome = engine.liquidate(KEEPER, order).unwrap();
        let LiquidationOutcome::ConversionStarted(key) = outcome else {
            panic!("expected an unwrap request");
        };
        assert!(engine.is_account_frozen(VAULT, 1));
        assert_eq!(engine.get_conversion_info(key).unwrap().input_amount.value(), dec!(1000));

        // proceeds 890: repay 800, reward 40, surplus 50
        let outcome = engine.on_execute_callback(VENUE, key, Wei::new(dec!(890)), dec!(0)).unwrap();
        assert_eq!(outcome, CallbackOutcome::Applied);
        assert_eq!(engine.get_balance(vault_account(), GLP).unwrap(), Wei::zero());
        assert_eq!(engine.get_balance(vault_account(), USDC).unwrap().value(), dec!(50));
        assert_eq!(engine.get_balance(solid(), USDC).unwrap().value(), dec!(100040));
        assert!(!engine.is_account_frozen(VAULT, 1));
        assert!(engine.events().iter().any(|e| matches!(
            &e.payload,
            EventPayload::AccountLiquidated(ev) if ev.reward.value() == dec!(40)
        )));
    }

    #[test]
    fn intent_attaches_to_owner_unwrap() {
        let mut engine = engine();
        engine.deposit(BORROWER, vault_account(), GLP, Wei::new(dec!(1000))).unwrap();
        engine.withdraw(BORROWER, vault_account(), USDC, Wei::new(dec!(800))).unwrap();
        let owner_order = ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(500)), Wei::new(dec!(400)))
            .with_fee(dec!(0.01));
        let key = engine.initiate(BORROWER, owner_order).unwrap();
        engine.update_price(GLP, dec!(0.9)).unwrap();

        let outcome = engine
            .liquidate(KEEPER, LiquidationOrder::immediate(solid(), vault_account(), GLP, USDC))
            .unwrap();
        assert_eq!(outcome, LiquidationOutcome::IntentAttached(key));
        assert!(engine.get_conversion_info(key).unwrap().intent.is_some());
        assert_eq!(engine.pending_liquidations().len(), 1);

        // a second intent is not compatible
        assert!(matches!(
            engine.liquidate(KEEPER, LiquidationOrder::immediate(solid(), vault_account(), GLP, USDC)),
            Err(EngineError::AlreadyFrozenIncompatible { .. })
        ));
    }

    #[test]
    fn frozen_account_blocks_sync_on_involved_assets() {
        let mut engine = engine();
        engine.deposit(BORROWER, vault_account(), GLP, Wei::new(dec!(1000))).unwrap();
        engine.deposit(BORROWER, vault_account(), WETH, Wei::new(dec!(1))).unwrap();
        engine.withdraw(BORROWER, vault_account(), USDC, Wei::new(dec!(2000))).unwrap();
        let owner_order = ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(1000)), Wei::new(dec!(900)))
            .with_fee(dec!(0.01));
        engine.initiate(BORROWER, owner_order).unwrap();
        engine.update_price(WETH, dec!(1000)).unwrap();

        // WETH is not involved, but the owed USDC is the unwrap's output
        assert!(matches!(
            engine.liquidate(KEEPER, LiquidationOrder::immediate(solid(), vault_account(), WETH, USDC)),
            Err(EngineError::AlreadyFrozenIncompatible { .. })
        ));
    }

    #[test]
    fn expiration_settles_matured_debt() {
        let mut engine = engine();
        engine.deposit(BORROWER, borrower(), WETH, Wei::new(dec!(1))).unwrap();
        engine.withdraw(BORROWER, borrower(), USDC, Wei::new(dec!(1000))).unwrap();
        let expiry = engine.set_expiry(BORROWER, borrower(), USDC, 60).unwrap();
        let order = LiquidationOrder::expiration(solid(), borrower(), WETH, USDC, expiry);

        assert_eq!(
            engine.liquidate(KEEPER, order.clone()),
            Err(EngineError::NotLiquidatable(borrower()))
        );

        // halfway through the ramp, prices refreshed
        engine.set_time(expiry.plus(engine.config().risk.expiry_ramp_secs / 2));
        engine.update_price(USDC, dec!(1)).unwrap();
        engine.update_price(WETH, dec!(2000)).unwrap();
        let LiquidationOutcome::Settled(result) = engine.liquidate(KEEPER, order).unwrap() else {
            panic!("expected a synchronous settlement");
        };
        // a little interest accrued while waiting
        assert_eq!(result.owed_repaid.value().round_dp(3), dec!(1000));
        assert_eq!(result.reward.value().round_dp(3), dec!(25));
        assert_eq!(engine.get_expiry(borrower(), USDC), None);
    }

    #[test]
    fn stale_price_blocks_liquidation() {
        let mut engine = engine();
        underwater_borrower(&mut engine);
        engine.advance_time(engine.config().oracle.max_staleness_secs + 1);
        let err = engine
            .liquidate(KEEPER, LiquidationOrder::immediate(solid(), borrower(), WETH, USDC))
            .unwrap_err();
        assert!(err.is_price_stale());
    }

    #[test]
    fn solid_must_stay_healthy() {
        let mut engine = engine();
        underwater_borrower(&mut engine);
        let poor = AccountId::new(KEEPER, 1);
        let err = engine
            .liquidate(KEEPER, LiquidationOrder::immediate(poor, borrower(), WETH, USDC))
            .unwrap_err();
        assert_eq!(err, EngineError::SolidUndercollateralized(poor));
        assert_eq!(engine.get_balance(borrower(), USDC).unwrap().value(), dec!(-1500));
        assert_eq!(engine.get_balance(poor, USDC).unwrap(), Wei::zero());
    }
}
