//! Margin Core Simulation.
//!
//! Walks the conversion and liquidation lifecycle end to end: interest curve,
//! unwrap through a venue, cancel and retry, liquidation checks, expiry ramps,
//! two-phase liquidation of isolation collateral and the operator escape hatch.
//! Set `RUST_LOG=margin_core=debug` to see every emitted event.

use margin_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

const ADMIN: Address = Address(1);
const OWNER: Address = Address(10);
const KEEPER: Address = Address(20);
const OPERATOR: Address = Address(30);
const VAULT: Address = Address(100);
const VENUE: VenueId = VenueId(7);

const USDC: AssetId = AssetId(1);
const WETH: AssetId = AssetId(2);
const GLP: AssetId = AssetId(5);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("margin_core=info")))
        .init();

    println!("Margin Core Simulation");
    println!("Cross-margin ledger, async conversions, freezable liquidations\n");

    scenario_1_interest_curve();
    scenario_2_unwrap();
    scenario_3_cancel_and_retry();
    scenario_4_healthy_account();
    scenario_5_expiry_ramp();
    scenario_6_two_phase_liquidation();
    scenario_7_force_unfreeze();

    println!("\nAll simulations completed successfully.");
}

/// Engine with USDC, WETH and an isolation asset with its venue and one vault.
fn setup() -> Engine {
    let mut engine = Engine::new(Environment::Development.config(), ADMIN);
    engine.set_time(Timestamp::now());

    engine.add_market(ADMIN, MarketConfig::new(USDC, "USDC")).unwrap();
    engine.add_market(ADMIN, MarketConfig::new(WETH, "WETH")).unwrap();
    engine
        .add_market(ADMIN, MarketConfig::new(GLP, "plvGLP").isolation())
        .unwrap();
    engine.update_price(USDC, dec!(1)).unwrap();
    engine.update_price(WETH, dec!(2000)).unwrap();
    engine.update_price(GLP, dec!(1)).unwrap();

    engine.set_venue(ADMIN, GLP, VENUE).unwrap();
    engine.grant(ADMIN, KEEPER, Capability::Liquidator).unwrap();
    engine.grant(ADMIN, OPERATOR, Capability::Operator).unwrap();
    engine
        .register_vault(ADMIN, Vault {
            address: VAULT,
            owner: OWNER,
            isolation_asset: GLP,
        })
        .unwrap();
    engine
        .deposit(KEEPER, AccountId::new(KEEPER, 0), USDC, Wei::new(dec!(100000)))
        .unwrap();
    engine
}

fn vault_account() -> AccountId {
    AccountId::new(VAULT, 1)
}

fn count_executed(engine: &Engine) -> usize {
    engine
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::ConversionExecuted(_)))
        .count()
}

/// Rate at zero and full utilization.
fn scenario_1_interest_curve() {
    println!("Scenario 1: Interest Curve\n");

    let curve = LinearStepFunction::new(dec!(0.06), dec!(1.00), dec!(0.90)).unwrap();
    for (borrow, supply) in [(dec!(0), dec!(100)), (dec!(45), dec!(100)), (dec!(90), dec!(100)), (dec!(100), dec!(100))] {
        let rate = curve.get_rate(borrow, supply);
        println!("  utilization {}/{} → {:.4} APR", borrow, supply, rate.annualized());
    }
    println!();
}

/// Unwrap 200 units, venue fills 190.
fn scenario_2_unwrap() {
    println!("Scenario 2: Unwrap Through the Venue\n");

    let mut engine = setup();
    engine.deposit(OWNER, vault_account(), GLP, Wei::new(dec!(200))).unwrap();

    let order = ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(200)), Wei::new(dec!(180))).with_fee(dec!(0.01));
    let key = engine.initiate(OWNER, order).unwrap();
    println!("  Requested unwrap {}, frozen: {}", key, engine.is_account_frozen(VAULT, 1));

    engine.on_execute_callback(VENUE, key, Wei::new(dec!(190)), dec!(0.004)).unwrap();
    println!(
        "  Executed: GLP {}, USDC {}, frozen: {}",
        engine.get_balance(vault_account(), GLP).unwrap(),
        engine.get_balance(vault_account(), USDC).unwrap(),
        engine.is_account_frozen(VAULT, 1)
    );

    let replay = engine.on_execute_callback(VENUE, key, Wei::new(dec!(190)), dec!(0)).unwrap();
    println!("  Redelivered callback: {:?}, executed events: {}", replay, count_executed(&engine));
    println!("  Fee refund owed to owner: {}\n", engine.fee_refund_balance(OWNER));
}

/// Venue cancels on slippage, owner retries with a lower minimum.
fn scenario_3_cancel_and_retry() {
    println!("Scenario 3: Cancel and Retry\n");

    let mut engine = setup();
    engine.deposit(OWNER, vault_account(), GLP, Wei::new(dec!(200))).unwrap();

    let order = ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(200)), Wei::new(dec!(195))).with_fee(dec!(0.01));
    let key = engine.initiate(OWNER, order).unwrap();
    engine.on_cancel_callback(VENUE, key, CancelReason::Slippage, dec!(0.002)).unwrap();
    println!("  Cancelled on slippage, still frozen: {}", engine.is_account_frozen(VAULT, 1));

    engine.retry(OWNER, key, Wei::new(dec!(185)), Decimal::ZERO).unwrap();
    engine.on_execute_callback(VENUE, key, Wei::new(dec!(188)), dec!(0.002)).unwrap();
    println!(
        "  Retried and executed: USDC {}, executed events: {}\n",
        engine.get_balance(vault_account(), USDC).unwrap(),
        count_executed(&engine)
    );
}

/// Healthy accounts cannot be liquidated.
fn scenario_4_healthy_account() {
    println!("Scenario 4: Healthy Account\n");

    let mut engine = setup();
    let borrower = AccountId::new(OWNER, 0);
    engine.deposit(OWNER, borrower, WETH, Wei::new(dec!(1))).unwrap();
    engine.withdraw(OWNER, borrower, USDC, Wei::new(dec!(1500))).unwrap();

    let order = LiquidationOrder::immediate(AccountId::new(KEEPER, 0), borrower, WETH, USDC);
    match engine.liquidate(KEEPER, order.clone()) {
        Err(e) => println!("  Rejected: {}", e),
        Ok(outcome) => println!("  Unexpected: {:?}", outcome),
    }

    engine.update_price(WETH, dec!(1700)).unwrap();
    if let Ok(LiquidationOutcome::Settled(result)) = engine.liquidate(KEEPER, order) {
        println!(
            "  After WETH drops to 1700: repaid {}, seized {} WETH, reward {}\n",
            result.owed_repaid,
            result.held_seized.value().round_dp(6),
            result.reward.value().round_dp(6)
        );
    }
}

/// Expiry spread ramps in over the configured window.
fn scenario_5_expiry_ramp() {
    println!("Scenario 5: Expiry Ramp\n");

    let mut engine = setup();
    let borrower = AccountId::new(OWNER, 0);
    engine.deposit(OWNER, borrower, WETH, Wei::new(dec!(1))).unwrap();
    engine.withdraw(OWNER, borrower, USDC, Wei::new(dec!(1000))).unwrap();

    let expiry = engine.set_expiry(OWNER, borrower, USDC, 600).unwrap();
    let ramp = engine.config().risk.expiry_ramp_secs;
    for offset in [0, ramp / 2, ramp, ramp + 1] {
        engine.set_time(expiry.plus(offset));
        println!("  T+{:>5}s spread {}", offset, engine.expiration_spread(WETH, USDC, expiry).unwrap());
    }
    println!();
}

/// Liquidating isolation collateral: unwrap first, distribute on execute.
fn scenario_6_two_phase_liquidation() {
    println!("Scenario 6: Two-Phase Liquidation\n");

    let mut engine = setup();
    engine.deposit(OWNER, vault_account(), GLP, Wei::new(dec!(1000))).unwrap();
    engine.withdraw(OWNER, vault_account(), USDC, Wei::new(dec!(800))).unwrap();
    engine.update_price(GLP, dec!(0.9)).unwrap();
    println!("  GLP drops to 0.9: {:?}", engine.health_status(vault_account()).unwrap());

    let solid = AccountId::new(KEEPER, 0);
    let order = LiquidationOrder::immediate(solid, vault_account(), GLP, USDC)
        .with_route(RouteData::with_min_output(Wei::new(dec!(850))))
        .with_fee(dec!(0.01));
    let outcome = engine.liquidate(KEEPER, order).unwrap();
    println!("  Phase one: {:?}", outcome);

    if let Some(key) = outcome.key() {
        engine.on_execute_callback(VENUE, key, Wei::new(dec!(890)), dec!(0.005)).unwrap();
    }
    println!(
        "  Phase two: vault USDC {}, solid USDC {}, frozen: {}\n",
        engine.get_balance(vault_account(), USDC).unwrap(),
        engine.get_balance(solid, USDC).unwrap(),
        engine.is_account_frozen(VAULT, 1)
    );
}

/// Venue goes silent; an operator restores the account.
fn scenario_7_force_unfreeze() {
    println!("Scenario 7: Force Unfreeze\n");

    let mut engine = setup();
    engine.deposit(OWNER, vault_account(), GLP, Wei::new(dec!(200))).unwrap();
    let order = ConversionOrder::unwrap_into(VAULT, 1, USDC, Wei::new(dec!(200)), Wei::new(dec!(180))).with_fee(dec!(0.01));
    let key = engine.initiate(OWNER, order).unwrap();

    if let Err(e) = engine.force_unfreeze(OPERATOR, key) {
        println!("  Too early: {}", e);
    }
    let timeout = engine.config().conversion.venue_timeout_secs;
    engine.advance_time(timeout);
    engine.force_unfreeze(OPERATOR, key).unwrap();
    println!(
        "  Unfrozen: {}, GLP {}, stuck requests left: {}",
        !engine.is_account_frozen(VAULT, 1),
        engine.get_balance(vault_account(), GLP).unwrap(),
        engine.pending_conversions().len()
    );
}
