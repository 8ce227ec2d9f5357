// 8.0 engine/core.rs: main engine. holds the ledger, the conversion book, registries and the event log.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::collateral::{AccountValues, HealthStatus, PricingContext};
use crate::conversion::ConversionBook;
use crate::events::{BalanceChangedEvent, Event, EventLog, EventPayload};
use crate::expiry::ExpiryRegistry;
use crate::ledger::{LedgerError, MarginLedger};
use crate::liquidation::LiquidityRouter;
use crate::market::{MarketConfig, MarketError, MarketState, MarketStatus};
use crate::oracle::{OraclePrice, PriceOracle, StaticOracle};
use crate::registry::{AccessTable, Capability, ConversionVenueRegistry, RegistryError, Vault, VaultRegistry};
use crate::types::{AccountId, Address, AssetId, Par, Timestamp, VenueId, Wei};
use rust_decimal::Decimal;
use tracing::{debug, info};

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) ledger: MarginLedger,
    pub(super) oracle: Box<dyn PriceOracle>,
    pub(super) router: Option<Box<dyn LiquidityRouter>>,
    pub(super) conversions: ConversionBook,
    pub(super) expiries: ExpiryRegistry,
    pub(super) access: AccessTable,
    pub(super) venues: ConversionVenueRegistry,
    pub(super) vaults: VaultRegistry,
    pub(super) events: EventLog,
    pub(super) current_time: Timestamp,
}

/// One signed wei change to apply to the ledger.
pub(super) type BalanceDelta = (AccountId, AssetId, Wei);

impl Engine {
    pub fn new(config: EngineConfig, admin: Address) -> Self {
        Self::with_oracle(config, admin, Box::new(StaticOracle::new()))
    }

    pub fn with_oracle(config: EngineConfig, admin: Address, oracle: Box<dyn PriceOracle>) -> Self {
        let conversions = ConversionBook::new(config.resolution_history);
        let events = EventLog::new(config.max_events);
        Self {
            config,
            ledger: MarginLedger::new(),
            oracle,
            router: None,
            conversions,
            expiries: ExpiryRegistry::new(),
            access: AccessTable::new(admin),
            venues: ConversionVenueRegistry::new(),
            vaults: VaultRegistry::new(),
            events,
            current_time: Timestamp::default(),
        }
    }

    /// Validates the config before building.
    pub fn try_new(config: EngineConfig, admin: Address) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::new(config, admin))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_router(&mut self, router: Box<dyn LiquidityRouter>) {
        self.router = Some(router);
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = self.current_time.plus(secs);
    }

    // --- markets ---

    pub fn add_market(&mut self, caller: Address, config: MarketConfig) -> Result<AssetId, EngineError> {
        self.access.require_admin(caller)?;
        let asset = self.ledger.add_market(config, self.current_time)?;
        info!(asset = asset.0, "market listed");
        Ok(asset)
    }

    pub fn get_market(&self, asset: AssetId) -> Option<&MarketState> {
        self.ledger.market(asset).ok()
    }

    pub fn pause_market(&mut self, caller: Address, asset: AssetId) -> Result<(), EngineError> {
        self.access.require_admin(caller)?;
        self.ledger.market_mut(asset)?.status = MarketStatus::Paused;
        Ok(())
    }

    pub fn resume_market(&mut self, caller: Address, asset: AssetId) -> Result<(), EngineError> {
        self.access.require_admin(caller)?;
        self.ledger.market_mut(asset)?.status = MarketStatus::Active;
        Ok(())
    }

    pub fn update_price(&mut self, asset: AssetId, value: Decimal) -> Result<(), EngineError> {
        self.oracle.submit_price(asset, OraclePrice::new(value, self.current_time))?;
        Ok(())
    }

    // --- registries ---

    pub fn grant(&mut self, caller: Address, subject: Address, capability: Capability) -> Result<(), EngineError> {
        self.access.grant(caller, subject, capability)?;
        Ok(())
    }

    pub fn revoke(&mut self, caller: Address, subject: Address, capability: Capability) -> Result<(), EngineError> {
        self.access.revoke(caller, subject, capability)?;
        Ok(())
    }

    pub fn set_venue(&mut self, caller: Address, asset: AssetId, venue: VenueId) -> Result<(), EngineError> {
        self.access.require_admin(caller)?;
        if !self.ledger.market(asset)?.config.is_isolation {
            return Err(LedgerError::Market(MarketError::NotIsolation(asset)).into());
        }
        self.venues.set_venue(asset, venue, self.current_time);
        Ok(())
    }

    pub fn venue_heartbeat(&mut self, venue: VenueId) {
        self.venues.record_liveness(venue, self.current_time);
    }

    /// Admin only. the address must not already own accounts, or its owner would take them over.
    pub fn register_vault(&mut self, caller: Address, vault: Vault) -> Result<(), EngineError> {
        self.access.require_admin(caller)?;
        if self.ledger.accounts().any(|a| a.id.owner == vault.address) {
            return Err(RegistryError::AddressInUse(vault.address).into());
        }
        if !self.ledger.market(vault.isolation_asset)?.config.is_isolation {
            return Err(LedgerError::Market(MarketError::NotIsolation(vault.isolation_asset)).into());
        }
        self.vaults.register(vault)?;
        info!(vault = vault.address.0, owner = vault.owner.0, "vault registered");
        Ok(())
    }

    pub fn get_vault(&self, address: Address) -> Option<&Vault> {
        self.vaults.get(address).ok()
    }

    // --- reads ---

    pub fn get_balance(&self, account: AccountId, asset: AssetId) -> Result<Wei, EngineError> {
        Ok(self.ledger.get_balance(account, asset)?)
    }

    pub fn get_par(&self, account: AccountId, asset: AssetId) -> Par {
        self.ledger.get_par(account, asset)
    }

    pub fn ledger(&self) -> &MarginLedger {
        &self.ledger
    }

    pub fn account_values(&self, account: AccountId) -> Result<AccountValues, EngineError> {
        Ok(self.pricing().account_values(account)?)
    }

    pub fn is_account_healthy(&self, account: AccountId) -> Result<bool, EngineError> {
        Ok(self.pricing().is_account_healthy(account)?)
    }

    pub fn health_status(&self, account: AccountId) -> Result<HealthStatus, EngineError> {
        Ok(self.pricing().health_status(account)?)
    }

    pub fn is_account_frozen(&self, vault: Address, account_number: u64) -> bool {
        self.conversions.freeze_state().is_account_frozen(vault, account_number)
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub(super) fn pricing(&self) -> PricingContext<'_> {
        PricingContext {
            ledger: &self.ledger,
            oracle: self.oracle.as_ref(),
            risk: &self.config.risk,
            now: self.current_time,
            max_staleness_secs: self.config.oracle.max_staleness_secs,
        }
    }

    /// Bring indices up to now before any read that values or moves balances.
    pub(super) fn accrue(&mut self, assets: &[AssetId]) -> Result<(), EngineError> {
        let earnings_rate = self.config.risk.earnings_rate;
        for asset in assets {
            self.ledger.accrue(*asset, self.current_time, earnings_rate)?;
        }
        Ok(())
    }

    /// Every market the account holds, plus `extra`.
    pub(super) fn accrue_account(&mut self, account: AccountId, extra: &[AssetId]) -> Result<(), EngineError> {
        let mut assets: Vec<AssetId> = self
            .ledger
            .account(account)
            .map(|a| a.balances.keys().copied().collect())
            .unwrap_or_default();
        assets.extend_from_slice(extra);
        assets.sort();
        assets.dedup();
        self.accrue(&assets)
    }

    pub(super) fn require_unfrozen(&self, account: AccountId) -> Result<(), EngineError> {
        if self.conversions.is_frozen(account) {
            return Err(EngineError::AccountFrozen(account));
        }
        Ok(())
    }

    pub(super) fn require_controller(&self, caller: Address, account: AccountId) -> Result<(), EngineError> {
        if self.vaults.controller_of(account) != caller {
            return Err(EngineError::Unauthorized { caller });
        }
        Ok(())
    }

    // isolation assets live only in their own vault, and are never borrowed
    pub(super) fn check_isolation(&self, account: AccountId, asset: AssetId, resulting: Wei) -> Result<(), EngineError> {
        if !self.ledger.market(asset)?.config.is_isolation || resulting.is_zero() {
            return Ok(());
        }
        let owns = self
            .vaults
            .vault_of(account)
            .is_some_and(|v| v.isolation_asset == asset);
        if resulting.is_negative() || !owns {
            return Err(EngineError::IsolationViolation { account, asset });
        }
        Ok(())
    }

    /// Apply deltas in order. returns the BalanceChanged payloads to emit once the caller commits.
    pub(super) fn apply_deltas(&mut self, deltas: &[BalanceDelta]) -> Result<Vec<EventPayload>, EngineError> {
        let mut payloads = Vec::with_capacity(deltas.len());
        for (account, asset, delta) in deltas {
            if delta.is_zero() {
                continue;
            }
            let new_balance = self.ledger.apply_delta(*account, *asset, *delta)?;
            payloads.push(EventPayload::BalanceChanged(BalanceChangedEvent {
                account: *account,
                asset: *asset,
                delta: *delta,
                new_balance,
            }));
        }
        Ok(payloads)
    }

    pub(super) fn snapshot_pars(&self, deltas: &[BalanceDelta]) -> Vec<BalanceSnapshot> {
        deltas
            .iter()
            .map(|(account, asset, _)| (*account, *asset, self.ledger.get_par(*account, *asset)))
            .collect()
    }

    // undo a tentative apply. restores in reverse so repeated pairs end at their first value
    pub(super) fn restore_pars(&mut self, snapshot: &[BalanceSnapshot]) -> Result<(), EngineError> {
        for (account, asset, par) in snapshot.iter().rev() {
            self.ledger.set_par(*account, *asset, *par)?;
        }
        Ok(())
    }

    /// A debt that is gone takes its expiry with it.
    pub(super) fn clear_settled_expiries(&mut self, deltas: &[BalanceDelta]) -> Result<(), EngineError> {
        for (account, asset, _) in deltas {
            if self.expiries.get(*account, *asset).is_some() && !self.ledger.get_balance(*account, *asset)?.is_negative() {
                self.expiries.clear(*account, *asset);
                debug!(account = %account, asset = asset.0, "expiry cleared");
            }
        }
        Ok(())
    }

    pub(super) fn emit_all(&mut self, payloads: Vec<EventPayload>) {
        for payload in payloads {
            self.emit_event(payload);
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = self.events.record(self.current_time, payload);
        debug!(id = event.id.0, payload = ?event.payload, "event");
    }
}

pub(super) type BalanceSnapshot = (AccountId, AssetId, Par);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ADMIN: Address = Address(1);

    #[test]
    fn admin_gates_listing() {
        let mut engine = Engine::new(EngineConfig::default(), ADMIN);
        assert!(engine.add_market(Address(9), MarketConfig::new(AssetId(1), "USDC")).is_err());
        assert_eq!(engine.add_market(ADMIN, MarketConfig::new(AssetId(1), "USDC")).unwrap(), AssetId(1));
        assert!(engine.get_market(AssetId(1)).is_some());
    }

    #[test]
    fn events_are_capped() {
        let config = EngineConfig {
            max_events: 2,
            ..Default::default()
        };
        let mut engine = Engine::new(config, ADMIN);
        for i in 0..5u64 {
            engine.emit_event(EventPayload::BalanceChanged(BalanceChangedEvent {
                account: AccountId::new(Address(2), 0),
                asset: AssetId(1),
                delta: Wei::new(Decimal::from(i)),
                new_balance: Wei::zero(),
            }));
        }
        assert_eq!(engine.events().len(), 2);
        assert_eq!(engine.events()[0].id, crate::events::EventId(4));
    }

    #[test]
    fn venues_only_for_isolation_markets() {
        let mut engine = Engine::new(EngineConfig::default(), ADMIN);
        engine.add_market(ADMIN, MarketConfig::new(AssetId(1), "USDC")).unwrap();
        engine.add_market(ADMIN, MarketConfig::new(AssetId(5), "plvGLP").isolation()).unwrap();

        assert!(engine.set_venue(ADMIN, AssetId(1), VenueId(1)).is_err());
        assert!(engine.set_venue(ADMIN, AssetId(5), VenueId(1)).is_ok());
    }

    #[test]
    fn vault_registration_is_guarded() {
        let mut engine = Engine::new(EngineConfig::default(), ADMIN);
        engine.add_market(ADMIN, MarketConfig::new(AssetId(1), "USDC")).unwrap();
        engine.add_market(ADMIN, MarketConfig::new(AssetId(5), "plvGLP").isolation()).unwrap();
        engine.update_price(AssetId(1), dec!(1)).unwrap();

        let wallet = Address(10);
        let victim = AccountId::new(wallet, 0);
        engine.deposit(wallet, victim, AssetId(1), Wei::new(dec!(1000))).unwrap();

        let hijack = Vault {
            address: wallet,
            owner: Address(66),
            isolation_asset: AssetId(5),
        };
        assert_eq!(
            engine.register_vault(Address(66), hijack),
            Err(EngineError::Registry(RegistryError::NotAdmin(Address(66))))
        );
        assert_eq!(
            engine.register_vault(ADMIN, hijack),
            Err(EngineError::Registry(RegistryError::AddressInUse(wallet)))
        );
        assert!(engine.get_vault(wallet).is_none());

        // the wallet still controls its own account
        assert!(matches!(
            engine.withdraw(Address(66), victim, AssetId(1), Wei::new(dec!(1))),
            Err(EngineError::Unauthorized { .. })
        ));
        engine.withdraw(wallet, victim, AssetId(1), Wei::new(dec!(1))).unwrap();

        let fresh = Vault {
            address: Address(100),
            ..hijack
        };
        engine.register_vault(ADMIN, fresh).unwrap();
        assert_eq!(engine.get_vault(Address(100)), Some(&fresh));
    }

    #[test]
    fn time_and_prices() {
        let mut engine = Engine::new(EngineConfig::default(), ADMIN);
        engine.add_market(ADMIN, MarketConfig::new(AssetId(1), "USDC")).unwrap();
        engine.set_time(Timestamp::from_secs(100));
        engine.advance_time(20);
        assert_eq!(engine.time(), Timestamp::from_secs(120));

        engine.update_price(AssetId(1), dec!(1)).unwrap();
        assert_eq!(engine.pricing().price(AssetId(1)).unwrap().value(), dec!(1));
    }
}
