//! Margin ledger.
//!
//! Every account holds a signed par balance per asset. Balances are read as
//! wei (par times the market index) and written as wei deltas, so interest
//! accrues by moving the index rather than touching accounts.

use crate::interest::{accrue_index, InterestError, InterestIndex, InterestSetter, ModularInterestSetter};
use crate::market::{MarketConfig, MarketError, MarketState};
use crate::types::{AccountId, AssetId, Par, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balances: BTreeMap<AssetId, Par>,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: AccountId, timestamp: Timestamp) -> Self {
        Self {
            id,
            balances: BTreeMap::new(),
            created_at: timestamp,
        }
    }

    pub fn par(&self, asset: AssetId) -> Par {
        self.balances.get(&asset).copied().unwrap_or_default()
    }

    pub fn has_debt(&self) -> bool {
        self.balances.values().any(|p| p.is_negative())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Interest error: {0}")]
    Interest(#[from] InterestError),

    #[error("Insufficient balance of {asset:?} in {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        requested: Wei,
        available: Wei,
    },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Wei),
}

#[derive(Debug, Clone, Default)]
pub struct MarginLedger {
    markets: BTreeMap<AssetId, MarketState>,
    accounts: HashMap<AccountId, Account>,
    interest: ModularInterestSetter,
}

impl MarginLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_market(&mut self, config: MarketConfig, now: Timestamp) -> Result<AssetId, LedgerError> {
        let asset = config.id;
        if self.markets.contains_key(&asset) {
            return Err(MarketError::AlreadyListed(asset).into());
        }
        self.interest.set_curve(asset, config.interest)?;
        self.markets.insert(asset, MarketState::new(config, now));
        Ok(asset)
    }

    pub fn market(&self, asset: AssetId) -> Result<&MarketState, LedgerError> {
        self.markets
            .get(&asset)
            .ok_or(LedgerError::Market(MarketError::MarketNotFound(asset)))
    }

    pub fn market_mut(&mut self, asset: AssetId) -> Result<&mut MarketState, LedgerError> {
        self.markets
            .get_mut(&asset)
            .ok_or(LedgerError::Market(MarketError::MarketNotFound(asset)))
    }

    pub fn markets(&self) -> impl Iterator<Item = &MarketState> {
        self.markets.values()
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn get_par(&self, account: AccountId, asset: AssetId) -> Par {
        self.accounts
            .get(&account)
            .map(|a| a.par(asset))
            .unwrap_or_default()
    }

    pub fn get_balance(&self, account: AccountId, asset: AssetId) -> Result<Wei, LedgerError> {
        let market = self.market(asset)?;
        Ok(market.par_to_wei(self.get_par(account, asset)))
    }

    /// Non-zero wei balances of an account, in asset order.
    pub fn balances(&self, account: AccountId) -> Result<Vec<(AssetId, Wei)>, LedgerError> {
        let Some(acc) = self.accounts.get(&account) else {
            return Ok(Vec::new());
        };
        acc.balances
            .iter()
            .filter(|(_, par)| !par.is_zero())
            .map(|(asset, par)| -> Result<(AssetId, Wei), LedgerError> {
                Ok((*asset, self.market(*asset)?.par_to_wei(*par)))
            })
            .collect()
    }

    pub fn current_index(&self, asset: AssetId) -> Result<InterestIndex, LedgerError> {
        Ok(self.market(asset)?.index)
    }

    pub fn require_balance(&self, account: AccountId, asset: AssetId, amount: Wei) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let available = self.get_balance(account, asset)?;
        if available.value() < amount.value() {
            return Err(LedgerError::InsufficientBalance {
                account,
                asset,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Add a signed wei delta. returns the new wei balance.
    pub fn apply_delta(&mut self, account: AccountId, asset: AssetId, delta: Wei) -> Result<Wei, LedgerError> {
        let market = self.market(asset)?;
        let old_par = self.get_par(account, asset);
        let new_wei = market.par_to_wei(old_par).add(delta);
        let new_par = market.wei_to_par(new_wei);
        self.set_par(account, asset, new_par)?;
        Ok(new_wei)
    }

    /// Overwrite a par balance. totals are kept in step.
    pub fn set_par(&mut self, account: AccountId, asset: AssetId, par: Par) -> Result<(), LedgerError> {
        let old_par = self.get_par(account, asset);
        self.market_mut(asset)?.update_total_par(old_par, par);

        let entry = self
            .accounts
            .entry(account)
            .or_insert_with(|| Account::new(account, Timestamp::default()));
        if par.is_zero() {
            entry.balances.remove(&asset);
        } else {
            entry.balances.insert(asset, par);
        }
        Ok(())
    }

    pub fn ensure_account(&mut self, account: AccountId, now: Timestamp) {
        self.accounts
            .entry(account)
            .or_insert_with(|| Account::new(account, now));
    }

    pub fn snapshot(&self, account: AccountId, assets: &[AssetId]) -> Vec<(AssetId, Par)> {
        assets.iter().map(|a| (*a, self.get_par(account, *a))).collect()
    }

    /// Advance a market's indices to `now` using the current, index-updated totals.
    pub fn accrue(&mut self, asset: AssetId, now: Timestamp, earnings_rate: Decimal) -> Result<(), LedgerError> {
        let market = self.market(asset)?;
        let rate = self.interest.get_interest_rate(
            asset,
            market.total_borrow_wei(),
            market.total_supply_wei(),
        )?;
        let next = accrue_index(
            &market.index,
            rate,
            market.total_par.borrow,
            market.total_par.supply,
            earnings_rate,
            now,
        );
        self.market_mut(asset)?.index = next;
        Ok(())
    }

    pub fn accrue_all(&mut self, now: Timestamp, earnings_rate: Decimal) -> Result<(), LedgerError> {
        let assets: Vec<AssetId> = self.markets.keys().copied().collect();
        for asset in assets {
            self.accrue(asset, now, earnings_rate)?;
        }
        Ok(())
    }
}
