//! Vault freeze state.
//!
//! The only authority on whether an account-number may take ordinary balance
//! changes. An account is frozen exactly while it has at least one live
//! conversion request (Pending, or Cancelled and retryable).

use crate::conversion::ConversionKey;
use crate::types::{AccountId, Address};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultFreezeState {
    live: HashMap<AccountId, BTreeSet<ConversionKey>>,
}

impl VaultFreezeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&mut self, account: AccountId, key: ConversionKey) {
        self.live.entry(account).or_default().insert(key);
    }

    /// Drop one key. returns true if the account is no longer frozen.
    pub fn release(&mut self, account: AccountId, key: ConversionKey) -> bool {
        let Some(keys) = self.live.get_mut(&account) else {
            return true;
        };
        keys.remove(&key);
        if keys.is_empty() {
            self.live.remove(&account);
            true
        } else {
            false
        }
    }

    pub fn is_frozen(&self, account: AccountId) -> bool {
        self.live.get(&account).is_some_and(|keys| !keys.is_empty())
    }

    pub fn is_account_frozen(&self, vault: Address, account_number: u64) -> bool {
        self.is_frozen(AccountId::new(vault, account_number))
    }

    pub fn live_keys(&self, account: AccountId) -> Vec<ConversionKey> {
        self.live
            .get(&account)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn frozen_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(nonce: u64) -> ConversionKey {
        ConversionKey { vault: Address(9), nonce }
    }

    #[test]
    fn freeze_and_release() {
        let mut state = VaultFreezeState::new();
        let account = AccountId::new(Address(9), 1);

        state.freeze(account, key(1));
        assert!(state.is_account_frozen(Address(9), 1));
        assert!(!state.is_account_frozen(Address(9), 2));

        assert!(state.release(account, key(1)));
        assert!(!state.is_frozen(account));
        assert_eq!(state.frozen_count(), 0);
    }

    #[test]
    fn stays_frozen_while_keys_remain() {
        let mut state = VaultFreezeState::new();
        let account = AccountId::new(Address(9), 1);

        state.freeze(account, key(1));
        state.freeze(account, key(2));
        assert!(!state.release(account, key(1)));
        assert!(state.is_frozen(account));
        assert_eq!(state.live_keys(account), vec![key(2)]);
        assert!(state.release(account, key(2)));
    }

    #[test]
    fn releasing_unknown_account_is_harmless() {
        let mut state = VaultFreezeState::new();
        assert!(state.release(AccountId::new(Address(1), 0), key(7)));
    }
}
