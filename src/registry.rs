//! Registries: who may call what.
//!
//! - `AccessTable`: owner-gated allow-list keyed by (subject, capability).
//! - `ConversionVenueRegistry`: isolation asset → the one venue allowed to call back for it,
//!   plus the venue's last sign of life for the force-unfreeze timeout.
//! - `VaultRegistry`: isolation vaults and the wallet that owns each.

use crate::types::{AccountId, Address, AssetId, Timestamp, VenueId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// may liquidate isolation collateral and drive liquidation retries
    Liquidator,
    /// may force-unfreeze conversions whose venue went silent
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{0:?} is not the admin")]
    NotAdmin(Address),

    #[error("{subject:?} lacks capability {capability:?}")]
    MissingCapability { subject: Address, capability: Capability },

    #[error("No conversion venue registered for {0:?}")]
    NoVenue(AssetId),

    #[error("Venue {caller:?} is not registered for {asset:?}")]
    UnauthorizedVenue { asset: AssetId, caller: VenueId },

    #[error("Unknown vault {0:?}")]
    UnknownVault(Address),

    #[error("Vault {0:?} already registered")]
    VaultExists(Address),

    #[error("{0:?} already holds ledger accounts and cannot become a vault")]
    AddressInUse(Address),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTable {
    admin: Address,
    grants: HashSet<(Address, Capability)>,
}

impl AccessTable {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            grants: HashSet::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn require_admin(&self, caller: Address) -> Result<(), RegistryError> {
        if caller != self.admin {
            return Err(RegistryError::NotAdmin(caller));
        }
        Ok(())
    }

    pub fn grant(&mut self, caller: Address, subject: Address, capability: Capability) -> Result<(), RegistryError> {
        self.require_admin(caller)?;
        self.grants.insert((subject, capability));
        Ok(())
    }

    pub fn revoke(&mut self, caller: Address, subject: Address, capability: Capability) -> Result<(), RegistryError> {
        self.require_admin(caller)?;
        self.grants.remove(&(subject, capability));
        Ok(())
    }

    pub fn has(&self, subject: Address, capability: Capability) -> bool {
        self.grants.contains(&(subject, capability))
    }

    pub fn require(&self, subject: Address, capability: Capability) -> Result<(), RegistryError> {
        if !self.has(subject, capability) {
            return Err(RegistryError::MissingCapability { subject, capability });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionVenueRegistry {
    by_asset: HashMap<AssetId, VenueId>,
    last_seen: HashMap<VenueId, Timestamp>,
}

impl ConversionVenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_venue(&mut self, asset: AssetId, venue: VenueId, now: Timestamp) {
        self.by_asset.insert(asset, venue);
        self.last_seen.entry(venue).or_insert(now);
    }

    pub fn venue_for(&self, asset: AssetId) -> Result<VenueId, RegistryError> {
        self.by_asset.get(&asset).copied().ok_or(RegistryError::NoVenue(asset))
    }

    /// Checked at every callback entry.
    pub fn require_venue(&self, asset: AssetId, caller: VenueId) -> Result<(), RegistryError> {
        if self.venue_for(asset)? != caller {
            return Err(RegistryError::UnauthorizedVenue { asset, caller });
        }
        Ok(())
    }

    pub fn record_liveness(&mut self, venue: VenueId, now: Timestamp) {
        let seen = self.last_seen.entry(venue).or_insert(now);
        if now > *seen {
            *seen = now;
        }
    }

    pub fn last_seen(&self, venue: VenueId) -> Option<Timestamp> {
        self.last_seen.get(&venue).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub address: Address,
    pub owner: Address,
    pub isolation_asset: AssetId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultRegistry {
    vaults: HashMap<Address, Vault>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, vault: Vault) -> Result<(), RegistryError> {
        if self.vaults.contains_key(&vault.address) {
            return Err(RegistryError::VaultExists(vault.address));
        }
        self.vaults.insert(vault.address, vault);
        Ok(())
    }

    pub fn get(&self, address: Address) -> Result<&Vault, RegistryError> {
        self.vaults.get(&address).ok_or(RegistryError::UnknownVault(address))
    }

    /// The vault behind an account, if the account belongs to one.
    pub fn vault_of(&self, account: AccountId) -> Option<&Vault> {
        self.vaults.get(&account.owner)
    }

    /// Wallet that controls an account: the vault owner for vault accounts, else the owner itself.
    pub fn controller_of(&self, account: AccountId) -> Address {
        self.vault_of(account).map(|v| v.owner).unwrap_or(account.owner)
    }
}
