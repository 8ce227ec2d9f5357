// margin-core: cross-margin lending core with async collateral conversion.
// isolation collateral is converted by an external venue that answers later;
// the ledger stays consistent while it waits, and liquidations still work.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AssetId, AccountId, Par, Wei, Price, Timestamp
//   2.x  interest.rs: two-segment rate curve, per-asset setter, index accrual
//   3.x  ledger.rs: par balances per account, wei reads, deltas
//   4.x  oracle.rs: price oracle trait, freshness checks
//   5.x  collateral.rs: account health, spread-adjusted prices
//   6.x  liquidation.rs: sync liquidation math, proceeds split, router trait
//   6.2  expiry.rs: expiry registry, ramped settlement spread
//   7.x  config.rs: risk, conversion and oracle params
//   8.x  engine/: operations, conversions, liquidations, expirations
//   9.x  conversion.rs: conversion requests, the book, tombstones
//   9.1  freeze.rs: which accounts are frozen
//   9.2  registry.rs: access table, venue registry, vaults
//   11.x events.rs: state transition events for audit
//   12.x market.rs: market config + runtime state

// ledger and pricing
pub mod collateral;
pub mod interest;
pub mod ledger;
pub mod market;
pub mod oracle;
pub mod types;

// conversions and liquidation
pub mod conversion;
pub mod engine;
pub mod expiry;
pub mod freeze;
pub mod liquidation;
pub mod registry;

// integration modules
pub mod config;
pub mod events;

// re exports for convenience
pub use collateral::*;
pub use conversion::*;
pub use engine::*;
pub use events::*;
pub use expiry::*;
pub use freeze::*;
pub use interest::*;
pub use ledger::*;
pub use liquidation::*;
pub use market::*;
pub use oracle::*;
pub use registry::*;
pub use types::*;
pub use config::{ConfigError, ConversionParams, OracleParams, RiskParams};
