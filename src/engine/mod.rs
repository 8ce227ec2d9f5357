// 8.0: core margin engine. coordinates the ledger, async conversions, liquidations
// and expirations. deterministic and event-driven with no external I/O:
// the venue, the oracle and the liquidity router are all driven by the caller.

mod config;
mod conversions;
mod core;
mod expiry;
mod liquidations;
mod operations;
mod results;

pub use config::{EngineConfig, Environment};
pub use core::Engine;
pub use results::{CallbackOutcome, EngineError, LiquidationOutcome, LiquidationResult};
