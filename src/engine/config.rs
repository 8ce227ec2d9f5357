//! Engine configuration options.

use crate::config::{
    validate_conversion, validate_oracle, validate_risk, ConfigError, ConversionParams, OracleParams, RiskParams,
};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Resolved conversions remembered for callback redelivery.
    pub resolution_history: usize,
    pub risk: RiskParams,
    pub conversion: ConversionParams,
    pub oracle: OracleParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            resolution_history: 10_000,
            risk: RiskParams::default(),
            conversion: ConversionParams::default(),
            oracle: OracleParams::default(),
        }
    }
}

impl EngineConfig {
    // looser freshness, short venue timeout so stuck requests can be cleared quickly
    pub fn testnet() -> Self {
        Self {
            conversion: ConversionParams {
                min_execution_fee: dec!(0.0001),
                venue_timeout_secs: 3_600,
            },
            oracle: OracleParams {
                max_staleness_secs: 86_400,
            },
            ..Default::default()
        }
    }

    pub fn mainnet_conservative() -> Self {
        Self {
            resolution_history: 100_000,
            risk: RiskParams {
                margin_ratio: dec!(1.25),
                liquidation_spread: dec!(0.08),
                expiry_ramp_secs: 7_200,
                ..Default::default()
            },
            conversion: ConversionParams {
                min_execution_fee: dec!(0.002),
                venue_timeout_secs: 3 * 86_400,
            },
            oracle: OracleParams {
                max_staleness_secs: 900,
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "max_events must be positive".to_string(),
            });
        }
        if self.resolution_history == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "resolution_history must be positive".to_string(),
            });
        }
        validate_risk(&self.risk)?;
        validate_conversion(&self.conversion)?;
        validate_oracle(&self.oracle)?;
        Ok(())
    }
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> EngineConfig {
        match self {
            Environment::Development => EngineConfig::default(),
            Environment::Testnet => EngineConfig::testnet(),
            Environment::Mainnet => EngineConfig::mainnet_conservative(),
        }
    }
}
