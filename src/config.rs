// 7.0 config.rs: all settings in one place. margin, spreads, conversion fees, oracle freshness.
// 7.1 RiskParams are global; markets scale them with their own premiums.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/** 7.2: collateralization and liquidation economics */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    // Required collateral multiple on debt (1.15 = 115%)
    pub margin_ratio: Decimal,
    // Extra owed-price premium paid to liquidators (0.05 = 5%)
    pub liquidation_spread: Decimal,
    // Seconds for an expiry spread to ramp from zero to the full spread
    pub expiry_ramp_secs: u64,
    // Share of borrow interest kept by the protocol instead of paid to suppliers
    pub earnings_rate: Decimal,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            margin_ratio: dec!(1.15),
            liquidation_spread: dec!(0.05),
            expiry_ramp_secs: 3_600,
            earnings_rate: Decimal::ZERO,
        }
    }
}

/** 7.3: async conversion settings */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionParams {
    // Minimum native fee escrowed per venue submission
    pub min_execution_fee: Decimal,
    // Venue silence after which an operator may force-unfreeze
    pub venue_timeout_secs: u64,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            min_execution_fee: dec!(0.001),
            venue_timeout_secs: 86_400, // one day
        }
    }
}

// Oracle freshness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleParams {
    pub max_staleness_secs: u64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            max_staleness_secs: 3_600,
        }
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid risk params: {reason}")]
    InvalidRisk { reason: String },

    #[error("Invalid conversion params: {reason}")]
    InvalidConversion { reason: String },

    #[error("Invalid oracle params: {reason}")]
    InvalidOracle { reason: String },

    #[error("Invalid engine params: {reason}")]
    InvalidEngine { reason: String },
}

pub fn validate_risk(risk: &RiskParams) -> Result<(), ConfigError> {
    if risk.margin_ratio <= Decimal::ONE {
        return Err(ConfigError::InvalidRisk {
            reason: "margin ratio must exceed 1".to_string(),
        });
    }
    if risk.liquidation_spread <= Decimal::ZERO || risk.liquidation_spread >= Decimal::ONE {
        return Err(ConfigError::InvalidRisk {
            reason: "liquidation spread must be in (0, 1)".to_string(),
        });
    }
    // the spread has to fit inside the margin buffer or liquidations create bad debt
    if risk.liquidation_spread >= risk.margin_ratio - Decimal::ONE {
        return Err(ConfigError::InvalidRisk {
            reason: "liquidation spread must be below the margin buffer".to_string(),
        });
    }
    if risk.expiry_ramp_secs == 0 {
        return Err(ConfigError::InvalidRisk {
            reason: "expiry ramp must be positive".to_string(),
        });
    }
    if risk.earnings_rate < Decimal::ZERO || risk.earnings_rate >= Decimal::ONE {
        return Err(ConfigError::InvalidRisk {
            reason: "earnings rate must be in [0, 1)".to_string(),
        });
    }
    Ok(())
}

pub fn validate_conversion(conversion: &ConversionParams) -> Result<(), ConfigError> {
    if conversion.min_execution_fee < Decimal::ZERO {
        return Err(ConfigError::InvalidConversion {
            reason: "execution fee cannot be negative".to_string(),
        });
    }
    if conversion.venue_timeout_secs == 0 {
        return Err(ConfigError::InvalidConversion {
            reason: "venue timeout must be positive".to_string(),
        });
    }
    Ok(())
}

pub fn validate_oracle(oracle: &OracleParams) -> Result<(), ConfigError> {
    if oracle.max_staleness_secs == 0 {
        return Err(ConfigError::InvalidOracle {
            reason: "staleness window must be positive".to_string(),
        });
    }
    Ok(())
}
