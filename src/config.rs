//! Front-end configuration, loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    AmmConfig, BPS_SCALE, DEFAULT_DEADLINE_MINUTES, DEFAULT_SLIPPAGE_BPS, ETH_DECIMALS,
    MAX_PERCENTAGE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexConfig {
    pub amm: AmmConfig,
    /// Slippage applied to quoted outputs when building minimum-output bounds.
    pub slippage_bps: u64,
    pub deadline_minutes: u64,
    pub base_decimals: u8,
    pub token_decimals: u8,
}

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            amm: AmmConfig::default(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            deadline_minutes: DEFAULT_DEADLINE_MINUTES,
            base_decimals: ETH_DECIMALS,
            token_decimals: ETH_DECIMALS,
        }
    }
}

impl DexConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DexConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amm.trade_fee_rate >= MAX_PERCENTAGE {
            return Err(ConfigError::Invalid(format!(
                "trade_fee_rate {} must be below {}",
                self.amm.trade_fee_rate, MAX_PERCENTAGE
            )));
        }
        if self.amm.ratio_change_tolerance_rate > MAX_PERCENTAGE {
            return Err(ConfigError::Invalid(format!(
                "ratio_change_tolerance_rate {} exceeds {}",
                self.amm.ratio_change_tolerance_rate, MAX_PERCENTAGE
            )));
        }
        if self.slippage_bps > BPS_SCALE {
            return Err(ConfigError::Invalid(format!(
                "slippage_bps {} exceeds {}",
                self.slippage_bps, BPS_SCALE
            )));
        }
        if self.base_decimals > 38 || self.token_decimals > 38 {
            return Err(ConfigError::Invalid("decimals must be at most 38".to_string()));
        }
        Ok(())
    }
}
