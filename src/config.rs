use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tuning knobs of the inference walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Visits allowed per block before the walk gives up.
    pub max_block_visits: u32,
    /// How often a variable's type at a block entry may grow before it becomes `T.untyped`.
    pub widening_threshold: u32,
    /// Widen differing literals to their class where they meet.
    pub widen_literals: bool,
    /// Report `T.let` and `T.assert_type!` on values of the wrong type.
    pub check_casts: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_block_visits: 32,
            widening_threshold: 3,
            widen_literals: true,
            check_casts: true,
        }
    }
}

impl InferenceConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::InferenceConfig;

    #[test]
    fn missing_fields_take_defaults() {
        let config = InferenceConfig::from_toml_str("widen_literals = false").unwrap();
        assert!(!config.widen_literals);
        assert_eq!(config.max_block_visits, 32);
        assert_eq!(config.widening_threshold, 3);
        assert!(config.check_casts);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(InferenceConfig::from_toml_str("max_block_visits = \"many\"").is_err());
    }
}
