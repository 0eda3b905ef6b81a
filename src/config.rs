use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Scan orchestration settings, read once when a session is created
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Scan automatically after the user stops typing
    pub auto_scan_enabled: bool,
    /// Quiet period after the last edit before an automatic scan
    pub debounce_ms: u64,
    /// Similarity (percent) above which a rescan needs user confirmation
    pub rescan_similarity_threshold: u8,
    /// Client-side limit on a single remote call; `None` leaves it to the transport
    pub request_timeout_ms: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            auto_scan_enabled: false,
            debounce_ms: 3000,
            rescan_similarity_threshold: 85,
            request_timeout_ms: None,
        }
    }
}

impl ScanConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    ///
    /// # Example
    /// ```
    /// use originality_scan::config::ScanConfig;
    /// let config = ScanConfig::from_toml_str("debounce_ms = 1500").unwrap();
    /// assert_eq!(config.debounce_ms, 1500);
    /// assert!(!config.auto_scan_enabled);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rescan_similarity_threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "rescan_similarity_threshold must be at most 100, got {}",
                self.rescan_similarity_threshold
            )));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
