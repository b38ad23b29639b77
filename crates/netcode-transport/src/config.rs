//! Transport configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Largest datagram the transport will assemble or expect
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Transport configuration
///
/// Every field has a default, so a TOML file only needs the values it
/// changes:
///
/// ```
/// use netcode_transport::TransportConfig;
///
/// let config = TransportConfig::from_toml_str("read_idle_waits = 4").unwrap();
/// assert_eq!(config.read_idle_waits, 4);
/// assert_eq!(config.listen_backlog, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Consecutive zero-readiness waits after which a stream read returns
    /// what it has
    #[serde(default = "default_read_idle_waits")]
    pub read_idle_waits: u32,
    /// Backlog for listening sockets
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: i32,
    /// Upper bound for a single datagram, in bytes
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,
    /// Pick an IPv4 result when a name resolves to several families
    #[serde(default = "default_true")]
    pub prefer_ipv4: bool,
    /// Bind `[::]` accepting both families, falling back to `0.0.0.0`
    #[serde(default = "default_true")]
    pub dual_stack: bool,
    /// Set `SO_REUSEADDR` on listening sockets
    #[serde(default = "default_true")]
    pub reuse_address: bool,
}

// Default values

fn default_read_idle_waits() -> u32 {
    2
}

fn default_listen_backlog() -> i32 {
    1
}

fn default_max_datagram_size() -> usize {
    MAX_DATAGRAM_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_idle_waits: default_read_idle_waits(),
            listen_backlog: default_listen_backlog(),
            max_datagram_size: default_max_datagram_size(),
            prefer_ipv4: true,
            dual_stack: true,
            reuse_address: true,
        }
    }
}

impl TransportConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or holds invalid
    /// values.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds
    /// invalid values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigLoad(e.to_string()))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.read_idle_waits == 0 {
            return Err(Error::InvalidConfig(
                "read_idle_waits must be at least 1".to_string(),
            ));
        }

        if self.listen_backlog <= 0 {
            return Err(Error::InvalidConfig(format!(
                "listen_backlog must be positive, got {}",
                self.listen_backlog
            )));
        }

        if self.max_datagram_size == 0 || self.max_datagram_size > MAX_DATAGRAM_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max_datagram_size must be between 1 and {MAX_DATAGRAM_SIZE}, got {}",
                self.max_datagram_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.read_idle_waits, 2);
        assert_eq!(config.listen_backlog, 1);
        assert_eq!(config.max_datagram_size, 65535);
        assert!(config.prefer_ipv4);
        assert!(config.dual_stack);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TransportConfig::default();

        config.read_idle_waits = 0;
        assert!(config.validate().is_err());

        config.read_idle_waits = 2;
        config.listen_backlog = 0;
        assert!(config.validate().is_err());

        config.listen_backlog = 16;
        config.max_datagram_size = 70_000;
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_partial_toml() {
        let config = TransportConfig::from_toml_str(
            r#"
            listen_backlog = 8
            dual_stack = false
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_backlog, 8);
        assert!(!config.dual_stack);
        assert_eq!(config.read_idle_waits, 2);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(TransportConfig::from_toml_str("read_idle_waits = \"two\"").is_err());
        assert!(TransportConfig::from_toml_str("read_idle_waits = 0").is_err());
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let config = TransportConfig {
            read_idle_waits: 5,
            ..TransportConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netcode.toml");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = TransportConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = TransportConfig::load("/nonexistent/netcode.toml").unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }
}
