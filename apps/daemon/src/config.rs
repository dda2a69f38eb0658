//! Daemon configuration.
//!
//! Optional TOML file; every field has a default and command-line flags
//! override whatever the file sets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamftp_protocol::constants::{DEFAULT_PORT, DRAIN_TIMEOUT};

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Uploads must target paths below this directory.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Seconds to wait for a rejected client to close its stream.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/")
}

fn default_drain_timeout_secs() -> u64 {
    DRAIN_TIMEOUT.as_secs()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root_dir: default_root_dir(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 50051);
        assert_eq!(config.root_dir, PathBuf::from("/"));
        assert_eq!(config.drain_timeout(), Duration::from_secs(5));
        assert_eq!(config.bind_addr(), "0.0.0.0:50051");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = DaemonConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            root_dir: "/srv/uploads".into(),
            drain_timeout_secs: 1,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: DaemonConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn config_partial_toml() {
        let config: DaemonConfig = toml::from_str(r#"root_dir = "/data""#).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/data"));
        assert_eq!(config.port, 50051);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn load_without_file_is_default() {
        assert_eq!(DaemonConfig::load(None).unwrap(), DaemonConfig::default());
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("streamftpd.toml");
        std::fs::write(&path, "port = 7000\ndrain_timeout_secs = 2\n").unwrap();

        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.drain_timeout_secs, 2);
    }

    #[test]
    fn load_rejects_bad_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(DaemonConfig::load(Some(&path)).is_err());
    }
}
