//! Server configuration
//!
//! Settings come from a TOML file, either passed with `--config` or found in
//! the platform config directory. Missing keys take their defaults; the
//! port can be overridden from the command line.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_FILE_NAME: &str = "codebreak.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
}

/// Server settings as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Largest accepted frame, in bytes
    pub max_frame_size: u32,
    /// Messages buffered per connection before it is closed as stalled
    pub outbound_queue: usize,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let net = codebreak_net::ServerConfig::default();
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: codebreak_net::DEFAULT_PORT,
            max_frame_size: net.max_frame_size,
            outbound_queue: net.outbound_queue,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load settings from `path`, or from the default location if none is
    /// given. Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// `codebreak.toml` in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "onyx", "codebreak")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Replace the configured port when one was given on the command line
    /// or through `PORT`
    pub fn with_port_override(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Transport settings for the network server
    pub fn to_server_config(&self) -> Result<codebreak_net::ServerConfig, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.bind_address.clone()))?;

        Ok(codebreak_net::ServerConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            max_frame_size: self.max_frame_size,
            outbound_queue: self.outbound_queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 4000);
        assert_eq!(config.log_level, "info");

        let net = config.to_server_config().unwrap();
        assert_eq!(net.bind_addr, SocketAddr::from(([0, 0, 0, 0], 4000)));
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
bind_address = "127.0.0.1"
port = 9100
max_frame_size = 4096
outbound_queue = 8
log_level = "debug"
"#,
        );

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config,
            ServerConfig {
                bind_address: "127.0.0.1".into(),
                port: 9100,
                max_frame_size: 4096,
                outbound_queue: 8,
                log_level: "debug".into(),
            }
        );

        let net = config.to_server_config().unwrap();
        assert_eq!(net.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9100)));
        assert_eq!(net.max_frame_size, 4096);
        assert_eq!(net.outbound_queue, 8);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("port = 5000\n");

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_address, ServerConfig::default().bind_address);
        assert_eq!(config.outbound_queue, ServerConfig::default().outbound_queue);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let result = ServerConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let file = write_config("port = \"not a number\"\n");

        let result = ServerConfig::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_port_override() {
        let config = ServerConfig::default().with_port_override(Some(8088));
        assert_eq!(config.port, 8088);

        let config = ServerConfig::default().with_port_override(None);
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = ServerConfig {
            bind_address: "not-an-ip".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.to_server_config(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }
}
