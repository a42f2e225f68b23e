//! Server settings from the environment.

use settlers_engine::Rules;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid SERVER_ADDR {value:?}: {source}")]
    Addr {
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("cannot read rules file {path:?}: {source}")]
    RulesFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid rules in {path:?}: {source}")]
    Rules {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub log_filter: String,
    /// Rules every new game starts with
    pub rules: Rules,
}

impl ServerConfig {
    /// `SERVER_ADDR`, `RUST_LOG` and an optional `SETTLERS_RULES` JSON file
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr = raw_addr
            .parse()
            .map_err(|source| ConfigError::Addr {
                value: raw_addr.clone(),
                source,
            })?;

        let rules = match lookup("SETTLERS_RULES") {
            Some(path) => {
                let path = PathBuf::from(path);
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::RulesFile {
                    path: path.clone(),
                    source,
                })?;
                Rules::from_json(&text).map_err(|source| ConfigError::Rules { path, source })?
            }
            None => Rules::default(),
        };

        Ok(Self {
            addr,
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
            rules,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_filter: DEFAULT_LOG_FILTER.into(),
            rules: Rules::default(),
        }
    }
}
