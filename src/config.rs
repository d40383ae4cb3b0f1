use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const DEFAULT_SERVER: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9041;
pub const DEFAULT_KEYSPACE: &str = "config_db_uuid";

/// Where and how to reach the cluster. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub server: String,
    pub port: u16,
    pub keyspace: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            keyspace: DEFAULT_KEYSPACE.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// `host:port` as the driver expects it
    pub fn node_address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Layer explicit overrides over the file contents and the defaults
    pub fn resolve(file: Option<&CassrefConfig>, overrides: ConnectionOverrides) -> Self {
        let defaults = Self::default();
        let section = file.map(|c| &c.connection);
        Self {
            server: overrides
                .server
                .or_else(|| section.and_then(|s| s.server.clone()))
                .unwrap_or(defaults.server),
            port: overrides
                .port
                .or_else(|| section.and_then(|s| s.port))
                .unwrap_or(defaults.port),
            keyspace: overrides
                .keyspace
                .or_else(|| section.and_then(|s| s.keyspace.clone()))
                .unwrap_or(defaults.keyspace),
        }
    }
}

/// Values given on the command line; `None` falls through to the file
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub keyspace: Option<String>,
}

/// Contents of `cassref.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CassrefConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionSection {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub keyspace: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("cassref.toml")
}

/// Load the config file. A missing default file is not an error; a missing
/// explicitly named file is.
pub fn load_config(path: Option<&Path>) -> Result<Option<CassrefConfig>> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!("config file not found: {}", path.display())));
        }
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CassrefConfig = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}
