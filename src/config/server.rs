use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_COOKIE_NAME: &str = "token";

const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Requests whose Host header matches are served by the git lane whatever their path.
    pub git_host: Option<String>,
    /// Name of the cookie carrying the session credential of browsers.
    pub cookie_name: String,
    pub session_lifetime_secs: i64,
    /// Lifetime of credentials issued for a single space membership.
    pub membership_token_lifetime_secs: i64,
}

impl ServerConfig {
    /// Loads a TOML config file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cookie_name.is_empty() {
            return Err(Error::Config("cookie_name cannot be empty".into()));
        }
        for lifetime in [self.session_lifetime_secs, self.membership_token_lifetime_secs] {
            if !(1..=MAX_LIFETIME_SECS).contains(&lifetime) {
                return Err(Error::Config(format!(
                    "token lifetimes must be between 1 and {MAX_LIFETIME_SECS} seconds"
                )));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("canopy.db")
    }

    #[must_use]
    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_lifetime_secs)
    }

    #[must_use]
    pub fn membership_token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.membership_token_lifetime_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            git_host: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            session_lifetime_secs: 30 * 24 * 60 * 60,
            membership_token_lifetime_secs: 60 * 60,
        }
    }
}
