//! Layered configuration: built-in defaults, then an optional `barscan.toml`,
//! then `BARSCAN_*` environment variables (`__` separates nested keys, as in
//! `BARSCAN_SERVER__PORT=9000`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::client::MalformedTokenPolicy;
use crate::error::Result;
use crate::protocol::{DEFAULT_HOST, DEFAULT_PORT};

pub const DEFAULT_CONFIG_FILE: &str = "barscan";
pub const CONFIG_FILE_VARIABLE: &str = "BARSCAN_CONFIG";
pub const ENVIRONMENT_PREFIX: &str = "BARSCAN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve, drive every cart through the server, then stop.
    #[default]
    Session,
    /// Serve until interrupted.
    Serve,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: Mode,
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub http: HttpSettings,
    pub data: DataSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// `0` waits for the request without a bound.
    pub read_timeout_ms: Option<u64>,
}
impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            port: DEFAULT_PORT,
            read_timeout_ms: Some(30_000),
        }
    }
}
impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
    pub fn read_timeout(&self) -> Option<Duration> {
        bounded(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub connect_timeout_ms: Option<u64>,
    /// How long one lookup may wait for its response; `0` waits forever.
    pub read_timeout_ms: Option<u64>,
    pub malformed_tokens: MalformedTokenPolicy,
    pub concurrent_carts: bool,
}
impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: None,
            read_timeout_ms: Some(30_000),
            malformed_tokens: MalformedTokenPolicy::default(),
            concurrent_carts: false,
        }
    }
}
impl ClientSettings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        bounded(self.connect_timeout_ms)
    }
    pub fn read_timeout(&self) -> Option<Duration> {
        bounded(self.read_timeout_ms)
    }
}

// A zero millisecond timeout means none at all.
fn bounded(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub encodings: PathBuf,
    pub products: PathBuf,
    pub carts: PathBuf,
    pub receipts: PathBuf,
}
impl Default for DataSettings {
    fn default() -> Self {
        Self {
            encodings: PathBuf::from("bc3of9.csv"),
            products: PathBuf::from("Products.csv"),
            carts: PathBuf::from("Carts.csv"),
            receipts: PathBuf::from("receipts.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
    pub file: Option<PathBuf>,
}
impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: String::from("info"),
            file: Some(PathBuf::from("log.txt")),
        }
    }
}

impl Settings {
    /// Loads the configuration named by `BARSCAN_CONFIG`, or `barscan.toml`
    /// when unset. A missing file just means defaults.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_VARIABLE).unwrap_or_else(|_| String::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&file)
    }
    pub fn load_from(file: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix(ENVIRONMENT_PREFIX).prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
