//! Command line and configuration file handling.
//!
//! Model paths come from the command line (or their environment variables).
//! Server and logging settings come from an optional TOML file:
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:8080"
//!
//! [logging]
//! level = "info"
//! format = "pretty"   # or "json"
//! ```

use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Serves gender and relationship predictions over HTTP.
#[derive(Debug, Parser)]
#[command(name = "multidata-server", version, about)]
pub struct Args {
    /// Path to the built gender classifier model.
    #[arg(
        short = 'g',
        long = "gender-model",
        env = "MULTIDATA_GENDER_MODEL",
        required_unless_present = "stub",
        conflicts_with = "stub"
    )]
    pub gender_model: Option<PathBuf>,

    /// Path to the built relationship classifier model.
    #[arg(
        short = 'r',
        long = "relationship-model",
        env = "MULTIDATA_RELATIONSHIP_MODEL",
        required_unless_present = "stub",
        conflicts_with = "stub"
    )]
    pub relationship_model: Option<PathBuf>,

    /// Serve fixed answers on `GET /classification` instead of loading models.
    #[arg(long)]
    pub stub: bool,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on; overrides `server.address`.
    #[arg(short, long)]
    pub address: Option<String>,
}

/// How requests are answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Classify with the two model artifacts.
    Models {
        gender: PathBuf,
        relationship: PathBuf,
    },
    /// Answer every request with the default result.
    Stub,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Models { .. } => "models",
            Mode::Stub => "stub",
        }
    }
}

impl Args {
    /// Resolves the serving mode. Stub mode takes no model paths; models mode
    /// needs both.
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        match (self.stub, &self.gender_model, &self.relationship_model) {
            (true, None, None) => Ok(Mode::Stub),
            (true, _, _) => Err(ConfigError::Mode(
                "--stub cannot be combined with model paths".to_string(),
            )),
            (false, Some(gender), Some(relationship)) => Ok(Mode::Models {
                gender: gender.clone(),
                relationship: relationship.clone(),
            }),
            (false, None, _) => Err(ConfigError::Mode("missing --gender-model".to_string())),
            (false, _, None) => Err(ConfigError::Mode(
                "missing --relationship-model".to_string(),
            )),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8080).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Level for this crate when `RUST_LOG` is unset (default: info).
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads the file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies command line overrides.
    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(address) = &args.address {
            self.server.address = address.clone();
        }
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Address {
                address: self.server.address.clone(),
                reason: e.to_string(),
            })
    }
}
