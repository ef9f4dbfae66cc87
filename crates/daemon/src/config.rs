//! Daemon configuration
//!
//! Layered: built-in defaults, then an optional TOML file (`shiftswap.toml`
//! or the path in `SHIFTSWAP_CONFIG`), then `SHIFTSWAP_*` environment
//! variables.

use anyhow::{Context, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "shiftswap.toml";
const FALLBACK_DATA_DIR: &str = "~/.shiftswap";
const DB_FILE_NAME: &str = "shiftswap.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    database_url: Option<String>,
    data_dir: Option<String>,
    rpc_host: String,
    rpc_port: u16,
    log_format: LogFormat,
    log_dir: Option<String>,
    rate_limit_burst: u32,
    rate_limit_rate: u32,
}

/// Resolved daemon settings
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Primary backend (SQLite URL)
    pub database_url: String,
    /// Directory holding the device-local fallback store
    pub data_dir: PathBuf,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    /// Daily rolling log files go here when set
    pub log_dir: Option<PathBuf>,
    pub rate_limit_burst: u32,
    pub rate_limit_rate: u32,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn expand_database_url(url: &str) -> String {
    match url.strip_prefix("sqlite://") {
        Some(rest) => format!("sqlite://{}", shellexpand::tilde(rest)),
        None => url.to_string(),
    }
}

impl DaemonConfig {
    /// Load from the default file location and the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("SHIFTSWAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some(&file), Environment::with_prefix("SHIFTSWAP").try_parsing(true))
    }

    /// Load from an optional file plus an environment source
    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("rpc_host", "127.0.0.1")?
            .set_default("rpc_port", 9631)?
            .set_default("log_format", "pretty")?
            .set_default("rate_limit_burst", 200)?
            .set_default("rate_limit_rate", 100)?;

        if let Some(file) = file {
            builder = builder.add_source(
                File::from(file.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let raw: RawConfig = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Ok(Self::resolve(raw))
    }

    fn resolve(raw: RawConfig) -> Self {
        let data_dir = match raw.data_dir {
            Some(dir) => expand(&dir),
            None => shiftswap_infra_local::default_data_dir()
                .unwrap_or_else(|| expand(FALLBACK_DATA_DIR)),
        };

        let database_url = match raw.database_url {
            Some(url) => expand_database_url(&url),
            None => format!("sqlite://{}", data_dir.join(DB_FILE_NAME).display()),
        };

        Self {
            database_url,
            data_dir,
            rpc_host: raw.rpc_host,
            rpc_port: raw.rpc_port,
            log_format: raw.log_format,
            log_dir: raw.log_dir.as_deref().map(expand),
            rate_limit_burst: raw.rate_limit_burst,
            rate_limit_rate: raw.rate_limit_rate,
        }
    }
}
