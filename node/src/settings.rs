//! Layered service configuration: file, then `RENTSEVA_*` environment, then CLI

use anyhow::{bail, Result};
use clap::ArgMatches;
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "RENTSEVA";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Some(StorageBackend::Memory),
            "sled" => Some(StorageBackend::Sled),
            _ => None,
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sled => "sled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    // HTTP
    pub rpc_host: String,
    pub rpc_port: u16,
    /// Secret the authenticating gateway sends in `x-gateway-secret`
    pub gateway_secret: Option<String>,

    // Model and catalog
    pub model_dir: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub expected_model_hash: Option<String>,

    // Storage
    pub storage: StorageBackend,
    pub data_dir: PathBuf,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 8000,
            gateway_secret: None,
            model_dir: PathBuf::from("models"),
            catalog_path: None,
            expected_model_hash: None,
            storage: StorageBackend::Memory,
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServiceConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.config_path = config_path.map(Path::to_path_buf);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_host.trim().is_empty() {
            bail!("RPC_HOST must not be empty");
        }
        if self.rpc_port == 0 {
            bail!("RPC_PORT must be greater than zero");
        }
        if self.gateway_secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
            bail!("GATEWAY_SECRET must not be empty when set");
        }
        if self.gateway_secret.is_none() && !self.is_loopback_bind() {
            bail!(
                "RPC_HOST {} is reachable from other hosts; set GATEWAY_SECRET so only the \
                 authenticating gateway can assert caller identity",
                self.rpc_host
            );
        }
        if self.model_dir.as_os_str().is_empty() {
            bail!("MODEL_DIR must not be empty");
        }
        if self.storage == StorageBackend::Sled && self.data_dir.as_os_str().is_empty() {
            bail!("DATA_DIR must not be empty when using sled storage");
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!(
                "Invalid LOG_LEVEL '{}'; expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            );
        }
        if let Some(hash) = &self.expected_model_hash {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                bail!("EXPECTED_MODEL_HASH must be 64 hex characters");
            }
        }
        Ok(())
    }

    /// Whether the API only listens on the loopback interface
    pub fn is_loopback_bind(&self) -> bool {
        let host = self.rpc_host.trim();
        host.eq_ignore_ascii_case("localhost")
            || host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .is_ok_and(|ip| ip.is_loopback())
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("predictions.db")
    }
}

pub fn load_config_with_overrides(matches: &ArgMatches) -> Result<ServiceConfig> {
    let config_path = matches.get_one::<String>("config").map(Path::new);
    let mut config = ServiceConfig::load(config_path)?;
    apply_overrides(matches, &mut config)?;
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &ArgMatches, config: &mut ServiceConfig) -> Result<()> {
    if let Some(model_dir) = matches.get_one::<String>("model-dir") {
        config.model_dir = PathBuf::from(model_dir);
    }

    if let Some(catalog) = matches.get_one::<String>("catalog") {
        config.catalog_path = Some(PathBuf::from(catalog));
    }

    if let Some(rpc_host) = matches.get_one::<String>("rpc-host") {
        config.rpc_host = rpc_host.clone();
    }

    if let Some(rpc_port) = matches.get_one::<u16>("rpc-port") {
        config.rpc_port = *rpc_port;
    }

    if let Some(storage) = matches.get_one::<String>("storage") {
        config.storage = match StorageBackend::parse(storage) {
            Some(backend) => backend,
            None => bail!("Invalid storage backend '{storage}'; expected memory or sled"),
        };
    }

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.data_dir = PathBuf::from(data_dir);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = match LogFormat::parse(log_format) {
            Some(format) => format,
            None => bail!("Invalid log format '{log_format}'; expected pretty or json"),
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_cli;
    use std::io::Write;

    fn matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["rentseva-node"];
        argv.extend_from_slice(args);
        build_cli().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rpc_addr(), "127.0.0.1:8000");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn file_values_then_cli_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "rpc_port = 9100\n\
             storage = \"sled\"\n\
             data_dir = \"/var/lib/rentseva\"\n\
             log_format = \"json\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load_config_with_overrides(&matches(&["--config", &path])).unwrap();
        assert_eq!(config.rpc_port, 9100);
        assert_eq!(config.storage, StorageBackend::Sled);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/rentseva/predictions.db"));

        let config = load_config_with_overrides(&matches(&[
            "--config",
            &path,
            "--rpc-port",
            "9200",
            "--storage",
            "memory",
        ]))
        .unwrap();
        assert_eq!(config.rpc_port, 9200);
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config_with_overrides(&matches(&["--config", "/nonexistent/rentseva.toml"]))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = ServiceConfig::default();
        config.rpc_port = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.expected_model_hash = Some("abc".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn public_bind_requires_gateway_secret() {
        let mut config = ServiceConfig::default();
        config.rpc_host = "0.0.0.0".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GATEWAY_SECRET"));

        config.gateway_secret = Some("   ".into());
        assert!(config.validate().is_err());

        config.gateway_secret = Some("gw-secret".into());
        assert!(config.validate().is_ok());

        for host in ["127.0.0.1", "localhost", "::1", "[::1]"] {
            let config = ServiceConfig {
                rpc_host: host.into(),
                ..ServiceConfig::default()
            };
            assert!(config.is_loopback_bind(), "{host}");
            assert!(config.validate().is_ok(), "{host}");
        }
    }

    #[test]
    fn cli_rejects_unknown_storage() {
        let result = build_cli().try_get_matches_from(["rentseva-node", "--storage", "postgres"]);
        assert!(result.is_err());
    }
}
