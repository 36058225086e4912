use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use rentseva_api::{start_server, AppState, GatewayHeaderVerifier};
use rentseva_predictor::{LocalityCatalog, ModelArtifacts, Predictor, API_VERSION};
use rentseva_storage::{MemoryStorage, PredictionStore, SledStorage};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod settings;
mod version;

use settings::{load_config_with_overrides, LogFormat, ServiceConfig, StorageBackend};
use version::{git_commit_hash, RENTSEVA_VERSION};

pub(crate) fn build_cli() -> Command {
    Command::new("rentseva-node")
        .version(RENTSEVA_VERSION)
        .about("RentSeva rent prediction service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("model-dir")
                .long("model-dir")
                .value_name("DIR")
                .help("Directory holding the trained model artifacts"),
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .value_name("FILE")
                .help("Locality catalog TOML (defaults to the built-in Visakhapatnam catalog)"),
        )
        .arg(
            Arg::new("rpc-host")
                .long("rpc-host")
                .value_name("HOST")
                .help("Override API bind host"),
        )
        .arg(
            Arg::new("rpc-port")
                .long("rpc-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override API port"),
        )
        .arg(
            Arg::new("storage")
                .long("storage")
                .value_name("BACKEND")
                .value_parser(["memory", "sled"])
                .help("Prediction storage backend"),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory for the sled backend"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Run configuration and model self-checks, then exit"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = load_config_with_overrides(&matches)?;

    if matches.get_flag("check") {
        return run_self_check(&config);
    }

    init_logging(&config)?;

    info!(
        "Starting RentSeva {} (commit {}, api {})",
        RENTSEVA_VERSION,
        git_commit_hash(),
        API_VERSION
    );
    if let Some(path) = &config.config_path {
        info!("Configuration loaded from {}", path.display());
    }

    let catalog = Arc::new(load_catalog(&config)?);
    info!(
        "Locality catalog {} with {} localities",
        catalog.version(),
        catalog.len()
    );

    let predictor = Predictor::load(
        catalog,
        &config.model_dir,
        config.expected_model_hash.as_deref(),
    );
    if !predictor.is_ready() {
        warn!(
            "Model artifacts unavailable; /api/predict returns 503 until restarted with valid artifacts"
        );
    }

    let (store, sled): (Arc<dyn PredictionStore>, Option<Arc<SledStorage>>) = match config.storage
    {
        StorageBackend::Memory => {
            info!("Using in-memory prediction storage");
            (Arc::new(MemoryStorage::new()) as Arc<dyn PredictionStore>, None)
        }
        StorageBackend::Sled => {
            fs::create_dir_all(&config.data_dir).with_context(|| {
                format!("failed to create data directory {}", config.data_dir.display())
            })?;
            let db_path = config.db_path();
            let storage = Arc::new(
                SledStorage::new(&db_path)
                    .with_context(|| format!("failed to open sled at {}", db_path.display()))?,
            );
            info!("Using sled prediction storage at {}", db_path.display());
            (storage.clone() as Arc<dyn PredictionStore>, Some(storage))
        }
    };

    let mut verifier = GatewayHeaderVerifier::default();
    match &config.gateway_secret {
        Some(secret) => verifier = verifier.with_secret(secret.clone()),
        None => warn!(
            "No gateway secret configured; caller identity is trusted from any client reaching {}",
            config.rpc_addr()
        ),
    }

    let state = AppState::new(Arc::new(predictor), store, Arc::new(verifier));

    start_server(state, &config.rpc_addr()).await?;

    if let Some(storage) = sled {
        storage.flush().context("failed to flush prediction storage")?;
    }
    info!("RentSeva shut down cleanly");

    Ok(())
}

fn init_logging(config: &ServiceConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?,
    }

    Ok(())
}

fn load_catalog(config: &ServiceConfig) -> Result<LocalityCatalog> {
    match &config.catalog_path {
        Some(path) => LocalityCatalog::load(path)
            .with_context(|| format!("failed to load locality catalog {}", path.display())),
        None => Ok(LocalityCatalog::vizag()),
    }
}

fn run_self_check(config: &ServiceConfig) -> Result<()> {
    println!("Running RentSeva self-check...");
    let mut issues = Vec::new();

    match load_catalog(config) {
        Ok(catalog) => println!(
            "catalog: {} ({} localities)",
            catalog.version(),
            catalog.len()
        ),
        Err(err) => issues.push(format!("{err:#}")),
    }

    match ModelArtifacts::load(&config.model_dir, config.expected_model_hash.as_deref()) {
        Ok(artifacts) => println!(
            "model: {} (hash {})",
            config.model_dir.display(),
            artifacts.model_hash.as_deref().unwrap_or("unknown")
        ),
        Err(err) => issues.push(format!(
            "Model artifacts in {} are unusable: {err}",
            config.model_dir.display()
        )),
    }

    if let Err(err) = ensure_port_available(&config.rpc_host, config.rpc_port) {
        issues.push(err);
    }

    if config.storage == StorageBackend::Sled {
        if let Err(err) = ensure_storage_directory(&config.data_dir) {
            issues.push(err);
        }
    }

    if issues.is_empty() {
        println!("OK");
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("- {issue}");
        }
        anyhow::bail!("self-check failed")
    }
}

fn ensure_port_available(host: &str, port: u16) -> Result<(), String> {
    let addr = format!("{host}:{port}");
    match TcpListener::bind(&addr) {
        Ok(listener) => drop(listener),
        Err(err) => return Err(format!("API port {addr} is not available for binding: {err}")),
    }
    Ok(())
}

fn ensure_storage_directory(dir: &Path) -> Result<(), String> {
    if !dir.exists() {
        return Err(format!(
            "Storage directory {} does not exist; create it before starting the service",
            dir.display()
        ));
    }
    if !dir.is_dir() {
        return Err(format!("Storage path {} is not a directory", dir.display()));
    }

    let marker = dir.join(".rentseva_write_test");
    let result = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&marker)
        .and_then(|mut file| file.write_all(b"ok"));
    let _ = fs::remove_file(&marker);
    result.map_err(|err| format!("Unable to write into {}: {}", dir.display(), err))
}
