// # cnames-robot - CNAME registry maintenance robot
//
// This binary is a thin layer over cnames-core and cnames-probe-http. It is
// responsible for:
// 1. Reading configuration from arguments and environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP tester and cache store into the core operations
// 4. Mapping outcomes to exit codes
//
// ## Configuration
//
// Every option can also be set through the environment:
//
// ### Registry
// - `CNAMES_DOMAIN`: Registry domain (default: js.org)
//
// ### Cache Store
// - `CNAMES_CACHE_TYPE`: Type of cache store (file, memory)
// - `CNAMES_CACHE_DIR`: Directory for the file store (default: cache)
//
// ### Probe
// - `CNAMES_PROBE_TIMEOUT_SECS`: Per-request timeout (default: 5)
// - `CNAMES_PROBE_LIMIT`: Stop after this many entries
//
// ### Logging
// - `CNAMES_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
//
// ## Exit Codes
//
// - 0: Success (file canonical, fixed, or report written)
// - 1: Failure (file not canonical, malformed registry, or bad configuration)
// - 2: Runtime error (I/O, network)

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cnames_core::cache::{CacheKey, REGISTRY_FILE};
use cnames_core::{
    CacheStore, CiContext, ProbeEngine, ProbeEvent, Registry, RegistryParser, RobotConfig,
    open_cache_store, regenerate, validate_file_with,
};
use cnames_probe_http::{HttpRegistrySource, HttpUrlTester};
use std::path::Path;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Command};

/// Exit codes for cnames-robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RobotExitCode {
    /// The command did what was asked
    Success = 0,

    /// The registry is not canonical or could not be parsed, or the
    /// configuration is invalid
    Failure = 1,

    /// Unexpected I/O or network error
    RuntimeError = 2,
}

impl From<RobotExitCode> for ExitCode {
    fn from(code: RobotExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = cli.robot_config();
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        return RobotExitCode::Failure.into();
    }

    let Some(level) = parse_level(&cli.log_level) else {
        eprintln!(
            "Configuration error: invalid log level '{}' (expected trace, debug, info, warn or error)",
            cli.log_level
        );
        return RobotExitCode::Failure.into();
    };

    // Logs go to stderr; stdout carries reports and CI annotations
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RobotExitCode::RuntimeError.into();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RobotExitCode::RuntimeError.into();
        }
    };

    match runtime.block_on(run(cli.command, config)) {
        Ok(code) => code.into(),
        Err(e) => {
            // Malformed registry input is a validation failure, not a crash
            if let Some(core) = e.downcast_ref::<cnames_core::Error>() {
                if core.is_structural() {
                    error!("{}", core);
                    return RobotExitCode::Failure.into();
                }
            }
            error!("{:#}", e);
            RobotExitCode::RuntimeError.into()
        }
    }
}

async fn run(command: Command, config: RobotConfig) -> Result<RobotExitCode> {
    let parser = RegistryParser::new(&config.registry.domain);

    match command {
        Command::Validate { file, fix } => validate(&parser, &file, fix).await,
        Command::Generate { file, output } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let canonical = regenerate(&parser, &content)?;
            write_output(output.as_deref(), &canonical).await?;
            Ok(RobotExitCode::Success)
        }
        Command::Probe {
            file,
            url,
            output,
            clear_cache,
            ..
        } => {
            probe(
                &parser,
                &config,
                file.as_deref(),
                url.as_deref(),
                output.as_deref(),
                clear_cache,
            )
            .await
        }
        Command::ClearCache => {
            let store = open_cache_store(&config.cache).await?;
            let results_key = CacheKey::<Registry>::named(config.probe.cache_name.clone());
            clear(store.as_ref(), &results_key).await?;
            Ok(RobotExitCode::Success)
        }
    }
}

async fn validate(parser: &RegistryParser, file: &Path, fix: bool) -> Result<RobotExitCode> {
    let report = validate_file_with(parser, file, fix).await?;

    let ci = CiContext::detect();
    if ci.is_ci() {
        for annotation in report.annotations(&ci, file) {
            println!("{}", annotation);
        }
    }

    if report.fixed {
        info!("{} rewritten in canonical form", file.display());
    } else if report.changed {
        for diagnostic in &report.diagnostics {
            println!("{}: {}", file.display(), diagnostic);
        }
        error!(
            "{} is not in canonical form ({} differences)",
            file.display(),
            report.diagnostics.len()
        );
    } else {
        info!("{} is in canonical form", file.display());
    }

    Ok(if report.passed() {
        RobotExitCode::Success
    } else {
        RobotExitCode::Failure
    })
}

async fn probe(
    parser: &RegistryParser,
    config: &RobotConfig,
    file: Option<&Path>,
    url: Option<&str>,
    output: Option<&Path>,
    clear_cache: bool,
) -> Result<RobotExitCode> {
    let store = open_cache_store(&config.cache).await?;

    let content = match (file, url) {
        (Some(file), _) => tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?,
        (None, Some(url)) => HttpRegistrySource::new(url)?
            .fetch_cached(store.as_ref())
            .await?,
        (None, None) => anyhow::bail!("Either a registry file or --url is required"),
    };

    // Line warnings are logged by the parser itself
    let parsed = parser.parse(&content)?;

    let tester = HttpUrlTester::from_config(config)?;
    let (engine, mut events) = ProbeEngine::new(Box::new(tester), store, config)?;

    let monitor = tokio::spawn(async move {
        let mut write_failures = 0usize;
        while let Some(event) = events.recv().await {
            if let ProbeEvent::CacheWriteFailed { .. } = event {
                write_failures += 1;
            }
        }
        write_failures
    });

    let outcome = engine.probe(&parsed.registry).await;
    let report = serde_json::to_string_pretty(&outcome)?;
    write_output(output, &format!("{}\n", report)).await?;

    if clear_cache {
        clear(engine.cache_store(), engine.results_key()).await?;
    }

    drop(engine);
    match monitor.await {
        Ok(0) => {}
        Ok(n) => warn!("{} checkpoint writes failed; an interrupted run would not resume fully", n),
        Err(e) => warn!("Event monitor ended abnormally: {}", e),
    }

    Ok(RobotExitCode::Success)
}

/// Drop the probe checkpoint and the cached registry file
async fn clear(store: &dyn CacheStore, results_key: &CacheKey<Registry>) -> Result<()> {
    results_key.invalidate(store).await?;
    REGISTRY_FILE.invalidate(store).await?;
    info!("Cleared cache '{}' and '{}'", results_key.name(), REGISTRY_FILE.name());
    Ok(())
}

async fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
