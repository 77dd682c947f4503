use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use log_archive_uploader::cli::{Args, Commands};
use log_archive_uploader::cloud::{MantaStore, RemoteStore, Uploader};
use log_archive_uploader::config::{ParameterResolver, UploadConfig, UploadSettings};
use log_archive_uploader::constants::DEFAULT_CONFIG_NAME;
use log_archive_uploader::rollover::{
    BackgroundExecutor, CompressionMode, CompressionWaiter, RolloverCoordinator, RolloverEvent,
    RolloverOutcome,
};
use log_archive_uploader::utils::compress::CompressionJob;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    run(&args)
}

/// Dispatch a subcommand. Settings are only read by the commands that need
/// them, so `init-config` can replace a broken settings file.
fn run(args: &Args) -> Result<()> {
    match &args.command {
        Commands::InitConfig { path } => {
            info!("Creating settings template at {}", path.display());
            UploadSettings::template().save_to_yaml_file(path)?;
            info!("Fill in the manta section or export the matching environment variables");
            Ok(())
        }
        Commands::CheckConfig { connect } => {
            let settings = load_settings(args.config.as_deref())?;
            let resolver = build_resolver(&args.overrides)?;
            check_config(&settings, &resolver, *connect)
        }
        Commands::Ship {
            file,
            compression,
            already_compressed,
        } => {
            let settings = load_settings(args.config.as_deref())?;
            let resolver = build_resolver(&args.overrides)?;
            ship(&settings, &resolver, file, compression.as_deref(), *already_compressed)
        }
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Explicit config file, else the default file in the working directory if
/// present, else nothing (every setting must then come from overrides or
/// the environment).
fn load_settings(path: Option<&Path>) -> Result<UploadSettings> {
    match path {
        Some(path) => UploadSettings::from_yaml_file(path),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
            if default_path.exists() {
                UploadSettings::from_yaml_file(&default_path)
            } else {
                Ok(UploadSettings::default())
            }
        }
    }
}

fn build_resolver(overrides: &[String]) -> Result<ParameterResolver> {
    let mut resolver = ParameterResolver::new();
    for pair in overrides {
        resolver
            .parse_override(pair)
            .with_context(|| format!("Invalid --set value '{}'", pair))?;
    }
    Ok(resolver)
}

fn resolve_config(settings: &UploadSettings, resolver: &ParameterResolver) -> Result<UploadConfig> {
    UploadConfig::resolve(settings, resolver).context("Configuration is incomplete")
}

fn check_config(settings: &UploadSettings, resolver: &ParameterResolver, connect: bool) -> Result<()> {
    let config = resolve_config(settings, resolver)?;
    info!("Resolved configuration: {:#?}", config);

    if connect {
        let store = MantaStore::new(&config).context("Failed to create Manta client")?;
        info!("Signing as {}", store.key_id());
        match store.probe(&config.log_directory) {
            Ok(()) => info!("Remote log directory {} exists", config.log_directory),
            Err(e) if e.is_not_found() => {
                warn!("Remote log directory {} does not exist yet; it will be created on first upload", config.log_directory)
            }
            Err(e) => return Err(e).context("Failed to reach the remote store"),
        }
    }

    info!("Configuration OK");
    Ok(())
}

fn ship(
    settings: &UploadSettings,
    resolver: &ParameterResolver,
    file: &Path,
    compression: Option<&str>,
    already_compressed: bool,
) -> Result<()> {
    let config = resolve_config(settings, resolver)?;

    let given = file.to_string_lossy().into_owned();
    let mode = match compression {
        Some(raw) => raw.parse::<CompressionMode>()?,
        None => CompressionMode::from_file_pattern(&given),
    };
    // A path that already carries the suffix is the finished archive.
    let (base, compress) = match given.strip_suffix(mode.suffix()) {
        Some(stripped) if mode != CompressionMode::None => (stripped.to_string(), false),
        _ => (given, mode != CompressionMode::None && !already_compressed),
    };

    let mut event = RolloverEvent::new(base.clone(), mode);
    if compress {
        let job = CompressionJob::start(&base, mode)
            .with_context(|| format!("Failed to start compressing {}", base))?;
        event = event.with_compression(job);
    }

    let store = MantaStore::new(&config).context("Failed to create Manta client")?;
    let uploader = Uploader::new(&config, Arc::new(store))?.with_listener(Arc::new(
        |local: &str, remote: &str| info!("Copied {} to {}", local, remote),
    ));
    let executor = BackgroundExecutor::new(config.tuning.workers)
        .context("Failed to start upload workers")?;
    let coordinator =
        RolloverCoordinator::new(uploader, CompressionWaiter::from_tuning(&config.tuning), executor);

    let ticket = coordinator.rollover(event)?;
    let outcome = ticket.wait();
    coordinator.shutdown();

    match outcome {
        RolloverOutcome::Uploaded(object) => {
            info!(
                "Stored {} ({} bytes, sha256 {}) at durability level {}",
                object.remote_path, object.size, object.sha256, object.durability_level
            );
            Ok(())
        }
        RolloverOutcome::Abandoned => {
            warn!("Compression was cancelled, nothing uploaded");
            Ok(())
        }
        RolloverOutcome::Failed(e) => bail!("Rollover of {} failed: {}", base, e),
    }
}
