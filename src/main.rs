use backuper::backup::backup_config::BackupConfig;
use backuper::backup::registry::ProviderRegistry;
use backuper::backup::result_error::error::Error;
use backuper::backup::result_error::result::Result;
use backuper::backup::result_error::AddMsg;
use backuper::logging::{default_log_file, init_console_logging, init_logging};
use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};
use validator::Validate;

/// Archive configured directories and upload them to remote storage
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file, defaults to $HOME/.backuper.yml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Location of log file, defaults to $HOME/.backuper.log
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Only back up these targets, may be repeated
    #[arg(short, long = "target")]
    targets: Vec<String>,
}

fn load_config(args: &Args) -> Result<BackupConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => BackupConfig::default_config_path()
            .ok_or_else(|| std::io::Error::other("Cannot determine home directory"))?,
    };

    let config = BackupConfig::from_path(&path)?;
    config
        .validate()
        .map_err(Error::from)
        .add_msg(format!("Config validation failed: {:?}", path))?;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let log_file = args.log_file.clone().unwrap_or_else(default_log_file);
    let guard = match init_logging(&log_file) {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_console_logging();
            warn!("Logging to console only: {e}");
            None
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            drop(guard);
            exit(1);
        }
    };

    let registry = ProviderRegistry::from_configs(config.providers());
    info!("Registered providers: {:?}", registry.names());

    let mut orchestrator = config.orchestrator(registry);
    let summary = if args.targets.is_empty() {
        orchestrator.run_all()
    } else {
        orchestrator.run_targets(&args.targets)
    };

    let failed = summary.failures().count();
    let code = if summary.is_success() {
        info!("All {} backups succeeded", summary.outcomes().len());
        0
    } else {
        error!(
            "{} of {} backups failed",
            failed,
            summary.outcomes().len()
        );
        1
    };

    drop(guard);
    exit(code);
}
