//! # backuper
//!
//! Configuration-driven backups: archive local directories and upload the
//! archives to pluggable remote storage providers.
//!
//! ## Features
//!
//! - **Multiple Targets**: any number of named directories per configuration
//! - **Compression**: gzip (default) or XZ (LZMA) wrapped around a tar stream
//! - **Pluggable Providers**: S3-compatible stores, Cloudflare R2, local directories
//! - **Isolated Failures**: one failing target never stops the others
//!
//! ## Quick Start
//!
//! ```no_run
//! use backuper::backup::backup_config::BackupConfig;
//! use backuper::backup::registry::ProviderRegistry;
//! use validator::Validate;
//!
//! let config = BackupConfig::from_path("backuper.yml")?;
//! config.validate()?;
//!
//! let registry = ProviderRegistry::from_configs(config.providers());
//! let summary = config.orchestrator(registry).run_all();
//! summary.into_result()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
pub mod logging;
