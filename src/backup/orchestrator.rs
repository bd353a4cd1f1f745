//! Backup execution: resolve a target, archive it, hand the archive to its
//! provider.

use crate::backup::registry::ProviderRegistry;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::tar::{Archiver, TarArchiver};
use crate::backup::target::{ArchiveArtifact, BackupTarget};
use bon::Builder;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub static DEFAULT_ARCHIVE_PREFIX: &str = "backuper";
pub static KEY_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// What happens to the local archive once a run is over
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Leave every archive in the temp directory
    #[default]
    Never,
    /// Delete the archive after a successful upload
    OnSuccess,
    /// Delete the archive after every attempt
    Always,
}

/// Runs backups for a fixed set of targets against a provider registry
///
/// Targets are processed one at a time; archive and upload errors are
/// returned to the caller and never stop other targets.
#[derive(Builder)]
pub struct Orchestrator {
    #[builder(into)]
    targets: Vec<BackupTarget>,
    registry: ProviderRegistry,
    #[builder(default = Box::new(TarArchiver::default()) as Box<dyn Archiver>)]
    archiver: Box<dyn Archiver>,
    #[builder(into, default = std::env::temp_dir())]
    temp_dir: PathBuf,
    #[builder(into, default = DEFAULT_ARCHIVE_PREFIX.to_string())]
    archive_prefix: String,
    #[builder(default)]
    cleanup: CleanupPolicy,
    /// Last timestamp handed out per target, keeps keys unique
    #[builder(skip)]
    issued: HashMap<String, DateTime<Utc>>,
}

impl Orchestrator {
    pub fn targets(&self) -> &[BackupTarget] {
        &self.targets
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Archives one target and uploads the archive to the target's provider.
    ///
    /// Nothing touches the disk when the target or its provider cannot be
    /// resolved.
    pub fn run_backup(&mut self, target_name: &str) -> Result<ArchiveArtifact> {
        let target = self
            .targets
            .iter()
            .find(|t| t.name() == target_name)
            .ok_or_else(|| Error::UnknownTarget(target_name.to_string()))?;

        let provider = self
            .registry
            .lookup(target.provider_name())
            .ok_or_else(|| Error::UnknownProvider(target.provider_name().clone()))?;

        let timestamp = next_timestamp(&mut self.issued, target.name(), Utc::now());
        let key = archive_key(&self.archive_prefix, target.name(), timestamp);
        let local_path = self.temp_dir.join(&key);

        info!(
            "Archiving {:?} for target {:?} into {:?}",
            target.source_path(),
            target.name(),
            local_path
        );
        if let Err(e) = self.archiver.archive(target.source_path(), &local_path) {
            if self.cleanup == CleanupPolicy::Always {
                remove_archive(&local_path);
            }
            return Err(Error::ArchiveFailed {
                target: target.name().clone(),
                error: Box::new(e),
            });
        }

        info!("Uploading {:?} with provider {:?}", key, provider.name());
        let uploaded = provider
            .upload(&key, &local_path)
            .map_err(|e| Error::UploadFailed {
                provider: provider.name().to_string(),
                key: key.clone(),
                error: Box::new(e),
            });

        match (&uploaded, self.cleanup) {
            (_, CleanupPolicy::Always) | (Ok(_), CleanupPolicy::OnSuccess) => {
                remove_archive(&local_path)
            }
            _ => {}
        }

        uploaded.map(|_| ArchiveArtifact::builder().key(key).local_path(local_path).build())
    }

    /// Runs every target once, in the order the targets were given.
    ///
    /// Targets built from a configuration file are sorted by name.
    pub fn run_all(&mut self) -> BackupSummary {
        let names = self.targets.iter().map(|t| t.name().clone()).collect_vec();
        self.run_targets(names)
    }

    /// Runs the named targets once each, continuing past failures.
    pub fn run_targets<I, S>(&mut self, names: I) -> BackupSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcomes = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                info!("Backing up {}...", name);
                let result = self.run_backup(name);
                match &result {
                    Ok(artifact) => info!(
                        "Successfully uploaded {:?} for {}",
                        artifact.key(),
                        name
                    ),
                    Err(e) => error!("Failed to backup {}: {e}", name),
                }
                BackupOutcome {
                    target: name.to_string(),
                    result,
                }
            })
            .collect();

        BackupSummary { outcomes }
    }
}

fn archive_key(prefix: &str, target: &str, timestamp: DateTime<Utc>) -> String {
    format!("{}-{}-{}", prefix, target, timestamp.format(KEY_TIME_FORMAT))
}

/// Second-precision timestamp for `target`, strictly after any earlier one
fn next_timestamp(
    issued: &mut HashMap<String, DateTime<Utc>>,
    target: &str,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let now = now.trunc_subsecs(0);
    let timestamp = match issued.get(target) {
        Some(last) if *last >= now => *last + TimeDelta::seconds(1),
        _ => now,
    };
    issued.insert(target.to_string(), timestamp);
    timestamp
}

fn remove_archive(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(_) => info!("Removed temporary archive {:?}", path),
        Err(e) => warn!("Failed to remove temporary archive {:?}: {e}", path),
    }
}

/// Outcome of one target within a run
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct BackupOutcome {
    target: String,
    result: Result<ArchiveArtifact>,
}

/// Per-target outcomes of a multi-target run
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct BackupSummary {
    outcomes: Vec<BackupOutcome>,
}

impl BackupSummary {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ArchiveArtifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.target.as_str(), e)))
    }

    /// All artifacts, or every failure folded into one error.
    pub fn into_result(self) -> Result<Vec<ArchiveArtifact>> {
        let (artifacts, errors): (Vec<_>, Vec<_>) =
            self.outcomes.into_iter().map(|o| o.result).partition_result();
        convert_error_vec(errors)?;
        Ok(artifacts)
    }
}
