use crate::backup::compress::CompressorConfig;
use crate::backup::function_path;
use crate::backup::orchestrator::{CleanupPolicy, Orchestrator, DEFAULT_ARCHIVE_PREFIX};
use crate::backup::provider::ProviderConfig;
use crate::backup::registry::ProviderRegistry;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::tar::TarArchiver;
use crate::backup::target::BackupTarget;
use crate::backup::validate::{
    validate_dir_exist, validate_dir_exist_or_created, validate_valid_file_name,
};
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

static DEFAULT_CONFIG_FILE_NAME: &str = ".backuper.yml";

fn default_archive_prefix() -> String {
    DEFAULT_ARCHIVE_PREFIX.to_string()
}

/// One entry of the `backups` map: which directory, and where it goes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupTargetConfig {
    #[builder(into)]
    path: PathBuf,
    /// Key into the `providers` map
    #[builder(into)]
    provider: String,
}

/// Top level of the YAML configuration file
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = validate_backups))]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[serde(default = "default_archive_prefix")]
    #[validate(custom(function = validate_valid_file_name))]
    #[builder(into, default = default_archive_prefix())]
    archive_prefix: String,
    #[serde(default = "std::env::temp_dir")]
    #[validate(custom(function = validate_dir_exist_or_created))]
    #[builder(into, default = std::env::temp_dir())]
    temp_dir: PathBuf,
    #[serde(default)]
    #[builder(default)]
    cleanup: CleanupPolicy,
    #[serde(default)]
    #[builder(default)]
    compressor: CompressorConfig,
    #[validate(length(min = 1, message = "at least one backup must be configured"))]
    backups: BTreeMap<String, BackupTargetConfig>,
    #[serde(default)]
    #[builder(default)]
    providers: BTreeMap<String, ProviderConfig>,
}

/// Checks every backup entry against the rest of the configuration.
///
/// All problems are reported together, one per line.
fn validate_backups(config: &BackupConfig) -> std::result::Result<(), ValidationError> {
    let mut problems = Vec::new();

    if let Err(e) = config.compressor.validate() {
        problems.push(format!("compressor: {e}"));
    }

    for (name, provider) in &config.providers {
        if let Err(e) = provider.validate() {
            problems.push(format!("provider {name:?}: {e}"));
        }
        if let ProviderConfig::LocalDir(local) = provider {
            if is_same_dir(local.dir(), &config.temp_dir) {
                problems.push(format!(
                    "provider {name:?}: dir {:?} is the temp_dir, archives stored there would be removed by cleanup",
                    local.dir()
                ));
            }
        }
    }

    for (name, target) in &config.backups {
        if let Err(e) = validate_valid_file_name(name) {
            problems.push(format!("backup {name:?}: {e}"));
        }
        if let Err(e) = validate_dir_exist(&target.path) {
            problems.push(format!("backup {name:?}: path {e}"));
        }
        if !config.providers.contains_key(&target.provider) {
            problems.push(format!(
                "backup {name:?}: provider {:?} is not configured",
                target.provider
            ));
        }
    }

    if problems.is_empty() {
        return Ok(());
    }

    Err(ValidationError::new("InvalidBackups").with_message(problems.join("\n").into()))
}

fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl BackupConfig {
    /// `$HOME/.backuper.yml`, if a home directory can be determined
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE_NAME))
    }

    /// Parses the YAML file at `path`. Validation is left to the caller.
    #[named]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map(BufReader::new)
            .map_err(Error::from)
            .and_then(|reader| serde_yml::from_reader(reader).map_err(Error::from))
            .add_msg(format!("Load config from {:?} failed", path))
            .add_fn_name(function_path!())
    }

    pub fn targets(&self) -> Vec<BackupTarget> {
        self.backups
            .iter()
            .map(|(name, target)| {
                BackupTarget::builder()
                    .name(name)
                    .source_path(&target.path)
                    .provider_name(&target.provider)
                    .build()
            })
            .collect_vec()
    }

    pub fn archiver(&self) -> TarArchiver {
        TarArchiver::builder()
            .compressor(self.compressor.clone())
            .build()
    }

    /// An orchestrator over every configured backup, sending archives to
    /// `registry`.
    pub fn orchestrator(&self, registry: ProviderRegistry) -> Orchestrator {
        Orchestrator::builder()
            .targets(self.targets())
            .registry(registry)
            .archiver(Box::new(self.archiver()))
            .temp_dir(&self.temp_dir)
            .archive_prefix(&self.archive_prefix)
            .cleanup(self.cleanup)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            std::fs::create_dir_all(root.path().join("docs")).unwrap();
            std::fs::create_dir_all(root.path().join("remote")).unwrap();
            std::fs::write(root.path().join("docs/a.txt"), "a").unwrap();
            Self { root }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.root.path().join(rel)
        }

        fn yaml(&self, backup_name: &str, backup_path: &str, provider: &str) -> String {
            format!(
                r#"
temp_dir: {tmp:?}
cleanup: on_success
compressor:
  compressor_type: xz
  level: 6
backups:
  {backup_name}:
    path: {path:?}
    provider: {provider}
providers:
  local:
    type: local_dir
    dir: {remote:?}
"#,
                tmp = self.path("tmp"),
                path = self.path(backup_path),
                remote = self.path("remote"),
            )
        }

        fn write_config(&self, yaml: &str) -> PathBuf {
            let path = self.path("backuper.yml");
            std::fs::write(&path, yaml).unwrap();
            path
        }
    }

    #[test]
    fn test_parse_full_config() {
        let fx = Fixture::new();
        let config: BackupConfig = serde_yml::from_str(&fx.yaml("docs", "docs", "local")).unwrap();

        assert_eq!(config.archive_prefix(), DEFAULT_ARCHIVE_PREFIX);
        assert_eq!(config.temp_dir(), &fx.path("tmp"));
        assert_eq!(config.cleanup(), &CleanupPolicy::OnSuccess);
        assert!(matches!(config.compressor(), CompressorConfig::Xz(_)));
        assert_eq!(
            config.backups()["docs"],
            BackupTargetConfig::builder()
                .path(fx.path("docs"))
                .provider("local")
                .build()
        );
        assert!(matches!(
            config.providers()["local"],
            ProviderConfig::LocalDir(_)
        ));
        assert!(config.validate().is_ok());
        assert!(fx.path("tmp").is_dir());
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let fx = Fixture::new();
        let yaml = format!(
            "backups:\n  docs:\n    path: {:?}\n    provider: local\n",
            fx.path("docs")
        );
        let config: BackupConfig = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(config.archive_prefix(), "backuper");
        assert_eq!(config.temp_dir(), &std::env::temp_dir());
        assert_eq!(config.cleanup(), &CleanupPolicy::Never);
        assert!(matches!(config.compressor(), CompressorConfig::Gzip(_)));
        assert!(config.providers().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "backups: {}\nencryptor: age\n";
        assert!(serde_yml::from_str::<BackupConfig>(yaml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_provider() {
        let fx = Fixture::new();
        let config: BackupConfig =
            serde_yml::from_str(&fx.yaml("docs", "docs", "cloudflare-r2")).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("\"cloudflare-r2\" is not configured"), "{err}");
    }

    #[test]
    fn test_validation_rejects_local_dir_equal_to_temp_dir() {
        let fx = Fixture::new();
        let yaml = fx.yaml("docs", "docs", "local").replace(
            &format!("dir: {:?}", fx.path("remote")),
            &format!("dir: {:?}", fx.path("tmp/.")),
        );
        let config: BackupConfig = serde_yml::from_str(&yaml).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("is the temp_dir"), "{err}");
    }

    #[test]
    fn test_validation_rejects_missing_path() {
        let fx = Fixture::new();
        let config: BackupConfig =
            serde_yml::from_str(&fx.yaml("docs", "missing", "local")).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("not found"), "{err}");
    }

    #[test]
    fn test_validation_rejects_unsafe_target_name() {
        let fx = Fixture::new();
        let config: BackupConfig =
            serde_yml::from_str(&fx.yaml("\"../etc\"", "docs", "local")).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_backups() {
        let config: BackupConfig = serde_yml::from_str("backups: {}\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_compressor_level() {
        let fx = Fixture::new();
        let yaml = fx.yaml("docs", "docs", "local").replace("level: 6", "level: 42");
        let config: BackupConfig = serde_yml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let fx = Fixture::new();
        let path = fx.write_config(&fx.yaml("docs", "docs", "local"));
        let config = BackupConfig::from_path(&path).unwrap();
        assert_eq!(config.backups().len(), 1);
    }

    #[test]
    fn test_from_path_missing_file() {
        let fx = Fixture::new();
        let err = BackupConfig::from_path(fx.path("nope.yml")).unwrap_err();
        assert!(matches!(err.root(), Error::Io(_)));
    }

    #[test]
    fn test_from_path_invalid_yaml() {
        let fx = Fixture::new();
        let path = fx.write_config("backups: [not, a, map]\n");
        let err = BackupConfig::from_path(&path).unwrap_err();
        assert!(matches!(err.root(), Error::SerdeYml(_)));
    }

    #[test]
    fn test_targets_follow_backup_names() {
        let fx = Fixture::new();
        let yaml = format!(
            "backups:\n  photos:\n    path: {p:?}\n    provider: a\n  docs:\n    path: {p:?}\n    provider: b\n",
            p = fx.path("docs")
        );
        let config: BackupConfig = serde_yml::from_str(&yaml).unwrap();
        let targets = config.targets();
        assert_eq!(
            targets.iter().map(|t| t.name().as_str()).collect_vec(),
            vec!["docs", "photos"]
        );
        assert_eq!(targets[0].provider_name(), "b");
        assert_eq!(targets[0].source_path(), &fx.path("docs"));
    }

    #[test]
    fn test_orchestrator_runs_configured_backup() {
        let fx = Fixture::new();
        let config: BackupConfig = serde_yml::from_str(&fx.yaml("docs", "docs", "local")).unwrap();
        config.validate().unwrap();

        let registry = ProviderRegistry::from_configs(config.providers());
        let artifacts = config
            .orchestrator(registry)
            .run_all()
            .into_result()
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        let key = artifacts[0].key();
        assert!(key.starts_with("backuper-docs-"));
        assert!(fx.path("remote").join(key).is_file());
        // on_success removes the local copy
        assert!(!artifacts[0].local_path().exists());

        let uploaded = std::fs::read_dir(fx.path("remote"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect::<BTreeSet<_>>();
        assert_eq!(uploaded.len(), 1);
    }
}
