pub mod local;
pub mod s3;

use crate::backup::provider::local::LocalDirConfig;
use crate::backup::provider::s3::{CloudflareR2Config, S3Config};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddDebugObjectAndFnName;
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::result;
use validator::{Validate, ValidationErrors};

/// A remote storage backend that accepts archive uploads
///
/// Implementations are stored as trait objects in the
/// [`ProviderRegistry`](crate::backup::registry::ProviderRegistry), so new
/// backends plug in without touching the orchestrator.
pub trait Provider {
    /// Stable identifier, used as the registry key and matched against the
    /// `provider` field of a backup target.
    fn name(&self) -> &str;

    /// Sends the file at `archive_path` to the backend under `key`.
    ///
    /// The file is streamed, never loaded whole. A single attempt is made.
    fn upload(&self, key: &str, archive_path: &Path) -> Result<()>;
}

/// Configuration of a provider, keyed by provider name in the config file
#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Any S3-compatible object store
    S3(S3Config),

    /// Cloudflare R2, an S3-compatible store addressed by account id
    CloudflareR2(CloudflareR2Config),

    /// A directory on the local filesystem (or a mounted share)
    LocalDir(LocalDirConfig),
}

impl Validate for ProviderConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            Self::S3(inner) => inner.validate(),
            Self::CloudflareR2(inner) => inner.validate(),
            Self::LocalDir(inner) => inner.validate(),
        }
    }
}

/// Creates the provider described by a configuration under the given name
pub trait ProviderBuilder {
    fn build_provider(&self, name: &str) -> Result<Box<dyn Provider>>;
}

impl ProviderBuilder for ProviderConfig {
    fn build_provider(&self, name: &str) -> Result<Box<dyn Provider>> {
        match self {
            Self::S3(inner) => inner.build_provider(name),
            Self::CloudflareR2(inner) => inner.build_provider(name),
            Self::LocalDir(inner) => inner.build_provider(name),
        }
        .add_debug_object_and_fn_name(self.clone(), "build_provider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_local_dir() {
        let config: ProviderConfig =
            serde_yml::from_str("type: local_dir\ndir: /srv/backups\n").unwrap();
        assert!(matches!(config, ProviderConfig::LocalDir(_)));
    }

    #[test]
    fn test_deserialize_cloudflare_r2_camel_case_keys() {
        let yaml = r#"
type: cloudflare_r2
accessKey: access
secretKey: secret
accountID: account
bucketName: bucket
"#;
        let config: ProviderConfig = serde_yml::from_str(yaml).unwrap();
        match config {
            ProviderConfig::CloudflareR2(r2) => {
                assert_eq!(r2.account_id(), "account");
                assert_eq!(r2.bucket_name(), "bucket");
                assert_eq!(r2.secret_key().inner(), "secret");
            }
            other => panic!("Expected CloudflareR2, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_unknown_type_fails() {
        let result = serde_yml::from_str::<ProviderConfig>("type: ftp\nhost: example.org\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let yaml = r#"
type: s3
bucket_name: bucket
access_key: visible-only-in-memory
secret_key: very-secret-value
"#;
        let config: ProviderConfig = serde_yml::from_str(yaml).unwrap();
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("very-secret-value"));
        assert!(!debug_str.contains("visible-only-in-memory"));
    }

    #[test]
    fn test_build_local_dir_provider_uses_given_name() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ProviderConfig::LocalDir(
            LocalDirConfig::builder().dir(temp_dir.path()).build(),
        );
        let provider = config.build_provider("nas").unwrap();
        assert_eq!(provider.name(), "nas");
    }
}
