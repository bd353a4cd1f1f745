use crate::backup::function_path;
use crate::backup::provider::{Provider, ProviderBuilder};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::validate::validate_dir_exist_or_created;

use bon::Builder;
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Keeps archives in a local (or mounted) directory
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct LocalDirConfig {
    #[validate(custom(function = validate_dir_exist_or_created))]
    #[builder(into)]
    dir: PathBuf,
}

impl ProviderBuilder for LocalDirConfig {
    fn build_provider(&self, name: &str) -> Result<Box<dyn Provider>> {
        Ok(Box::new(LocalDirProvider {
            name: name.to_string(),
            dir: self.dir.clone(),
        }))
    }
}

/// Copies each archive to `<dir>/<key>`
///
/// An archive that already is `<dir>/<key>` is left as it is.
#[derive(Debug)]
pub struct LocalDirProvider {
    name: String,
    dir: PathBuf,
}

impl LocalDirProvider {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, dir: P) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

impl Provider for LocalDirProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[named]
    fn upload(&self, key: &str, archive_path: &Path) -> Result<()> {
        let dst = self.dir.join(key);
        tracing::info!("Copying {:?} to {:?}", archive_path, dst);

        let copy = || -> Result<Option<u64>> {
            std::fs::create_dir_all(&self.dir)?;
            // creating dst would truncate the archive itself
            let in_place = std::fs::canonicalize(archive_path)?
                == std::fs::canonicalize(&self.dir)?.join(key);
            if in_place {
                return Ok(None);
            }
            let mut reader = File::open(archive_path).map(BufReader::new)?;
            let mut writer = File::create(&dst).map(BufWriter::new)?;
            let copied = std::io::copy(&mut reader, &mut writer)?;
            writer
                .into_inner()
                .map_err(IntoInnerError::into_error)?
                .sync_all()?;
            Ok(Some(copied))
        };

        match copy()
            .add_msg(format!("Copy {:?} to {:?} failed", archive_path, dst))
            .add_fn_name(function_path!())?
        {
            Some(copied) => tracing::debug!("Copied {} bytes to {:?}", copied, dst),
            None => tracing::info!("{:?} is already in {:?}", archive_path, self.dir),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::result_error::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_upload_copies_file_under_key() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let archive = src.path().join("archive");
        std::fs::write(&archive, b"archive bytes").unwrap();

        let provider = LocalDirProvider::new("nas", dst.path().join("nested"));
        provider.upload("backuper-docs-2026-01-01_00-00-00", &archive).unwrap();

        let copied = dst.path().join("nested/backuper-docs-2026-01-01_00-00-00");
        assert_eq!(std::fs::read(copied).unwrap(), b"archive bytes");
    }

    #[test]
    fn test_upload_of_archive_already_in_dir_keeps_content() {
        let dir = TempDir::new().unwrap();
        let key = "backuper-docs-2026-01-01_00-00-00";
        let archive = dir.path().join(key);
        std::fs::write(&archive, b"archive bytes").unwrap();

        let provider = LocalDirProvider::new("nas", dir.path());
        provider.upload(key, &archive).unwrap();
        // same file reached through another spelling of the path
        provider
            .upload(key, &dir.path().join(".").join(key))
            .unwrap();

        assert_eq!(std::fs::read(&archive).unwrap(), b"archive bytes");
    }

    #[test]
    fn test_upload_missing_archive_fails() {
        let dst = TempDir::new().unwrap();
        let provider = LocalDirProvider::new("nas", dst.path());
        let result = provider.upload("key", Path::new("/nonexistent/archive"));
        assert!(matches!(result.unwrap_err().root(), Error::Io(_)));
    }

    #[test]
    fn test_config_validation_creates_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("created");
        let config = LocalDirConfig::builder().dir(&dir).build();
        assert!(config.validate().is_ok());
        assert!(dir.is_dir());
    }
}
