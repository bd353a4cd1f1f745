use crate::backup::archive::directory::DirectorySource;
use crate::backup::archive::ArchiveEntryIterable;
use crate::backup::compress::{CompressorBuilder, CompressorConfig};
use crate::backup::finish::Finish;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use bon::Builder;
use getset::Getters;
use std::fs::File;
use std::io::{BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};

/// Turns a directory tree into a single archive file
pub trait Archiver {
    /// Writes every regular file below `source_dir` into a new archive at
    /// `destination`. Stops at the first error and leaves whatever was
    /// written so far on disk.
    fn archive(&self, source_dir: &Path, destination: &Path) -> Result<()>;
}

/// Compressed TAR archiver
#[derive(Clone, Debug, Default, Builder, Getters)]
#[getset(get = "pub")]
pub struct TarArchiver {
    #[builder(default)]
    compressor: CompressorConfig,
}

impl Archiver for TarArchiver {
    fn archive(&self, source_dir: &Path, destination: &Path) -> Result<()> {
        // the destination may sit inside the source tree
        let archive_path = canonical_path(destination)?;
        let entries = DirectorySource::builder()
            .src_dir(source_dir)
            .exclude(&archive_path)
            .build()
            .archive_entry_iterator()?;

        let mut writer = File::create(&archive_path)
            .map(BufWriter::new)
            .map_err(Error::from)
            .and_then(|f| self.compressor.build_compressor(f))
            .map(BufWriter::new)
            .map(::tar::Builder::new)?;

        writer.follow_symlinks(true);

        let mut entry_count = 0;
        for entry in entries {
            let entry = entry?;
            writer.append_path_with_name(&entry.src, &entry.dst)?;
            entry_count += 1;
        }

        writer
            .into_inner()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .sync_all()?;

        tracing::info!(
            "Archived {} files from {:?} into {:?}",
            entry_count,
            source_dir,
            destination
        );
        Ok(())
    }
}

/// Symlink-free absolute form of `path`. Only the parent has to exist.
fn canonical_path(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other(format!("{:?} has no file name", path)))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(std::fs::canonicalize(parent)?.join(file_name))
}
