use crate::backup::archive::{ArchiveEntry, ArchiveEntryIterable};
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};

use bon::Builder;
use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use getset::Getters;
use walkdir::{DirEntry, WalkDir};

use std::path::{Path, PathBuf};

/// Every regular file below `src_dir`, named relative to `src_dir`
#[derive(Clone, Debug, Builder, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct DirectorySource {
    #[builder(into)]
    src_dir: PathBuf,
    /// File left out of the walk, matched by canonical path
    #[builder(into)]
    exclude: Option<PathBuf>,
}

impl ArchiveEntryIterable for DirectorySource {
    #[named]
    fn archive_entry_iterator<'a>(&self) -> Result<DynIter<'a, Result<ArchiveEntry>>> {
        if !self.src_dir.is_dir() {
            tracing::error!(
                "Source directory does not exist or is not a directory: {:?}",
                self.src_dir
            );
            return Err(Error::from(std::io::Error::other(format!(
                "{:?} is not a directory",
                self.src_dir
            ))));
        }

        tracing::info!("Starting directory scan: {:?}", self.src_dir);
        let src_dir = self.src_dir.to_path_buf();
        let exclude = self.exclude.clone();

        let entries = WalkDir::new(&self.src_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |res| match res {
                Ok(de) if is_excluded(&de, exclude.as_deref()) => {
                    tracing::debug!("Skipping excluded {:?}", de.path());
                    None
                }
                Ok(de) => process_dir_entry(de, &src_dir),
                Err(e) => Some(Err(e.into())),
            })
            .map(move |res| res.add_fn_name(function_path!()));

        Ok(entries.into_dyn_iter())
    }
}

fn is_excluded(de: &DirEntry, exclude: Option<&Path>) -> bool {
    let Some(exclude) = exclude else {
        return false;
    };
    if exclude.file_name() != Some(de.file_name()) {
        return false;
    }
    std::fs::canonicalize(de.path()).is_ok_and(|p| p == exclude)
}

fn process_dir_entry<P: AsRef<Path>>(
    de: DirEntry,
    base_src_dir: P,
) -> Option<Result<ArchiveEntry>> {
    if !de.file_type().is_file() {
        tracing::trace!("Skipping {:?} not a file", de.path());
        return None;
    }

    let p = de.into_path();
    let res = match p.strip_prefix(base_src_dir.as_ref()) {
        Ok(stripped_path) => Ok(stripped_path.to_path_buf()),
        Err(e) => Err(Error::from(e).add_msg(format!(
            "Stripping {:?} from {:?} failed",
            base_src_dir.as_ref(),
            p
        ))),
    };

    Some(res.map(|dst| {
        let entry = ArchiveEntry::new(p, dst);
        tracing::trace!("Including file: {:?} -> {:?}", entry.src, entry.dst);
        entry
    }))
}
