pub mod directory;

use crate::backup::result_error::result::Result;
use dyn_iter::DynIter;
use std::path::Path;
use std::sync::Arc;

/// A single regular file to be written into a backup archive
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Source file path on the filesystem
    pub src: Arc<Path>,

    /// Entry name inside the archive, relative to the archived directory
    pub dst: Arc<Path>,
}

impl ArchiveEntry {
    pub fn new<A: Into<Arc<Path>>, B: Into<Arc<Path>>>(src: A, dst: B) -> ArchiveEntry {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }
}

/// Trait for generating archive entries from a backup source
///
/// The iterator yields Results so that errors met while scanning (permission
/// denied, vanished files) reach the archive writer in order.
pub trait ArchiveEntryIterable {
    fn archive_entry_iterator<'a>(&self) -> Result<DynIter<'a, Result<ArchiveEntry>>>;
}
