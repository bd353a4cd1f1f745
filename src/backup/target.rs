use bon::Builder;
use getset::Getters;
use std::path::PathBuf;

/// A named directory and the provider its archives go to
#[derive(Clone, Debug, PartialEq, Eq, Builder, Getters)]
#[getset(get = "pub")]
pub struct BackupTarget {
    #[builder(into)]
    name: String,
    #[builder(into)]
    source_path: PathBuf,
    /// Name of a registered provider, resolved at run time
    #[builder(into)]
    provider_name: String,
}

/// The archive produced by one backup run
#[derive(Clone, Debug, PartialEq, Eq, Builder, Getters)]
#[getset(get = "pub")]
pub struct ArchiveArtifact {
    /// Remote object key, also used as the local file name
    #[builder(into)]
    key: String,
    #[builder(into)]
    local_path: PathBuf,
}
