pub mod compression;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-proto")))]
#[cfg(feature = "io-proto")]
pub mod proto;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::path::Path;

/// Create (truncate) `path`, making parent directories as needed.
pub(crate) fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("create {}", path.display()))
}

pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("open {}", path.display()))
}
