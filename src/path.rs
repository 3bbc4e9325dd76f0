//! Guest paths, checked before they reach a directory capability.
//!
//! The lookups themselves go through `cap_std::fs::Dir`, which resolves
//! every component (symlinks included) beneath the directory and reports an
//! escape as `ENOTCAPABLE`. What is left here is the part that needs no host
//! access at all.
use crate::{Error, Result};
use std::path::{Component, Path};

fn escape(path: &Path) -> Result<&Path> {
    tracing::trace!("     | {:?} escapes its directory", path);
    Err(Error::ENOTCAPABLE)
}

/// Validates a guest path relative to a directory descriptor.
///
/// Empty paths are `ENOENT` and embedded NULs `EILSEQ`. Absolute paths, and
/// `..` components that climb above the directory even through components
/// that do not exist, are `ENOTCAPABLE` before anything is looked up.
pub(crate) fn checked_path(path: &str) -> Result<&Path> {
    if path.is_empty() {
        return Err(Error::ENOENT);
    }
    if path.contains('\0') {
        return Err(Error::EILSEQ);
    }

    let path = Path::new(path);
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return escape(path),
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(up) => depth = up,
                None => return escape(path),
            },
            Component::Normal(_) => depth += 1,
        }
    }
    Ok(path)
}
