//! Exclusive file lock for writer coordination on one package/branch's seed
//! directory. Readers never take this lock — they bind to whatever
//! generation `meta.json` points at when they open it, so writers never
//! block them and vice versa.

use std::fs;
use std::path::PathBuf;

use crate::error::{Result, StorageError};
use crate::seed_path::SeedLayout;

/// Held for the duration of one generation's write. Dropping it removes the
/// `.lock-<branch>` sidecar; a process that crashes mid-write leaves the
/// sidecar behind, which the `clean` maintenance operation treats as an
/// orphan.
pub struct SeedLock {
    path: PathBuf,
}

impl SeedLock {
    pub fn acquire(layout: &SeedLayout, branch: &str) -> Result<Self> {
        fs::create_dir_all(layout.seed_root())?;
        let path = layout.lock_path(branch);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(SeedLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!(branch, path = %path.display(), "seed directory locked by another writer");
                Err(StorageError::Locked(branch.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SeedLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_branch_is_rejected_until_the_first_drops() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());

        let first = SeedLock::acquire(&layout, "main").unwrap();
        let second = SeedLock::acquire(&layout, "main");
        assert!(matches!(second, Err(StorageError::Locked(_))));

        drop(first);
        assert!(SeedLock::acquire(&layout, "main").is_ok());
    }

    #[test]
    fn locks_on_different_branches_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());

        let _main = SeedLock::acquire(&layout, "main").unwrap();
        assert!(SeedLock::acquire(&layout, "feature/x").is_ok());
    }
}
