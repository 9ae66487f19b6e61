//! C2 cleanup: removes an entire seed subtree and any orphan `.tmp`/`.lock`
//! files. Never touches source code — it only ever descends into the
//! configured `.seed` directory.

use std::fs;

use crate::error::Result;
use crate::seed_path::SeedLayout;

/// Removes the whole `.seed` directory for a package, including every
/// branch's generations and any abandoned lock/staging sidecars.
pub fn clean(layout: &SeedLayout) -> Result<()> {
    let root = layout.seed_root();
    if root.exists() {
        tracing::debug!(path = %root.display(), "removing seed subtree");
        fs::remove_dir_all(&root)?;
    }
    Ok(())
}

/// Removes only orphan sidecars (`.tmp`, `.lock-*`, `.staging-*`) without
/// touching any complete generation, for callers that want maintenance
/// without a full wipe.
pub fn clean_orphans(layout: &SeedLayout) -> Result<usize> {
    let root = layout.seed_root();
    if !root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        let path = entry.path();
        if crate::seed_path::is_orphan_sidecar(&path) {
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_the_entire_seed_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        fs::create_dir_all(layout.branch_dir("main")).unwrap();
        fs::write(layout.meta_path("main"), b"{}").unwrap();

        clean(&layout).unwrap();
        assert!(!layout.seed_root().exists());
    }

    #[test]
    fn clean_orphans_leaves_complete_generations_alone() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        fs::create_dir_all(layout.branch_dir("main")).unwrap();
        fs::write(layout.meta_path("main"), b"{}").unwrap();
        fs::write(layout.lock_path("main"), b"").unwrap();

        let removed = clean_orphans(&layout).unwrap();
        assert_eq!(removed, 1);
        assert!(layout.meta_path("main").exists());
        assert!(!layout.lock_path("main").exists());
    }
}
