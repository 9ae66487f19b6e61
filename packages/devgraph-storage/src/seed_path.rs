//! Seed directory layout: `<pkg>/.seed/<branch>/gen-<N>/{nodes,edges,external_refs,effects}.parquet`
//! plus a branch-level `meta.json` pointer naming the current generation.
//! Table files are never mutated or replaced in place — each generation gets
//! its own directory, created once by an atomic directory rename, so a
//! reader that has already resolved a generation number keeps reading a
//! frozen file set no matter what a concurrent writer does afterwards.

use std::path::{Path, PathBuf};

/// The four columnar tables every generation carries.
pub const TABLES: [&str; 4] = ["nodes", "edges", "external_refs", "effects"];

/// Default convention directory name under a package root. Configurable by
/// constructing [`SeedLayout`] with an explicit `seed_dir_name`.
pub const DEFAULT_SEED_DIR: &str = ".seed";

/// Resolves on-disk paths for one package's seed artifacts. The package root
/// and the `.seed` directory name are both caller-supplied so the convention
/// can be overridden per deployment.
#[derive(Debug, Clone)]
pub struct SeedLayout {
    pub package_root: PathBuf,
    pub seed_dir_name: String,
}

impl SeedLayout {
    pub fn new(package_root: impl Into<PathBuf>) -> Self {
        Self {
            package_root: package_root.into(),
            seed_dir_name: DEFAULT_SEED_DIR.to_string(),
        }
    }

    pub fn seed_root(&self) -> PathBuf {
        self.package_root.join(&self.seed_dir_name)
    }

    pub fn branch_dir(&self, branch: &str) -> PathBuf {
        self.seed_root().join(sanitize_branch(branch))
    }

    pub fn staging_dir(&self, branch: &str, generation: u64) -> PathBuf {
        self.seed_root().join(format!(".staging-{}-{generation}", sanitize_branch(branch)))
    }

    /// The directory a generation's table files live in once visible. Never
    /// written into directly — a writer builds the equivalent [`staging_dir`]
    /// and renames the whole directory into place here as one atomic swap.
    ///
    /// [`staging_dir`]: Self::staging_dir
    pub fn gen_dir(&self, branch: &str, generation: u64) -> PathBuf {
        self.branch_dir(branch).join(format!("gen-{generation}"))
    }

    pub fn meta_path(&self, branch: &str) -> PathBuf {
        self.branch_dir(branch).join("meta.json")
    }

    pub fn table_path(&self, branch: &str, generation: u64, table: &str) -> PathBuf {
        self.gen_dir(branch, generation).join(format!("{table}.parquet"))
    }

    pub fn lock_path(&self, branch: &str) -> PathBuf {
        self.seed_root().join(format!(".lock-{}", sanitize_branch(branch)))
    }

    /// True if any `.tmp`/`.lock`/`.staging-*` sidecar exists directly under
    /// the seed root, indicating an in-flight or abandoned write.
    pub fn has_inflight_markers(&self) -> std::io::Result<bool> {
        let root = self.seed_root();
        if !root.exists() {
            return Ok(false);
        }
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(".staging-") || name.starts_with(".lock-") || name.ends_with(".tmp") {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Branch names become directory components; slashes (common in branch
/// names like `feature/x`) are replaced so one branch never nests inside
/// another's directory by accident.
fn sanitize_branch(branch: &str) -> String {
    branch.replace(['/', '\\'], "__")
}

pub fn is_orphan_sidecar(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy(),
        None => return false,
    };
    name.starts_with(".staging-") || name.starts_with(".lock-") || name.ends_with(".tmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_names_with_slashes_sanitize_to_a_single_directory() {
        let layout = SeedLayout::new("/repo/pkg");
        let dir = layout.branch_dir("feature/x");
        assert_eq!(dir.file_name().unwrap(), "feature__x");
    }

    #[test]
    fn table_path_is_stamped_with_its_generation() {
        let layout = SeedLayout::new("/repo/pkg");
        let path = layout.table_path("main", 3, "nodes");
        assert_eq!(path, PathBuf::from("/repo/pkg/.seed/main/gen-3/nodes.parquet"));
    }

    #[test]
    fn different_generations_never_share_a_directory() {
        let layout = SeedLayout::new("/repo/pkg");
        assert_ne!(layout.gen_dir("main", 1), layout.gen_dir("main", 2));
    }
}
