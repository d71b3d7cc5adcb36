use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ToolPaths;
use crate::error::HarnessError;
use crate::toolchain::Toolchain;
use crate::version::{VersionSpec, VersionTag};

/// Source of candidate file paths, relative to the repository root.
pub trait FileLister {
    fn list(&self, root: &Path, toolchain: &dyn Toolchain) -> Result<Vec<PathBuf>, HarnessError>;
}

/// Lists tracked files with `git ls-files`.
pub struct GitLister {
    tools: ToolPaths,
}

impl GitLister {
    pub fn new(tools: ToolPaths) -> Self {
        GitLister { tools }
    }
}

impl FileLister for GitLister {
    fn list(&self, root: &Path, toolchain: &dyn Toolchain) -> Result<Vec<PathBuf>, HarnessError> {
        let output = toolchain
            .output(&self.tools.git_ls_files(root))
            .map_err(|e| HarnessError::Enumerate(e.to_string()))?;
        if output.code != 0 {
            return Err(HarnessError::Enumerate(format!(
                "`git ls-files` exited with status {} in {}",
                output.code,
                root.display()
            )));
        }
        let files = String::from_utf8_lossy(&output.stdout)
            .split('\0')
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect();
        Ok(files)
    }
}

/// Walks the directory tree, skipping hidden directories and build output.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemLister;

impl FileLister for FilesystemLister {
    fn list(&self, root: &Path, _toolchain: &dyn Toolchain) -> Result<Vec<PathBuf>, HarnessError> {
        let mut files = Vec::new();
        collect_files(root, root, &mut files)?;
        Ok(files)
    }
}

fn collect_files(dir: &Path, root: &Path, out: &mut Vec<PathBuf>) -> Result<(), HarnessError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| HarnessError::Enumerate(format!("cannot read {}: {}", dir.display(), e)))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if name.starts_with('.') || name == "target" {
                continue;
            }
            collect_files(&path, root, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

/// Guide files partitioned by version, in configured version order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    versions: Vec<(VersionTag, Vec<PathBuf>)>,
}

impl Corpus {
    /// Assign every markdown file to the first version that owns it. Files
    /// owned by no version are dropped. Each list is sorted and deduplicated,
    /// so every file is tested exactly once.
    pub fn discover(files: impl IntoIterator<Item = PathBuf>, versions: &[VersionSpec]) -> Self {
        let mut buckets: Vec<BTreeSet<PathBuf>> = vec![BTreeSet::new(); versions.len()];
        for file in files {
            match versions.iter().position(|spec| spec.owns(&file)) {
                Some(i) => {
                    buckets[i].insert(file);
                }
                None => debug!(file = %file.display(), "not a guide of any version"),
            }
        }
        Corpus {
            versions: versions
                .iter()
                .zip(buckets)
                .map(|(spec, files)| (spec.tag.clone(), files.into_iter().collect()))
                .collect(),
        }
    }

    pub fn files_for(&self, tag: &VersionTag) -> &[PathBuf] {
        self.versions
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, files)| files.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VersionTag, &[PathBuf])> {
        self.versions
            .iter()
            .map(|(tag, files)| (tag, files.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.versions.iter().map(|(_, files)| files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
