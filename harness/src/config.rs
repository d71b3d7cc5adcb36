use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use guide::attributes::UntaggedPolicy;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::HarnessError;
use crate::version::{VersionSpec, VersionTag, builtin_versions};

/// Where the list of guide files comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListerKind {
    /// Tracked files only (`git ls-files`).
    #[default]
    Git,
    /// Every file under the root, for trees that are not git checkouts.
    Filesystem,
}

/// Which tool extracts and runs the snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `rustdoc --test` per file.
    #[default]
    Rustdoc,
    /// Per-block programs compiled with `rustc`.
    Extract,
}

/// Executables the harness shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub cargo: PathBuf,
    pub rustdoc: PathBuf,
    pub rustc: PathBuf,
    pub git: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            cargo: PathBuf::from("cargo"),
            rustdoc: PathBuf::from("rustdoc"),
            rustc: PathBuf::from("rustc"),
            git: PathBuf::from("git"),
        }
    }
}

/// Contents of `guidetest.toml`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory holding the version environments, relative to the root.
    pub env_root: PathBuf,
    pub lister: ListerKind,
    pub backend: BackendKind,
    pub untagged: UntaggedPolicy,
    /// Version used for a single file whose path matches no version.
    pub default_version: VersionTag,
    pub lock_timeout_secs: u64,
    pub tools: ToolPaths,
    /// Replaces the built-in versions entirely when present.
    #[serde(rename = "version")]
    pub versions: Vec<VersionSpec>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            env_root: PathBuf::from("."),
            lister: ListerKind::default(),
            backend: BackendKind::default(),
            untagged: UntaggedPolicy::default(),
            default_version: VersionTag::new("stable"),
            lock_timeout_secs: 600,
            tools: ToolPaths::default(),
            versions: builtin_versions(),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, HarnessError> {
        let config: HarnessConfig =
            toml::from_str(text).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        info!(config_path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Reject configurations that would make two versions share guides or
    /// an environment directory.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.versions.is_empty() {
            return Err(HarnessError::Config("no versions configured".into()));
        }
        let mut tags = HashSet::new();
        let mut env_dirs = HashSet::new();
        let mut guide_dirs = HashSet::new();
        for spec in &self.versions {
            if !tags.insert(spec.tag.clone()) {
                return Err(HarnessError::Config(format!(
                    "version '{}' is declared twice",
                    spec.tag
                )));
            }
            if !env_dirs.insert(spec.env_dir_name()) {
                return Err(HarnessError::Config(format!(
                    "environment directory '{}' is shared by several versions",
                    spec.env_dir_name()
                )));
            }
            if !guide_dirs.insert(spec.guides_dir()) {
                return Err(HarnessError::Config(format!(
                    "guide directory '{}' is shared by several versions",
                    spec.guides_dir()
                )));
            }
        }
        Ok(())
    }

    pub fn version(&self, tag: &VersionTag) -> Option<&VersionSpec> {
        self.versions.iter().find(|spec| &spec.tag == tag)
    }

    /// The first version whose guide directory contains `path`.
    pub fn version_for_path(&self, path: &Path) -> Option<&VersionSpec> {
        self.versions.iter().find(|spec| spec.owns(path))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}
