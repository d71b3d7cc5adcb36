use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use guide::attributes::Edition;
use serde::{Deserialize, Serialize};

/// A documentation version label such as `legacy` or `stable`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VersionTag(pub String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        VersionTag(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pinned dependency, written the way Cargo.toml writes it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// `hyper = "0.14"`
    Version(String),
    /// `hyper = { version = "0.14", features = ["full"] }`
    Detailed(DetailedDependency),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailedDependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_features: Option<bool>,
}

/// One documentation version: where its guides live and what they link against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionSpec {
    pub tag: VersionTag,
    /// Directory name the guides of this version live under. Defaults to `_<tag>`.
    #[serde(default)]
    pub guides: Option<String>,
    /// Directory of the cargo project holding the built dependencies. Defaults to `<tag>`.
    #[serde(default)]
    pub env_dir: Option<String>,
    #[serde(default = "default_edition")]
    pub edition: Edition,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

fn default_edition() -> Edition {
    Edition::E2018
}

impl VersionSpec {
    pub fn guides_dir(&self) -> String {
        self.guides
            .clone()
            .unwrap_or_else(|| format!("_{}", self.tag))
    }

    pub fn env_dir_name(&self) -> String {
        self.env_dir.clone().unwrap_or_else(|| self.tag.0.clone())
    }

    /// Whether `path` is a guide of this version: a markdown file with the
    /// version's guide directory among its components.
    pub fn owns(&self, path: &Path) -> bool {
        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        let guides = self.guides_dir();
        is_markdown
            && path
                .parent()
                .is_some_and(|parent| parent.components().any(|c| c.as_os_str() == guides.as_str()))
    }

    /// Package name used for the generated cargo project.
    pub fn package_name(&self) -> String {
        let sanitized: String = self
            .tag
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{}-snippets", sanitized)
    }
}

fn detailed(version: &str, features: &[&str]) -> DependencySpec {
    DependencySpec::Detailed(DetailedDependency {
        version: Some(version.to_string()),
        features: features.iter().map(|f| f.to_string()).collect(),
        default_features: None,
    })
}

/// The two documentation versions the site ships with.
pub fn builtin_versions() -> Vec<VersionSpec> {
    let legacy = VersionSpec {
        tag: VersionTag::new("legacy"),
        guides: None,
        env_dir: None,
        edition: Edition::E2018,
        dependencies: BTreeMap::from([
            ("hyper".to_string(), detailed("0.14", &["full"])),
            ("tokio".to_string(), detailed("1", &["full"])),
            ("futures-util".to_string(), DependencySpec::Version("0.3".into())),
        ]),
    };
    let stable = VersionSpec {
        tag: VersionTag::new("stable"),
        guides: None,
        env_dir: None,
        edition: Edition::E2021,
        dependencies: BTreeMap::from([
            ("hyper".to_string(), detailed("1", &["full"])),
            ("hyper-util".to_string(), detailed("0.1", &["full"])),
            ("http-body-util".to_string(), DependencySpec::Version("0.1".into())),
            ("tokio".to_string(), detailed("1", &["full"])),
            ("bytes".to_string(), DependencySpec::Version("1".into())),
        ]),
    };
    vec![legacy, stable]
}
