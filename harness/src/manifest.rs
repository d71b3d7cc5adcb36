use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::BootstrapError;
use crate::version::VersionSpec;

/// The `[dependencies]` table for a version, as TOML.
pub fn dependency_table(spec: &VersionSpec) -> Result<toml::Table, String> {
    match toml::Value::try_from(&spec.dependencies).map_err(|e| e.to_string())? {
        toml::Value::Table(table) => Ok(table),
        other => Err(format!("dependencies serialized to {}", other.type_str())),
    }
}

/// Replace the `[dependencies]` table of the cargo project at `descriptor`
/// with the version's pinned dependencies. Everything else cargo generated
/// (package name, edition) is kept.
pub fn write_dependencies(descriptor: &Path, spec: &VersionSpec) -> Result<(), BootstrapError> {
    let manifest_error = |message: String| BootstrapError::Manifest {
        path: descriptor.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(descriptor).map_err(|e| manifest_error(e.to_string()))?;
    let mut manifest: toml::Table = text
        .parse()
        .map_err(|e: toml::de::Error| manifest_error(e.to_string()))?;
    let dependencies = dependency_table(spec).map_err(manifest_error)?;
    manifest.insert("dependencies".to_string(), toml::Value::Table(dependencies));

    let rendered = toml::to_string(&manifest).map_err(|e| manifest_error(e.to_string()))?;
    std::fs::write(descriptor, rendered).map_err(|e| manifest_error(e.to_string()))
}

/// Stable digest of everything that determines a built environment.
pub fn fingerprint(spec: &VersionSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec.tag.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(spec.edition.as_str().as_bytes());
    hasher.update(b"\0");
    // BTreeMap order keeps the rendering deterministic.
    let dependencies = dependency_table(spec)
        .ok()
        .and_then(|table| toml::to_string(&table).ok())
        .unwrap_or_default();
    hasher.update(dependencies.as_bytes());
    format!("{:x}", hasher.finalize())
}
