use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use guide::attributes::Edition;
use tracing::{info, warn};

use crate::config::ToolPaths;
use crate::error::BootstrapError;
use crate::manifest;
use crate::toolchain::Toolchain;
use crate::version::{VersionSpec, VersionTag};

/// File written after a successful build; holds the environment fingerprint.
pub const READY_MARKER: &str = ".guidetest-ready";

/// A built dependency environment for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEnvironment {
    pub tag: VersionTag,
    /// The cargo project directory.
    pub dir: PathBuf,
    /// Where the compiled dependency artifacts live (`-L` for rustdoc/rustc).
    pub deps_dir: PathBuf,
    pub edition: Edition,
    /// True when this call had to build the environment.
    pub built: bool,
}

/// Idempotent build cache of version environments, keyed by version tag.
///
/// Check-then-build-then-persist runs under a per-tag mutex and an exclusive
/// lock file, so concurrent callers never build the same directory twice.
pub struct EnvironmentCache {
    root: PathBuf,
    lock_timeout: Duration,
    poll_interval: Duration,
    guards: Mutex<HashMap<VersionTag, Arc<Mutex<()>>>>,
}

impl EnvironmentCache {
    pub fn new(root: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        EnvironmentCache {
            root: root.into(),
            lock_timeout,
            poll_interval: Duration::from_millis(200),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn env_dir(&self, spec: &VersionSpec) -> PathBuf {
        self.root.join(spec.env_dir_name())
    }

    pub fn descriptor(&self, spec: &VersionSpec) -> PathBuf {
        self.env_dir(spec).join("Cargo.toml")
    }

    fn marker(&self, spec: &VersionSpec) -> PathBuf {
        self.env_dir(spec).join(READY_MARKER)
    }

    fn lock_path(&self, spec: &VersionSpec) -> PathBuf {
        self.root.join(format!("{}.lock", spec.env_dir_name()))
    }

    /// Whether the environment is built for exactly this spec.
    pub fn is_ready(&self, spec: &VersionSpec) -> bool {
        if !self.descriptor(spec).is_file() {
            return false;
        }
        match fs::read_to_string(self.marker(spec)) {
            Ok(recorded) => recorded.trim() == manifest::fingerprint(spec),
            Err(_) => false,
        }
    }

    fn environment(&self, spec: &VersionSpec, built: bool) -> VersionEnvironment {
        let dir = self.env_dir(spec);
        VersionEnvironment {
            tag: spec.tag.clone(),
            deps_dir: dir.join("target").join("debug").join("deps"),
            dir,
            edition: spec.edition,
            built,
        }
    }

    fn guard_for(&self, tag: &VersionTag) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        guards.entry(tag.clone()).or_default().clone()
    }

    /// Make sure the environment for `spec` exists, building it if needed.
    pub fn ensure(
        &self,
        spec: &VersionSpec,
        toolchain: &dyn Toolchain,
        tools: &ToolPaths,
    ) -> Result<VersionEnvironment, BootstrapError> {
        let guard = self.guard_for(&spec.tag);
        let _held = guard.lock().unwrap_or_else(PoisonError::into_inner);

        if self.is_ready(spec) {
            info!(version = %spec.tag, "environment ready, skipping bootstrap");
            return Ok(self.environment(spec, false));
        }

        // A nested `env_dir` puts the lock file below the root.
        let lock_path = self.lock_path(spec);
        let lock_dir = lock_path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&lock_dir).map_err(|source| BootstrapError::CreateDir {
            path: lock_dir,
            source,
        })?;
        let _lock = LockFile::acquire(lock_path, self.lock_timeout, self.poll_interval)?;

        // Another process may have finished the build while we waited.
        if self.is_ready(spec) {
            info!(version = %spec.tag, "environment built concurrently, skipping bootstrap");
            return Ok(self.environment(spec, false));
        }

        let dir = self.env_dir(spec);
        let descriptor = self.descriptor(spec);
        if descriptor.is_file() {
            warn!(version = %spec.tag, dir = %dir.display(), "environment is stale, rebuilding");
        } else {
            info!(version = %spec.tag, dir = %dir.display(), "initializing environment");
            let code = toolchain.run(&tools.cargo_init(&dir, &spec.package_name()))?;
            if code != 0 {
                return Err(BootstrapError::Init { code });
            }
        }

        manifest::write_dependencies(&descriptor, spec)?;

        info!(version = %spec.tag, "building dependencies");
        let code = toolchain.run(&tools.cargo_build(&descriptor))?;
        if code != 0 {
            return Err(BootstrapError::Build { code });
        }

        let marker = self.marker(spec);
        fs::write(&marker, manifest::fingerprint(spec))
            .map_err(|source| BootstrapError::Marker { path: marker, source })?;

        info!(version = %spec.tag, "environment ready");
        Ok(self.environment(spec, true))
    }
}

/// An exclusive lock held by creating a file; released on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf, timeout: Duration, poll: Duration) -> Result<Self, BootstrapError> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Owner pid, for whoever finds a stale lock.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(LockFile { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        return Err(BootstrapError::LockTimeout { path });
                    }
                    thread::sleep(poll);
                }
                Err(source) => return Err(BootstrapError::Lock { path, source }),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
