use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A tool could not be started at all (as opposed to exiting unsuccessfully).
#[derive(Debug, Error)]
#[error("failed to spawn `{program}`: {source}")]
pub struct ToolError {
    pub program: String,
    #[source]
    pub source: io::Error,
}

/// Failures while materializing a version environment. All are fatal.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("cannot create environment directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Spawn(#[from] ToolError),

    #[error("`cargo init` exited with status {code}")]
    Init { code: i32 },

    #[error("cannot write dependency manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("dependency build exited with status {code}")]
    Build { code: i32 },

    #[error("cannot acquire build lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for build lock {path}; remove it if no other build is running")]
    LockTimeout { path: PathBuf },

    #[error("cannot persist ready marker {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Pipeline-level errors. Per-file test failures are not errors; they are
/// recorded in the report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("bootstrapping the '{version}' environment failed: {source}")]
    Bootstrap {
        version: String,
        #[source]
        source: BootstrapError,
    },

    #[error("cannot enumerate guides: {0}")]
    Enumerate(String),

    #[error("no version matches {path} and no default version '{default}' is configured")]
    UnknownVersion { path: PathBuf, default: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HarnessError {
    /// Process exit code for this error. Failed builds keep the tool's own status.
    pub fn exit_code(&self) -> i32 {
        match self {
            HarnessError::Bootstrap {
                source: BootstrapError::Build { code } | BootstrapError::Init { code },
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
