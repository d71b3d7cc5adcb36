pub mod bootstrap;
pub mod config;
pub mod corpus;
pub mod doctest;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod toolchain;
pub mod version;

pub use bootstrap::{EnvironmentCache, VersionEnvironment};
pub use config::HarnessConfig;
pub use error::{BootstrapError, HarnessError};
pub use pipeline::{Pipeline, Selection};
pub use report::{FileResult, Report};
pub use toolchain::{SystemToolchain, Toolchain};
pub use version::{VersionSpec, VersionTag};
