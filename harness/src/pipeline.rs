use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::bootstrap::EnvironmentCache;
use crate::config::{BackendKind, HarnessConfig, ListerKind};
use crate::corpus::{Corpus, FileLister, FilesystemLister, GitLister};
use crate::doctest::{DoctestBackend, ExtractBackend, RustdocBackend};
use crate::error::HarnessError;
use crate::report::{FileResult, Report};
use crate::toolchain::Toolchain;
use crate::version::VersionSpec;

/// Which guides a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every tracked guide of every version.
    All,
    /// Exactly this file, bypassing enumeration.
    File(PathBuf),
}

/// A guide scheduled for testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Path as shown to the user.
    pub display: PathBuf,
    /// Path handed to the test tool.
    pub location: PathBuf,
}

/// The files of one version, tested after its environment is bootstrapped.
#[derive(Debug, Clone)]
pub struct VersionPlan<'c> {
    pub spec: &'c VersionSpec,
    pub files: Vec<PlannedFile>,
}

/// Bootstrap, test, and report, one version at a time.
pub struct Pipeline<'a> {
    config: &'a HarnessConfig,
    root: PathBuf,
    toolchain: &'a dyn Toolchain,
    cache: EnvironmentCache,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        root: impl Into<PathBuf>,
        toolchain: &'a dyn Toolchain,
    ) -> Self {
        let root = root.into();
        let env_root = if config.env_root.is_absolute() {
            config.env_root.clone()
        } else {
            root.join(&config.env_root)
        };
        Pipeline {
            config,
            root,
            toolchain,
            cache: EnvironmentCache::new(env_root, config.lock_timeout()),
        }
    }

    fn lister(&self) -> Box<dyn FileLister> {
        match self.config.lister {
            ListerKind::Git => Box::new(GitLister::new(self.config.tools.clone())),
            ListerKind::Filesystem => Box::new(FilesystemLister),
        }
    }

    fn backend(&self) -> Box<dyn DoctestBackend> {
        match self.config.backend {
            BackendKind::Rustdoc => Box::new(RustdocBackend::new(self.config.tools.clone())),
            BackendKind::Extract => Box::new(ExtractBackend::new(
                self.config.tools.clone(),
                self.config.untagged,
            )),
        }
    }

    /// Enumerate every guide, grouped by version in configured order.
    pub fn discover(&self) -> Result<Corpus, HarnessError> {
        let files = self.lister().list(&self.root, self.toolchain)?;
        Ok(Corpus::discover(files, &self.config.versions))
    }

    /// Work out which files are tested against which version.
    pub fn plan(&self, selection: &Selection) -> Result<Vec<VersionPlan<'a>>, HarnessError> {
        match selection {
            Selection::All => {
                let config: &'a HarnessConfig = self.config;
                let corpus = self.discover()?;
                let plans = config
                    .versions
                    .iter()
                    .map(|spec| VersionPlan {
                        spec,
                        files: corpus
                            .files_for(&spec.tag)
                            .iter()
                            .map(|rel| PlannedFile {
                                display: rel.clone(),
                                location: self.root.join(rel),
                            })
                            .collect(),
                    })
                    .filter(|plan| !plan.files.is_empty())
                    .collect();
                Ok(plans)
            }
            Selection::File(path) => {
                let spec = self.version_for_single_file(path)?;
                Ok(vec![VersionPlan {
                    spec,
                    files: vec![PlannedFile {
                        display: path.clone(),
                        location: path.clone(),
                    }],
                }])
            }
        }
    }

    fn version_for_single_file(&self, path: &Path) -> Result<&'a VersionSpec, HarnessError> {
        let config: &'a HarnessConfig = self.config;
        if let Some(spec) = config.version_for_path(path) {
            return Ok(spec);
        }
        match config.version(&config.default_version) {
            Some(spec) => {
                warn!(
                    file = %path.display(),
                    version = %spec.tag,
                    "file matches no version directory, using the default version"
                );
                Ok(spec)
            }
            None => Err(HarnessError::UnknownVersion {
                path: path.to_path_buf(),
                default: config.default_version.to_string(),
            }),
        }
    }

    /// Run the pipeline. `out` receives one `Testing <path>` line per file,
    /// written before the file's tool output.
    ///
    /// A bootstrap failure aborts the run; a failing file does not.
    pub fn run(&self, selection: &Selection, out: &mut dyn Write) -> Result<Report, HarnessError> {
        let plans = self.plan(selection)?;
        let backend = self.backend();
        let mut report = Report::new();

        for plan in &plans {
            info!(version = %plan.spec.tag, files = plan.files.len(), "testing version");
            let env = self
                .cache
                .ensure(plan.spec, self.toolchain, &self.config.tools)
                .map_err(|source| HarnessError::Bootstrap {
                    version: plan.spec.tag.to_string(),
                    source,
                })?;

            for file in &plan.files {
                writeln!(out, "Testing {}", file.display.display())?;
                out.flush()?;

                let outcome = backend.test_file(&env, &file.location, self.toolchain);
                if outcome.exit_code == 0 {
                    info!(file = %file.display.display(), "passed");
                } else {
                    warn!(file = %file.display.display(), code = outcome.exit_code, "failed");
                }
                report.record(FileResult {
                    path: file.display.clone(),
                    version: plan.spec.tag.clone(),
                    exit_code: outcome.exit_code,
                    blocks: outcome.blocks,
                    error: outcome.error,
                });
            }
        }

        Ok(report)
    }
}
