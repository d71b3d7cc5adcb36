use std::path::PathBuf;

use crate::doctest::BlockResult;
use crate::version::VersionTag;

/// Outcome of testing one guide file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub version: VersionTag,
    pub exit_code: i32,
    /// Per-block outcomes, when the backend reports them.
    pub blocks: Vec<BlockResult>,
    /// Why the file could not be tested at all, if that is what happened.
    pub error: Option<String>,
}

impl FileResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Every (file, result) pair of one pipeline run, in test order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    results: Vec<FileResult>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: FileResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[FileResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// First-failure-wins: the exit code of the earliest failed file, or 0.
    pub fn exit_code(&self) -> i32 {
        self.results
            .iter()
            .fold(0, |acc, r| if acc == 0 { r.exit_code } else { acc })
    }
}
