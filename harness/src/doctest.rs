use std::path::Path;

use guide::attributes::{RunMode, UntaggedPolicy};
use guide::code_block::CodeBlock;
use guide::synthesize::synthesize;
use tracing::{debug, error};

use crate::bootstrap::VersionEnvironment;
use crate::config::ToolPaths;
use crate::toolchain::{Invocation, SPAWN_FAILURE_CODE, Toolchain};

/// Outcome of one code block (extract backend only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    pub index: usize,
    /// 1-based line of the opening fence.
    pub line: usize,
    pub mode: RunMode,
    pub outcome: BlockOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Passed,
    Failed { code: i32, reason: String },
}

/// What a backend reports for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileOutcome {
    pub exit_code: i32,
    pub blocks: Vec<BlockResult>,
    pub error: Option<String>,
}

impl FileOutcome {
    fn broken(reason: String) -> Self {
        FileOutcome {
            exit_code: 1,
            blocks: Vec::new(),
            error: Some(reason),
        }
    }
}

/// Doctests one guide file against a built environment.
pub trait DoctestBackend {
    fn test_file(
        &self,
        env: &VersionEnvironment,
        path: &Path,
        toolchain: &dyn Toolchain,
    ) -> FileOutcome;
}

fn run_tool(toolchain: &dyn Toolchain, invocation: &Invocation) -> Result<i32, String> {
    toolchain.run(invocation).map_err(|e| {
        error!(command = %invocation, error = %e, "cannot start test tool");
        e.to_string()
    })
}

// ---------------------------------------------------------------------------
// rustdoc
// ---------------------------------------------------------------------------

/// Hands the whole file to `rustdoc --test`, which extracts, compiles and
/// runs every block itself.
pub struct RustdocBackend {
    tools: ToolPaths,
}

impl RustdocBackend {
    pub fn new(tools: ToolPaths) -> Self {
        RustdocBackend { tools }
    }
}

impl DoctestBackend for RustdocBackend {
    fn test_file(
        &self,
        env: &VersionEnvironment,
        path: &Path,
        toolchain: &dyn Toolchain,
    ) -> FileOutcome {
        let invocation = self.tools.rustdoc_test(env.edition, &env.deps_dir, path);
        match run_tool(toolchain, &invocation) {
            Ok(code) => FileOutcome {
                exit_code: code,
                ..FileOutcome::default()
            },
            Err(reason) => FileOutcome {
                exit_code: SPAWN_FAILURE_CODE,
                blocks: Vec::new(),
                error: Some(reason),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

/// Parses the guide itself and compiles one program per block with `rustc`,
/// so results are reported per block.
pub struct ExtractBackend {
    tools: ToolPaths,
    untagged: UntaggedPolicy,
}

impl ExtractBackend {
    pub fn new(tools: ToolPaths, untagged: UntaggedPolicy) -> Self {
        ExtractBackend { tools, untagged }
    }

    fn test_block(
        &self,
        env: &VersionEnvironment,
        block: &CodeBlock,
        workdir: &Path,
        toolchain: &dyn Toolchain,
    ) -> BlockResult {
        let mode = block.run_mode(self.untagged);
        let result = |outcome| BlockResult {
            index: block.index,
            line: block.line,
            mode,
            outcome,
        };

        let program = synthesize(block);
        let crate_name = format!("snippet_{}", block.index);
        let source_path = workdir.join(format!("{}.rs", crate_name));
        let binary_path = workdir.join(&crate_name);
        if let Err(e) = std::fs::write(&source_path, &program.source) {
            return result(BlockOutcome::Failed {
                code: 1,
                reason: format!("cannot write {}: {}", source_path.display(), e),
            });
        }

        let edition = block.edition().unwrap_or(env.edition);
        let compile = self.tools.rustc_compile(
            edition,
            &env.deps_dir,
            &crate_name,
            program.test_harness,
            &source_path,
            &binary_path,
        );
        let compiled = match run_tool(toolchain, &compile) {
            Ok(code) => code,
            Err(reason) => {
                return result(BlockOutcome::Failed {
                    code: SPAWN_FAILURE_CODE,
                    reason,
                });
            }
        };
        debug!(block = block.index, line = block.line, %mode, compiled, "compiled snippet");

        let outcome = match (mode, compiled) {
            (RunMode::CompileFail, 0) => BlockOutcome::Failed {
                code: 1,
                reason: "compiled successfully but was marked compile_fail".into(),
            },
            (RunMode::CompileFail, _) => BlockOutcome::Passed,
            (_, code) if code != 0 => BlockOutcome::Failed {
                code,
                reason: format!("compilation failed with status {}", code),
            },
            (mode, _) if !mode.executes() => BlockOutcome::Passed,
            (mode, _) => match run_tool(toolchain, &Invocation::new(&binary_path)) {
                Err(reason) => BlockOutcome::Failed {
                    code: SPAWN_FAILURE_CODE,
                    reason,
                },
                Ok(0) if mode == RunMode::ShouldPanic => BlockOutcome::Failed {
                    code: 1,
                    reason: "ran successfully but was marked should_panic".into(),
                },
                Ok(0) => BlockOutcome::Passed,
                Ok(_) if mode == RunMode::ShouldPanic => BlockOutcome::Passed,
                Ok(code) => BlockOutcome::Failed {
                    code,
                    reason: format!("exited with status {}", code),
                },
            },
        };
        result(outcome)
    }
}

impl DoctestBackend for ExtractBackend {
    fn test_file(
        &self,
        env: &VersionEnvironment,
        path: &Path,
        toolchain: &dyn Toolchain,
    ) -> FileOutcome {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                return FileOutcome::broken(format!("cannot read {}: {}", path.display(), e));
            }
        };
        let guide = match guide::parser::Parser::new(source, 0).with_path(path).parse() {
            Ok(guide) => guide,
            Err(errors) => {
                let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
                return FileOutcome::broken(format!("parse error: {}", messages.join("; ")));
            }
        };
        let workdir = match tempfile::Builder::new().prefix("guidetest-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return FileOutcome::broken(format!("cannot create scratch directory: {}", e));
            }
        };

        let blocks: Vec<BlockResult> = guide
            .tested_blocks(self.untagged)
            .map(|block| self.test_block(env, block, workdir.path(), toolchain))
            .collect();

        let exit_code = blocks
            .iter()
            .find_map(|b| match b.outcome {
                BlockOutcome::Failed { code, .. } => Some(if code == 0 { 1 } else { code }),
                BlockOutcome::Passed => None,
            })
            .unwrap_or(0);

        FileOutcome {
            exit_code,
            blocks,
            error: None,
        }
    }
}
