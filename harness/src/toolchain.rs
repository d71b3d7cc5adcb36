use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use guide::attributes::Edition;
use tracing::debug;

use crate::config::ToolPaths;
use crate::error::ToolError;

/// A command line to run, independent of how it is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The program's file name, e.g. `cargo` for `/usr/bin/cargo`.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured result of a command whose stdout the harness needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
}

/// The seam between the harness and external tools.
pub trait Toolchain {
    /// Run with inherited stdio and return the exit code.
    fn run(&self, invocation: &Invocation) -> Result<i32, ToolError>;

    /// Run with stdout captured (stderr inherited).
    fn output(&self, invocation: &Invocation) -> Result<CapturedOutput, ToolError>;
}

/// Runs tools as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolchain;

impl SystemToolchain {
    fn command(invocation: &Invocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        command
    }

    fn spawn_error(invocation: &Invocation, source: std::io::Error) -> ToolError {
        ToolError {
            program: invocation.program.display().to_string(),
            source,
        }
    }
}

impl Toolchain for SystemToolchain {
    fn run(&self, invocation: &Invocation) -> Result<i32, ToolError> {
        debug!(command = %invocation, "running");
        let status = Self::command(invocation)
            .status()
            .map_err(|e| Self::spawn_error(invocation, e))?;
        Ok(exit_code(status))
    }

    fn output(&self, invocation: &Invocation) -> Result<CapturedOutput, ToolError> {
        debug!(command = %invocation, "running (captured)");
        let output = Self::command(invocation)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| Self::spawn_error(invocation, e))?;
        Ok(CapturedOutput {
            code: exit_code(output.status),
            stdout: output.stdout,
        })
    }
}

/// Exit code of a finished process. Signal deaths map to `128 + signal` like a shell.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Exit code recorded for a file whose test tool could not be started.
pub const SPAWN_FAILURE_CODE: i32 = 127;

// ---------------------------------------------------------------------------
// Command lines
// ---------------------------------------------------------------------------

impl ToolPaths {
    pub fn cargo_init(&self, dir: &Path, package: &str) -> Invocation {
        Invocation::new(&self.cargo)
            .arg("init")
            .arg("--quiet")
            .arg("--vcs")
            .arg("none")
            .arg("--name")
            .arg(package)
            .arg(dir)
    }

    pub fn cargo_build(&self, manifest: &Path) -> Invocation {
        Invocation::new(&self.cargo)
            .arg("build")
            .arg("--manifest-path")
            .arg(manifest)
    }

    pub fn rustdoc_test(&self, edition: Edition, deps_dir: &Path, file: &Path) -> Invocation {
        Invocation::new(&self.rustdoc)
            .arg("--edition")
            .arg(edition.as_str())
            .arg("--test")
            .arg("-L")
            .arg(deps_dir)
            .arg(file)
    }

    pub fn rustc_compile(
        &self,
        edition: Edition,
        deps_dir: &Path,
        crate_name: &str,
        test_harness: bool,
        source: &Path,
        output: &Path,
    ) -> Invocation {
        let mut invocation = Invocation::new(&self.rustc)
            .arg("--edition")
            .arg(edition.as_str())
            .arg("--crate-name")
            .arg(crate_name)
            .arg("-L")
            .arg(deps_dir);
        invocation = if test_harness {
            invocation.arg("--test")
        } else {
            invocation.arg("--crate-type").arg("bin")
        };
        invocation.arg("-o").arg(output).arg(source)
    }

    pub fn git_ls_files(&self, root: &Path) -> Invocation {
        Invocation::new(&self.git)
            .arg("ls-files")
            .arg("-z")
            .current_dir(root)
    }
}
