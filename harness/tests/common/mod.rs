#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use harness::error::ToolError;
use harness::toolchain::{CapturedOutput, Invocation, Toolchain};

/// Records every invocation and imitates cargo, rustdoc, rustc and git.
///
/// - `cargo init` creates a minimal project; `cargo build` returns `build_code`.
/// - `rustdoc` returns the code registered for the file name (default 0).
/// - `rustc` fails on sources containing `compile_error!`, otherwise copies
///   the source to the output path; running that "binary" fails with 101 if
///   the source contains `panic!`.
/// - `git ls-files` prints `tracked`.
#[derive(Default)]
pub struct FakeToolchain {
    pub calls: RefCell<Vec<Invocation>>,
    pub tracked: Vec<String>,
    pub rustdoc_codes: HashMap<String, i32>,
    pub init_code: i32,
    pub build_code: i32,
}

impl FakeToolchain {
    pub fn tracking(files: &[&str]) -> Self {
        FakeToolchain {
            tracked: files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing(mut self, file_name: &str, code: i32) -> Self {
        self.rustdoc_codes.insert(file_name.to_string(), code);
        self
    }

    /// Every call as `program arg arg ...`, program reduced to its file name.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|inv| {
                let mut parts = vec![inv.program_name()];
                parts.extend(inv.args_lossy());
                parts.join(" ")
            })
            .collect()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|inv| inv.program_name() == program)
            .cloned()
            .collect()
    }

    /// Files handed to rustdoc, in order.
    pub fn rustdoc_files(&self) -> Vec<PathBuf> {
        self.calls_to("rustdoc")
            .iter()
            .filter_map(|inv| inv.args.last().map(PathBuf::from))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

fn last_arg(invocation: &Invocation) -> PathBuf {
    invocation.args.last().map(PathBuf::from).unwrap_or_default()
}

fn arg_after(invocation: &Invocation, flag: &str) -> Option<PathBuf> {
    let position = invocation.args.iter().position(|a| a == flag)?;
    invocation.args.get(position + 1).map(PathBuf::from)
}

impl Toolchain for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> Result<i32, ToolError> {
        self.calls.borrow_mut().push(invocation.clone());
        let name = invocation.program_name();
        let first = invocation.args.first().map(|a| a.to_string_lossy().into_owned());

        match (name.as_str(), first.as_deref()) {
            ("cargo", Some("init")) => {
                if self.init_code == 0 {
                    let dir = last_arg(invocation);
                    fs::create_dir_all(dir.join("src")).expect("create project dir");
                    fs::write(
                        dir.join("Cargo.toml"),
                        "[package]\nname = \"fake\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n",
                    )
                    .expect("write Cargo.toml");
                }
                Ok(self.init_code)
            }
            ("cargo", Some("build")) => Ok(self.build_code),
            ("rustdoc", _) => {
                let file = last_arg(invocation);
                let file_name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(*self.rustdoc_codes.get(&file_name).unwrap_or(&0))
            }
            ("rustc", _) => {
                let source = fs::read_to_string(last_arg(invocation)).expect("read snippet source");
                if source.contains("compile_error!") {
                    return Ok(1);
                }
                let output = arg_after(invocation, "-o").expect("rustc -o");
                fs::write(output, source).expect("write fake binary");
                Ok(0)
            }
            (program, _) if program.starts_with("snippet_") => {
                let source = fs::read_to_string(&invocation.program).expect("read fake binary");
                Ok(if source.contains("panic!") { 101 } else { 0 })
            }
            (program, _) => Err(ToolError {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            }),
        }
    }

    fn output(&self, invocation: &Invocation) -> Result<CapturedOutput, ToolError> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(CapturedOutput {
            code: 0,
            stdout: self.tracked.join("\0").into_bytes(),
        })
    }
}

/// Create `files` (relative paths with contents) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(full, contents).expect("write file");
    }
}

pub const PASSING_GUIDE: &str = "---\ntitle: Passing\n---\n```rust\nassert_eq!(1 + 1, 2);\n```\n";

pub const BROKEN_GUIDE: &str = "---\ntitle: Broken\n---\n```rust\ncompile_error!(\"nope\");\n```\n";
