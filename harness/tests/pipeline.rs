mod common;

use std::path::{Path, PathBuf};

use common::{BROKEN_GUIDE, FakeToolchain, PASSING_GUIDE, write_tree};
use harness::config::{BackendKind, HarnessConfig};
use harness::doctest::BlockOutcome;
use harness::{HarnessError, Pipeline, Report, Selection};

const TRACKED: &[&str] = &[
    "README.md",
    "_legacy/guides/client.md",
    "_legacy/server.md",
    "_stable/client.md",
    "_stable/logo.png",
    "_posts/2024-01-01-release.md",
];

fn config_for(root: &Path) -> HarnessConfig {
    HarnessConfig {
        env_root: root.join("envs"),
        ..HarnessConfig::default()
    }
}

fn run(
    config: &HarnessConfig,
    root: &Path,
    toolchain: &FakeToolchain,
    selection: Selection,
) -> (Result<Report, HarnessError>, String) {
    let mut out = Vec::new();
    let result = Pipeline::new(config, root, toolchain).run(&selection, &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn every_tracked_guide_is_tested_exactly_once() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(TRACKED);

    let (result, out) = run(&config, dir.path(), &toolchain, Selection::All);
    let report = result.expect("pipeline failed");

    let tested: Vec<PathBuf> = report.results().iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        tested,
        vec![
            PathBuf::from("_legacy/guides/client.md"),
            PathBuf::from("_legacy/server.md"),
            PathBuf::from("_stable/client.md"),
        ]
    );
    assert_eq!(toolchain.rustdoc_files().len(), 3);
    assert_eq!(
        out,
        "Testing _legacy/guides/client.md\nTesting _legacy/server.md\nTesting _stable/client.md\n"
    );
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn rustdoc_is_invoked_with_edition_and_dependency_path() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(&["_legacy/server.md"]);

    run(&config, dir.path(), &toolchain, Selection::All).0.expect("pipeline failed");

    let calls = toolchain.calls_to("rustdoc");
    assert_eq!(calls.len(), 1);
    let deps = dir.path().join("envs/legacy/target/debug/deps");
    let expected: Vec<String> = vec![
        "--edition".into(),
        "2018".into(),
        "--test".into(),
        "-L".into(),
        deps.display().to_string(),
        dir.path().join("_legacy/server.md").display().to_string(),
    ];
    assert_eq!(calls[0].args_lossy(), expected);
}

#[test]
fn environments_are_built_before_their_guides_are_tested() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(TRACKED);

    run(&config, dir.path(), &toolchain, Selection::All).0.expect("pipeline failed");

    let sequence: Vec<String> = toolchain
        .call_lines()
        .into_iter()
        .filter(|line| !line.starts_with("git"))
        .map(|line| line.split(' ').take(2).collect::<Vec<_>>().join(" "))
        .collect();
    assert_eq!(
        sequence,
        vec![
            "cargo init",
            "cargo build",
            "rustdoc --edition",
            "rustdoc --edition",
            "cargo init",
            "cargo build",
            "rustdoc --edition",
        ]
    );
    assert!(dir.path().join("envs/legacy/Cargo.toml").is_file());
    assert!(dir.path().join("envs/stable/Cargo.toml").is_file());
}

#[test]
fn second_run_skips_bootstrap() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(TRACKED);

    run(&config, dir.path(), &toolchain, Selection::All).0.expect("first run failed");
    toolchain.clear();
    run(&config, dir.path(), &toolchain, Selection::All).0.expect("second run failed");

    assert!(toolchain.calls_to("cargo").is_empty());
    assert_eq!(toolchain.rustdoc_files().len(), 3);
}

#[test]
fn versions_without_guides_are_not_bootstrapped() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(&["_stable/client.md"]);

    run(&config, dir.path(), &toolchain, Selection::All).0.expect("pipeline failed");

    assert!(!dir.path().join("envs/legacy").exists());
    assert_eq!(toolchain.calls_to("cargo").len(), 2);
}

#[test]
fn single_file_bypasses_enumeration() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(TRACKED);
    let file = dir.path().join("_legacy/server.md");

    let (result, out) = run(&config, dir.path(), &toolchain, Selection::File(file.clone()));
    let report = result.expect("pipeline failed");

    assert_eq!(report.results().len(), 1);
    assert_eq!(report.results()[0].version.as_str(), "legacy");
    assert_eq!(toolchain.rustdoc_files(), vec![file.clone()]);
    assert!(toolchain.calls_to("git").is_empty());
    assert!(!dir.path().join("envs/stable").exists());
    assert_eq!(out, format!("Testing {}\n", file.display()));
}

#[test]
fn single_file_outside_version_directories_uses_default_version() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::default();

    let report = run(
        &config,
        dir.path(),
        &toolchain,
        Selection::File(PathBuf::from("scratch/try.md")),
    )
    .0
    .expect("pipeline failed");

    assert_eq!(report.results()[0].version.as_str(), "stable");
}

#[test]
fn single_file_without_default_version_is_an_error() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut config = config_for(dir.path());
    config.default_version = harness::VersionTag::new("nightly");
    let toolchain = FakeToolchain::default();

    let err = run(
        &config,
        dir.path(),
        &toolchain,
        Selection::File(PathBuf::from("scratch/try.md")),
    )
    .0
    .expect_err("expected an error");

    assert!(matches!(err, HarnessError::UnknownVersion { .. }));
    assert!(toolchain.calls.borrow().is_empty());
}

#[test]
fn one_failing_file_fails_the_run_but_every_file_is_tested() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(&["_stable/broken.md", "_stable/ok.md"])
        .failing("broken.md", 101);

    let (result, out) = run(&config, dir.path(), &toolchain, Selection::All);
    let report = result.expect("pipeline failed");

    assert!(out.contains("Testing _stable/broken.md\n"));
    assert!(out.contains("Testing _stable/ok.md\n"));
    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.exit_code(), 101);
    let failures: Vec<&Path> = report.failures().map(|r| r.path.as_path()).collect();
    assert_eq!(failures, vec![Path::new("_stable/broken.md")]);
}

#[test]
fn first_failure_wins() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain::tracking(&["_legacy/a.md", "_legacy/b.md", "_stable/c.md"])
        .failing("b.md", 101)
        .failing("c.md", 1);

    let report = run(&config, dir.path(), &toolchain, Selection::All)
        .0
        .expect("pipeline failed");

    assert_eq!(report.failed(), 2);
    assert_eq!(report.exit_code(), 101);
}

#[test]
fn bootstrap_failure_aborts_the_run() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let toolchain = FakeToolchain {
        build_code: 101,
        ..FakeToolchain::tracking(TRACKED)
    };

    let (result, out) = run(&config, dir.path(), &toolchain, Selection::All);
    let err = result.expect_err("expected bootstrap failure");

    assert!(matches!(err, HarnessError::Bootstrap { ref version, .. } if version == "legacy"));
    assert_eq!(err.exit_code(), 101);
    assert!(toolchain.rustdoc_files().is_empty());
    assert!(out.is_empty());
    assert!(!dir.path().join("envs/legacy/.guidetest-ready").exists());
}

#[test]
fn failed_bootstrap_is_retried_on_the_next_run() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_for(dir.path());
    let failing = FakeToolchain {
        build_code: 1,
        ..FakeToolchain::tracking(&["_legacy/a.md"])
    };
    run(&config, dir.path(), &failing, Selection::All).0.expect_err("expected failure");

    let toolchain = FakeToolchain::tracking(&["_legacy/a.md"]);
    run(&config, dir.path(), &toolchain, Selection::All).0.expect("pipeline failed");

    // The project already exists, so only the build is repeated.
    let cargo: Vec<String> = toolchain
        .call_lines()
        .into_iter()
        .filter(|l| l.starts_with("cargo"))
        .collect();
    assert_eq!(cargo.len(), 1);
    assert!(cargo[0].starts_with("cargo build"));
}

#[test]
fn extract_backend_reports_each_block() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_tree(
        dir.path(),
        &[
            ("_stable/ok.md", PASSING_GUIDE),
            ("_stable/broken.md", BROKEN_GUIDE),
            (
                "_stable/mixed.md",
                "```rust\n# fn main() {\n#     let _ = 1;\n# }\n```\n\n```rust,no_run\nloop {}\n```\n\n```rust,should_panic\npanic!(\"expected\");\n```\n\n```rust,ignore\nnot rust at all\n```\n\n```toml\n[package]\n```\n",
            ),
        ],
    );
    let config = HarnessConfig {
        backend: BackendKind::Extract,
        ..config_for(dir.path())
    };
    let toolchain =
        FakeToolchain::tracking(&["_stable/broken.md", "_stable/mixed.md", "_stable/ok.md"]);

    let report = run(&config, dir.path(), &toolchain, Selection::All)
        .0
        .expect("pipeline failed");

    let broken = &report.results()[0];
    assert_eq!(broken.exit_code, 1);
    assert!(matches!(broken.blocks[0].outcome, BlockOutcome::Failed { code: 1, .. }));

    let mixed = &report.results()[1];
    assert_eq!(mixed.exit_code, 0, "{:?}", mixed.blocks);
    assert_eq!(mixed.blocks.len(), 3);
    assert!(mixed.blocks.iter().all(|b| b.outcome == BlockOutcome::Passed));

    assert!(report.results()[2].passed());
    assert_eq!(report.exit_code(), 1);

    // broken: 1 compile; mixed: 3 compiles + 2 runs; ok: 1 compile + 1 run.
    assert_eq!(toolchain.calls_to("rustc").len(), 5);
    assert!(toolchain.rustdoc_files().is_empty());
}

#[test]
fn extract_backend_marks_unreadable_files_as_failed() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = HarnessConfig {
        backend: BackendKind::Extract,
        ..config_for(dir.path())
    };
    let toolchain = FakeToolchain::tracking(&["_stable/missing.md", "_stable/ok.md"]);
    write_tree(dir.path(), &[("_stable/ok.md", PASSING_GUIDE)]);

    let report = run(&config, dir.path(), &toolchain, Selection::All)
        .0
        .expect("pipeline failed");

    assert_eq!(report.results().len(), 2);
    assert_eq!(report.results()[0].exit_code, 1);
    assert!(report.results()[0].error.as_deref().unwrap().starts_with("cannot read"));
    assert!(report.results()[1].passed());
}

#[test]
fn missing_test_tool_is_recorded_not_fatal() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut config = config_for(dir.path());
    config.tools.rustdoc = PathBuf::from("/nonexistent/rustdoc-missing");
    let toolchain = FakeToolchain::tracking(&["_stable/a.md", "_stable/b.md"]);

    let report = run(&config, dir.path(), &toolchain, Selection::All)
        .0
        .expect("pipeline failed");

    assert_eq!(report.results().len(), 2);
    assert!(report.results().iter().all(|r| r.exit_code == 127));
    assert_eq!(report.exit_code(), 127);
}
