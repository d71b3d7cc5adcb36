mod common;

use std::path::PathBuf;

use common::{FakeToolchain, write_tree};
use harness::config::ToolPaths;
use harness::corpus::{Corpus, FileLister, FilesystemLister, GitLister};
use harness::doctest::{BlockOutcome, BlockResult};
use harness::version::builtin_versions;
use harness::{FileResult, HarnessError, Report, VersionTag};

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[test]
fn corpus_groups_markdown_by_version() {
    let corpus = Corpus::discover(
        paths(&[
            "_stable/b.md",
            "_legacy/a.md",
            "_stable/a.md",
            "_stable/a.md",
            "_stable/notes.txt",
            "index.md",
        ]),
        &builtin_versions(),
    );

    assert_eq!(corpus.files_for(&VersionTag::new("legacy")), paths(&["_legacy/a.md"]));
    assert_eq!(
        corpus.files_for(&VersionTag::new("stable")),
        paths(&["_stable/a.md", "_stable/b.md"])
    );
    assert!(corpus.files_for(&VersionTag::new("nightly")).is_empty());
    assert_eq!(corpus.len(), 3);

    let order: Vec<&str> = corpus.iter().map(|(tag, _)| tag.as_str()).collect();
    assert_eq!(order, vec!["legacy", "stable"]);
}

#[test]
fn empty_corpus() {
    let corpus = Corpus::discover(paths(&["README.md"]), &builtin_versions());
    assert!(corpus.is_empty());
}

#[test]
fn git_lister_splits_nul_separated_output() {
    let toolchain = FakeToolchain::tracking(&["_stable/with space.md", "_legacy/a.md"]);
    let files = GitLister::new(ToolPaths::default())
        .list(std::path::Path::new("/site"), &toolchain)
        .unwrap();

    assert_eq!(files, paths(&["_stable/with space.md", "_legacy/a.md"]));
    assert_eq!(toolchain.call_lines(), vec!["git ls-files -z"]);
    assert_eq!(toolchain.calls.borrow()[0].cwd.as_deref(), Some(std::path::Path::new("/site")));
}

#[test]
fn filesystem_lister_skips_hidden_and_build_directories() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_tree(
        dir.path(),
        &[
            ("_stable/a.md", ""),
            ("_stable/nested/b.md", ""),
            (".git/_stable/c.md", ""),
            ("target/_stable/d.md", ""),
            ("README.md", ""),
        ],
    );

    let mut files = FilesystemLister
        .list(dir.path(), &FakeToolchain::default())
        .unwrap();
    files.sort();

    assert_eq!(files, paths(&["README.md", "_stable/a.md", "_stable/nested/b.md"]));
}

#[test]
fn filesystem_lister_reports_missing_root() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let err = FilesystemLister
        .list(&dir.path().join("missing"), &FakeToolchain::default())
        .unwrap_err();
    assert!(matches!(err, HarnessError::Enumerate(_)));
}

fn result(path: &str, exit_code: i32) -> FileResult {
    FileResult {
        path: PathBuf::from(path),
        version: VersionTag::new("stable"),
        exit_code,
        blocks: Vec::new(),
        error: None,
    }
}

#[test]
fn empty_report_succeeds() {
    let report = Report::new();
    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn report_keeps_the_first_failure_code() {
    let mut report = Report::new();
    report.record(result("a.md", 0));
    report.record(result("b.md", 2));
    report.record(result("c.md", 0));
    report.record(result("d.md", 101));

    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.passed(), 2);
    assert_eq!(report.failed(), 2);
    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().map(|r| r.path.clone()).collect();
    assert_eq!(failed, paths(&["b.md", "d.md"]));
}

#[test]
fn report_keeps_block_details() {
    let mut report = Report::new();
    let mut file = result("a.md", 1);
    file.blocks.push(BlockResult {
        index: 3,
        line: 12,
        mode: guide::attributes::RunMode::Run,
        outcome: BlockOutcome::Failed {
            code: 1,
            reason: "compilation failed with status 1".into(),
        },
    });
    report.record(file);

    assert_eq!(report.results()[0].blocks[0].line, 12);
}
