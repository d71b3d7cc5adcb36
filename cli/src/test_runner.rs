use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use harness::doctest::BlockOutcome;
use harness::{FileResult, Pipeline, Report, Selection, SystemToolchain};

use crate::Session;

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

/// Run the pipeline over every tracked guide (or just `file`) and print a
/// summary to stderr. Returns the process exit code.
pub fn run_tests(session: &Session, file: Option<PathBuf>) -> Result<i32> {
    let selection = match file {
        Some(path) => Selection::File(path),
        None => Selection::All,
    };

    let toolchain = SystemToolchain;
    let pipeline = Pipeline::new(&session.config, &session.root, &toolchain);
    let mut stdout = std::io::stdout();
    let report = pipeline.run(&selection, &mut stdout)?;
    stdout.flush()?;

    if report.results().is_empty() {
        eprintln!("no guides found under {}", session.root.display());
        return Ok(0);
    }

    print_summary(&report, session.no_color);
    Ok(report.exit_code())
}

fn print_summary(report: &Report, no_color: bool) {
    let mut current_version = None;
    for result in report.results() {
        if current_version != Some(&result.version) {
            eprintln!();
            eprintln!("{}", bold(result.version.as_str(), no_color));
            current_version = Some(&result.version);
        }
        let label = if result.passed() {
            pass_label(no_color)
        } else {
            fail_label(no_color)
        };
        eprintln!("  {}  {}", label, result.path.display());
    }

    let failures: Vec<&FileResult> = report.failures().collect();
    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            print_failure(failure);
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            if no_color { "ok" } else { "\x1b[32mok\x1b[0m" },
            report.passed()
        );
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" },
            report.passed(),
            report.failed(),
            report.results().len()
        );
    }
}

fn print_failure(result: &FileResult) {
    if let Some(error) = &result.error {
        eprintln!("  {}", error);
    }
    let mut detailed = false;
    for block in &result.blocks {
        if let BlockOutcome::Failed { reason, .. } = &block.outcome {
            eprintln!("  line {} ({}): {}", block.line, block.mode, reason);
            detailed = true;
        }
    }
    if !detailed && result.error.is_none() {
        eprintln!("  exited with status {}", result.exit_code);
    }
}

/// Print every guide of every version with its title and tested block count.
pub fn list_guides(session: &Session) -> Result<i32> {
    let toolchain = SystemToolchain;
    let pipeline = Pipeline::new(&session.config, &session.root, &toolchain);
    let corpus = pipeline.discover()?;

    if corpus.is_empty() {
        eprintln!("no guides found under {}", session.root.display());
        return Ok(0);
    }

    for (tag, files) in corpus.iter() {
        if files.is_empty() {
            continue;
        }
        println!("{} ({} guides)", bold(tag.as_str(), session.no_color), files.len());
        for file in files {
            let path = session.root.join(file);
            let summary = match std::fs::read_to_string(&path) {
                Err(e) => format!("unreadable: {}", e),
                Ok(source) => match guide::parser::Parser::new(source, 0).with_path(&path).parse() {
                    Err(errors) => format!("{} parse error(s)", errors.len()),
                    Ok(guide) => {
                        let tested = guide.tested_blocks(session.config.untagged).count();
                        match guide.title() {
                            Some(title) => format!("{} tested blocks, \"{}\"", tested, title),
                            None => format!("{} tested blocks", tested),
                        }
                    }
                },
            };
            println!("  {}  {}", file.display(), summary);
        }
    }
    Ok(0)
}
