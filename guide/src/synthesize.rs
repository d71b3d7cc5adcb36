//! Turn a code block into a standalone program the way rustdoc does.

use crate::code_block::CodeBlock;

/// A compilable program built from one code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctestProgram {
    pub source: String,
    /// Whether the body was wrapped in a generated `fn main`.
    pub wrapped: bool,
    /// Whether the block asked to be compiled as a test harness (`--test`).
    pub test_harness: bool,
}

/// Build a program from the block's compiled lines (hidden lines included).
///
/// Leading crate attributes and `extern crate` items are hoisted to the top
/// of the crate; the rest is wrapped in `fn main` unless the block declares
/// its own. A block ending in `Ok::<(), E>(())` gets a fallible main.
pub fn synthesize(block: &CodeBlock) -> DoctestProgram {
    let compiled = block.compiled();
    let mut prelude: Vec<&str> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    let mut in_prelude = true;
    for line in compiled.lines() {
        let trimmed = line.trim();
        if in_prelude
            && (trimmed.starts_with("#![")
                || trimmed.starts_with("extern crate ")
                || (trimmed.is_empty() && !prelude.is_empty()))
        {
            prelude.push(line);
            continue;
        }
        if in_prelude && trimmed.is_empty() {
            continue;
        }
        in_prelude = false;
        body.push(line);
    }

    let test_harness = block.attributes.test_harness;
    let body_text = body.join("\n");
    let wrapped = !test_harness && !declares_main(&body_text);

    let mut source = String::from("#![allow(unused)]\n");
    for line in &prelude {
        source.push_str(line);
        source.push('\n');
    }

    if !wrapped {
        source.push_str(&body_text);
        source.push('\n');
    } else if returns_result(&body) {
        source.push_str("fn main() {\n");
        source.push_str("fn _inner() -> ::core::result::Result<(), impl ::core::fmt::Debug> {\n");
        source.push_str(&body_text);
        source.push_str("\n}\n");
        source.push_str("_inner().unwrap()\n");
        source.push_str("}\n");
    } else {
        source.push_str("fn main() {\n");
        source.push_str(&body_text);
        source.push_str("\n}\n");
    }

    DoctestProgram {
        source,
        wrapped,
        test_harness,
    }
}

/// Whether the code declares `fn main` itself (including `async fn main`).
fn declares_main(code: &str) -> bool {
    let mut rest = code;
    while let Some(pos) = rest.find("fn main") {
        let before = rest[..pos].chars().next_back();
        let after = rest[pos + "fn main".len()..].trim_start().chars().next();
        let starts_token = before.is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if starts_token && matches!(after, Some('(') | Some('<')) {
            return true;
        }
        rest = &rest[pos + "fn main".len()..];
    }
    false
}

fn returns_result(body: &[&str]) -> bool {
    body.iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .is_some_and(|last| last.starts_with("Ok::<") && last.ends_with("(())"))
}
