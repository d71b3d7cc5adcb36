use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How fenced blocks without an info string are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntaggedPolicy {
    /// Untagged blocks are prose (shell sessions, output) and never compiled.
    #[default]
    Skip,
    /// Untagged blocks are Rust, matching rustdoc's own convention.
    Rust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Edition {
    #[serde(rename = "2015")]
    E2015,
    #[serde(rename = "2018")]
    E2018,
    #[serde(rename = "2021")]
    E2021,
    #[serde(rename = "2024")]
    E2024,
}

impl Edition {
    pub fn as_str(self) -> &'static str {
        match self {
            Edition::E2015 => "2015",
            Edition::E2018 => "2018",
            Edition::E2021 => "2021",
            Edition::E2024 => "2024",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2015" => Ok(Edition::E2015),
            "2018" => Ok(Edition::E2018),
            "2021" => Ok(Edition::E2021),
            "2024" => Ok(Edition::E2024),
            other => Err(format!("unknown edition '{}'", other)),
        }
    }
}

/// The language a fenced block is written in, as far as doctesting cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Language {
    /// No info string at all (or an indented block).
    Untagged,
    Rust,
    /// Any other language; holds the first unrecognized token.
    Other(String),
}

/// Attributes parsed from a fence info string such as `rust,no_run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAttributes {
    pub language: Language,
    pub ignore: bool,
    pub no_run: bool,
    pub should_panic: bool,
    pub compile_fail: bool,
    pub test_harness: bool,
    pub edition: Option<Edition>,
    /// `editionXXXX` tokens naming an edition that does not exist.
    pub invalid_editions: Vec<String>,
}

impl BlockAttributes {
    pub fn untagged() -> Self {
        BlockAttributes {
            language: Language::Untagged,
            ignore: false,
            no_run: false,
            should_panic: false,
            compile_fail: false,
            test_harness: false,
            edition: None,
            invalid_editions: Vec::new(),
        }
    }

    /// Parse an info string using rustdoc's rules: tokens are separated by
    /// commas or whitespace, and a block is Rust if it carries any Rust tag
    /// or no foreign tag at all.
    pub fn parse(info: &str) -> Self {
        let mut attrs = BlockAttributes::untagged();
        let mut seen_rust = false;
        let mut first_other: Option<String> = None;
        let mut any_token = false;

        for token in info
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim_matches(|c| c == '{' || c == '}' || c == '.'))
            .filter(|t| !t.is_empty())
        {
            any_token = true;
            match token {
                "rust" => seen_rust = true,
                "ignore" => {
                    attrs.ignore = true;
                    seen_rust = true;
                }
                "no_run" => {
                    attrs.no_run = true;
                    seen_rust = true;
                }
                "should_panic" => {
                    attrs.should_panic = true;
                    seen_rust = true;
                }
                "compile_fail" => {
                    attrs.compile_fail = true;
                    seen_rust = true;
                }
                "test_harness" => {
                    attrs.test_harness = true;
                    seen_rust = true;
                }
                t if t.starts_with("ignore-") => seen_rust = true,
                t if t.starts_with("edition") => match t["edition".len()..].parse::<Edition>() {
                    Ok(edition) => {
                        attrs.edition = Some(edition);
                        seen_rust = true;
                    }
                    Err(_) => {
                        attrs.invalid_editions.push(t.to_string());
                        first_other.get_or_insert_with(|| t.to_string());
                    }
                },
                t if is_error_code(t) => seen_rust = true,
                t => {
                    first_other.get_or_insert_with(|| t.to_string());
                }
            }
        }

        attrs.language = match (any_token, seen_rust, first_other) {
            (false, _, _) => Language::Untagged,
            (true, true, _) | (true, false, None) => Language::Rust,
            (true, false, Some(other)) => Language::Other(other),
        };
        attrs
    }

    pub fn run_mode(&self, untagged: UntaggedPolicy) -> RunMode {
        match (&self.language, untagged) {
            (Language::Other(_), _) => return RunMode::Skipped,
            (Language::Untagged, UntaggedPolicy::Skip) => return RunMode::Skipped,
            _ => {}
        }
        if self.ignore {
            RunMode::Ignore
        } else if self.compile_fail {
            RunMode::CompileFail
        } else if self.no_run {
            RunMode::NoRun
        } else if self.should_panic {
            RunMode::ShouldPanic
        } else {
            RunMode::Run
        }
    }
}

/// rustdoc accepts error codes such as `E0277` alongside `compile_fail`.
fn is_error_code(token: &str) -> bool {
    token.len() == 5
        && token.starts_with('E')
        && token[1..].chars().all(|c| c.is_ascii_digit())
}

/// What the doctest pipeline does with a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Not Rust; never compiled.
    Skipped,
    /// Rust, but explicitly excluded with `ignore`.
    Ignore,
    /// Compilation must fail.
    CompileFail,
    /// Compiled, never executed.
    NoRun,
    /// Executed; the program must exit unsuccessfully.
    ShouldPanic,
    /// Compiled and executed; must exit successfully.
    Run,
}

impl RunMode {
    pub fn is_tested(self) -> bool {
        !matches!(self, RunMode::Skipped | RunMode::Ignore)
    }

    pub fn executes(self) -> bool {
        matches!(self, RunMode::Run | RunMode::ShouldPanic)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunMode::Skipped => "skipped",
            RunMode::Ignore => "ignore",
            RunMode::CompileFail => "compile_fail",
            RunMode::NoRun => "no_run",
            RunMode::ShouldPanic => "should_panic",
            RunMode::Run => "run",
        };
        f.write_str(label)
    }
}
