mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use guide::Guide;
use guide::synthesize::synthesize;
use harness::{HarnessConfig, HarnessError};

const SUBCOMMANDS: &[&str] = &["test", "list", "render", "extract", "help"];

/// Global options that consume the following argument.
const VALUE_OPTIONS: &[&str] = &["--config", "--root"];

const CONFIG_FILE: &str = "guidetest.toml";

#[derive(Parser)]
#[command(name = "guidetest", version, about = "Doctest the code snippets of versioned guides")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (default: guidetest.toml in the root, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository root holding the guides
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap environments and doctest guides (all tracked guides by default)
    Test(TestArgs),

    /// List the guides of every version with their tested block counts
    List,

    /// Print a guide as readers see it, hidden lines removed
    Render(FileArgs),

    /// Print the programs synthesized from a guide's code blocks
    Extract(ExtractArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Test(_) => "test",
            Command::List => "list",
            Command::Render(_) => "render",
            Command::Extract(_) => "extract",
        }
    }
}

#[derive(clap::Args, Default)]
struct TestArgs {
    /// Test only this guide, bypassing enumeration
    file: Option<PathBuf>,
}

#[derive(clap::Args)]
struct FileArgs {
    /// Markdown guide
    file: PathBuf,
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Markdown guide
    file: PathBuf,

    /// Only the block with this index (0-based, in document order)
    #[arg(short, long)]
    block: Option<usize>,
}

/// Settings shared by every subcommand.
struct Session {
    config: HarnessConfig,
    root: PathBuf,
    no_color: bool,
}

fn main() {
    // `guidetest file.md` works like `guidetest test file.md`.
    let args = inject_default_subcommand(std::env::args().collect());
    let cli = Cli::parse_from(&args);
    init_logging(cli.no_color);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            err.downcast_ref::<HarnessError>()
                .map(HarnessError::exit_code)
                .unwrap_or(1)
        }
    };
    process::exit(code);
}

/// Insert `test` before the first positional argument unless it already
/// names a subcommand.
fn inject_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_OPTIONS.contains(&arg) {
            i += 2;
            continue;
        }
        if arg.starts_with('-') {
            i += 1;
            continue;
        }
        if !SUBCOMMANDS.contains(&arg) {
            args.insert(i, "test".to_string());
        }
        break;
    }
    args
}

fn init_logging(no_color: bool) {
    let filter =
        EnvFilter::try_from_env("GUIDETEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref(), &cli.root)?;
    let ctx = Session {
        config,
        root: cli.root,
        no_color: cli.no_color,
    };

    let command = cli.command.unwrap_or(Command::Test(TestArgs::default()));
    debug!(command = command.name(), root = %ctx.root.display(), "dispatching");
    match command {
        Command::Test(args) => test_runner::run_tests(&ctx, args.file),
        Command::List => test_runner::list_guides(&ctx),
        Command::Render(args) => {
            let Some(guide) = parse_guide(&args.file, ctx.no_color)? else {
                return Ok(1);
            };
            print!("{}", guide::render::render_markdown(&guide, ctx.config.untagged));
            Ok(0)
        }
        Command::Extract(args) => do_extract(&ctx, args),
    }
}

fn load_config(explicit: Option<&Path>, root: &Path) -> Result<HarnessConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = root.join(CONFIG_FILE);
            if !default.is_file() {
                info!(
                    config_path = %default.display(),
                    "no configuration file found, using built-in versions"
                );
                return Ok(HarnessConfig::default());
            }
            default
        }
    };
    HarnessConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Read and parse a guide, printing diagnostics to stderr. Returns `None`
/// when the guide has errors.
fn parse_guide(path: &Path, no_color: bool) -> Result<Option<Guide>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;

    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source.clone());

    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();

    let parser = guide::parser::Parser::new(source, file_id).with_path(path);
    match parser.parse() {
        Ok(guide) => {
            debug!(
                file = %path.display(),
                blocks = guide.code_blocks().count(),
                warnings = guide.warnings.len(),
                "parsed guide"
            );
            for warning in &guide.warnings {
                let diagnostic = warning.to_diagnostic();
                let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            }
            Ok(Some(guide))
        }
        Err(errors) => {
            for error in &errors {
                let diagnostic = error.to_diagnostic();
                let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            }
            Ok(None)
        }
    }
}

fn do_extract(ctx: &Session, args: ExtractArgs) -> Result<i32> {
    let Some(guide) = parse_guide(&args.file, ctx.no_color)? else {
        return Ok(1);
    };

    let blocks: Vec<_> = guide
        .tested_blocks(ctx.config.untagged)
        .filter(|block| args.block.is_none_or(|wanted| block.index == wanted))
        .collect();
    if blocks.is_empty() {
        match args.block {
            Some(wanted) => eprintln!("error: no tested block with index {}", wanted),
            None => eprintln!("no tested blocks in {}", args.file.display()),
        }
        return Ok(1);
    }

    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let program = synthesize(block);
        println!(
            "// {}:{} block {} ({})",
            args.file.display(),
            block.line,
            block.index,
            block.run_mode(ctx.config.untagged)
        );
        print!("{}", program.source);
    }
    Ok(0)
}
