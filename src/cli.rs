// Command-line front end for confdelta.
//
// Explicit subcommands with long-form options. Every command reads its
// inputs from named files and writes to a named file or stdout; nothing is
// taken from fixed directories.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::builder::RangedU64ValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde_json::Value;

use crate::delta::{Delta, Section};
use crate::diff::{self, DEFAULT_MAX_DEPTH, DiffOptions};
use crate::document::{self, MAX_NESTING};
use crate::io as fileio;
use crate::patch;
use crate::store::{self, JSON_INDENT};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024;

/// Exit status when `apply --strict` rejects stale updates.
const EXIT_STALE: i32 = 2;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Structural delta/patch tool for JSON configuration documents.
#[derive(Parser, Debug)]
#[command(
    name = "confdelta",
    version,
    about = "Structural delta/patch tool for JSON configuration documents",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute the delta between a base and a patched document.
    Diff(DiffArgs),
    /// Apply a delta to a base document.
    Apply(ApplyArgs),
    /// List the entries of a delta.
    Show(ShowArgs),
    /// Write the delta that undoes a delta.
    Invert(InvertArgs),
    /// Remove empty mappings from a document.
    Compact(CompactArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Base document.
    #[arg(value_hint = ValueHint::FilePath)]
    base: PathBuf,

    /// Patched document.
    #[arg(value_hint = ValueHint::FilePath)]
    patched: PathBuf,

    /// Output delta file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Compare arrays without regard to element order.
    #[arg(long = "ignore-array-order")]
    ignore_array_order: bool,

    /// Deepest mapping nesting to descend into.
    #[arg(
        long = "max-depth",
        default_value_t = DEFAULT_MAX_DEPTH,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_NESTING as u64)
    )]
    max_depth: usize,

    /// Output delta file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Base document.
    #[arg(value_hint = ValueHint::FilePath)]
    base: PathBuf,

    /// Delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Output document (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Remove empty mappings left behind by deletions.
    #[arg(long)]
    compact: bool,

    /// Fail without writing output if any update is stale.
    #[arg(long)]
    strict: bool,

    /// Output document (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

#[derive(Args, Debug)]
struct InvertArgs {
    /// Delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Output delta file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompactArgs {
    /// Document to compact.
    #[arg(value_hint = ValueHint::FilePath)]
    document: PathBuf,

    /// Output document (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Diff,
    Apply,
    Show,
    Invert,
    Compact,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    /// Primary input: base document, delta, or document to compact.
    input_file: Option<PathBuf>,
    /// Second input: patched document (diff) or delta (apply).
    other_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    max_depth: usize,
    ignore_array_order: bool,
    compact: bool,
    strict: bool,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            input_file: None,
            other_file: None,
            output_file: None,
            max_depth: DEFAULT_MAX_DEPTH,
            ignore_array_order: false,
            compact: false,
            strict: false,
        }
    }

    fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            max_depth: self.max_depth,
            ignore_array_order: self.ignore_array_order,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Diff(args) => Options {
            input_file: Some(args.base.clone()),
            other_file: Some(args.patched.clone()),
            output_file: args.output.clone().or_else(|| args.output_pos.clone()),
            max_depth: args.max_depth,
            ignore_array_order: args.ignore_array_order,
            ..Options::new(Command::Diff, &cli)
        },
        Cmd::Apply(args) => Options {
            input_file: Some(args.base.clone()),
            other_file: Some(args.delta.clone()),
            output_file: args.output.clone().or_else(|| args.output_pos.clone()),
            compact: args.compact,
            strict: args.strict,
            ..Options::new(Command::Apply, &cli)
        },
        Cmd::Show(args) => Options {
            input_file: Some(args.delta.clone()),
            ..Options::new(Command::Show, &cli)
        },
        Cmd::Invert(args) => Options {
            input_file: Some(args.delta.clone()),
            output_file: args.output.clone(),
            ..Options::new(Command::Invert, &cli)
        },
        Cmd::Compact(args) => Options {
            input_file: Some(args.document.clone()),
            output_file: args.output.clone(),
            ..Options::new(Command::Compact, &cli)
        },
        Cmd::Config => Options::new(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("confdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Shared I/O
// ---------------------------------------------------------------------------

fn required<'a>(path: &'a Option<PathBuf>, what: &str) -> Result<&'a Path, i32> {
    path.as_deref().ok_or_else(|| {
        eprintln!("confdelta: missing {what}");
        1
    })
}

fn read_document(path: &Path) -> Result<Value, i32> {
    fileio::read_document(path).map_err(|e| {
        eprintln!("confdelta: {}: {e}", path.display());
        1
    })
}

fn read_delta(path: &Path) -> Result<Delta, i32> {
    fileio::read_delta(path).map_err(|e| {
        eprintln!("confdelta: {}: {e}", path.display());
        1
    })
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, i32> {
    match &opts.output_file {
        None => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        Some(path) => {
            if path.exists() && !opts.force {
                eprintln!(
                    "confdelta: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return Err(1);
            }
            match File::create(path) {
                Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("confdelta: output file: {}: {e}", path.display());
                    Err(1)
                }
            }
        }
    }
}

/// Write `value` pretty-printed to the resolved output and return its size.
fn write_output(opts: &Options, value: &Value) -> Result<u64, i32> {
    let mut buf = Vec::new();
    if let Err(e) = store::write_pretty(&mut buf, value) {
        eprintln!("confdelta: serialize error: {e}");
        return Err(1);
    }
    let mut writer = open_output(opts)?;
    if let Err(e) = writer.write_all(&buf).and_then(|()| writer.flush()) {
        eprintln!("confdelta: write error: {e}");
        return Err(1);
    }
    Ok(buf.len() as u64)
}

fn exit_code(result: Result<i32, i32>) -> i32 {
    match result {
        Ok(code) | Err(code) => code,
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("confdelta version {version} (Rust), Copyright (C) confdelta contributors");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let indent = JSON_INDENT.len();

    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_MAX_DEPTH={DEFAULT_MAX_DEPTH}");
    eprintln!("MAX_NESTING={MAX_NESTING}");
    eprintln!("JSON_INDENT={indent}");
    eprintln!("PATH_SEPARATOR={}", crate::path::SEPARATOR);
    eprintln!("PATH_ESCAPE={}", crate::path::ESCAPE);

    0
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn cmd_diff(opts: &Options) -> Result<i32, i32> {
    let base_path = required(&opts.input_file, "base document")?;
    let patched_path = required(&opts.other_file, "patched document")?;
    let base = read_document(base_path)?;
    let patched = read_document(patched_path)?;

    let delta = diff::diff_with_options(&base, &patched, &opts.diff_options()).map_err(|e| {
        eprintln!("confdelta: diff error: {e}");
        1
    })?;
    let size = write_output(opts, &store::to_value(&delta))?;

    let summary = delta.summary();
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "confdelta: diff: additions: {}, deletions: {}, updates: {}, delta size: {size}",
            summary.additions, summary.deletions, summary.updates
        );
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "diff",
            "additions": summary.additions,
            "deletions": summary.deletions,
            "updates": summary.updates,
            "delta_size": size,
        });
        eprintln!("{json:#}");
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> Result<i32, i32> {
    let base_path = required(&opts.input_file, "base document")?;
    let delta_path = required(&opts.other_file, "delta")?;
    let base = read_document(base_path)?;
    let delta = read_delta(delta_path)?;

    let patched = patch::apply(&base, &delta).map_err(|e| {
        eprintln!("confdelta: apply error: {e}");
        1
    })?;

    for w in &patched.warnings {
        log::warn!("{w}");
    }
    if opts.strict && !patched.is_clean() {
        eprintln!(
            "confdelta: {} stale update(s), output not written",
            patched.warnings.len()
        );
        return Err(EXIT_STALE);
    }

    let document = if opts.compact {
        document::compact(&patched.document)
    } else {
        patched.document
    };
    let size = write_output(opts, &document)?;

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "confdelta: apply: entries: {}, stale: {}, output size: {size}",
            delta.len(),
            patched.warnings.len()
        );
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "entries": delta.len(),
            "stale": patched.warnings.len(),
            "output_size": size,
        });
        eprintln!("{json:#}");
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Show command
// ---------------------------------------------------------------------------

fn render_entries(delta: &Delta) -> Vec<String> {
    let mut lines = Vec::with_capacity(delta.len());
    for (section, path) in delta.paths() {
        let line = match section {
            Section::Additions => format!("+ {path} = {}", delta.additions[path]),
            Section::Deletions => format!("- {path} = {}", delta.deletions[path]),
            Section::Updates => {
                let u = &delta.updates[path];
                format!("~ {path}: {} -> {}", u.old_value, u.new_value)
            }
        };
        lines.push(line);
    }
    lines
}

fn cmd_show(opts: &Options) -> Result<i32, i32> {
    let delta_path = required(&opts.input_file, "delta")?;
    let delta = read_delta(delta_path)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = delta.summary();
    let mut text = format!(
        "additions: {}, deletions: {}, updates: {}\n",
        summary.additions, summary.deletions, summary.updates
    );
    for line in render_entries(&delta) {
        text.push_str(&line);
        text.push('\n');
    }
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        eprintln!("confdelta: write error: {e}");
        return Err(1);
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Invert / compact commands
// ---------------------------------------------------------------------------

fn cmd_invert(opts: &Options) -> Result<i32, i32> {
    let delta_path = required(&opts.input_file, "delta")?;
    let delta = read_delta(delta_path)?;
    write_output(opts, &store::to_value(&delta.invert()))?;
    Ok(0)
}

fn cmd_compact(opts: &Options) -> Result<i32, i32> {
    let doc_path = required(&opts.input_file, "document")?;
    let doc = read_document(doc_path)?;
    write_output(opts, &document::compact(&doc))?;
    Ok(0)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn default_log_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(opts.verbose, opts.quiet)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let exit_code = match opts.command {
        Command::Diff => exit_code(cmd_diff(&opts)),
        Command::Apply => exit_code(cmd_apply(&opts)),
        Command::Show => exit_code(cmd_show(&opts)),
        Command::Invert => exit_code(cmd_invert(&opts)),
        Command::Compact => exit_code(cmd_compact(&opts)),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Update;
    use crate::path::Path as DocPath;
    use serde_json::json;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("confdelta".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn diff_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "diff",
            "--ignore-array-order",
            "--max-depth",
            "16",
            "config.json",
            "patched_config.json",
            "delta.json",
        ]);
        assert_eq!(opts.command, Command::Diff);
        assert_eq!(opts.input_file, Some(PathBuf::from("config.json")));
        assert_eq!(opts.other_file, Some(PathBuf::from("patched_config.json")));
        assert_eq!(opts.output_file, Some(PathBuf::from("delta.json")));
        let d = opts.diff_options();
        assert_eq!(d.max_depth, 16);
        assert!(d.ignore_array_order);
    }

    #[test]
    fn diff_defaults() {
        let opts = parse_opts(&["diff", "a.json", "b.json"]);
        assert_eq!(opts.output_file, None);
        assert_eq!(opts.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!opts.ignore_array_order);
    }

    #[test]
    fn apply_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "--quiet",
            "apply",
            "--compact",
            "--strict",
            "--output",
            "res_patched_config.json",
            "config.json",
            "delta.json",
        ]);
        assert_eq!(opts.command, Command::Apply);
        assert!(opts.quiet);
        assert!(opts.compact);
        assert!(opts.strict);
        assert_eq!(opts.input_file, Some(PathBuf::from("config.json")));
        assert_eq!(opts.other_file, Some(PathBuf::from("delta.json")));
        assert_eq!(
            opts.output_file,
            Some(PathBuf::from("res_patched_config.json"))
        );
    }

    #[test]
    fn max_depth_is_bounded_by_parse_limit() {
        let limit = MAX_NESTING.to_string();
        let opts = parse_opts(&["diff", "--max-depth", limit.as_str(), "a", "b"]);
        assert_eq!(opts.max_depth, MAX_NESTING);
        let over = (MAX_NESTING + 1).to_string();
        let argv = ["confdelta", "diff", "--max-depth", over.as_str(), "a", "b"];
        assert!(Cli::try_parse_from(argv).is_err());
        assert!(Cli::try_parse_from(["confdelta", "diff", "--max-depth", "0", "a", "b"]).is_err());
    }

    #[test]
    fn output_flag_conflicts_with_positional() {
        let argv = ["confdelta", "diff", "--output", "x", "a", "b", "c"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--force", "--json", "invert", "d.json", "out.json"]);
        assert_eq!(opts.command, Command::Invert);
        assert!(opts.force);
        assert!(opts.json_output);
        assert_eq!(opts.output_file, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn verbose_is_capped() {
        let verbose = parse_opts(&["-vvv", "show", "d.json"]);
        assert_eq!(verbose.verbose, 2);
        assert_eq!(default_log_filter(verbose.verbose, false), "debug");
        assert_eq!(default_log_filter(0, false), "warn");
        assert_eq!(default_log_filter(1, true), "error");
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let argv = ["confdelta", "-q", "-v", "config"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn remaining_commands_map() {
        assert_eq!(parse_opts(&["show", "d.json"]).command, Command::Show);
        assert_eq!(parse_opts(&["compact", "c.json"]).command, Command::Compact);
        assert_eq!(parse_opts(&["config"]).command, Command::Config);
    }

    #[test]
    fn show_renders_each_section() {
        let mut d = Delta::new();
        d.additions.insert(DocPath::decode("b.d").unwrap(), json!(4));
        d.deletions.insert(DocPath::decode("x").unwrap(), json!({"y": 1}));
        d.updates.insert(
            DocPath::decode("b.c").unwrap(),
            Update::new(json!(2), json!(3)),
        );
        assert_eq!(
            render_entries(&d),
            vec![
                "+ b.d = 4".to_string(),
                "- x = {\"y\":1}".to_string(),
                "~ b.c: 2 -> 3".to_string(),
            ]
        );
    }

    #[test]
    fn fuzz_parser_tolerates_garbage() {
        fuzz_try_parse_args(&["--bogus".to_string(), "diff".to_string()]);
        fuzz_try_parse_args(&[]);
    }
}
