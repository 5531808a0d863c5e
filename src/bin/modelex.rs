//! Command-line interface for modelex
//! This binary tokenizes files with a highlighting mode, computes fold ranges, and checks mode files.
//!
//! Usage:
//!   modelex tokenize `<path>` --mode `<mode>` [--format `<format>`] [--merge]  - Tokenize a file ('-' for stdin)
//!   modelex fold `<path>` --mode `<mode>` [--row `<row>`]                      - Print fold ranges
//!   modelex list-modes                                                       - List registered modes
//!   modelex check `<mode-file>`...                                           - Compile mode files and report problems
//!
//! Global options: --config `<file>` layers a TOML file over the built-in defaults (without it,
//! `modelex.toml` in the working directory is used when present),
//! --mode-file `<file>` registers an extra mode. Logging is controlled by MODELEX_LOG.

use clap::{Arg, ArgAction, ArgMatches, Command};
use crossterm::style::{Color, Stylize};
use crossterm::tty::IsTty;
use modelex::modelex::modes::{self, ModeEntry, ModeRegistry};
use modelex::modelex::rules::file::ModeFile;
use modelex::modelex::settings::{Loader, ModelexConfig, OutputFormat};
use modelex::modelex::{FoldMarker, FoldRange, LineState, Token};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = Command::new("modelex")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rule-based syntax highlighting: tokenize lines, compute fold ranges, check modes")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML configuration file layered over the defaults (default: ./modelex.toml if present)")
                .global(true),
        )
        .arg(
            Arg::new("mode-file")
                .long("mode-file")
                .help("Extra mode file to register (YAML, or JSON with a .json extension)")
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Output format")
                .value_parser(["text", "json"])
                .global(true),
        )
        .subcommand(
            Command::new("tokenize")
                .about("Tokenize a file line by line")
                .arg(
                    Arg::new("path")
                        .help("Path to the input file, or '-' for stdin")
                        .required(true)
                        .index(1),
                )
                .arg(mode_arg())
                .arg(
                    Arg::new("merge")
                        .long("merge")
                        .help("Join adjacent tokens of the same kind")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("fold")
                .about("Print the fold ranges of a file")
                .arg(
                    Arg::new("path")
                        .help("Path to the input file, or '-' for stdin")
                        .required(true)
                        .index(1),
                )
                .arg(mode_arg())
                .arg(
                    Arg::new("row")
                        .long("row")
                        .help("Only the fold starting at this row (0-based)")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("list-modes").about("List registered modes"))
        .subcommand(
            Command::new("check")
                .about("Compile mode files and report problems")
                .arg(
                    Arg::new("files")
                        .help("Mode files to check")
                        .required(true)
                        .num_args(1..)
                        .index(1),
                ),
        )
        .get_matches();

    let config = load_config(&matches);
    init_tracing(&config);

    match matches.subcommand() {
        Some(("tokenize", sub)) => {
            let registry = init_registry(&config, &matches);
            let path = sub.get_one::<String>("path").unwrap();
            let mode = sub.get_one::<String>("mode").unwrap();
            handle_tokenize_command(registry, &config, path, mode);
        }
        Some(("fold", sub)) => {
            let registry = init_registry(&config, &matches);
            let path = sub.get_one::<String>("path").unwrap();
            let mode = sub.get_one::<String>("mode").unwrap();
            let row = sub.get_one::<usize>("row").copied();
            handle_fold_command(registry, &config, path, mode, row);
        }
        Some(("list-modes", _)) => {
            let registry = init_registry(&config, &matches);
            handle_list_modes_command(registry, &config);
        }
        Some(("check", sub)) => {
            let files: Vec<&String> = sub.get_many::<String>("files").unwrap().collect();
            handle_check_command(&files);
        }
        _ => unreachable!(),
    }
}

fn mode_arg() -> Arg {
    Arg::new("mode")
        .long("mode")
        .short('m')
        .help("Mode name (see list-modes)")
        .required(true)
}

fn load_config(matches: &ArgMatches) -> ModelexConfig {
    let explicit = matches.get_one::<String>("config").map(Path::new);
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut loader = Loader::new().with_user_file(explicit, cwd);
    if let Some(format) = matches.get_one::<String>("format") {
        loader = loader
            .set_override("output.format", format.as_str())
            .unwrap_or_else(|e| fail("Invalid option", e));
    }
    if let Some(("tokenize", sub)) = matches.subcommand() {
        if sub.get_flag("merge") {
            loader = loader
                .set_override("tokenizer.merge_adjacent", true)
                .unwrap_or_else(|e| fail("Invalid option", e));
        }
    }
    loader
        .build()
        .unwrap_or_else(|e| fail("Error loading configuration", e))
}

fn init_tracing(config: &ModelexConfig) {
    let filter = EnvFilter::try_from_env("MODELEX_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Built-in modes, then configured mode files, then --mode-file arguments.
fn init_registry(config: &ModelexConfig, matches: &ArgMatches) -> &'static ModeRegistry {
    let mut registry =
        ModeRegistry::with_defaults().unwrap_or_else(|e| fail("Error loading built-in modes", e));

    let extra = matches
        .get_many::<String>("mode-file")
        .into_iter()
        .flatten()
        .map(PathBuf::from);
    for path in config.modes.paths.iter().cloned().chain(extra) {
        let entry = registry
            .load_file(&path)
            .unwrap_or_else(|e| fail("Error loading mode file", e));
        debug!(mode = %entry.name, path = %path.display(), "loaded mode file");
    }

    modes::init_global(registry).unwrap_or_else(|e| fail("Error", e))
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, error);
    std::process::exit(1);
}

fn lookup<'r>(registry: &'r ModeRegistry, name: &str) -> &'r ModeEntry {
    registry.mode(name).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("\nAvailable modes:");
        for name in registry.list() {
            eprintln!("  {}", name);
        }
        std::process::exit(1);
    })
}

fn read_source(path: &str) -> String {
    if path == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .unwrap_or_else(|e| fail("Error reading stdin", e));
        source
    } else {
        std::fs::read_to_string(path).unwrap_or_else(|e| fail("Error reading file", e))
    }
}

fn use_color(config: &ModelexConfig) -> bool {
    config.output.color && std::io::stdout().is_tty()
}

fn kind_color(kind: &str) -> Option<Color> {
    let family = kind.split('.').next().unwrap_or(kind);
    match family {
        "comment" => Some(Color::DarkGrey),
        "string" => Some(Color::Green),
        "keyword" => Some(Color::Magenta),
        "constant" => Some(Color::Yellow),
        "entity" | "storage" | "support" => Some(Color::Cyan),
        "variable" => Some(Color::Blue),
        "invalid" => Some(Color::Red),
        _ => None,
    }
}

#[derive(Serialize)]
struct LineOutput<'a> {
    row: usize,
    tokens: &'a [Token<'a>],
    end_state: Vec<&'a str>,
}

/// Handle the tokenize command
fn handle_tokenize_command(registry: &ModeRegistry, config: &ModelexConfig, path: &str, mode: &str) {
    let entry = lookup(registry, mode);
    let source = read_source(path);
    let lines: Vec<&str> = source.lines().collect();

    let tokenizer = entry.tokenizer(config.tokenizer);
    let results = tokenizer.tokenize_lines(lines.iter().copied(), &LineState::default());

    match config.output.format {
        OutputFormat::Json => {
            let output: Vec<LineOutput> = results
                .iter()
                .enumerate()
                .map(|(row, line)| LineOutput {
                    row,
                    tokens: &line.tokens,
                    end_state: entry.mode.state_path(&line.end_state),
                })
                .collect();
            let json = serde_json::to_string_pretty(&output)
                .unwrap_or_else(|e| fail("Error formatting tokens", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            let color = use_color(config);
            for (row, line) in results.iter().enumerate() {
                println!(
                    "{:>4} [{}]",
                    row,
                    entry.mode.state_path(&line.end_state).join("/")
                );
                for token in &line.tokens {
                    let kind = token.kind.as_str();
                    let label = format!("{:<40}", kind);
                    match kind_color(kind).filter(|_| color) {
                        Some(c) => println!("     {} {:?}", label.with(c), token.text),
                        None => println!("     {} {:?}", label, token.text),
                    }
                }
            }
        }
    }
}

/// Handle the fold command
fn handle_fold_command(
    registry: &ModeRegistry,
    config: &ModelexConfig,
    path: &str,
    mode: &str,
    row: Option<usize>,
) {
    let entry = lookup(registry, mode);
    let Some(folding) = entry.folding.as_ref() else {
        fail("Error", format!("mode '{}' has no fold mode", entry.name));
    };

    let source = read_source(path);
    let lines: Vec<&str> = source.lines().collect();

    let ranges: Vec<FoldRange> = match row {
        Some(row) => folding.fold_range(&lines, row).into_iter().collect(),
        None => (0..lines.len())
            .filter(|row| folding.fold_widget(&lines, *row) == Some(FoldMarker::Start))
            .filter_map(|row| folding.fold_range(&lines, row))
            .collect(),
    };

    match config.output.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&ranges)
                .unwrap_or_else(|e| fail("Error formatting fold ranges", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for range in &ranges {
                println!(
                    "{}:{}-{}:{}  {}",
                    range.start_row,
                    range.start_column,
                    range.end_row,
                    range.end_column,
                    lines[range.start_row].trim()
                );
            }
        }
    }
}

#[derive(Serialize)]
struct ModeSummary<'a> {
    name: &'a str,
    caption: &'a str,
    states: usize,
    rules: usize,
    folding: Option<&'a str>,
}

/// Handle the list-modes command
fn handle_list_modes_command(registry: &ModeRegistry, config: &ModelexConfig) {
    let summaries: Vec<ModeSummary> = registry
        .entries()
        .into_iter()
        .map(|entry| ModeSummary {
            name: &entry.name,
            caption: &entry.caption,
            states: entry.mode.state_names().count(),
            rules: entry.mode.rule_count(),
            folding: entry.folding.as_ref().map(|f| f.name()),
        })
        .collect();

    match config.output.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summaries)
                .unwrap_or_else(|e| fail("Error formatting modes", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("Available modes:\n");
            for mode in &summaries {
                println!("  {:<12} {}", mode.name, mode.caption);
                let folding = mode
                    .folding
                    .map(|f| format!(", {} folding", f))
                    .unwrap_or_default();
                println!("    {} states, {} rules{}", mode.states, mode.rules, folding);
            }
        }
    }
}

/// Handle the check command
fn handle_check_command(files: &[&String]) {
    let mut failed = 0;

    for path in files {
        let entry = ModeFile::from_path(path).and_then(|file| ModeEntry::from_file(&file));
        match entry {
            Ok(entry) => {
                println!(
                    "ok {}: mode '{}', {} states, {} rules",
                    path,
                    entry.name,
                    entry.mode.state_names().count(),
                    entry.mode.rule_count()
                );
                for rule in entry.mode.nullable_rules() {
                    println!(
                        "  warning: state '{}', rule {}: `{}` matches the empty string",
                        rule.state, rule.index, rule.pattern
                    );
                }
            }
            Err(e) => {
                eprintln!("error {}: {}", path, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
