//! Purpose: `fieldalias` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, writes documents on stdout.
//! Invariants: Filter commands write only transformed documents to stdout.
//! Invariants: Non-interactive errors and notices are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::fs::File;
use std::io::{self, IsTerminal, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;

mod command_dispatch;

use fieldalias::api::{
    AliasRule, DeprecationNotice, Error, ErrorKind, KeyRewriter, NoticeSource, RewriteOptions,
    RuleSet, load_rules, to_exit_code,
};
use fieldalias::notice::deprecation_json;
use fieldalias::serve;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, color_mode).map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "fieldalias",
    version,
    about = "Rename deprecated JSON fields on the way in, duplicate them on the way out",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Rules pair a deprecated field name with its replacement (old=new).

Mental model:
  - `rewrite` renames deprecated keys in a request body (old -> new)
  - `duplicate` adds deprecated copies next to renamed keys in a response
  - `serve` exposes both over HTTP
"#,
    after_help = r#"EXAMPLES
  $ echo '{"team_id": 3}' | fieldalias rewrite --rule team_id=fleet_id
  {"fleet_id": 3}
  $ echo '{"fleet_id":3}' | fieldalias duplicate --rule team_id=fleet_id
  {"fleet_id":3,"team_id":3}

LEARN MORE
  $ fieldalias <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct RuleArgs {
    #[arg(long = "rule", value_name = "OLD=NEW", help = "Repeatable rename rule")]
    rules: Vec<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "JSON file with an array of {\"old\": ..., \"new\": ...} rules",
        value_hint = ValueHint::FilePath
    )]
    rules_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Rename deprecated keys in a JSON document (stream filter)",
        long_about = r#"Stream a JSON document from FILE (or stdin) to stdout, renaming deprecated
keys to their replacements. Bytes other than renamed keys are copied as-is.

Supplying both spellings of one field in the same object is an error (exit 3)."#,
        after_help = r#"EXAMPLES
  $ fieldalias rewrite --rule team_id=fleet_id request.json
  $ curl -s localhost:8080/api | fieldalias rewrite --rules-file rules.json

NOTES
  - Deprecated names that were used are reported on stderr as a notice
  - Output may be partial when a conflict stops the stream"#
    )]
    Rewrite {
        #[command(flatten)]
        rules: RuleArgs,
        #[arg(long, help = "Reject documents nested deeper than N levels")]
        max_depth: Option<usize>,
        #[arg(help = "Input file (default: stdin)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    #[command(
        about = "Add deprecated copies of renamed keys to a JSON document",
        after_help = r#"EXAMPLES
  $ fieldalias duplicate --rule team_id=fleet_id response.json
  $ fieldalias duplicate --rules-file rules.json --lines events.jsonl

NOTES
  - Keys already present are never inserted again; running twice is a no-op
  - `--lines` treats input as JSON Lines and processes each line on its own"#
    )]
    Duplicate {
        #[command(flatten)]
        rules: RuleArgs,
        #[arg(long, help = "Strip all whitespace outside strings from the output")]
        compact: bool,
        #[arg(long, help = "Copy documents nested deeper than N levels unchanged")]
        max_depth: Option<usize>,
        #[arg(long, help = "Input is JSON Lines (one document per line)")]
        lines: bool,
        #[arg(help = "Input file (default: stdin)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    #[command(
        name = "check-rules",
        about = "Validate rules and print how each name resolves",
        after_help = r#"EXAMPLES
  $ fieldalias check-rules --rules-file rules.json
  $ fieldalias check-rules --rule a=b --rule b=c"#
    )]
    CheckRules {
        #[command(flatten)]
        rules: RuleArgs,
    },
    #[command(
        about = "Serve normalize/duplicate endpoints over HTTP",
        after_help = r#"EXAMPLES
  $ fieldalias serve --rules-file rules.json
  $ curl -s -XPOST localhost:9780/v1/normalize -d '{"team_id":1}'

NOTES
  - Endpoints: GET /healthz, GET /v1/rules, GET /v1/query,
    POST /v1/normalize, POST /v1/duplicate
  - Loopback-only unless --allow-non-loopback is given
  - Log level follows RUST_LOG (default: info)"#
    )]
    Serve {
        #[command(flatten)]
        rules: RuleArgs,
        #[arg(long, default_value = "127.0.0.1:9780", help = "Address to bind")]
        bind: SocketAddr,
        #[arg(long, help = "Allow binding to a non-loopback address")]
        allow_non_loopback: bool,
        #[arg(long, default_value_t = 1024 * 1024, help = "Request body limit in bytes")]
        max_body_bytes: u64,
        #[arg(long, help = "Maximum JSON nesting depth")]
        max_depth: Option<usize>,
        #[arg(long, help = "Strip all whitespace outside strings from /v1/duplicate output")]
        compact: bool,
    },
}

fn resolve_rules(args: &RuleArgs) -> Result<RuleSet, Error> {
    let mut rules: Vec<AliasRule> = match &args.rules_file {
        Some(path) => load_rules(path)?.rules().to_vec(),
        None => Vec::new(),
    };
    for raw in &args.rules {
        let rule = raw.parse::<AliasRule>().map_err(|err| {
            err.with_hint(format!(
                "Rules look like --rule old_name=new_name (got {raw:?})."
            ))
        })?;
        rules.push(rule);
    }
    Ok(RuleSet::new(rules))
}

fn open_input(file: Option<&Path>) -> Result<Box<dyn Read>, Error> {
    match file {
        None => Ok(Box::new(io::stdin().lock())),
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdin().lock())),
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message(format!("failed to open {}", path.display()))
                    .with_source(err)
            })?;
            Ok(Box::new(io::BufReader::new(file)))
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<Vec<u8>, Error> {
    let mut input = open_input(file)?;
    let mut buf = Vec::new();
    input.read_to_end(&mut buf).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read input")
            .with_source(err)
    })?;
    Ok(buf)
}

fn write_stdout(bytes: &[u8]) -> Result<(), Error> {
    let mut out = io::stdout().lock();
    out.write_all(bytes)
        .and_then(|()| out.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn emit_json(value: Value) {
    let is_tty = io::stdout().is_terminal();
    let json = if is_tty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notice(notice: &DeprecationNotice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!(
            "{label} deprecated fields {}; {}",
            notice.fields_label(),
            notice.warning()
        );
        return;
    }

    let value = deprecation_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Conflict => "alias conflict".to_string(),
        ErrorKind::Limit => "limit exceeded".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    if let Some(conflict) = err.alias_conflict() {
        inner.insert(
            "conflict".to_string(),
            json!({ "old": conflict.old, "new": conflict.new }),
        );
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!(
            "{} {offset}",
            colorize_label("offset:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `fieldalias --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "fieldalias") else {
        return "Try `fieldalias --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !token.starts_with('-') && !token.starts_with('<') && !token.starts_with('[')
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `fieldalias --help`.".to_string();
    }
    format!("Try `fieldalias {} --help`.", parts.join(" "))
}

fn stream_rewrite(
    input: Box<dyn Read>,
    rules: Arc<RuleSet>,
    max_depth: Option<usize>,
) -> Result<Option<DeprecationNotice>, Error> {
    let options = RewriteOptions { max_depth };
    let mut rewriter = KeyRewriter::with_options(input, Arc::clone(&rules), options);
    let mut out = io::stdout().lock();
    let copied = io::copy(&mut rewriter, &mut out).and_then(|_| out.flush());
    if let Some(halted) = rewriter.terminal_error() {
        return Err(halted.replicate());
    }
    copied.map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to stream document")
            .with_source(err)
    })?;
    Ok(DeprecationNotice::from_usage(
        NoticeSource::Body,
        rewriter.deprecated_keys(),
        &rules,
    ))
}
