//! Purpose: Hold top-level CLI command dispatch for `fieldalias`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Output envelopes and exit code semantics stay unchanged across commands.
//! Invariants: Helpers in `main.rs` remain the source of command business logic.

use super::*;

use bstr::ByteSlice;
use fieldalias::api::{DuplicateOptions, duplicate_document};

pub(super) fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Rewrite {
            rules,
            max_depth,
            file,
        } => {
            serve::init_tracing("warn");
            let rules = Arc::new(resolve_rules(&rules)?);
            let input = open_input(file.as_deref())?;
            if let Some(notice) = stream_rewrite(input, rules, max_depth)? {
                emit_notice(&notice, color_mode);
            }
            Ok(RunOutcome::ok())
        }
        Command::Duplicate {
            rules,
            compact,
            max_depth,
            lines,
            file,
        } => {
            serve::init_tracing("warn");
            let rules = resolve_rules(&rules)?;
            let options = DuplicateOptions { compact, max_depth };
            let input = read_input(file.as_deref())?;
            let output = if lines {
                duplicate_lines(&input, &rules, options)?
            } else {
                duplicate_document(&input, &rules, options)?
            };
            write_stdout(&output)?;
            Ok(RunOutcome::ok())
        }
        Command::CheckRules { rules } => {
            let rules = resolve_rules(&rules)?;
            emit_json(rules_report(&rules));
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            rules,
            bind,
            allow_non_loopback,
            max_body_bytes,
            max_depth,
            compact,
        } => {
            let config = serve::ServeConfig {
                bind,
                rules: resolve_rules(&rules)?,
                allow_non_loopback,
                max_body_bytes,
                max_depth,
                compact,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

/// JSON Lines: each non-blank line is duplicated on its own; line endings
/// and blank lines are kept.
fn duplicate_lines(input: &[u8], rules: &RuleSet, options: DuplicateOptions) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(input.len());
    for (idx, line) in input.lines_with_terminator().enumerate() {
        let body = line.trim_end_with(|ch| ch == '\n' || ch == '\r');
        if body.trim().is_empty() {
            out.extend_from_slice(line);
            continue;
        }
        let duplicated = duplicate_document(body, rules, options).map_err(|err| {
            let line_no = idx + 1;
            err.with_hint(format!("Line {line_no} is not a single JSON document."))
        })?;
        out.extend_from_slice(&duplicated);
        out.extend_from_slice(&line[body.len()..]);
    }
    Ok(out)
}

fn rules_report(rules: &RuleSet) -> Value {
    let entries: Vec<Value> = rules
        .rules()
        .iter()
        .map(|rule| {
            json!({
                "old": rule.old_key(),
                "new": rule.new_key(),
                "canonical": rules.canonical_of(rule.old_key()).unwrap_or(rule.new_key()),
                "aliases": rules.family(rule.new_key()),
            })
        })
        .collect();
    json!({
        "ok": true,
        "count": rules.len(),
        "rules": entries,
    })
}
