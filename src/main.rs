use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use is_terminal::IsTerminal;

mod anchor;
mod apply;
mod diff;
mod document;
mod encoding;
mod engine;
mod error;
mod guard;
mod intents;
mod logging;
mod plan;

use apply::PatchResult;
use document::SourceDocument;
use error::PlanError;
use guard::GuardReport;

const DEFAULT_TARGET: &str = "electron/main.ts";

#[derive(Debug, Parser)]
#[command(
    name = "anchorpatch",
    about = "Extract the git subsystem from the main-process entry point by anchor-based patching"
)]
struct Cli {
    /// Target file to patch.
    #[arg(value_name = "FILE", default_value = DEFAULT_TARGET)]
    target: PathBuf,
    #[arg(long, value_enum, default_value = "dry-run")]
    mode: Mode,
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,
    /// Context lines around each diff hunk.
    #[arg(long, default_value_t = 3)]
    context: usize,
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    no_backup: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum Mode {
    /// Compute the result and print a diff; write nothing.
    DryRun,
    /// Compute and atomically write the result.
    Apply,
    /// Report the idempotence signatures only.
    Verify,
}

impl Mode {
    fn label(self) -> &'static str {
        match self {
            Mode::DryRun => "dry-run",
            Mode::Apply => "apply",
            Mode::Verify => "verify",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let planning = err
                .chain()
                .any(|cause| cause.downcast_ref::<PlanError>().is_some());
            if planning { ExitCode::from(1) } else { ExitCode::from(2) }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let override_encoding = encoding::resolve_override(cli.encoding.as_deref())?;
    let doc = SourceDocument::read(&cli.target, override_encoding)?;
    if doc.decode_errors {
        println!(
            "warning: decoding errors encountered for {}; continuing",
            cli.target.display()
        );
    }
    let intents = intents::git_service_intents()?;

    match cli.mode {
        Mode::Verify => run_verify(&cli, &doc, &intents),
        Mode::DryRun | Mode::Apply => run_patch(&cli, &doc, &intents),
    }
}

fn run_patch(cli: &Cli, doc: &SourceDocument, intents: &[intents::TransformIntent]) -> Result<()> {
    print_run_header(cli, doc, intents.len());
    let outcome = engine::plan_and_apply(doc, intents)?;

    let Some(result) = outcome.result else {
        println!(
            "all {} intents already applied; nothing to do.",
            intents.len()
        );
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&outcome.guard)?);
        }
        if cli.mode == Mode::Apply {
            log_change(cli, "no-op", "all intents already applied");
        }
        return Ok(());
    };

    for warning in &result.warnings {
        println!("warning: {warning}");
    }

    let old_text = doc.render();
    let new_text = result.document.render();
    println!("--- preview: {} ---", cli.target.display());
    diff::print_unified(
        &old_text,
        &new_text,
        &cli.target,
        &diff::DiffConfig {
            context: cli.context,
            colorize: cli.color.should_color(),
        },
    );
    print_op_summary(&result, doc.len());
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if cli.mode != Mode::Apply {
        println!("dry-run: rerun with --mode apply to write this change.");
        return Ok(());
    }

    let backup = engine::write_back(&cli.target, &result, cli.no_backup)?;
    if let Some(bak) = backup {
        println!(
            "backup saved: {} -> {}",
            cli.target.display(),
            bak.display()
        );
    }
    println!("applied {}", cli.target.display());
    log_change(
        cli,
        "applied",
        &format!(
            "-{} +{} lines across {} operations",
            result.lines_removed(),
            result.lines_added(),
            result.reports.len()
        ),
    );
    Ok(())
}

// the patch result decides the exit code; a change-log hiccup only warns
fn log_change(cli: &Cli, action: &str, detail: &str) {
    if let Err(err) = logging::record_change(cli.mode.label(), &cli.target, action, detail) {
        eprintln!("warning: could not record change log: {err:#}");
    }
}

fn run_verify(cli: &Cli, doc: &SourceDocument, intents: &[intents::TransformIntent]) -> Result<()> {
    let report = guard::inspect(doc, intents);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&verify_json(&report))?);
        return Ok(());
    }
    for entry in &report.states {
        println!("{:<28} {}", entry.intent, entry.state);
    }
    println!("document state: {}", report.document_state());
    Ok(())
}

fn verify_json(report: &GuardReport) -> serde_json::Value {
    serde_json::json!({
        "intents": report.states,
        "document_state": report.document_state(),
    })
}

fn print_run_header(cli: &Cli, doc: &SourceDocument, intent_count: usize) {
    println!("target: {}", cli.target.display());
    println!("mode: {}", cli.mode.label());
    println!("encoding: {}", doc.encoding.describe());
    println!("intents: {intent_count}");
    if cli.no_backup {
        println!("backups disabled");
    }
    println!("---");
}

fn print_op_summary(result: &PatchResult, original_lines: usize) {
    for report in &result.reports {
        println!(
            "{}: -{} +{} @ line {}",
            report.intent, report.lines_removed, report.lines_added, report.line
        );
    }
    for name in &result.already_applied {
        println!("{name}: already applied, skipped");
    }
    let new_lines = original_lines - result.lines_removed() + result.lines_added();
    println!(
        "lines: {} -> {} (-{} +{})",
        original_lines,
        new_lines,
        result.lines_removed(),
        result.lines_added()
    );
}
