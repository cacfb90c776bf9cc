//! Hook binary: `do-gate stop` for the Stop event, `do-gate pretool-escalate`
//! for PreToolUse on the Skill tool.
//!
//! Always exits 0. A verdict is signalled only by what is printed to stdout.

use clap::{Parser, Subcommand};
use do_gate::config::Config;
use do_gate::error::Result;
use do_gate::gate::{self, Verdict};
use do_gate::hook::HookInput;
use do_gate::logging;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "do-gate",
    version,
    about = "Enforce the /do -> /verify -> /done|/escalate workflow"
)]
struct Cli {
    /// YAML config overriding workflow names and loop thresholds
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stop hook: block ending the turn until the workflow is formally exited
    Stop,
    /// PreToolUse hook: block /escalate until /verify has been called
    PretoolEscalate,
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    // Fail open: an internal error must never turn into a blocked session.
    if let Err(e) = run(&cli) {
        tracing::warn!(error = %e, "hook error, allowing");
    }
}

fn run(cli: &Cli) -> Result<()> {
    let input = HookInput::read_from(io::stdin().lock())?;
    tracing::debug!(
        session_id = input.session_id.as_deref().unwrap_or("-"),
        hook_event_name = input.hook_event_name.as_deref().unwrap_or("-"),
        cwd = input.cwd.as_deref().unwrap_or("-"),
        "hook input"
    );

    let config = Config::load(cli.config.as_deref());

    let verdict = match cli.command {
        Command::Stop => gate::stop(&input, &config),
        Command::PretoolEscalate => gate::pretool_escalate(&input, &config),
    };

    emit(&verdict)
}

/// Exit 0 without output = allow
fn emit(verdict: &Verdict) -> Result<()> {
    match verdict.to_output() {
        Some(output) => output.write_to(io::stdout().lock()),
        None => Ok(()),
    }
}
