//! stderr diagnostics for the gates.
//!
//! Claude Code reads the verdict from stdout, so nothing but the verdict may
//! go there. Skipped transcript lines, config fallbacks and the folded state
//! behind each decision are traced to stderr instead, filtered by `RUST_LOG`
//! (quiet below `warn` by default).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr subscriber. Safe to call when one is already set.
///
/// ```bash
/// echo '{"transcript_path":"/tmp/t.jsonl"}' | RUST_LOG=do_gate=debug do-gate stop
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(std::io::stderr).without_time().compact();

    let _ = tracing_subscriber::registry().with(filter).with(stderr).try_init();
}
