//! Claude Code hooks that enforce the `/do` workflow.
//!
//! `/do` starts a workflow that may only end through `/done` (reached via a
//! passing `/verify`) or `/escalate` (allowed only after `/verify` was tried).
//! Both hooks re-read the session transcript on every call; nothing else is
//! persisted.

pub mod config;
pub mod error;
pub mod gate;
pub mod hook;
pub mod logging;
pub mod scan;
pub mod transcript;
