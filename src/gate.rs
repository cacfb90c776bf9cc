//! The two decision tables: the `/escalate` pre-tool gate and the stop gate.

use crate::config::{Config, WorkflowNames};
use crate::hook::{HookInput, HookOutput};
use crate::scan::{scan_file, try_scan_file, TranscriptScan, WorkflowState};
use crate::transcript::skill_matches;

/// What a gate decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let it through without saying anything.
    Allow,
    Block { reason: String, message: String },
    /// Let it through, but tell the agent why that is not fine.
    Warn { reason: String, message: String },
}

impl Verdict {
    /// The JSON to print, if any. Silence means allow.
    pub fn to_output(&self) -> Option<HookOutput> {
        let (decision, reason, message) = match self {
            Verdict::Allow => return None,
            Verdict::Block { reason, message } => ("block", reason, message),
            Verdict::Warn { reason, message } => ("allow", reason, message),
        };
        Some(HookOutput {
            decision: decision.to_string(),
            reason: reason.clone(),
            system_message: message.clone(),
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Block { .. } => "block",
            Verdict::Warn { .. } => "warn",
        }
    }
}

/// Decide whether `/escalate` may run given the workflow so far.
///
/// Decision matrix:
/// - no `/do`: block, there is nothing to escalate from
/// - `/do` + `/verify`: allow
/// - `/do` only: block until verification has been attempted
pub fn decide_escalate(workflow: WorkflowState, names: &WorkflowNames) -> Verdict {
    if !workflow.active {
        return Verdict::Block {
            reason: format!("No /{} in progress", names.start),
            message: format!(
                "Cannot escalate - no /{start} workflow is active. \
                 /{escalate} is only valid during a /{start} workflow.",
                start = names.start,
                escalate = names.escalate,
            ),
        };
    }

    if workflow.verified {
        return Verdict::Allow;
    }

    Verdict::Block {
        reason: "Must verify before escalating".to_string(),
        message: format!(
            "Cannot escalate - must call /{verify} first. \
             Run /{verify} to check acceptance criteria, then escalate if genuinely stuck.",
            verify = names.verify,
        ),
    }
}

/// Decide whether the agent may stop.
///
/// Decision matrix:
/// - last assistant record is an API error: allow (not a voluntary stop)
/// - no `/do`: allow
/// - `/do` + `/done` or `/do` + `/escalate`: allow
/// - otherwise, after enough trailing short outputs: allow with a warning
/// - otherwise: block
pub fn decide_stop(scan: &TranscriptScan, config: &Config) -> Verdict {
    let names = &config.workflow;
    let workflow = scan.workflow;

    if scan.error.last_was_api_error
        || !workflow.active
        || workflow.completed
        || workflow.escalated
    {
        return Verdict::Allow;
    }

    if scan.loop_state.trailing_short >= config.loop_guard.threshold {
        return Verdict::Warn {
            reason: "Loop detected - allowing stop to prevent infinite loop".to_string(),
            message: format!(
                "WARNING: Stop allowed to break infinite loop. \
                 The /{start} workflow was NOT properly completed. \
                 Next time, call /{escalate} when blocked instead of minimal outputs.",
                start = names.start,
                escalate = names.escalate,
            ),
        };
    }

    Verdict::Block {
        reason: "Execution not verified".to_string(),
        message: format!(
            "Stop blocked: /{start} workflow requires formal exit. \
             Options: (1) Run /{verify} to check criteria - if all pass, /{verify} calls /{done}. \
             (2) Call /{escalate} - for blocking issues OR user-requested pauses. \
             Short outputs will be blocked. Choose one.",
            start = names.start,
            verify = names.verify,
            done = names.done,
            escalate = names.escalate,
        ),
    }
}

/// `PreToolUse` entry point. Only `/escalate` skill calls are gated.
pub fn pretool_escalate(input: &HookInput, config: &Config) -> Verdict {
    let names = &config.workflow;

    if input.tool_name.as_deref() != Some(names.skill_tool.as_str()) {
        return Verdict::Allow;
    }
    let Some(skill) = input.skill() else {
        return Verdict::Allow;
    };
    if !skill_matches(skill, &names.escalate) {
        return Verdict::Allow;
    }
    let Some(path) = input.transcript() else {
        return Verdict::Allow;
    };

    // An unreadable transcript fails open rather than reading as "no /do".
    let workflow = match try_scan_file(&path, config) {
        Ok(scan) => scan.workflow,
        Err(err) => {
            tracing::warn!(error = %err, "allowing escalate");
            return Verdict::Allow;
        }
    };

    let verdict = decide_escalate(workflow, names);
    tracing::debug!(?workflow, verdict = verdict.label(), "escalate gate");
    verdict
}

/// `Stop` entry point.
pub fn stop(input: &HookInput, config: &Config) -> Verdict {
    let Some(path) = input.transcript() else {
        return Verdict::Allow;
    };
    if input.stop_hook_active == Some(true) {
        tracing::debug!("stop hook already active, relying on loop guard");
    }

    let scan = scan_file(&path, config);
    let verdict = decide_stop(&scan, config);
    tracing::debug!(?scan, verdict = verdict.label(), "stop gate");
    verdict
}
