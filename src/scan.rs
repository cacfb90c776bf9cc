//! One pass over a transcript, folded into the state the gates decide on.

use crate::config::Config;
use crate::error::{HookError, Result};
use crate::transcript::{
    classify_output, is_command_invocation, is_skill_invocation, OutputKind, Record,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Where the most recent `/do` stands.
///
/// Only the latest activation counts: a new `/do` clears everything after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub active: bool,
    pub verified: bool,
    pub completed: bool,
    pub escalated: bool,
}

impl WorkflowState {
    fn started() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    pub fn apply(self, record: &Record, config: &Config) -> Self {
        let names = &config.workflow;
        let mut state = self;

        if is_command_invocation(record, &names.namespace, &names.start)
            || is_skill_invocation(record, &names.skill_tool, &names.start)
        {
            state = Self::started();
        }

        if state.active {
            if is_skill_invocation(record, &names.skill_tool, &names.verify) {
                state.verified = true;
            }
            if is_skill_invocation(record, &names.skill_tool, &names.done) {
                state.completed = true;
            }
            if is_skill_invocation(record, &names.skill_tool, &names.escalate) {
                state.escalated = true;
            }
        }

        state
    }
}

/// Consecutive short assistant outputs at the end of the transcript so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    pub trailing_short: usize,
}

impl LoopState {
    pub fn apply(self, record: &Record, config: &Config) -> Self {
        let Some(class) = classify_output(
            record,
            &config.workflow.skill_tool,
            config.loop_guard.short_output_chars,
        ) else {
            return self;
        };

        let trailing_short = match class.kind {
            OutputKind::Short => self.trailing_short + 1,
            OutputKind::Substantial => 0,
        };
        Self { trailing_short }
    }
}

/// Whether the last assistant record was an API error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorState {
    pub last_was_api_error: bool,
}

impl ErrorState {
    pub fn apply(self, record: &Record) -> Self {
        if record.is_assistant() {
            Self {
                last_was_api_error: record.is_api_error(),
            }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscriptScan {
    pub workflow: WorkflowState,
    pub loop_state: LoopState,
    pub error: ErrorState,
}

impl TranscriptScan {
    pub fn apply(self, record: &Record, config: &Config) -> Self {
        Self {
            workflow: self.workflow.apply(record, config),
            loop_state: self.loop_state.apply(record, config),
            error: self.error.apply(record),
        }
    }

    pub fn from_records<'a, I>(records: I, config: &Config) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .fold(Self::default(), |scan, record| scan.apply(record, config))
    }
}

/// Fold the transcript line by line, skipping blank and malformed lines.
///
/// Lines are split on raw bytes, so a line that is not valid UTF-8 is
/// skipped like any other malformed line. Only opening or reading the file
/// can fail.
pub fn try_scan_file(path: &Path, config: &Config) -> Result<TranscriptScan> {
    let file = File::open(path).map_err(|source| HookError::OpenTranscript {
        path: path.to_path_buf(),
        source,
    })?;

    let mut scan = TranscriptScan::default();
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(|source| HookError::ReadTranscript {
            path: path.to_path_buf(),
            source,
        })?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match Record::parse(&line) {
            Ok(record) => scan = scan.apply(&record, config),
            Err(err) => tracing::debug!(
                line = index + 1,
                error = %err,
                "skipping malformed transcript line"
            ),
        }
    }

    Ok(scan)
}

/// Scan a transcript file. An unreadable file scans as empty.
pub fn scan_file(path: &Path, config: &Config) -> TranscriptScan {
    try_scan_file(path, config).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "treating transcript as empty");
        TranscriptScan::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::fixtures::*;
    use serde_json::{json, Value};
    use std::io::Write;

    fn scan(lines: &[Value]) -> TranscriptScan {
        let records: Vec<Record> = lines
            .iter()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect();
        TranscriptScan::from_records(&records, &Config::default())
    }

    fn do_command() -> Value {
        user_command("manifest-dev", "do")
    }

    #[test]
    fn empty_transcript_is_default() {
        assert_eq!(scan(&[]), TranscriptScan::default());
    }

    #[test]
    fn do_command_activates_workflow() {
        let state = scan(&[do_command()]).workflow;
        assert_eq!(
            state,
            WorkflowState {
                active: true,
                ..WorkflowState::default()
            }
        );
    }

    #[test]
    fn do_skill_call_activates_workflow() {
        assert!(scan(&[skill_call("manifest-dev:do")]).workflow.active);
    }

    #[test]
    fn follow_ups_before_do_are_ignored() {
        let state = scan(&[
            skill_call("verify"),
            skill_call("done"),
            skill_call("escalate"),
        ])
        .workflow;
        assert_eq!(state, WorkflowState::default());
    }

    #[test]
    fn follow_ups_set_flags() {
        let state = scan(&[do_command(), skill_call("verify"), skill_call("done")]).workflow;
        assert!(state.active && state.verified && state.completed);
        assert!(!state.escalated);

        let state = scan(&[do_command(), skill_call("escalate")]).workflow;
        assert!(state.escalated && !state.verified);
    }

    #[test]
    fn second_do_resets_flags() {
        let state = scan(&[
            do_command(),
            skill_call("verify"),
            skill_call("done"),
            skill_call("escalate"),
            do_command(),
        ])
        .workflow;
        assert_eq!(
            state,
            WorkflowState {
                active: true,
                ..WorkflowState::default()
            }
        );
    }

    #[test]
    fn start_and_verify_in_one_record_both_apply() {
        let both = json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "tool_use", "name": "Skill", "input": {"skill": "do"}},
                {"type": "tool_use", "name": "Skill", "input": {"skill": "verify"}}
            ]}
        });
        let state = scan(&[both]).workflow;
        assert!(state.active && state.verified);
    }

    #[test]
    fn trailing_short_outputs_are_counted() {
        let state = scan(&[
            do_command(),
            assistant_text("."),
            assistant_text("Done."),
            assistant_text("ok"),
        ])
        .loop_state;
        assert_eq!(state.trailing_short, 3);
    }

    #[test]
    fn substantial_output_resets_the_run() {
        let state = scan(&[
            assistant_text("."),
            assistant_text("."),
            tool_call("Bash"),
            assistant_text("."),
        ])
        .loop_state;
        assert_eq!(state.trailing_short, 1);

        let state = scan(&[assistant_text("."), assistant_text(&"x".repeat(120))]).loop_state;
        assert_eq!(state.trailing_short, 0);
    }

    #[test]
    fn skill_calls_extend_the_run() {
        let state = scan(&[
            assistant_text("."),
            skill_call("verify"),
            assistant_text("."),
        ])
        .loop_state;
        assert_eq!(state.trailing_short, 3);
    }

    #[test]
    fn user_records_do_not_break_the_run() {
        let state = scan(&[
            assistant_text("."),
            json!({"type": "user", "message": {"content": "Stop hook feedback"}}),
            assistant_text("."),
        ])
        .loop_state;
        assert_eq!(state.trailing_short, 2);
    }

    #[test]
    fn error_flag_tracks_last_assistant_record() {
        assert!(scan(&[assistant_text("hi"), api_error()]).error.last_was_api_error);
        assert!(!scan(&[api_error(), assistant_text("back")]).error.last_was_api_error);
        assert!(scan(&[api_error(), do_command()]).error.last_was_api_error);
        assert!(!scan(&[do_command()]).error.last_was_api_error);
    }

    #[test]
    fn missing_file_scans_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.jsonl");
        let err = try_scan_file(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, HookError::OpenTranscript { .. }));
        assert_eq!(scan_file(&path, &Config::default()), TranscriptScan::default());
    }

    #[test]
    fn malformed_and_blank_lines_are_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", do_command()).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, "{}", skill_call("verify")).unwrap();

        let state = scan_file(file.path(), &Config::default()).workflow;
        assert!(state.active && state.verified);
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", do_command()).unwrap();
        file.write_all(b"{\xff}\n").unwrap();
        file.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        writeln!(file, "{}", tool_call("Bash")).unwrap();
        writeln!(file, "{}", assistant_text(".")).unwrap();

        let scan = try_scan_file(file.path(), &Config::default()).unwrap();
        assert!(scan.workflow.active);
        assert_eq!(scan.loop_state.trailing_short, 1);
    }

    #[test]
    fn file_scan_matches_in_memory_fold() {
        let lines = [do_command(), skill_call("verify"), assistant_text("."), api_error()];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in &lines {
            writeln!(file, "{line}").unwrap();
        }

        assert_eq!(scan_file(file.path(), &Config::default()), scan(&lines));
    }

    #[test]
    fn custom_vocabulary_is_respected() {
        let mut config = Config::default();
        config.workflow.namespace = "acme".to_string();
        config.workflow.start = "run".to_string();

        let records: Vec<Record> = [
            user_command("acme", "run"),
            user_command("manifest-dev", "do"),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect();
        assert!(TranscriptScan::from_records(&records[..1], &config).workflow.active);
        assert!(!TranscriptScan::from_records(&records[1..], &config).workflow.active);
    }
}
