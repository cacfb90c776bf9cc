//! Claude Code hook wire format: JSON in on stdin, an optional JSON verdict out.

use crate::error::{HookError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Input received from Claude Code via stdin
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
    pub cwd: Option<String>,
    pub hook_event_name: Option<String>,
    pub stop_hook_active: Option<bool>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
}

impl HookInput {
    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw).map_err(HookError::ReadInput)?;
        serde_json::from_str(&raw).map_err(HookError::ParseInput)
    }

    /// The transcript path, `~`-expanded. Empty strings count as absent.
    pub fn transcript(&self) -> Option<PathBuf> {
        self.transcript_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(expand_path)
    }

    /// `tool_input.skill`, when the tool input carries one.
    pub fn skill(&self) -> Option<&str> {
        self.tool_input.as_ref()?.get("skill")?.as_str()
    }
}

/// Output to control Claude's behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutput {
    pub decision: String,
    pub reason: String,
    #[serde(rename = "systemMessage")]
    pub system_message: String,
}

impl HookOutput {
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        let line = serde_json::to_string(self).map_err(HookError::EncodeOutput)?;
        writeln!(writer, "{line}").map_err(HookError::WriteOutput)?;
        writer.flush().map_err(HookError::WriteOutput)
    }
}

/// Expand ~ to home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
