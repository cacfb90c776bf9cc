//! Transcript records and the per-record classifiers.
//!
//! A transcript is JSON Lines written by Claude Code. Only `user` and
//! `assistant` records matter here; everything else parses as [`Record::Other`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A single entry in the transcript JSONL file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    User {
        #[serde(default, deserialize_with = "lenient")]
        message: Option<Message>,
    },
    Assistant {
        #[serde(default, deserialize_with = "lenient")]
        message: Option<Message>,
        /// Set by Claude Code on synthetic messages for API failures (e.g. 529).
        #[serde(default, rename = "isApiErrorMessage", deserialize_with = "lenient")]
        is_api_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

/// Deserialize a field, falling back to its default when the value has the
/// wrong shape, so one odd field never drops the whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Content,
}

/// Message content: either a bare string or a list of blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Blocks(Vec<Block>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Blocks(Vec::new())
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Unknown or malformed blocks are dropped one by one rather than
        // failing the whole record.
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Content::Text(text),
            Value::Array(items) => Content::Blocks(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
            ),
            _ => Content::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl Block {
    /// The `skill` field of a tool call's input, if it is a string.
    pub fn skill(&self) -> Option<&str> {
        match self {
            Block::ToolUse { input, .. } => input.get("skill").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl Record {
    /// Parse one raw transcript line. Invalid UTF-8 is a parse error.
    pub fn parse(line: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(line)
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Record::User { message } | Record::Assistant { message, .. } => {
                message.as_ref().map(|m| &m.content)
            }
            Record::Other => None,
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Record::Assistant { .. })
    }

    /// `isApiErrorMessage` for assistant records, false for everything else.
    pub fn is_api_error(&self) -> bool {
        match self {
            Record::Assistant { is_api_error, .. } => is_api_error.unwrap_or(false),
            _ => false,
        }
    }

    fn blocks(&self) -> &[Block] {
        match self.content() {
            Some(Content::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }
}

/// True when `skill` names `action`, bare or plugin-qualified (`plugin:action`).
pub fn skill_matches(skill: &str, action: &str) -> bool {
    skill == action
        || skill
            .strip_suffix(action)
            .is_some_and(|prefix| prefix.ends_with(':'))
}

/// A user message that ran `/{namespace}:{action}` as a slash command.
pub fn is_command_invocation(record: &Record, namespace: &str, action: &str) -> bool {
    let Record::User { .. } = record else {
        return false;
    };
    let marker = format!("<command-name>/{namespace}:{action}");

    match record.content() {
        Some(Content::Text(text)) => text.contains(&marker),
        Some(Content::Blocks(blocks)) => {
            let text: String = blocks
                .iter()
                .filter_map(|block| match block {
                    Block::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            text.contains(&marker)
        }
        None => false,
    }
}

/// An assistant message that calls `skill_tool` with a skill matching `action`.
pub fn is_skill_invocation(record: &Record, skill_tool: &str, action: &str) -> bool {
    if !record.is_assistant() {
        return false;
    }
    record.blocks().iter().any(|block| match block {
        Block::ToolUse { name, .. } if name == skill_tool => {
            block.skill().is_some_and(|skill| skill_matches(skill, action))
        }
        _ => false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Short,
    Substantial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputClass {
    pub kind: OutputKind,
    /// The record calls skills and no other tool.
    pub pure_skill_call: bool,
}

/// Classify an assistant output for loop detection; `None` for other records.
///
/// Skill calls do not make an output substantial, since an `/escalate`
/// attempt is itself a skill call.
pub fn classify_output(record: &Record, skill_tool: &str, min_chars: usize) -> Option<OutputClass> {
    if !record.is_assistant() {
        return None;
    }

    let mut text_len = 0;
    let mut has_meaningful_tool = false;
    let mut has_skill_call = false;

    match record.content() {
        Some(Content::Text(text)) => text_len = text.trim().chars().count(),
        Some(Content::Blocks(blocks)) => {
            for block in blocks {
                match block {
                    Block::Text { text } => text_len += text.trim().chars().count(),
                    Block::ToolUse { name, .. } if name == skill_tool => has_skill_call = true,
                    Block::ToolUse { .. } => has_meaningful_tool = true,
                    Block::Other => {}
                }
            }
        }
        None => {}
    }

    let kind = if has_meaningful_tool || text_len >= min_chars {
        OutputKind::Substantial
    } else {
        OutputKind::Short
    };

    Some(OutputClass {
        kind,
        pure_skill_call: has_skill_call && !has_meaningful_tool,
    })
}
