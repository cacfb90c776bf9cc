//! Workflow vocabulary and loop-guard thresholds.
//!
//! Everything here has a built-in default; a YAML file may override any subset.

use crate::error::{HookError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DO_GATE_CONFIG";

/// File name looked up under `~/.claude/` when nothing explicit is given.
pub const DEFAULT_CONFIG_FILE: &str = "do-gate.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workflow: WorkflowNames,
    pub loop_guard: LoopGuard,
}

/// Names that identify workflow events in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowNames {
    /// Plugin namespace in `<command-name>/{namespace}:{action}` markers.
    pub namespace: String,
    /// Tool name the assistant uses to invoke a skill.
    pub skill_tool: String,
    pub start: String,
    pub verify: String,
    pub done: String,
    pub escalate: String,
}

impl Default for WorkflowNames {
    fn default() -> Self {
        Self {
            namespace: "manifest-dev".to_string(),
            skill_tool: "Skill".to_string(),
            start: "do".to_string(),
            verify: "verify".to_string(),
            done: "done".to_string(),
            escalate: "escalate".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoopGuard {
    /// Trimmed text length at which an assistant output stops being "short".
    pub short_output_chars: usize,
    /// Trailing short outputs needed before a stop is let through with a warning.
    pub threshold: usize,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self {
            short_output_chars: 100,
            threshold: 3,
        }
    }
}

impl Config {
    pub fn from_yaml_str(raw: &str, path: &Path) -> Result<Self> {
        // An empty file deserializes as unit, not as an empty mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw).map_err(|source| HookError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;

        // Zero would let every stop through with a loop warning.
        if config.loop_guard.threshold == 0 {
            return Err(HookError::InvalidConfig {
                path: path.to_path_buf(),
                reason: "loop_guard.threshold must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| HookError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw, path)
    }

    /// Resolve the config for this invocation.
    ///
    /// An explicit path (flag, then environment) must load; the implicit
    /// `~/.claude/do-gate.yaml` is optional. Any failure falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let explicit = explicit.map(Path::to_path_buf).or(from_env);

        let path = match explicit {
            Some(path) => path,
            None => match default_config_path() {
                Some(path) if path.is_file() => path,
                _ => return Self::default(),
            },
        };

        match Self::from_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                config
            }
            Err(err) => {
                tracing::warn!(error = %err, "using default config");
                Self::default()
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".claude").join(DEFAULT_CONFIG_FILE))
}
