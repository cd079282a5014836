//! Wire protocol between the agent and the command receiver.
//!
//! One JSON object per line in each direction. Commands are tagged by `cmd`;
//! unrecognized tags receive an explicit error acknowledgement naming the
//! command rather than being silently dropped. Extra fields the agent sends
//! (e.g. `ttl_seconds`) are ignored.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Commands accepted from the agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    EnableBlocking {
        #[serde(default)]
        domains: Vec<String>,
    },
    DisableBlocking,
    UpdateBlocklist {
        #[serde(default)]
        domains: Vec<String>,
    },
    PauseProtection {
        #[serde(default)]
        minutes: Option<u64>,
    },
    WhitelistDomain {
        domain: String,
    },
    GetStatus,
}

const KNOWN_COMMANDS: &[&str] = &[
    "enable_blocking",
    "disable_blocking",
    "update_blocklist",
    "pause_protection",
    "whitelist_domain",
    "get_status",
];

/// Parse one command line.
///
/// Reads the `cmd` tag out of the raw value first so the resulting error can
/// distinguish a malformed payload from an unsupported command.
pub fn parse_command(line: &str) -> Result<Command, AppError> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| AppError::InvalidInput(format!("malformed command: {e}")))?;
    let cmd = value
        .get("cmd")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::InvalidInput("missing \"cmd\" field".into()))?;
    if !KNOWN_COMMANDS.contains(&cmd) {
        return Err(AppError::InvalidInput(format!("unsupported command: {cmd:?}")));
    }
    let cmd = cmd.to_string();
    serde_json::from_value(value)
        .map_err(|e| AppError::InvalidInput(format!("invalid {cmd} command: {e}")))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    #[default]
    Success,
    Error,
}

/// Acknowledgement returned for every command. Optional fields are present
/// only where the command that ran produces them.
#[derive(Debug, Default, Serialize)]
pub struct Ack {
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_added: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_domains: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_in_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks_today: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
}

impl Ack {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn error(err: AppError) -> Self {
        Self {
            status: AckStatus::Error,
            error: Some(err),
            ..Default::default()
        }
    }

    pub fn rules_added(mut self, count: usize) -> Self {
        self.rules_added = Some(count);
        self
    }

    pub fn total_domains(mut self, count: usize) -> Self {
        self.total_domains = Some(count);
        self
    }

    pub fn whitelist_size(mut self, size: usize) -> Self {
        self.whitelist_size = Some(size);
        self
    }

    pub fn resume_in_secs(mut self, secs: u64) -> Self {
        self.resume_in_secs = Some(secs);
        self
    }
}
