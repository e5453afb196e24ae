//! Append-only audit trail of whisper creation and reveal decisions.
//!
//! Message bodies are never written here; only ids, lengths and outcomes.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::UserId, errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 200;

#[derive(Clone, Debug, Default, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_len: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, user_id: UserId) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            user_id: Some(user_id.0),
            ..Self::default()
        }
    }

    pub fn whisper_created(
        sender: UserId,
        recipient: UserId,
        synthesized: bool,
        body_len: usize,
    ) -> Self {
        Self {
            recipient_id: Some(recipient.0),
            synthesized: Some(synthesized),
            body_len: Some(body_len),
            ..Self::base("whisper_created", sender)
        }
    }

    pub fn reveal(requester: UserId, outcome: &str, reason: Option<&str>) -> Self {
        Self {
            outcome: Some(outcome.to_string()),
            reason: reason.map(|s| s.to_string()),
            ..Self::base("reveal", requester)
        }
    }

    pub fn cooldown(user: UserId) -> Self {
        Self::base("cooldown", user)
    }

    pub fn admin(user: UserId, command: &str, authorized: bool) -> Self {
        Self {
            command: Some(truncate_text(command, AUDIT_MAX_TEXT)),
            outcome: Some(if authorized { "allowed" } else { "denied" }.to_string()),
            ..Self::base("admin", user)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, event: AuditEvent) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text: one `key=value` line per event.
        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        let line = obj
            .iter()
            .map(|(k, v)| format!("{k}={}", json_value_to_display(v)))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Write and swallow failures; the audit trail never affects the whisper flow.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(path = %self.path.display(), error = %e, "audit write failed");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
