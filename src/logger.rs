use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::diff::diff_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    Full,
    Diffed,
}

/// NDJSON capture of traffic with the cloud API.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    client_id: Uuid,
    previous_list: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str, client_id: Uuid) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            client_id,
            previous_list: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "client": self.client_id.to_string(),
            "dir": "req",
            "method": method,
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, appliance_id: &str, patch: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "client": self.client_id.to_string(),
            "dir": "cmd",
            "appliance": appliance_id,
            "body": patch,
        });
        self.write_line(&entry);
    }

    /// Appliance list responses; in diffed mode only the first is written in full.
    pub fn log_list(&mut self, status: u16, body: &Value) {
        let mut entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "client": self.client_id.to_string(),
            "dir": "list",
            "status": status,
        });

        match (self.mode, self.previous_list.as_ref()) {
            (MessageLogMode::Full, _) => {
                entry["body"] = body.clone();
            }
            (MessageLogMode::Diffed, None) => {
                entry["full"] = Value::Bool(true);
                entry["body"] = body.clone();
            }
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(prev, body, "", &mut changes);
                entry["changes"] = changes
                    .iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
            }
        }

        if self.mode == MessageLogMode::Diffed {
            self.previous_list = Some(body.clone());
        }
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
