//! JSON-on-disk `PersistenceSink`.
//!
//! Saves go to a sibling temp file first and are renamed into place, so a crash
//! mid-write leaves the previous file intact.

use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::UserId,
    errors::Error,
    ports::PersistenceSink,
    recency::{RecencyEntry, RecencySnapshot},
    Result,
};

const FILE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecencyFile {
    #[serde(default)]
    version: u32,
    /// Keyed by sender id in string form.
    #[serde(default)]
    senders: BTreeMap<String, Vec<RecencyEntry>>,
}

pub struct JsonFileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn fail(&self, reason: impl std::fmt::Display) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn load_recency(&self) -> Result<RecencySnapshot> {
        let txt = match tokio::fs::read_to_string(&self.path).await {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecencySnapshot::new()),
            Err(e) => return Err(self.fail(e)),
        };
        if txt.trim().is_empty() {
            return Ok(RecencySnapshot::new());
        }

        let file: RecencyFile = serde_json::from_str(&txt).map_err(|e| self.fail(e))?;
        let mut out = RecencySnapshot::new();
        for (key, entries) in file.senders {
            match key.parse::<i64>() {
                Ok(id) => {
                    out.insert(UserId(id), entries);
                }
                Err(_) => {
                    // Older files kept one shared list; it has no owner to restore to.
                    tracing::warn!(key = %key, "skipping recency list without a sender id");
                }
            }
        }
        Ok(out)
    }

    async fn save_recency(&self, snapshot: &RecencySnapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let file = RecencyFile {
            version: FILE_VERSION,
            senders: snapshot
                .iter()
                .map(|(k, v)| (k.0.to_string(), v.clone()))
                .collect(),
        };
        let txt = serde_json::to_string_pretty(&file)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.fail(e))?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, txt)
            .await
            .map_err(|e| self.fail(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(())
    }
}
