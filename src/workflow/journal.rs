// SPDX-License-Identifier: MIT
//! Best-effort daily message journal.
//!
//! One JSON line per message, appended to `messages-YYYY-MM-DD.jsonl` under
//! the logs directory. The file handle is cached until the calendar day
//! rolls over. Write failures are logged at WARN and never propagated — a
//! broken journal must not interrupt a workflow. A missing or corrupt file
//! simply reads as a fresh log.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;

use super::coordinator::AgentMessage;

pub struct MessageJournal {
    dir: PathBuf,
    /// Cached, open handle plus the day key it was opened for; `None` until
    /// the first write.
    file: Mutex<Option<(String, tokio::fs::File)>>,
}

impl MessageJournal {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: logs_dir.into(),
            file: Mutex::new(None),
        }
    }

    pub fn file_name(day: NaiveDate) -> String {
        format!("messages-{}.jsonl", day.format("%Y-%m-%d"))
    }

    /// Append one message. Errors are logged and swallowed.
    pub async fn append(&self, message: &AgentMessage) {
        if let Err(e) = self.try_append(message).await {
            warn!(err = %e, "message journal write failed");
        }
    }

    async fn try_append(&self, message: &AgentMessage) -> Result<()> {
        let line = serde_json::to_string(message)? + "\n";
        let day = Utc::now().date_naive();
        let day_key = day.format("%Y-%m-%d").to_string();

        let mut guard = self.file.lock().await;

        // Re-open when the day rolls over (or on the first write).
        let stale = guard.as_ref().map(|(k, _)| k != &day_key).unwrap_or(true);
        if stale {
            tokio::fs::create_dir_all(&self.dir).await?;
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.dir.join(Self::file_name(day)))
                .await?;
            *guard = Some((day_key, f));
        }

        guard.as_mut().unwrap().1.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Read back one day's messages. Missing file yields an empty log;
    /// corrupt lines are counted and skipped.
    pub async fn read_day(&self, day: NaiveDate) -> Vec<AgentMessage> {
        let path = self.dir.join(Self::file_name(day));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };

        let mut messages = Vec::new();
        let mut skipped = 0usize;
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AgentMessage>(line) {
                Ok(m) => messages.push(m),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, path = %path.display(), "corrupt journal lines skipped");
        }
        messages
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::coordinator::MessageKind;

    fn message(payload: &str) -> AgentMessage {
        AgentMessage {
            id: format!("id-{payload}"),
            from: "workflow".to_string(),
            to: "planner".to_string(),
            kind: MessageKind::Request,
            payload: payload.to_string(),
            timestamp: 42,
        }
    }

    #[tokio::test]
    async fn appends_one_json_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let journal = MessageJournal::new(dir.path());
        journal.append(&message("first")).await;
        journal.append(&message("second")).await;

        let today = Utc::now().date_naive();
        let content = tokio::fs::read_to_string(dir.path().join(MessageJournal::file_name(today)))
            .await
            .unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"payload\":\"first\""));
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn read_day_round_trips_and_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = MessageJournal::new(dir.path());
        journal.append(&message("kept")).await;

        // Corrupt the file by hand, then append another good line.
        let today = Utc::now().date_naive();
        let path = dir.path().join(MessageJournal::file_name(today));
        let mut content = tokio::fs::read_to_string(&path).await.unwrap();
        content.push_str("{not json at all\n");
        tokio::fs::write(&path, content).await.unwrap();
        journal.append(&message("also kept")).await;

        let messages = journal.read_day(today).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload, "kept");
        assert_eq!(messages[1].payload, "also kept");
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = MessageJournal::new(dir.path());
        let messages = journal.read_day(Utc::now().date_naive()).await;
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // Block the journal directory with a plain file of the same name.
        let blocked = dir.path().join("logs");
        tokio::fs::write(&blocked, "in the way").await.unwrap();

        let journal = MessageJournal::new(&blocked);
        journal.append(&message("dropped")).await;
        assert!(journal.read_day(Utc::now().date_naive()).await.is_empty());
    }
}
