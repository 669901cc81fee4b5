// SPDX-License-Identifier: MIT
//! Message log between pipeline stages.
//!
//! One ordered, append-only, in-memory log owned by the coordinator.
//! Point-to-point `send`/`receive`, `broadcast` to every registered agent,
//! and `history` reads. Every send is mirrored to the daily journal when one
//! is attached; journal failures never abort a workflow.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::journal::MessageJournal;

// ─── Message model ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Completion,
    Error,
}

/// One entry in the coordinator's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// Assigned by the coordinator on first send; empty in a draft.
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: MessageKind,
    pub payload: String,
    /// Unix millis, stamped by the coordinator. Non-decreasing within a log.
    pub timestamp: i64,
}

impl AgentMessage {
    /// An unstamped draft. `send` assigns the id and timestamp.
    pub fn draft(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageKind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            from: from.into(),
            to: to.into(),
            kind,
            payload: payload.into(),
            timestamp: 0,
        }
    }

    fn is_stamped(&self) -> bool {
        !self.id.is_empty() && self.timestamp > 0
    }
}

// ─── Coordinator ──────────────────────────────────────────────────────────────

/// Sole owner of the workflow message log. Single-writer in practice (one
/// workflow run at a time), so ordered append is the only discipline needed.
pub struct WorkflowCoordinator {
    agents: Vec<String>,
    log: Vec<AgentMessage>,
    /// Stamping ratchet: fresh timestamps never go backwards.
    last_timestamp: i64,
    journal: Option<MessageJournal>,
}

impl WorkflowCoordinator {
    pub fn new(agents: Vec<String>) -> Self {
        Self {
            agents,
            log: Vec::new(),
            last_timestamp: 0,
            journal: None,
        }
    }

    /// Attach a daily journal; every subsequent send is mirrored to it.
    pub fn with_journal(mut self, journal: MessageJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    /// Append one message to the log and mirror it to the journal.
    ///
    /// Stamping is idempotent: a draft gets a fresh id and a clamped
    /// timestamp; a message that already carries both keeps them unchanged.
    /// Returns the message as logged.
    pub async fn send(&mut self, message: AgentMessage) -> AgentMessage {
        let stamped = self.stamp(message);
        self.log.push(stamped.clone());
        if let Some(journal) = &self.journal {
            journal.append(&stamped).await;
        }
        debug!(
            from = %stamped.from,
            to = %stamped.to,
            kind = ?stamped.kind,
            "message logged"
        );
        stamped
    }

    /// Fan `payload` out to every registered agent name, the sender included
    /// when it is itself a registered agent.
    pub async fn broadcast(
        &mut self,
        from: &str,
        kind: MessageKind,
        payload: &str,
    ) -> Vec<AgentMessage> {
        let recipients: Vec<String> = self.agents.clone();
        let mut sent = Vec::with_capacity(recipients.len());
        for to in recipients {
            sent.push(self.send(AgentMessage::draft(from, &to, kind, payload)).await);
        }
        sent
    }

    /// The most recent message addressed to `agent`.
    pub fn receive(&self, agent: &str) -> Option<&AgentMessage> {
        self.log.iter().rev().find(|m| m.to == agent)
    }

    /// Messages involving `agent` (as sender or recipient), or the whole log.
    pub fn history(&self, agent: Option<&str>) -> Vec<&AgentMessage> {
        match agent {
            None => self.log.iter().collect(),
            Some(name) => self
                .log
                .iter()
                .filter(|m| m.from == name || m.to == name)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    fn stamp(&mut self, mut message: AgentMessage) -> AgentMessage {
        if message.is_stamped() {
            // Re-sent messages keep their stamp, but the ratchet still
            // advances so later fresh stamps stay non-decreasing.
            self.last_timestamp = self.last_timestamp.max(message.timestamp);
            return message;
        }
        let stamped_at = Utc::now().timestamp_millis().max(self.last_timestamp);
        self.last_timestamp = stamped_at;
        message.id = Uuid::new_v4().to_string();
        message.timestamp = stamped_at;
        message
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> WorkflowCoordinator {
        WorkflowCoordinator::new(vec![
            "planner".to_string(),
            "implementer".to_string(),
            "reviewer".to_string(),
        ])
    }

    #[tokio::test]
    async fn send_stamps_a_draft_exactly_once() {
        let mut c = coordinator();
        let draft = AgentMessage::draft("workflow", "planner", MessageKind::Request, "plan it");
        assert!(draft.id.is_empty());

        let stamped = c.send(draft).await;
        assert!(!stamped.id.is_empty());
        assert!(stamped.timestamp > 0);

        // Re-sending the stamped message keeps id and timestamp.
        let resent = c.send(stamped.clone()).await;
        assert_eq!(resent.id, stamped.id);
        assert_eq!(resent.timestamp, stamped.timestamp);
        assert_eq!(c.len(), 2);
    }

    #[tokio::test]
    async fn timestamps_never_decrease() {
        let mut c = coordinator();
        for i in 0..20 {
            c.send(AgentMessage::draft(
                "workflow",
                "planner",
                MessageKind::Request,
                format!("msg {i}"),
            ))
            .await;
        }
        let stamps: Vec<i64> = c.history(None).iter().map(|m| m.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn receive_returns_the_most_recent_message_to_an_agent() {
        let mut c = coordinator();
        c.send(AgentMessage::draft("workflow", "planner", MessageKind::Request, "first"))
            .await;
        c.send(AgentMessage::draft("workflow", "reviewer", MessageKind::Request, "other"))
            .await;
        c.send(AgentMessage::draft("workflow", "planner", MessageKind::Request, "second"))
            .await;

        let latest = c.receive("planner").unwrap();
        assert_eq!(latest.payload, "second");
        assert!(c.receive("nobody").is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_agent() {
        let mut c = coordinator();
        let sent = c
            .broadcast("planner", MessageKind::Completion, "plan ready")
            .await;

        // Fans out to the full registered list — the sender gets its own
        // copy too.
        let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(recipients, vec!["planner", "implementer", "reviewer"]);
        assert!(sent.iter().all(|m| m.from == "planner"));
    }

    #[tokio::test]
    async fn history_filters_by_participant() {
        let mut c = coordinator();
        c.send(AgentMessage::draft("workflow", "planner", MessageKind::Request, "a"))
            .await;
        c.send(AgentMessage::draft("planner", "workflow", MessageKind::Completion, "b"))
            .await;
        c.send(AgentMessage::draft("workflow", "reviewer", MessageKind::Request, "c"))
            .await;

        assert_eq!(c.history(None).len(), 3);
        assert_eq!(c.history(Some("planner")).len(), 2);
        assert_eq!(c.history(Some("reviewer")).len(), 1);
        assert!(c.history(Some("nobody")).is_empty());
    }

    #[test]
    fn messages_serialize_to_camel_case_json() {
        let m = AgentMessage {
            id: "m-1".to_string(),
            from: "workflow".to_string(),
            to: "planner".to_string(),
            kind: MessageKind::Completion,
            payload: "done".to_string(),
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"kind\":\"completion\""));
        assert!(json.contains("\"timestamp\":1700000000000"));
        assert!(json.contains("\"from\":\"workflow\""));
    }
}
