//! Audit collaborator: fire-and-forget record of configuration writes.
//!
//! Services accept an `Arc<dyn AuditSink>` and call `record` after a write
//! has committed. A failing sink is logged by the caller and never fails the
//! write.

use crate::error::AuditError;
use crate::types::TenantScope;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One configuration change as reported to the audit collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Option<String>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub scope: TenantScope,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: Option<&str>,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: Option<&str>,
        scope: &TenantScope,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            actor: actor.map(str::to_string),
            action: action.into(),
            entity: entity.into(),
            entity_id: entity_id.map(str::to_string),
            scope: scope.clone(),
            metadata,
            timestamp: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Sink that drops every entry.
pub struct NoOpAuditSink;

impl AuditSink for NoOpAuditSink {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Ok(())
    }
}

/// In-memory sink that captures entries for testing.
#[derive(Default)]
pub struct CaptureAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl CaptureAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn count_action(&self, action: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl AuditSink for CaptureAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = CaptureAuditSink::new();
        for action in ["setting.update", "setting.update", "module.update"] {
            sink.record(AuditEntry::new(
                Some("ops"),
                action,
                "setting",
                Some("smtp_host"),
                &TenantScope::Global,
                serde_json::json!({}),
            ))
            .unwrap();
        }
        assert_eq!(sink.count(), 3);
        assert_eq!(sink.count_action("setting.update"), 2);

        sink.clear();
        assert_eq!(sink.count(), 0);
    }
}
