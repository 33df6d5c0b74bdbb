//! Audit logging: tamper-evident, hash-chained record of configuration
//! changes. Implements `AuditSink` so it can be handed to the stores.

use chrono::{DateTime, Utc};
use confgate_core::audit::{AuditEntry, AuditSink};
use confgate_core::error::AuditError;
use confgate_core::types::TenantScope;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

/// An audit entry after it has been sequenced and chained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub sequence: u64,
    pub entry: AuditEntry,
    /// SHA-256 hash of this event's content.
    pub event_hash: String,
    /// Hash of the previous event in the chain (`genesis` for the first).
    pub previous_hash: String,
}

struct Chain {
    events: Vec<AuditEvent>,
    last_hash: String,
}

/// Append-only audit log with hash chaining.
pub struct AuditLogger {
    chain: Mutex<Chain>,
    capacity: usize,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create an empty log that keeps every event.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Create a log that refuses new events once `capacity` are stored.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chain: Mutex::new(Chain {
                events: Vec::new(),
                last_hash: GENESIS.to_string(),
            }),
            capacity,
        }
    }

    /// Append an entry, assigning its sequence number and chain hash.
    pub fn append(&self, entry: AuditEntry) -> Result<AuditEvent, AuditError> {
        let mut chain = self.chain.lock();
        if chain.events.len() >= self.capacity {
            return Err(AuditError(format!(
                "audit log full ({} events)",
                self.capacity
            )));
        }

        let sequence = chain.events.len() as u64 + 1;
        let previous_hash = chain.last_hash.clone();
        let event_hash = sha256_hex(&chain_content(sequence, &entry, &previous_hash));
        let event = AuditEvent {
            id: Uuid::new_v4(),
            sequence,
            entry,
            event_hash: event_hash.clone(),
            previous_hash,
        };

        info!(
            event_id = %event.id,
            sequence,
            action = %event.entry.action,
            entity = %event.entry.entity,
            scope = %event.entry.scope,
            "Audit event logged (hash-chained)"
        );
        chain.last_hash = event_hash;
        chain.events.push(event.clone());
        Ok(event)
    }

    pub fn len(&self) -> usize {
        self.chain.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.lock().events.is_empty()
    }

    /// Verify the integrity of the audit chain.
    pub fn verify_chain(&self) -> ChainVerification {
        let chain = self.chain.lock();
        verify(&chain.events)
    }

    /// Events for a scope with optional time range and action filter,
    /// newest first.
    pub fn query(
        &self,
        scope: &TenantScope,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        action: Option<&str>,
        limit: usize,
    ) -> Vec<AuditEvent> {
        let chain = self.chain.lock();
        let mut results: Vec<AuditEvent> = chain
            .events
            .iter()
            .filter(|ev| {
                let e = &ev.entry;
                e.scope == *scope
                    && from.map_or(true, |f| e.timestamp >= f)
                    && to.map_or(true, |t| e.timestamp <= t)
                    && action.map_or(true, |a| e.action == a)
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        results.truncate(limit);
        results
    }

    /// Snapshot of every event in sequence order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.chain.lock().events.clone()
    }
}

impl AuditSink for AuditLogger {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.append(entry).map(|_| ())
    }
}

/// Result of verifying the audit chain integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub total_events: usize,
    pub valid_events: usize,
    pub tampered_sequences: Vec<u64>,
    pub chain_intact: bool,
}

const GENESIS: &str = "genesis";

fn verify(events: &[AuditEvent]) -> ChainVerification {
    let mut valid = 0;
    let mut tampered = Vec::new();
    let mut expected_prev = GENESIS.to_string();

    for event in events {
        let expected_hash = sha256_hex(&chain_content(
            event.sequence,
            &event.entry,
            &event.previous_hash,
        ));
        if event.previous_hash == expected_prev && expected_hash == event.event_hash {
            valid += 1;
        } else {
            tampered.push(event.sequence);
        }
        expected_prev = event.event_hash.clone();
    }

    ChainVerification {
        total_events: events.len(),
        valid_events: valid,
        tampered_sequences: tampered,
        chain_intact: valid == events.len(),
    }
}

/// Content covered by an event hash: sequence, actor, action, entity,
/// scope, metadata, timestamp and the previous hash.
fn chain_content(sequence: u64, entry: &AuditEntry, previous_hash: &str) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}:{}:{}",
        sequence,
        entry.actor.as_deref().unwrap_or(""),
        entry.action,
        entry.entity,
        entry.entity_id.as_deref().unwrap_or(""),
        entry.scope,
        entry.metadata,
        entry.timestamp.to_rfc3339(),
        previous_hash,
    )
}

/// Compute SHA-256 hex digest.
fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
