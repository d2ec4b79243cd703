//! Telemetry Module for the type guard
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use log::{info, warn};
use serde::Serialize;

/// Audit event types
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Push body passed through the rewriter
    PushRewritten,
    /// Request was not a text format push and was left alone
    PushSkipped,
    /// Plugin configuration rejected, previous configuration kept
    ConfigRejected,
}

/// Audit event for logging
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event type
    pub event_type: AuditEventType,
    /// Envoy context id of the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u32>,
    /// Request path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Body bytes received from the pusher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_in: Option<u64>,
    /// Body bytes forwarded to the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_out: Option<u64>,
    /// `# TYPE` lines neutralized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_lines_neutralized: Option<u64>,
    /// Size of the injected preamble
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble_bytes: Option<u64>,
    /// Reason for action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            request_id: None,
            path: None,
            bytes_in: None,
            bytes_out: None,
            type_lines_neutralized: None,
            preamble_bytes: None,
            reason: None,
        }
    }

    pub fn with_request_id(mut self, id: u32) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                AuditEventType::ConfigRejected => warn!("[TYPE-GUARD-AUDIT] {}", json),
                _ => info!("[TYPE-GUARD-AUDIT] {}", json),
            },
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
            }
        }
    }
}

/// Byte and rewrite counts of one push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub type_lines_neutralized: u64,
    pub preamble_bytes: u64,
}

/// Create a rewritten push audit event
pub fn audit_rewritten(stats: PushStats) -> AuditEvent {
    let mut event = AuditEvent::new(AuditEventType::PushRewritten);
    event.bytes_in = Some(stats.bytes_in);
    event.bytes_out = Some(stats.bytes_out);
    event.type_lines_neutralized = Some(stats.type_lines_neutralized);
    event.preamble_bytes = Some(stats.preamble_bytes);
    event
}

/// Create a skipped request audit event
pub fn audit_skipped(reason: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::PushSkipped).with_reason(reason)
}

/// Create a rejected configuration audit event
pub fn audit_config_rejected(error: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::ConfigRejected).with_reason(error)
}
