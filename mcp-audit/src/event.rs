//! The append-only audit event shape.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AuthSuccess,
    AuthFailure,
    AuthzGranted,
    AuthzDenied,
    CodeExec,
    GraphWrite,
    GraphRead,
    SecurityViolation,
    RateLimited,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AuthSuccess => "auth_success",
            EventType::AuthFailure => "auth_failure",
            EventType::AuthzGranted => "authz_granted",
            EventType::AuthzDenied => "authz_denied",
            EventType::CodeExec => "code_exec",
            EventType::GraphWrite => "graph_write",
            EventType::GraphRead => "graph_read",
            EventType::SecurityViolation => "security_violation",
            EventType::RateLimited => "rate_limited",
        }
    }

    /// Security-relevant by default; only a handful of types are routine.
    pub fn default_severity(&self) -> Severity {
        match self {
            EventType::AuthFailure | EventType::AuthzDenied | EventType::SecurityViolation => {
                Severity::Warning
            }
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub correlation_id: String,
    pub severity: Severity,
    pub attributes: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(event_type: EventType, correlation_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity: event_type.default_severity(),
            event_type,
            timestamp: Utc::now(),
            user_id: None,
            correlation_id: correlation_id.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_relevant_failures_default_to_warning() {
        assert_eq!(EventType::AuthFailure.default_severity(), Severity::Warning);
        assert_eq!(EventType::AuthzDenied.default_severity(), Severity::Warning);
        assert_eq!(EventType::SecurityViolation.default_severity(), Severity::Warning);
    }

    #[test]
    fn routine_events_default_to_info() {
        assert_eq!(EventType::AuthSuccess.default_severity(), Severity::Info);
        assert_eq!(EventType::CodeExec.default_severity(), Severity::Info);
    }

    #[test]
    fn builder_sets_user_and_attributes() {
        let event = AuditEvent::new(EventType::CodeExec, "req-1")
            .with_user("user-1")
            .with_attribute("cache_hit", true);
        assert_eq!(event.user_id.as_deref(), Some("user-1"));
        assert_eq!(event.attributes.get("cache_hit"), Some(&Value::Bool(true)));
        assert_eq!(event.correlation_id, "req-1");
    }
}
