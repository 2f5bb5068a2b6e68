//! Audit hooks for lifecycle and stack transitions.
//!
//! Every transition that reaches a listener, and every structural stack change,
//! produces one [`NavigationAuditEvent`]. Sinks can buffer, forward, or drop
//! them; the default sink drops them.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationAuditStage {
    /// A controller materialized its view and fired `on_create`.
    Created,
    /// A controller became effectively visible.
    Started,
    /// A started controller became hidden.
    Stopped,
    /// A controller joined a stack.
    Pushed,
    /// A controller left a stack.
    Popped,
    /// A back request was consumed.
    BackHandled,
}

#[derive(Debug, Clone)]
pub struct NavigationAuditEvent {
    pub timestamp: SystemTime,
    pub stage: NavigationAuditStage,
    pub controller: String,
    pub details: Vec<(String, Value)>,
}

pub struct NavigationAuditEventBuilder {
    event: NavigationAuditEvent,
}

impl NavigationAuditEventBuilder {
    pub fn new(stage: NavigationAuditStage, controller: impl Into<String>) -> Self {
        Self {
            event: NavigationAuditEvent {
                timestamp: SystemTime::now(),
                stage,
                controller: controller.into(),
                details: Vec::new(),
            },
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> NavigationAuditEvent {
        self.event
    }
}

pub trait NavigationAudit: Send + Sync {
    fn record(&self, event: NavigationAuditEvent);
}

#[derive(Debug, Default)]
pub struct NullNavigationAudit;

impl NavigationAudit for NullNavigationAudit {
    fn record(&self, _event: NavigationAuditEvent) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct BufferedAudit {
    events: Mutex<Vec<NavigationAuditEvent>>,
}

impl BufferedAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NavigationAuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// `(stage, controller id)` pairs, convenient for ordering assertions.
    pub fn trail(&self) -> Vec<(NavigationAuditStage, String)> {
        self.events()
            .into_iter()
            .map(|event| (event.stage, event.controller))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

impl NavigationAudit for BufferedAudit {
    fn record(&self, event: NavigationAuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffered_audit_keeps_order() {
        let audit = BufferedAudit::new();
        audit.record(NavigationAuditEventBuilder::new(NavigationAuditStage::Pushed, "a").finish());
        audit.record(
            NavigationAuditEventBuilder::new(NavigationAuditStage::Popped, "a")
                .detail("remaining", json!(0))
                .finish(),
        );
        assert_eq!(
            audit.trail(),
            vec![
                (NavigationAuditStage::Pushed, "a".to_string()),
                (NavigationAuditStage::Popped, "a".to_string()),
            ]
        );
        assert_eq!(audit.events()[1].details[0].1, json!(0));
        audit.clear();
        assert!(audit.events().is_empty());
    }
}
