use serde_json::json;

use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::MetricSnapshot;

use super::OwnerContext;
use super::controller::LifecycleListener;

/// Listener that writes every callback it receives to a logger.
///
/// Useful as a stand-in while a screen has no real listener yet, or to
/// compare what a listener saw with what the controller logged.
pub struct LifecycleLoggerListener {
    logger: Logger,
    controller: String,
    level: LogLevel,
    target: String,
}

impl LifecycleLoggerListener {
    pub fn new(logger: Logger, controller: impl Into<String>) -> Self {
        Self {
            logger,
            controller: controller.into(),
            level: LogLevel::Info,
            target: "room_nav::listener".to_string(),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    fn emit(&self, message: &str) {
        let event = event_with_fields(
            self.level,
            &self.target,
            message,
            [json_kv("controller", json!(self.controller))],
        );
        let _ = self.logger.log_event(event);
    }
}

impl LifecycleListener for LifecycleLoggerListener {
    fn on_create(&self) {
        self.emit("on_create");
    }

    fn on_start(&self) {
        self.emit("on_start");
    }

    fn on_stop(&self) {
        self.emit("on_stop");
    }
}

/// Current counters of `context`, or `None` when metrics are disabled.
pub fn metrics_snapshot(context: &OwnerContext) -> Option<MetricSnapshot> {
    let metrics = context.config().metrics.as_ref()?;
    metrics.lock().ok().map(|guard| guard.snapshot())
}

/// Log the current counters of `context` through its logger.
pub fn emit_metrics_snapshot(context: &OwnerContext, target: &str) {
    if let (Some(logger), Some(snapshot)) =
        (context.config().logger.as_ref(), metrics_snapshot(context))
    {
        let _ = logger.log_event(snapshot.to_log_event(target));
    }
}
