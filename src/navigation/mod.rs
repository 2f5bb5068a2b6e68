use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::logging::{LogLevel, Logger, event_with_fields};
use crate::metrics::NavigationMetrics;

pub mod audit;
pub mod controller;
pub mod diagnostics;
pub mod stack;

use audit::{NavigationAudit, NavigationAuditEvent, NullNavigationAudit};

/// Observability knobs shared by every controller created from one context.
#[derive(Clone)]
pub struct NavigationConfig {
    /// Optional structured logger for lifecycle and stack events.
    pub logger: Option<Logger>,
    /// Metrics accumulator; `None` disables counting.
    pub metrics: Option<Arc<Mutex<NavigationMetrics>>>,
    /// Audit sink receiving one record per lifecycle or stack transition.
    pub audit: Arc<dyn NavigationAudit>,
    /// Level used for per-transition log lines.
    pub lifecycle_level: LogLevel,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics: None,
            audit: Arc::new(NullNavigationAudit),
            lifecycle_level: LogLevel::Debug,
        }
    }
}

impl NavigationConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn NavigationAudit>) -> Self {
        self.audit = audit;
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(NavigationMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<NavigationMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

struct ContextInner {
    name: String,
    config: NavigationConfig,
}

/// Opaque handle to the hosting environment (window or activity equivalent).
///
/// Immutable once built. Clones share identity; two separately constructed
/// contexts never compare equal, even with the same name.
#[derive(Clone)]
pub struct OwnerContext {
    inner: Arc<ContextInner>,
}

impl OwnerContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, NavigationConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: NavigationConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                config,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.inner.config
    }

    pub fn ptr_eq(&self, other: &OwnerContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn log<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.inner.config.logger.as_ref() {
            if logger.enabled(level) {
                let event = event_with_fields(level, target, message, fields);
                let _ = logger.log_event(event);
            }
        }
    }

    pub(crate) fn record_metrics(&self, record: impl FnOnce(&mut NavigationMetrics)) {
        if let Some(metrics) = self.inner.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut guard);
            }
        }
    }

    pub(crate) fn audit(&self, event: NavigationAuditEvent) {
        self.inner.config.audit.record(event);
    }
}

impl PartialEq for OwnerContext {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for OwnerContext {}

impl fmt::Debug for OwnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerContext")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
