use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;

/// Counters accumulated by controllers and stacks sharing a config.
#[derive(Debug, Default, Clone)]
pub struct NavigationMetrics {
    views_created: u64,
    layout_signals: u64,
    starts: u64,
    stops: u64,
    pushes: u64,
    pops: u64,
}

impl NavigationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_view_created(&mut self) {
        self.views_created = self.views_created.saturating_add(1);
    }

    pub fn record_layout_signal(&mut self) {
        self.layout_signals = self.layout_signals.saturating_add(1);
    }

    pub fn record_start(&mut self) {
        self.starts = self.starts.saturating_add(1);
    }

    pub fn record_stop(&mut self) {
        self.stops = self.stops.saturating_add(1);
    }

    pub fn record_push(&mut self) {
        self.pushes = self.pushes.saturating_add(1);
    }

    pub fn record_pop(&mut self) {
        self.pops = self.pops.saturating_add(1);
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            views_created: self.views_created,
            layout_signals: self.layout_signals,
            starts: self.starts,
            stops: self.stops,
            pushes: self.pushes,
            pops: self.pops,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub views_created: u64,
    pub layout_signals: u64,
    pub starts: u64,
    pub stops: u64,
    pub pushes: u64,
    pub pops: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("views_created".to_string(), json!(self.views_created));
        map.insert("layout_signals".to_string(), json!(self.layout_signals));
        map.insert("starts".to_string(), json!(self.starts));
        map.insert("stops".to_string(), json!(self.stops));
        map.insert("pushes".to_string(), json!(self.pushes));
        map.insert("pops".to_string(), json!(self.pops));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        let mut event = LogEvent::new(LogLevel::Info, target, "navigation_metrics");
        event.fields = self.as_fields();
        event
    }
}
