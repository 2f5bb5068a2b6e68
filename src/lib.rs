//! Screen lifecycle and stack navigation for Room hosts.
//!
//! A [`ViewController`] owns one screen's [`View`], creates it lazily, and
//! turns layout signals from the rendering engine into `on_create`,
//! `on_start` and `on_stop` callbacks. A [`StackController`] keeps controllers
//! in push/pop order and decides which of their views is visible.

pub mod error;
pub mod logging;
pub mod metrics;
pub mod navigation;
pub mod view;

pub use error::{NavigationError, Result};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, NavigationMetrics};
pub use navigation::audit::{
    BufferedAudit, NavigationAudit, NavigationAuditEvent, NavigationAuditEventBuilder,
    NavigationAuditStage, NullNavigationAudit,
};
pub use navigation::controller::{
    BackHandler, LifecycleEvent, LifecycleListener, LifecycleState, ViewController, ViewFactory,
};
pub use navigation::diagnostics::{
    LifecycleLoggerListener, emit_metrics_snapshot, metrics_snapshot,
};
pub use navigation::stack::StackController;
pub use navigation::{NavigationConfig, OwnerContext};
pub use view::{LayoutObserver, LayoutSubscription, View, ViewId, ViewKind, Visibility};
