use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::json;

use crate::logging::{LogLevel, json_kv};
use crate::view::{LayoutSubscription, View};

use super::OwnerContext;
use super::audit::{NavigationAuditEventBuilder, NavigationAuditStage};
use super::stack::{StackController, StackInner};

const LOG_TARGET: &str = "room_nav::controller";

/// Receives lifecycle transitions of one controller.
///
/// Callbacks run synchronously on the thread that delivered the layout signal,
/// after the controller released its internal state. A callback that triggers
/// another layout pass re-enters the state machine before returning; avoid it.
pub trait LifecycleListener: Send + Sync {
    fn on_create(&self);
    fn on_start(&self);
    fn on_stop(&self);
}

/// Builds the view a controller owns. Called at most once per controller.
pub type ViewFactory = Arc<dyn Fn(&OwnerContext) -> View + Send + Sync>;

/// Answers whether a back request was consumed.
pub type BackHandler = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    NotCreated,
    Stopped,
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Create,
    Start,
    Stop,
}

impl LifecycleState {
    pub fn on_view_created(self) -> (LifecycleState, Option<LifecycleEvent>) {
        match self {
            LifecycleState::NotCreated => (LifecycleState::Stopped, Some(LifecycleEvent::Create)),
            other => (other, None),
        }
    }

    /// Next state for one layout signal observing `visible`.
    ///
    /// Emits at most one event; redundant signals emit nothing, so `Start`
    /// and `Stop` always alternate.
    pub fn on_layout(self, visible: bool) -> (LifecycleState, Option<LifecycleEvent>) {
        match (self, visible) {
            (Self::NotCreated, _) => (self, None),
            (Self::Stopped, true) => (Self::Started, Some(LifecycleEvent::Start)),
            (Self::Started, false) => (Self::Stopped, Some(LifecycleEvent::Stop)),
            _ => (self, None),
        }
    }
}

impl LifecycleEvent {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleEvent::Create => "create",
            LifecycleEvent::Start => "start",
            LifecycleEvent::Stop => "stop",
        }
    }

    fn deliver(self, listener: &dyn LifecycleListener) {
        match self {
            LifecycleEvent::Create => listener.on_create(),
            LifecycleEvent::Start => listener.on_start(),
            LifecycleEvent::Stop => listener.on_stop(),
        }
    }

    fn audit_stage(self) -> NavigationAuditStage {
        match self {
            LifecycleEvent::Create => NavigationAuditStage::Created,
            LifecycleEvent::Start => NavigationAuditStage::Started,
            LifecycleEvent::Stop => NavigationAuditStage::Stopped,
        }
    }
}

#[derive(Default)]
struct ControllerState {
    view: Option<View>,
    _subscription: Option<LayoutSubscription>,
    lifecycle: LifecycleState,
    listener: Option<Weak<dyn LifecycleListener>>,
    stack: Weak<StackInner>,
}

struct ControllerCore {
    id: String,
    context: OwnerContext,
    factory: ViewFactory,
    /// Held across the factory call so concurrent first accesses build one view.
    creation: Mutex<()>,
    back_handler: Mutex<Option<BackHandler>>,
    state: Mutex<ControllerState>,
}

/// Owns one screen's view and turns layout signals into lifecycle callbacks.
///
/// Cloning yields another handle to the same controller. The layout
/// subscription is released when the last handle drops.
#[derive(Clone)]
pub struct ViewController {
    core: Arc<ControllerCore>,
}

impl ViewController {
    /// Controller whose view is a plain view bound to `context`.
    pub fn new(context: &OwnerContext, id: impl Into<String>) -> Self {
        Self::with_factory(context, id, Arc::new(View::new))
    }

    pub fn with_factory(
        context: &OwnerContext,
        id: impl Into<String>,
        factory: ViewFactory,
    ) -> Self {
        Self {
            core: Arc::new(ControllerCore {
                id: id.into(),
                context: context.clone(),
                factory,
                creation: Mutex::new(()),
                back_handler: Mutex::new(None),
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    pub fn with_back_handler<F>(self, handler: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        *lock(&self.core.back_handler) = Some(Arc::new(handler));
        self
    }

    pub fn id(&self) -> &str {
        &self.core.id
    }

    /// The hosting context supplied at construction.
    pub fn context(&self) -> &OwnerContext {
        &self.core.context
    }

    pub fn ptr_eq(&self, other: &ViewController) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.state().lifecycle
    }

    pub fn is_view_created(&self) -> bool {
        self.state().view.is_some()
    }

    /// The owned view, created through the factory on first access.
    ///
    /// Creation subscribes to the view's layout signals and fires `on_create`.
    /// The factory must not call back into this controller's `view`.
    pub fn view(&self) -> View {
        if let Some(view) = self.existing_view() {
            return view;
        }

        let (view, event, listener) = {
            let _creating = lock(&self.core.creation);
            if let Some(existing) = self.existing_view() {
                return existing;
            }
            let created = (self.core.factory)(&self.core.context);
            let mut state = self.state();
            if let Some(existing) = state.view.clone() {
                return existing;
            }
            let weak = Arc::downgrade(&self.core);
            state._subscription = Some(created.observer().subscribe(move || {
                if let Some(core) = weak.upgrade() {
                    ViewController { core }.on_global_layout();
                }
            }));
            state.view = Some(created.clone());
            let (next, event) = state.lifecycle.on_view_created();
            state.lifecycle = next;
            (created, event, state.listener.clone())
        };

        self.core.context.record_metrics(|m| m.record_view_created());
        self.core.context.log(
            LogLevel::Debug,
            LOG_TARGET,
            "view_created",
            [
                json_kv("controller", json!(self.core.id)),
                json_kv("view", json!(view.id().to_string())),
            ],
        );
        if let Some(event) = event {
            self.emit(event, listener);
        }
        view
    }

    pub(crate) fn existing_view(&self) -> Option<View> {
        self.state().view.clone()
    }

    /// The stack currently holding this controller, if any.
    pub fn stack_controller(&self) -> Option<StackController> {
        self.state().stack.upgrade().map(StackController::from_inner)
    }

    pub(crate) fn attach_to(&self, stack: Weak<StackInner>) {
        self.state().stack = stack;
    }

    pub(crate) fn detach_from_stack(&self) {
        self.state().stack = Weak::new();
    }

    /// Replace the listener. The controller keeps only a weak reference, and
    /// events that already fired are not replayed.
    pub fn set_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) {
        self.state().listener = Some(Arc::downgrade(listener));
    }

    pub fn clear_lifecycle_listener(&self) {
        self.state().listener = None;
    }

    /// Whether this controller consumed a back request. False unless a back
    /// handler was installed.
    pub fn handle_back(&self) -> bool {
        let handler = lock(&self.core.back_handler).clone();
        let consumed = handler.map(|handler| handler()).unwrap_or(false);
        if consumed {
            self.core.context.audit(
                NavigationAuditEventBuilder::new(NavigationAuditStage::BackHandled, self.id())
                    .finish(),
            );
        }
        consumed
    }

    fn on_global_layout(&self) {
        let Some(view) = self.existing_view() else {
            return;
        };
        let visible = view.is_effectively_visible();
        self.core.context.record_metrics(|m| m.record_layout_signal());

        let (event, listener) = {
            let mut state = self.state();
            let (next, event) = state.lifecycle.on_layout(visible);
            state.lifecycle = next;
            (event, state.listener.clone())
        };
        if let Some(event) = event {
            self.emit(event, listener);
        }
    }

    fn emit(&self, event: LifecycleEvent, listener: Option<Weak<dyn LifecycleListener>>) {
        let context = &self.core.context;
        match event {
            LifecycleEvent::Start => context.record_metrics(|m| m.record_start()),
            LifecycleEvent::Stop => context.record_metrics(|m| m.record_stop()),
            LifecycleEvent::Create => {}
        }
        context.log(
            context.config().lifecycle_level,
            LOG_TARGET,
            "lifecycle",
            [
                json_kv("controller", json!(self.core.id)),
                json_kv("event", json!(event.name())),
            ],
        );
        context.audit(NavigationAuditEventBuilder::new(event.audit_stage(), self.id()).finish());

        if let Some(listener) = listener.and_then(|weak| weak.upgrade()) {
            event.deliver(listener.as_ref());
        }
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        lock(&self.core.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PartialEq for ViewController {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ViewController {}

impl fmt::Debug for ViewController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewController")
            .field("id", &self.core.id)
            .field("lifecycle", &self.lifecycle_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::NavigationConfig;
    use crate::logging::{Logger, MemorySink};
    use crate::navigation::audit::BufferedAudit;
    use crate::view::{ViewKind, Visibility};

    /// Records callbacks in order.
    #[derive(Default)]
    pub(crate) struct RecordingListener {
        calls: Mutex<Vec<LifecycleEvent>>,
    }

    impl RecordingListener {
        pub(crate) fn attach(controller: &ViewController) -> Arc<RecordingListener> {
            let listener = Arc::new(RecordingListener::default());
            let shared: Arc<dyn LifecycleListener> = listener.clone();
            controller.set_lifecycle_listener(&shared);
            listener
        }

        pub(crate) fn calls(&self) -> Vec<LifecycleEvent> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, event: LifecycleEvent) -> usize {
            self.calls().into_iter().filter(|e| *e == event).count()
        }

        pub(crate) fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    impl LifecycleListener for RecordingListener {
        fn on_create(&self) {
            self.calls.lock().unwrap().push(LifecycleEvent::Create);
        }

        fn on_start(&self) {
            self.calls.lock().unwrap().push(LifecycleEvent::Start);
        }

        fn on_stop(&self) {
            self.calls.lock().unwrap().push(LifecycleEvent::Stop);
        }
    }

    fn controller(id: &str) -> (OwnerContext, ViewController) {
        let context = OwnerContext::new("activity");
        let controller = ViewController::new(&context, id);
        (context, controller)
    }

    #[test]
    fn holds_a_plain_view() {
        let (_, uut) = controller("uut");
        let view = uut.view();
        assert_eq!(view.kind(), ViewKind::Plain);
        assert!(uut.is_view_created());
    }

    #[test]
    fn view_is_created_once() {
        let (_, uut) = controller("uut");
        assert!(!uut.is_view_created());
        let first = uut.view();
        let second = uut.view();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.observer().subscriber_count(), 1);
    }

    #[test]
    fn holds_its_context() {
        let (context, uut) = controller("uut");
        assert_eq!(uut.context(), &context);
        assert_eq!(uut.view().context(), &context);
        assert_eq!(uut.id(), "uut");
    }

    #[test]
    fn factory_overrides_view_creation() {
        let context = OwnerContext::new("activity");
        let other = View::container(&context);
        let provided = other.clone();
        let factory: ViewFactory = Arc::new(move |_: &OwnerContext| provided.clone());
        let uut = ViewController::with_factory(&context, "custom", factory);
        assert!(uut.view().ptr_eq(&other));
    }

    #[test]
    fn concurrent_first_access_builds_one_view() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;
        use std::time::Duration;

        let context = OwnerContext::new("activity");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory: ViewFactory = Arc::new(move |ctx: &OwnerContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            View::new(ctx)
        });
        let uut = ViewController::with_factory(&context, "shared", factory);
        let listener = RecordingListener::attach(&uut);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let controller = uut.clone();
                thread::spawn(move || controller.view())
            })
            .collect();
        let views: Vec<View> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(views[0].ptr_eq(&views[1]));
        assert_eq!(listener.calls(), vec![LifecycleEvent::Create]);
        assert_eq!(views[0].observer().subscriber_count(), 1);
    }

    #[test]
    fn handle_back_defaults_to_false() {
        let (_, uut) = controller("uut");
        assert!(!uut.handle_back());
    }

    #[test]
    fn back_handler_decides() {
        let context = OwnerContext::new("activity");
        let uut = ViewController::new(&context, "modal").with_back_handler(|| true);
        assert!(uut.handle_back());
    }

    #[test]
    fn unattached_controller_has_no_stack() {
        let (_, uut) = controller("uut");
        assert!(uut.stack_controller().is_none());
    }

    #[test]
    fn no_calls_before_view_exists() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        assert!(listener.calls().is_empty());
        assert_eq!(uut.lifecycle_state(), LifecycleState::NotCreated);
    }

    #[test]
    fn on_create_fires_as_soon_as_view_exists() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        uut.view();
        uut.view();
        assert_eq!(listener.calls(), vec![LifecycleEvent::Create]);
        assert_eq!(uut.lifecycle_state(), LifecycleState::Stopped);
    }

    #[test]
    fn on_start_fires_when_visible() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        uut.view().dispatch_layout();
        assert_eq!(
            listener.calls(),
            vec![LifecycleEvent::Create, LifecycleEvent::Start]
        );
    }

    #[test]
    fn on_stop_fires_when_gone() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        let view = uut.view();
        view.dispatch_layout();
        view.set_visibility(Visibility::Gone);
        view.dispatch_layout();
        view.dispatch_layout();
        assert_eq!(listener.count(LifecycleEvent::Stop), 1);
        assert_eq!(uut.lifecycle_state(), LifecycleState::Stopped);
    }

    #[test]
    fn start_stop_cycles_alternate() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        let view = uut.view();
        listener.clear();

        for _ in 0..3 {
            view.set_visibility(Visibility::Visible);
            view.dispatch_layout();
            view.dispatch_layout();
            view.set_visibility(Visibility::Invisible);
            view.dispatch_layout();
            view.dispatch_layout();
        }

        let calls = listener.calls();
        assert_eq!(calls.len(), 6);
        for pair in calls.chunks(2) {
            assert_eq!(pair, [LifecycleEvent::Start, LifecycleEvent::Stop]);
        }
    }

    #[test]
    fn hidden_first_layout_does_not_start() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        let view = uut.view();
        view.set_visibility(Visibility::Invisible);
        view.dispatch_layout();
        assert_eq!(listener.calls(), vec![LifecycleEvent::Create]);
    }

    #[test]
    fn transition_table() {
        use LifecycleEvent::*;
        use LifecycleState::*;

        assert_eq!(NotCreated.on_layout(true), (NotCreated, None));
        assert_eq!(NotCreated.on_view_created(), (Stopped, Some(Create)));
        assert_eq!(Stopped.on_view_created(), (Stopped, None));
        assert_eq!(Stopped.on_layout(true), (Started, Some(Start)));
        assert_eq!(Stopped.on_layout(false), (Stopped, None));
        assert_eq!(Started.on_layout(true), (Started, None));
        assert_eq!(Started.on_layout(false), (Stopped, Some(Stop)));
    }

    #[test]
    fn replaced_listener_sees_only_later_events() {
        let (_, uut) = controller("controller");
        let first = RecordingListener::attach(&uut);
        let view = uut.view();
        let second = RecordingListener::attach(&uut);
        view.dispatch_layout();
        assert_eq!(first.calls(), vec![LifecycleEvent::Create]);
        assert_eq!(second.calls(), vec![LifecycleEvent::Start]);
    }

    #[test]
    fn listener_is_held_weakly() {
        let (_, uut) = controller("controller");
        let listener = RecordingListener::attach(&uut);
        let weak = Arc::downgrade(&listener);
        drop(listener);
        assert!(weak.upgrade().is_none());
        uut.view().dispatch_layout();
        assert_eq!(uut.lifecycle_state(), LifecycleState::Started);
    }

    #[test]
    fn dropping_controller_releases_subscription() {
        let (_, uut) = controller("controller");
        let view = uut.view();
        assert_eq!(view.observer().subscriber_count(), 1);
        drop(uut);
        assert_eq!(view.observer().subscriber_count(), 0);
        view.dispatch_layout();
    }

    #[test]
    fn transitions_reach_logger_metrics_and_audit() {
        let sink = Arc::new(MemorySink::new());
        let audit = Arc::new(BufferedAudit::new());
        let mut config = NavigationConfig::default()
            .with_logger(Logger::from_shared(sink.clone()))
            .with_audit(audit.clone());
        config.enable_metrics();
        let metrics = config.metrics_handle().unwrap();
        let context = OwnerContext::with_config("activity", config);

        let uut = ViewController::new(&context, "logged");
        let view = uut.view();
        view.dispatch_layout();
        view.set_visibility(Visibility::Gone);
        view.dispatch_layout();

        assert_eq!(
            sink.messages(),
            vec!["view_created", "lifecycle", "lifecycle", "lifecycle"]
        );
        assert_eq!(
            audit.trail(),
            vec![
                (NavigationAuditStage::Created, "logged".to_string()),
                (NavigationAuditStage::Started, "logged".to_string()),
                (NavigationAuditStage::Stopped, "logged".to_string()),
            ]
        );
        let snapshot = metrics.lock().unwrap().snapshot();
        assert_eq!(snapshot.views_created, 1);
        assert_eq!(snapshot.layout_signals, 2);
        assert_eq!((snapshot.starts, snapshot.stops), (1, 1));
    }
}
