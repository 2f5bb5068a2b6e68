use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::OwnerContext;

use super::observer::LayoutObserver;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Visibility flag as reported by the rendering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    /// Hidden but still occupying layout space.
    Invisible,
    /// Hidden and removed from layout.
    Gone,
}

impl Visibility {
    /// `Invisible` and `Gone` both count as hidden for lifecycle purposes.
    pub fn is_visible(self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Leaf view produced by the default factory.
    Plain,
    /// View that hosts the views of other controllers.
    Container,
}

struct ViewInner {
    id: ViewId,
    kind: ViewKind,
    context: OwnerContext,
    visibility: Mutex<Visibility>,
    parent: Mutex<Weak<ViewInner>>,
    children: Mutex<Vec<View>>,
    observer: LayoutObserver,
}

/// Shared handle to a node in the view tree.
///
/// Clones refer to the same node; equality is identity.
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

impl View {
    pub fn new(context: &OwnerContext) -> Self {
        Self::with_kind(context, ViewKind::Plain)
    }

    pub fn container(context: &OwnerContext) -> Self {
        Self::with_kind(context, ViewKind::Container)
    }

    pub fn with_kind(context: &OwnerContext, kind: ViewKind) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                id: ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed)),
                kind,
                context: context.clone(),
                visibility: Mutex::new(Visibility::Visible),
                parent: Mutex::new(Weak::new()),
                children: Mutex::new(Vec::new()),
                observer: LayoutObserver::new(),
            }),
        }
    }

    fn from_inner(inner: Arc<ViewInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ViewId {
        self.inner.id
    }

    pub fn kind(&self) -> ViewKind {
        self.inner.kind
    }

    pub fn context(&self) -> &OwnerContext {
        &self.inner.context
    }

    pub fn observer(&self) -> &LayoutObserver {
        &self.inner.observer
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn visibility(&self) -> Visibility {
        self.inner
            .visibility
            .lock()
            .map(|guard| *guard)
            .unwrap_or(Visibility::Gone)
    }

    /// Change the flag. No layout pass is triggered; the engine delivers one later.
    pub fn set_visibility(&self, visibility: Visibility) {
        if let Ok(mut guard) = self.inner.visibility.lock() {
            *guard = visibility;
        }
    }

    /// Visible itself and through every ancestor.
    pub fn is_effectively_visible(&self) -> bool {
        if !self.visibility().is_visible() {
            return false;
        }
        match self.parent() {
            Some(parent) => parent.is_effectively_visible(),
            None => true,
        }
    }

    pub fn parent(&self) -> Option<View> {
        self.inner
            .parent
            .lock()
            .ok()
            .and_then(|guard| guard.upgrade())
            .map(View::from_inner)
    }

    pub fn children(&self) -> Vec<View> {
        self.inner
            .children
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Attach `child` as the last child, moving it out of any previous parent.
    pub fn add_child(&self, child: &View) {
        if self.ptr_eq(child) || self.is_descendant_of(child) {
            return;
        }
        if let Some(previous) = child.parent() {
            if previous.ptr_eq(self) {
                return;
            }
            previous.detach(child);
        }
        if let Ok(mut guard) = child.inner.parent.lock() {
            *guard = Arc::downgrade(&self.inner);
        }
        if let Ok(mut guard) = self.inner.children.lock() {
            guard.push(child.clone());
        }
    }

    /// Detach `child` and deliver a final layout pass to the removed subtree.
    ///
    /// Returns false when `child` was not attached here.
    pub fn remove_child(&self, child: &View) -> bool {
        if !self.detach(child) {
            return false;
        }
        child.dispatch_layout();
        true
    }

    fn detach(&self, child: &View) -> bool {
        let removed = match self.inner.children.lock() {
            Ok(mut guard) => {
                let before = guard.len();
                guard.retain(|existing| !existing.ptr_eq(child));
                guard.len() != before
            }
            Err(_) => false,
        };
        if removed {
            if let Ok(mut guard) = child.inner.parent.lock() {
                *guard = Weak::new();
            }
        }
        removed
    }

    /// True when `candidate` is a strict ancestor of this view.
    pub fn is_descendant_of(&self, candidate: &View) -> bool {
        let mut current = self.parent();
        while let Some(view) = current {
            if view.ptr_eq(candidate) {
                return true;
            }
            current = view.parent();
        }
        false
    }

    /// Deliver a global-layout signal to this view, then to its subtree in
    /// attachment order.
    pub fn dispatch_layout(&self) {
        self.inner.observer.dispatch_global_layout();
        for child in self.children() {
            child.dispatch_layout();
        }
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for View {}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("visibility", &self.visibility())
            .finish()
    }
}
