use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::json;

use crate::error::{NavigationError, Result};
use crate::logging::{LogLevel, json_kv};
use crate::view::{View, Visibility};

use super::OwnerContext;
use super::audit::{NavigationAuditEventBuilder, NavigationAuditStage};
use super::controller::ViewController;

const LOG_TARGET: &str = "room_nav::stack";

pub(crate) struct StackInner {
    controller: ViewController,
    children: Mutex<Vec<ViewController>>,
}

/// Ordered push/pop collection of controllers.
///
/// The stack is itself backed by a [`ViewController`] with a container view,
/// so it can be pushed into another stack. Only the top child's view is
/// visible; the others are kept attached but `Gone`.
#[derive(Clone)]
pub struct StackController {
    inner: Arc<StackInner>,
}

impl StackController {
    pub fn new(context: &OwnerContext, id: impl Into<String>) -> Self {
        let id = id.into();
        let inner = Arc::new_cyclic(|weak: &Weak<StackInner>| {
            let weak = weak.clone();
            let controller = ViewController::with_factory(context, id, Arc::new(View::container))
                .with_back_handler(move || {
                    weak.upgrade()
                        .map(|inner| StackController { inner }.handle_back())
                        .unwrap_or(false)
                });
            StackInner {
                controller,
                children: Mutex::new(Vec::new()),
            }
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<StackInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &str {
        self.inner.controller.id()
    }

    pub fn context(&self) -> &OwnerContext {
        self.inner.controller.context()
    }

    /// The controller backing this stack; push it to nest stacks.
    pub fn controller(&self) -> &ViewController {
        &self.inner.controller
    }

    /// The container view hosting the children's views.
    pub fn view(&self) -> View {
        self.inner.controller.view()
    }

    pub fn ptr_eq(&self, other: &StackController) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Put `child` on top.
    ///
    /// The back-reference is set before the child's view is materialized, so
    /// `on_create` already observes the stack. The previous top is hidden.
    pub fn push(&self, child: &ViewController) -> Result<()> {
        self.check_pushable(child)?;

        let previous_top = {
            let mut children = self.children();
            if children.iter().any(|existing| existing.id() == child.id()) {
                return Err(NavigationError::DuplicateId {
                    id: child.id().to_string(),
                    stack: self.id().to_string(),
                });
            }
            let previous_top = children.last().cloned();
            children.push(child.clone());
            previous_top
        };
        child.attach_to(Arc::downgrade(&self.inner));

        let container = self.view();
        let child_view = child.view();
        child_view.set_visibility(Visibility::Visible);
        container.add_child(&child_view);
        if let Some(previous) = previous_top.as_ref().and_then(ViewController::existing_view) {
            previous.set_visibility(Visibility::Gone);
        }

        let context = self.context();
        context.record_metrics(|m| m.record_push());
        context.log(
            LogLevel::Debug,
            LOG_TARGET,
            "pushed",
            [
                json_kv("stack", json!(self.id())),
                json_kv("controller", json!(child.id())),
                json_kv("depth", json!(self.len())),
            ],
        );
        context.audit(
            NavigationAuditEventBuilder::new(NavigationAuditStage::Pushed, child.id())
                .detail("stack", json!(self.id()))
                .finish(),
        );
        Ok(())
    }

    fn check_pushable(&self, child: &ViewController) -> Result<()> {
        let mut ancestor = Some(self.clone());
        while let Some(stack) = ancestor {
            if stack.controller().ptr_eq(child) {
                return Err(NavigationError::SelfPush(self.id().to_string()));
            }
            ancestor = stack.controller().stack_controller();
        }

        if let (Some(child_view), Some(container)) =
            (child.existing_view(), self.inner.controller.existing_view())
        {
            if child_view.ptr_eq(&container) || container.is_descendant_of(&child_view) {
                return Err(NavigationError::SelfPush(self.id().to_string()));
            }
        }

        match child.stack_controller() {
            Some(current) if current.ptr_eq(self) => Err(NavigationError::AlreadyInStack {
                id: child.id().to_string(),
                stack: self.id().to_string(),
            }),
            Some(current) => Err(NavigationError::AttachedToOtherStack {
                id: child.id().to_string(),
                stack: self.id().to_string(),
                other: current.id().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Remove and return the top child, revealing the one beneath.
    pub fn pop(&self) -> Result<ViewController> {
        let (popped, new_top) = {
            let mut children = self.children();
            let popped = children
                .pop()
                .ok_or_else(|| NavigationError::EmptyStack(self.id().to_string()))?;
            (popped, children.last().cloned())
        };
        self.release(&popped);
        if let Some(view) = new_top.as_ref().and_then(ViewController::existing_view) {
            view.set_visibility(Visibility::Visible);
        }
        Ok(popped)
    }

    /// Remove `child` wherever it sits. Removing the top behaves like [`pop`](Self::pop).
    pub fn pop_specific(&self, child: &ViewController) -> Result<ViewController> {
        let is_top = {
            let mut children = self.children();
            let index = children
                .iter()
                .position(|existing| existing.ptr_eq(child))
                .ok_or_else(|| self.not_in_stack(child))?;
            if index + 1 == children.len() {
                true
            } else {
                children.remove(index);
                false
            }
        };
        if is_top {
            return self.pop();
        }
        self.release(child);
        Ok(child.clone())
    }

    /// Pop everything above `target`. Returns the popped controllers, top first.
    pub fn pop_to(&self, target: &ViewController) -> Result<Vec<ViewController>> {
        if !self.contains(target) {
            return Err(self.not_in_stack(target));
        }
        let mut popped = Vec::new();
        while self.peek().is_some_and(|top| !top.ptr_eq(target)) {
            popped.push(self.pop()?);
        }
        Ok(popped)
    }

    /// Pop until only the bottom child remains.
    pub fn pop_to_root(&self) -> Result<Vec<ViewController>> {
        let mut popped = Vec::new();
        while self.can_pop() {
            popped.push(self.pop()?);
        }
        Ok(popped)
    }

    /// Let the top child consume the request first, then pop if possible.
    pub fn handle_back(&self) -> bool {
        if self.peek().is_some_and(|top| top.handle_back()) {
            return true;
        }
        self.can_pop() && self.pop().is_ok()
    }

    pub fn peek(&self) -> Option<ViewController> {
        self.children().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.children().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    /// True while more than one child remains.
    pub fn can_pop(&self) -> bool {
        self.len() > 1
    }

    pub fn contains(&self, child: &ViewController) -> bool {
        self.children().iter().any(|existing| existing.ptr_eq(child))
    }

    /// Snapshot of the children, bottom first.
    pub fn child_controllers(&self) -> Vec<ViewController> {
        self.children().clone()
    }

    fn release(&self, child: &ViewController) {
        child.detach_from_stack();
        if let Some(view) = child.existing_view() {
            view.set_visibility(Visibility::Gone);
            if let Some(container) = self.inner.controller.existing_view() {
                container.remove_child(&view);
            }
        }

        let context = self.context();
        context.record_metrics(|m| m.record_pop());
        context.log(
            LogLevel::Debug,
            LOG_TARGET,
            "popped",
            [
                json_kv("stack", json!(self.id())),
                json_kv("controller", json!(child.id())),
                json_kv("depth", json!(self.len())),
            ],
        );
        context.audit(
            NavigationAuditEventBuilder::new(NavigationAuditStage::Popped, child.id())
                .detail("stack", json!(self.id()))
                .finish(),
        );
    }

    fn not_in_stack(&self, child: &ViewController) -> NavigationError {
        NavigationError::NotInStack {
            id: child.id().to_string(),
            stack: self.id().to_string(),
        }
    }

    fn children(&self) -> MutexGuard<'_, Vec<ViewController>> {
        self.inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for StackController {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for StackController {}

impl fmt::Debug for StackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self
            .children()
            .iter()
            .map(|child| child.id().to_string())
            .collect();
        f.debug_struct("StackController")
            .field("id", &self.id())
            .field("children", &ids)
            .finish()
    }
}
