//! Minimal view tree standing in for the rendering engine boundary.
//!
//! Controllers only need three things from the engine: a node they own, its
//! visibility, and a way to hear about layout passes. Everything else about
//! drawing lives outside this crate.

mod core;
mod observer;

pub use self::core::{View, ViewId, ViewKind, Visibility};
pub use self::observer::{LayoutObserver, LayoutSubscription};
