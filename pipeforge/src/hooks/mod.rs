//! Dispatch of executor job notifications to business-logic hooks.
//!
//! A [`HookRunner`] maps the value of a message's discriminant field to an
//! ordered list of handlers and keeps a separate list of wildcard handlers
//! that see every message.

mod handler;
mod message;
mod runner;

pub use handler::{FnHandler, HookHandler};
pub use message::JobMessage;
pub use runner::{HookRunReport, HookRunner};
