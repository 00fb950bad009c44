//! Core types for the automator
//!
//! This crate provides the types shared by every automator crate: the
//! [`Action`] values a sequence is made of, the [`Reply`] a handler hands back,
//! the [`Deferred`] async-result abstraction, run identifiers, and the
//! [`Event`]s published while a run progresses.

mod action;
mod deferred;
mod error;
mod event;
mod keycode;
mod reply;
mod run_id;

pub use action::{Action, ActionShape, Callable};
pub use deferred::{pair, Deferred, DeferredResult, Resolver};
pub use error::HandlerError;
pub use event::{Event, EventKind, EventPayload, SleepReason};
pub use keycode::{key_code, KEY_CODES};
pub use reply::Reply;
pub use run_id::RunId;

// Pass-through values are plain JSON values
pub use serde_json::Value;
