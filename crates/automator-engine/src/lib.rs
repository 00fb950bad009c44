//! Automator Engine
//!
//! This crate provides the sequencing engine: it runs a list of actions one
//! step at a time, inserting step and iteration delays, repeating the list a
//! number of times, and running interim sequences that handlers inject while
//! a run is in progress.
//!
//! # Action Shapes
//!
//! - Numbers - delays in milliseconds
//! - Callables - invoked with the previous step's value
//! - Strings - symbolic key tokens, optionally repeated with `xN`
//!
//! # Key Types
//!
//! - [`Automator`] - Starts, supersedes, and kills runs
//! - [`DispatchTable`] - Maps action shapes to handlers
//! - [`CompletionHandle`] - Resolves once every iteration has finished
//! - [`RunStatus`] - Observable snapshot of the current run

mod automator;
mod completion;
mod dispatch;
mod error;
mod expand;
mod run;
mod status;

pub use automator::{iteration_callback, Automator, IterationCallback};
pub use completion::{CompletionHandle, RunOutcome};
pub use dispatch::{call_handler, key_press_handler, sleep_handler, DispatchTable, Handler};
pub use error::{AutomatorError, AutomatorResult};
pub use expand::{expand_actions, parse_repeat};
pub use status::{RunPhase, RunStatus};
