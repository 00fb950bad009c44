//! Event types for the automator event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionShape;
use crate::run_id::RunId;

/// Why the engine is sleeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepReason {
    /// Configured delay between two steps
    Step,
    /// Configured delay between two iterations
    Iteration,
}

/// Discriminant of [`EventPayload`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    StepDispatched,
    InterimPushed,
    Sleeping,
    IterationCompleted,
    RunCompleted,
    RunKilled,
    RunFaulted,
    KeyDown,
}

/// Event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A run began
    RunStarted { iterations: usize },

    /// An action was handed to its handler
    ///
    /// `action_index` is the main-sequence cursor after the action was taken;
    /// `interim` is true when the action came from the interim stack.
    StepDispatched {
        shape: ActionShape,
        action_index: usize,
        delay_ms: u64,
        interim: bool,
    },

    /// A handler returned further actions
    InterimPushed { len: usize, depth: usize },

    /// The engine is about to sleep
    Sleeping { delay_ms: u64, reason: SleepReason },

    /// All actions of an iteration ran
    IterationCompleted { iteration: usize },

    /// The completion handle was resolved
    RunCompleted,

    /// The kill latch stopped the run
    RunKilled,

    /// A handler or configuration fault stopped the run
    RunFaulted { message: String },

    /// The default string handler simulated a key press
    KeyDown { token: String, key_code: u32 },
}

impl EventPayload {
    /// Kind of this payload
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RunStarted { .. } => EventKind::RunStarted,
            Self::StepDispatched { .. } => EventKind::StepDispatched,
            Self::InterimPushed { .. } => EventKind::InterimPushed,
            Self::Sleeping { .. } => EventKind::Sleeping,
            Self::IterationCompleted { .. } => EventKind::IterationCompleted,
            Self::RunCompleted => EventKind::RunCompleted,
            Self::RunKilled => EventKind::RunKilled,
            Self::RunFaulted { .. } => EventKind::RunFaulted,
            Self::KeyDown { .. } => EventKind::KeyDown,
        }
    }
}

/// An event fired on the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Run that produced the event, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,

    /// The event data
    #[serde(flatten)]
    pub payload: EventPayload,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,
}

impl Event {
    /// Create an event belonging to a run
    pub fn for_run(run_id: RunId, payload: EventPayload) -> Self {
        Self {
            run_id: Some(run_id),
            payload,
            time_fired: Utc::now(),
        }
    }

    /// Create an event not tied to any run
    pub fn detached(payload: EventPayload) -> Self {
        Self {
            run_id: None,
            payload,
            time_fired: Utc::now(),
        }
    }

    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_matches_payload() {
        let event = Event::detached(EventPayload::KeyDown {
            token: "enter".to_string(),
            key_code: 13,
        });
        assert_eq!(event.kind(), EventKind::KeyDown);
        assert!(event.run_id.is_none());

        let event = Event::for_run(RunId::new(), EventPayload::RunKilled);
        assert_eq!(event.kind(), EventKind::RunKilled);
        assert!(event.run_id.is_some());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::for_run(
            RunId::with_id("run-1"),
            EventPayload::Sleeping {
                delay_ms: 50,
                reason: SleepReason::Iteration,
            },
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["run_id"], json!("run-1"));
        assert_eq!(value["event_type"], json!("sleeping"));
        assert_eq!(value["delay_ms"], json!(50));
        assert_eq!(value["reason"], json!("iteration"));

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back.payload, event.payload);
    }
}
