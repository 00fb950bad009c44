//! Dispatch table
//!
//! Maps each [`ActionShape`] to the handler that performs it. The engine only
//! classifies actions; everything an action actually does lives here.

use automator_core::{
    key_code, Action, ActionShape, Deferred, Event, EventPayload, HandlerError, Reply, Value,
};
use automator_event_bus::SharedEventBus;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Handler function type
///
/// Receives the action and the current pass-through value. An `Err` is a
/// synchronous fault and stops the run.
pub type Handler = Arc<dyn Fn(&Action, Value) -> Result<Reply, HandlerError> + Send + Sync>;

/// Shape → handler mapping handed to an [`Automator`](crate::Automator)
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<ActionShape, Handler>,
}

impl DispatchTable {
    /// A table with no handlers
    pub fn empty() -> Self {
        Self::default()
    }

    /// A table with the default number, function, and string handlers
    ///
    /// There is no default for [`ActionShape::Object`].
    pub fn with_defaults(event_bus: SharedEventBus) -> Self {
        let mut table = Self::empty();
        table.handlers.insert(ActionShape::Number, sleep_handler());
        table.handlers.insert(ActionShape::Function, call_handler());
        table
            .handlers
            .insert(ActionShape::String, key_press_handler(event_bus));
        table
    }

    /// Register or replace the handler for a shape
    pub fn set_handler<F>(&mut self, shape: ActionShape, handler: F)
    where
        F: Fn(&Action, Value) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.handlers.insert(shape, Arc::new(handler));
    }

    /// Builder form of [`set_handler`](Self::set_handler)
    pub fn with_handler<F>(mut self, shape: ActionShape, handler: F) -> Self
    where
        F: Fn(&Action, Value) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.set_handler(shape, handler);
        self
    }

    /// Handler registered for a shape
    pub fn handler(&self, shape: ActionShape) -> Option<&Handler> {
        self.handlers.get(&shape)
    }

    /// Whether a handler is registered for a shape
    pub fn contains(&self, shape: ActionShape) -> bool {
        self.handlers.contains_key(&shape)
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shapes: Vec<_> = self.handlers.keys().map(ToString::to_string).collect();
        shapes.sort();
        f.debug_struct("DispatchTable")
            .field("shapes", &shapes)
            .finish()
    }
}

fn unexpected(expected: ActionShape, action: &Action) -> HandlerError {
    HandlerError::failed(format!("{} handler received {}", expected, action))
}

/// Sleep for the delay, then settle with the incoming pass-through value
pub fn sleep_handler() -> Handler {
    Arc::new(|action: &Action, pass_through: Value| {
        let Action::Delay(ms) = action else {
            return Err(unexpected(ActionShape::Number, action));
        };
        let duration = Duration::from_millis(*ms);
        Ok(Reply::Pending(Deferred::new(async move {
            tokio::time::sleep(duration).await;
            Ok(pass_through)
        })))
    })
}

/// Call the action's function with the pass-through value
pub fn call_handler() -> Handler {
    Arc::new(|action: &Action, pass_through: Value| match action {
        Action::Call(callable) => callable.call(pass_through),
        other => Err(unexpected(ActionShape::Function, other)),
    })
}

/// Publish a key-down event for known tokens
///
/// Unknown tokens are ignored. Either way the reply carries no value.
pub fn key_press_handler(event_bus: SharedEventBus) -> Handler {
    Arc::new(move |action: &Action, _pass_through: Value| {
        let Some(token) = action.as_key() else {
            return Err(unexpected(ActionShape::String, action));
        };

        match key_code(token) {
            Some(code) => {
                trace!(token, key_code = code, "Simulating key down");
                event_bus.fire(Event::detached(EventPayload::KeyDown {
                    token: token.to_string(),
                    key_code: code,
                }));
            }
            None => trace!(token, "No key code for token"),
        }

        Ok(Reply::none())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use automator_core::{Callable, EventKind};
    use automator_event_bus::EventBus;
    use serde_json::json;

    fn defaults() -> (SharedEventBus, DispatchTable) {
        let bus = Arc::new(EventBus::new());
        let table = DispatchTable::with_defaults(bus.clone());
        (bus, table)
    }

    #[test]
    fn test_defaults_cover_three_shapes() {
        let (_, table) = defaults();
        assert!(table.contains(ActionShape::Number));
        assert!(table.contains(ActionShape::Function));
        assert!(table.contains(ActionShape::String));
        assert!(!table.contains(ActionShape::Object));
        assert!(DispatchTable::empty().handler(ActionShape::Number).is_none());
    }

    #[test]
    fn test_override_replaces_default() {
        let (_, table) = defaults();
        let table = table.with_handler(ActionShape::String, |_, _| {
            Ok(Reply::Value(json!("custom")))
        });

        let handler = table.handler(ActionShape::String).unwrap();
        match handler(&Action::key("a"), Value::Null).unwrap() {
            Reply::Value(v) => assert_eq!(v, json!("custom")),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_key_press_fires_event() {
        let (bus, table) = defaults();
        let mut rx = bus.subscribe(EventKind::KeyDown);

        let handler = table.handler(ActionShape::String).unwrap();
        assert!(matches!(
            handler(&Action::key("enter"), Value::Null),
            Ok(Reply::Value(Value::Null))
        ));
        assert!(matches!(
            handler(&Action::key("not-a-key"), Value::Null),
            Ok(Reply::Value(Value::Null))
        ));

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event.payload,
            EventPayload::KeyDown {
                token: "enter".to_string(),
                key_code: 13
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_call_handler_threads_pass_through() {
        let (_, table) = defaults();
        let action = Action::Call(Callable::new(|v| Ok(Reply::Value(json!([v, "seen"])))));

        let handler = table.handler(ActionShape::Function).unwrap();
        match handler(&action, json!(1)).unwrap() {
            Reply::Value(v) => assert_eq!(v, json!([1, "seen"])),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_handler_waits_then_passes_through() {
        let (_, table) = defaults();
        let handler = table.handler(ActionShape::Number).unwrap();

        let start = tokio::time::Instant::now();
        let Reply::Pending(deferred) = handler(&Action::delay(250), json!("kept")).unwrap() else {
            panic!("sleep handler must reply with a deferred");
        };

        assert_eq!(deferred.await, Ok(json!("kept")));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_mismatched_action_is_a_fault() {
        let handler = sleep_handler();
        assert!(handler(&Action::key("a"), Value::Null).is_err());
    }
}
