//! Handler replies

use serde_json::Value;

use crate::action::Action;
use crate::deferred::Deferred;

/// What a handler hands back to the engine
#[derive(Debug)]
pub enum Reply {
    /// Continue with this pass-through value
    Value(Value),

    /// Continue once the deferred result settles
    Pending(Deferred),

    /// Run these actions before resuming the current sequence
    Interim(Vec<Action>),
}

impl Reply {
    /// Reply carrying no pass-through value
    pub fn none() -> Self {
        Self::Value(Value::Null)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Deferred> for Reply {
    fn from(deferred: Deferred) -> Self {
        Self::Pending(deferred)
    }
}

impl From<Vec<Action>> for Reply {
    fn from(actions: Vec<Action>) -> Self {
        Self::Interim(actions)
    }
}
