//! Action types
//!
//! Actions are the units of work a sequence is made of. The engine never
//! interprets an action: it classifies it by [`ActionShape`] and hands it to
//! whichever handler is registered for that shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::reply::Reply;

type CallableFn = dyn Fn(Value) -> Result<Reply, HandlerError> + Send + Sync;

/// A side-effecting function carried inside a sequence
///
/// Receives the current pass-through value and returns a [`Reply`].
#[derive(Clone)]
pub struct Callable {
    name: Option<String>,
    func: Arc<CallableFn>,
}

impl Callable {
    /// Wrap a function
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Value) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: None,
            func: Arc::new(func),
        }
    }

    /// Wrap a function and give it a name for log output
    pub fn named<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            func: Arc::new(func),
        }
    }

    /// Invoke the function with a pass-through value
    pub fn call(&self, pass_through: Value) -> Result<Reply, HandlerError> {
        (self.func)(pass_through)
    }

    /// Name given at construction, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Runtime shape of an action, used as the dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionShape {
    /// Timed delay in milliseconds
    Number,
    /// Side-effecting callable
    Function,
    /// Symbolic token (usually a key name)
    String,
    /// Anything else
    Object,
}

impl fmt::Display for ActionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Number => "number",
            Self::Function => "function",
            Self::String => "string",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// One unit of work in a sequence
#[derive(Debug, Clone)]
pub enum Action {
    /// Wait for the given number of milliseconds
    Delay(u64),

    /// Call a function
    Call(Callable),

    /// Symbolic token such as `"enter"` or `"a"`
    Key(String),

    /// Opaque value with no default handler
    Other(Value),

    /// Absent action; skipped without dispatch
    Null,
}

impl Action {
    /// Create a delay action
    pub fn delay(ms: u64) -> Self {
        Self::Delay(ms)
    }

    /// Create a symbolic token action
    pub fn key(token: impl Into<String>) -> Self {
        Self::Key(token.into())
    }

    /// Create a callable action from a function
    pub fn call<F>(func: F) -> Self
    where
        F: Fn(Value) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Self::Call(Callable::new(func))
    }

    /// Dispatch shape, or `None` for [`Action::Null`]
    pub fn shape(&self) -> Option<ActionShape> {
        match self {
            Self::Delay(_) => Some(ActionShape::Number),
            Self::Call(_) => Some(ActionShape::Function),
            Self::Key(_) => Some(ActionShape::String),
            Self::Other(_) => Some(ActionShape::Object),
            Self::Null => None,
        }
    }

    /// Whether this is a numeric delay
    pub fn is_delay(&self) -> bool {
        matches!(self, Self::Delay(_))
    }

    /// Whether this is the absent action
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Token text, for symbolic token actions
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(token) => Some(token),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay(ms) => write!(f, "{}", ms),
            Self::Call(callable) => match callable.name() {
                Some(name) => write!(f, "fn {}", name),
                None => f.write_str("fn"),
            },
            Self::Key(token) => write!(f, "{:?}", token),
            Self::Other(value) => write!(f, "{}", value),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<u64> for Action {
    fn from(ms: u64) -> Self {
        Self::Delay(ms)
    }
}

impl From<&str> for Action {
    fn from(token: &str) -> Self {
        Self::Key(token.to_string())
    }
}

impl From<String> for Action {
    fn from(token: String) -> Self {
        Self::Key(token)
    }
}

impl From<Callable> for Action {
    fn from(callable: Callable) -> Self {
        Self::Call(callable)
    }
}

/// Classify a JSON value by shape
///
/// Numbers become delays (negative or fractional values are clamped and
/// truncated to whole milliseconds), strings become tokens, `null` becomes
/// [`Action::Null`], and everything else is kept as [`Action::Other`].
impl From<Value> for Action {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Number(n) => {
                let ms = n
                    .as_u64()
                    .unwrap_or_else(|| n.as_f64().map(|f| f.max(0.0) as u64).unwrap_or(0));
                Self::Delay(ms)
            }
            Value::String(s) => Self::Key(s),
            other => Self::Other(other),
        }
    }
}
