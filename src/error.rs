use std::time::Duration;
use thiserror::Error;

/// Malformed page JSON. `path` points at the offending field (`$.items[2].actions[0].type`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("pipe failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("command timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("command cancelled")]
    Cancelled,
}

/// A `${name}` reference with no matching collected input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved input reference '${{{reference}}}'")]
pub struct InterpolationError {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("input collection cancelled")]
    Cancelled,
    #[error("'{value}' is not a valid choice for '{name}'")]
    InvalidChoice { name: String, value: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("plugin exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },
    #[error("invalid page: {0}")]
    Schema(#[from] SchemaError),
    #[error("cannot resolve page '{0}'")]
    Catalog(String),
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can abort an action. Caught at the dispatcher boundary and turned
/// into a toast; never leaves a half-applied stack mutation behind.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("command exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },
    #[error("{capability} failed: {message}")]
    Capability {
        capability: &'static str,
        message: String,
    },
}

impl DispatchError {
    /// Cancellations are silent no-ops rather than user-facing failures.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            DispatchError::Input(InputError::Cancelled)
                | DispatchError::Command(CommandError::Cancelled)
                | DispatchError::Load(LoadError::Command(CommandError::Cancelled))
        )
    }
}
