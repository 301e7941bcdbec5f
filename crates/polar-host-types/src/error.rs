use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the engine through the foreign interface.
///
/// The host never interprets the message; it only distinguishes the kind so
/// callers (and the REPL) can tell a bad query from a failed evaluation.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum EngineError {
    /// Policy source or query text could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// Evaluation failed at runtime (e.g. arithmetic on an unbound variable).
    #[error("{0}")]
    Runtime(String),

    /// Anything else the engine reports about its own state.
    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            EngineError::Parse(m) | EngineError::Runtime(m) | EngineError::Internal(m) => m,
        }
    }
}
