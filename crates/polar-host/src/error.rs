//! Error taxonomy for the runtime.

use camino::Utf8PathBuf;
use polar_host_types::EngineError;
use thiserror::Error;

pub type PolarResult<T> = Result<T, PolarError>;

#[derive(Error, Debug)]
pub enum PolarError {
    // Usage errors: the caller asked for something invalid.
    #[error("policy files must have a .pol or .polar extension: {path}")]
    InvalidExtension { path: Utf8PathBuf },

    #[error("policy file not found: {path}")]
    FileNotFound { path: Utf8PathBuf },

    #[error("query must be a string or a predicate, got {found}")]
    InvalidQueryType { found: String },

    #[error("invalid constructor for class {class}: {reason}")]
    InvalidConstructor { class: String, reason: String },

    #[error("policy source {} contains a null byte", .filename.as_deref().unwrap_or("<string>"))]
    EmbeddedNulByte { filename: Option<String> },

    #[error("a class named {name} is already registered")]
    DuplicateClassAlias { name: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// An inline query (`?= ...`) found no results while loading.
    #[error(
        "inline query #{index} in {} found no results",
        .filename.as_deref().unwrap_or("<string>")
    )]
    InlineQueryFailed { filename: Option<String>, index: usize },

    /// The stream was opened against an engine handle that `reset` replaced.
    #[error("query belongs to an engine handle that has since been reset")]
    StaleQuery,

    /// Parse, runtime, or internal failure reported by the engine, unchanged.
    #[error(transparent)]
    Engine(#[from] EngineError),

    // Host-side failures while serving the engine.
    #[error("unregistered class: {name}")]
    UnregisteredClass { name: String },

    #[error("unregistered instance: {id}")]
    UnregisteredInstance { id: u64 },

    #[error("instance {id} already exists")]
    DuplicateInstance { id: u64 },

    #[error("failed to construct {class}: {message}")]
    Construction { class: String, message: String },

    #[error("comparison failed: {message}")]
    Comparison { message: String },

    #[error("cannot convert {kind} term to a host value")]
    UnexpectedTerm { kind: String },

    #[error("{receiver}.{name}: {message}")]
    Method {
        receiver: String,
        name: String,
        message: String,
    },

    // IO.
    #[error("failed to read {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("console I/O failed")]
    Console(#[source] std::io::Error),
}

impl PolarError {
    pub fn is_parse(&self) -> bool {
        matches!(self, PolarError::Engine(EngineError::Parse(_)))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, PolarError::Engine(EngineError::Runtime(_)))
    }

    pub(crate) fn comparison(message: impl Into<String>) -> Self {
        PolarError::Comparison {
            message: message.into(),
        }
    }

    pub(crate) fn method(
        receiver: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PolarError::Method {
            receiver: receiver.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}
