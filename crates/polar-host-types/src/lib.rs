//! Engine-facing types shared across the polar-host workspace.
//!
//! This crate is intentionally boring:
//! - the term representation exchanged with the engine
//! - query step results and host callback requests
//! - the foreign engine contract (`Engine`, `EngineQuery`)
//! - stable identifiers (file extensions, built-in class tags)

#![forbid(unsafe_code)]

pub mod counter;
pub mod engine;
pub mod error;
pub mod event;
pub mod ids;
pub mod symbol;
pub mod term;

pub use counter::Counter;
pub use engine::{Engine, EngineQuery};
pub use error::EngineError;
pub use event::{Bindings, HostRequest, StepResult};
pub use symbol::Symbol;
pub use term::{Call, ExternalInstance, InstanceLiteral, Operator, Term};
