//! Host-side runtime for a policy evaluation engine.
//!
//! The engine itself (parsing, unification, rule resolution) sits behind the
//! `Engine` trait from `polar-host-types`. This crate drives it:
//! - `Polar` is the facade: load, query, register, reset, REPL
//! - `LoadQueue` tracks policy files that still need loading
//! - `Host` converts values across the boundary and caches host objects
//! - `Query` streams binding sets lazily and answers engine callbacks

#![forbid(unsafe_code)]

pub mod class;
pub mod error;
pub mod host;
pub mod load_queue;
pub mod query;
pub mod value;

mod polar;
mod repl;

#[cfg(test)]
mod proptest;

pub use class::{Class, ClassBuilder, ClassRegistry, Constructor};
pub use error::{PolarError, PolarResult};
pub use host::Host;
pub use load_queue::LoadQueue;
pub use polar::{Polar, QueryInput};
pub use query::{HandleGeneration, Query, QueryState, ResultSet};
pub use value::{HostValue, Instance, Predicate, Variable};

pub use polar_host_types as types;
