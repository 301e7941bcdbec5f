//! The foreign engine contract.
//!
//! The evaluation core (parser, unifier, rule resolution) lives behind these
//! traits. The host only drives it: load text, open queries, step them, and
//! answer callbacks.

use crate::{Counter, EngineError, StepResult, Symbol, Term};

/// One live engine instance ("engine handle").
///
/// Handles are not safe to step from several queries at the same instant;
/// callers interleave streams, they do not run them in parallel.
pub trait Engine {
    type Query: EngineQuery;

    /// Parse and register policy source. `filename` is used for diagnostics.
    fn load(&mut self, src: &str, filename: Option<&str>) -> Result<(), EngineError>;

    /// Pop the next inline query surfaced by previous loads, if any.
    fn next_inline_query(&mut self) -> Option<Self::Query>;

    /// Parse `text` as a query.
    fn new_query_from_text(&mut self, text: &str) -> Result<Self::Query, EngineError>;

    /// Open a query for an already-built term (usually a `Term::Call`).
    fn new_query_from_term(&mut self, term: Term) -> Self::Query;

    /// Bind `name` to `value` for all later loads and queries.
    fn register_constant(&mut self, name: Symbol, value: Term) -> Result<(), EngineError>;

    /// Source of instance ids. The host mints tokens from the same sequence the
    /// engine uses for `MakeExternal`, so the two never collide.
    fn counter(&self) -> Counter;
}

/// A single in-flight query inside the engine.
pub trait EngineQuery {
    /// Advance evaluation until the next observable outcome.
    fn step(&mut self) -> StepResult;

    /// Answer an `ExternalCall`. `None` means "no value" (the branch fails).
    fn call_result(&mut self, call_id: u64, value: Option<Term>) -> Result<(), EngineError>;

    /// Answer a yes/no callback (`ExternalIsa`, `ExternalUnify`, ...).
    fn question_result(&mut self, call_id: u64, answer: bool) -> Result<(), EngineError>;

    /// Report a host-side failure; the engine decides whether it is fatal.
    fn application_error(&mut self, message: String) -> Result<(), EngineError>;
}
