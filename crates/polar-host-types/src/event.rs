//! What a query step can produce, and what the engine may ask of the host.

use crate::{EngineError, Operator, Symbol, Term};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One solution as the engine reports it: variable name to term.
pub type Bindings = BTreeMap<Symbol, Term>;

/// Outcome of a single `EngineQuery::step`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum StepResult {
    /// A satisfying set of bindings.
    Yield(Bindings),
    /// No further solutions.
    Done,
    /// Evaluation failed; the query is finished.
    Error(EngineError),
    /// The engine needs the host before it can continue.
    HostCallback(HostRequest),
}

/// A callback from the engine into the host.
///
/// Requests with a `call_id` expect exactly one answer via
/// `EngineQuery::call_result` or `EngineQuery::question_result`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum HostRequest {
    /// Build a host value and cache it under `instance_id`. No answer expected.
    MakeExternal { instance_id: u64, constructor: Term },

    /// Look up an attribute (`args == None`) or call a method on `instance`.
    ExternalCall {
        call_id: u64,
        instance: Term,
        attribute: Symbol,
        args: Option<Vec<Term>>,
    },

    /// Is `instance` an instance of the class named `class_tag`?
    ExternalIsa {
        call_id: u64,
        instance: Term,
        class_tag: Symbol,
    },

    /// Is the class `left_class_tag` a subclass of `right_class_tag`?
    ExternalIsSubclass {
        call_id: u64,
        left_class_tag: Symbol,
        right_class_tag: Symbol,
    },

    /// Are two cached host instances equal?
    ExternalUnify {
        call_id: u64,
        left_instance_id: u64,
        right_instance_id: u64,
    },

    /// Compare operands with `operator`; at least one is a host instance.
    ExternalOp {
        call_id: u64,
        operator: Operator,
        args: Vec<Term>,
    },
}

impl HostRequest {
    /// The id the engine expects the answer under, if any.
    pub fn call_id(&self) -> Option<u64> {
        match self {
            HostRequest::MakeExternal { .. } => None,
            HostRequest::ExternalCall { call_id, .. }
            | HostRequest::ExternalIsa { call_id, .. }
            | HostRequest::ExternalIsSubclass { call_id, .. }
            | HostRequest::ExternalUnify { call_id, .. }
            | HostRequest::ExternalOp { call_id, .. } => Some(*call_id),
        }
    }
}
