//! Lazy result streams over a running engine query.

use crate::error::{PolarError, PolarResult};
use crate::host::Host;
use crate::value::HostValue;
use polar_host_types::{Bindings, EngineQuery, HostRequest, StepResult};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::iter::FusedIterator;
use std::rc::Rc;
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryState {
    /// Created; the engine has not been stepped yet.
    Pending,
    /// Stepping the engine or serving a callback.
    Running,
    /// Produced a binding set; more may follow.
    Yielded,
    Exhausted,
    Failed,
}

impl QueryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryState::Exhausted | QueryState::Failed)
    }
}

/// Which engine handle is current. Bumped each time the handle is replaced.
#[derive(Clone, Debug, Default)]
pub struct HandleGeneration(Rc<Cell<u64>>);

impl HandleGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.get()
    }

    pub(crate) fn advance(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// One engine query plus the host cache that serves its callbacks.
///
/// Iterating yields one `ResultSet` per solution. The stream is fused: once
/// it is exhausted or has failed, `next()` returns `None` forever. A stream
/// bound to a handle generation fails with `StaleQuery` once that handle
/// has been replaced.
pub struct Query<Q> {
    inner: Q,
    host: Host,
    state: QueryState,
    handle: Option<(HandleGeneration, u64)>,
}

impl<Q: EngineQuery> Query<Q> {
    pub fn new(inner: Q, host: Host) -> Self {
        Self {
            inner,
            host,
            state: QueryState::Pending,
            handle: None,
        }
    }

    /// Tie the stream to the handle that is current in `generation`.
    pub fn bound_to(mut self, generation: &HandleGeneration) -> Self {
        self.handle = Some((generation.clone(), generation.current()));
        self
    }

    fn is_stale(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|(generation, stamp)| generation.current() != *stamp)
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    fn run(&mut self) -> Option<PolarResult<ResultSet>> {
        loop {
            let step = self.inner.step();
            trace!(?step, "query step");
            match step {
                StepResult::Yield(bindings) => {
                    return Some(self.bindings_to_host(bindings));
                }
                StepResult::Done => {
                    self.state = QueryState::Exhausted;
                    return None;
                }
                StepResult::Error(e) => {
                    self.state = QueryState::Failed;
                    return Some(Err(e.into()));
                }
                StepResult::HostCallback(request) => {
                    if let Err(e) = self.handle_request(request) {
                        self.state = QueryState::Failed;
                        return Some(Err(e));
                    }
                }
            }
        }
    }

    fn bindings_to_host(&mut self, bindings: Bindings) -> PolarResult<ResultSet> {
        let mut converted = BTreeMap::new();
        for (name, term) in bindings {
            match self.host.to_host(&term) {
                Ok(value) => {
                    converted.insert(name.into_string(), value);
                }
                Err(e) => {
                    self.state = QueryState::Failed;
                    return Err(e);
                }
            }
        }
        self.state = QueryState::Yielded;
        Ok(ResultSet {
            bindings: converted,
        })
    }

    fn handle_request(&mut self, request: HostRequest) -> PolarResult<()> {
        match request {
            HostRequest::MakeExternal {
                instance_id,
                constructor,
            } => {
                trace!(instance_id, %constructor, "make external");
                self.host.make_instance(&constructor, instance_id)
            }
            HostRequest::ExternalCall {
                call_id,
                instance,
                attribute,
                args,
            } => {
                trace!(call_id, %instance, %attribute, "external call");
                let result = self
                    .host
                    .call_attribute(&instance, attribute.as_str(), args.as_deref());
                match result {
                    Ok(term) => self.inner.call_result(call_id, Some(term))?,
                    Err(e) => {
                        self.report(call_id, &e)?;
                        self.inner.call_result(call_id, None)?;
                    }
                }
                Ok(())
            }
            HostRequest::ExternalIsa {
                call_id,
                instance,
                class_tag,
            } => {
                trace!(call_id, %instance, %class_tag, "external isa");
                let answer = match self.host.isa(&instance, class_tag.as_str()) {
                    Ok(answer) => answer,
                    Err(e) => {
                        self.report(call_id, &e)?;
                        false
                    }
                };
                Ok(self.inner.question_result(call_id, answer)?)
            }
            HostRequest::ExternalIsSubclass {
                call_id,
                left_class_tag,
                right_class_tag,
            } => {
                trace!(call_id, %left_class_tag, %right_class_tag, "external is_subclass");
                let answer = self
                    .host
                    .is_subclass(left_class_tag.as_str(), right_class_tag.as_str());
                Ok(self.inner.question_result(call_id, answer)?)
            }
            HostRequest::ExternalUnify {
                call_id,
                left_instance_id,
                right_instance_id,
            } => {
                trace!(call_id, left_instance_id, right_instance_id, "external unify");
                let answer = self.host.unify(left_instance_id, right_instance_id)?;
                Ok(self.inner.question_result(call_id, answer)?)
            }
            HostRequest::ExternalOp {
                call_id,
                operator,
                args,
            } => {
                trace!(call_id, %operator, "external op");
                let answer = self.host.compare(operator, &args)?;
                Ok(self.inner.question_result(call_id, answer)?)
            }
        }
    }

    /// Hand a recoverable host failure to the engine.
    fn report(&mut self, call_id: u64, err: &PolarError) -> PolarResult<()> {
        warn!(call_id, error = %err, "host callback failed");
        Ok(self.inner.application_error(err.to_string())?)
    }
}

impl<Q: EngineQuery> Iterator for Query<Q> {
    type Item = PolarResult<ResultSet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.is_terminal() {
            return None;
        }
        if self.is_stale() {
            debug!("query outlived its engine handle");
            self.state = QueryState::Failed;
            return Some(Err(PolarError::StaleQuery));
        }
        self.state = QueryState::Running;
        self.run()
    }
}

impl<Q: EngineQuery> FusedIterator for Query<Q> {}

impl<Q> fmt::Debug for Query<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// One solution: query variable name to host value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    bindings: BTreeMap<String, HostValue>,
}

impl ResultSet {
    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.bindings.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, HostValue> {
        self.bindings.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, HostValue> {
        self.bindings
    }
}

impl From<BTreeMap<String, HostValue>> for ResultSet {
    fn from(bindings: BTreeMap<String, HostValue>) -> Self {
        Self { bindings }
    }
}

impl IntoIterator for ResultSet {
    type Item = (String, HostValue);
    type IntoIter = btree_map::IntoIter<String, HostValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = (&'a String, &'a HostValue);
    type IntoIter = btree_map::Iter<'a, String, HostValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}
