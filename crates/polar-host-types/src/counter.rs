use std::cell::Cell;
use std::rc::Rc;

/// Monotonic source of instance ids, owned by an engine handle.
///
/// Clones share the same underlying cell, so the host and the engine draw from
/// one sequence and never hand out the same id twice. Ids start at 1.
#[derive(Clone, Debug, Default)]
pub struct Counter(Rc<Cell<u64>>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        let id = self.0.get() + 1;
        self.0.set(id);
        id
    }

    /// The most recently issued id (0 if none).
    pub fn last_id(&self) -> u64 {
        self.0.get()
    }
}
