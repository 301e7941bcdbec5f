//! The runtime facade.

use crate::class::{Class, ClassRegistry};
use crate::error::{PolarError, PolarResult};
use crate::host::Host;
use crate::load_queue::LoadQueue;
use crate::query::{HandleGeneration, Query};
use crate::value::{HostValue, Predicate};
use camino::{Utf8Path, Utf8PathBuf};
use polar_host_settings::{ReplSettings, ResolvedConfig};
use polar_host_types::{Engine, Symbol};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// What `Polar::query` accepts: raw query text or a structured predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryInput {
    Text(String),
    Predicate(Predicate),
}

impl TryFrom<HostValue> for QueryInput {
    type Error = PolarError;

    fn try_from(value: HostValue) -> Result<Self, Self::Error> {
        match value {
            HostValue::String(text) => Ok(QueryInput::Text(text)),
            HostValue::Predicate(predicate) => Ok(QueryInput::Predicate(predicate)),
            other => Err(PolarError::InvalidQueryType {
                found: other.kind().to_string(),
            }),
        }
    }
}

/// A policy engine handle plus everything the host keeps around it.
///
/// Classes and constants live in a registry owned here rather than by the
/// engine, so `reset` can swap in a fresh handle without losing them.
pub struct Polar<E: Engine> {
    engine: E,
    create: Box<dyn Fn() -> E>,
    registry: Rc<RefCell<ClassRegistry>>,
    host: Host,
    load_queue: LoadQueue,
    generation: HandleGeneration,
    repl: ReplSettings,
}

impl<E: Engine + Default + 'static> Polar<E> {
    pub fn new() -> Self {
        Self::with_factory(E::default)
    }
}

impl<E: Engine + Default + 'static> Default for Polar<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> Polar<E> {
    /// Build a runtime whose engine handles come from `create`.
    pub fn with_factory(create: impl Fn() -> E + 'static) -> Self {
        let engine = create();
        let registry = Rc::new(RefCell::new(ClassRegistry::new()));
        let host = Host::new(Rc::clone(&registry), engine.counter());
        Self {
            engine,
            create: Box::new(create),
            registry,
            host,
            load_queue: LoadQueue::new(),
            generation: HandleGeneration::new(),
            repl: ReplSettings::default(),
        }
    }

    /// Replace the engine handle, dropping loaded policy and queued files.
    ///
    /// Registered classes and constants survive and are handed to the new
    /// handle. Streams opened before the reset fail with `StaleQuery`. If a
    /// constant cannot be replayed the old handle stays in place untouched.
    pub fn reset(&mut self) -> PolarResult<()> {
        info!("resetting policy engine");
        let mut engine = (self.create)();
        let mut host = Host::new(Rc::clone(&self.registry), engine.counter());

        let constants: Vec<(String, HostValue)> = self
            .registry
            .borrow()
            .constants()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for (name, value) in constants {
            let term = host.to_term(&value);
            if let Err(e) = engine.register_constant(Symbol::new(name.as_str()), term) {
                warn!(constant = %name, error = %e, "could not replay constant, reset abandoned");
                return Err(e.into());
            }
        }

        self.engine = engine;
        self.host = host;
        self.load_queue.clear();
        self.generation.advance();
        Ok(())
    }

    /// Load policy text. `filename` only labels diagnostics.
    pub fn load_str(&mut self, src: &str, filename: Option<&str>) -> PolarResult<()> {
        load_source(&mut self.engine, &self.host, src, filename)
    }

    /// Queue a policy file; it is read on the next query or explicit flush.
    pub fn load_file(&mut self, path: impl Into<Utf8PathBuf>) -> PolarResult<()> {
        self.load_queue.enqueue(path)
    }

    /// Queue several files, stopping at the first invalid one.
    pub fn load_files<I, P>(&mut self, paths: I) -> PolarResult<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        paths
            .into_iter()
            .try_for_each(|path| self.load_queue.enqueue(path))
    }

    pub fn load_queued_files(&mut self) -> PolarResult<()> {
        let Self {
            engine,
            host,
            load_queue,
            ..
        } = self;
        load_queue.flush(|src, path| load_source(engine, host, src, Some(path.as_str())))
    }

    pub fn queued_files(&self) -> impl Iterator<Item = &Utf8Path> {
        self.load_queue.iter()
    }

    /// Start a query. Nothing is evaluated until the stream is pulled.
    pub fn query(&mut self, input: impl Into<HostValue>) -> PolarResult<Query<E::Query>> {
        let input = QueryInput::try_from(input.into())?;
        self.load_queued_files()?;

        let mut host = self.host.duplicate();
        let inner = match input {
            QueryInput::Text(text) => self.engine.new_query_from_text(&text)?,
            QueryInput::Predicate(predicate) => {
                let term = host.to_term(&HostValue::Predicate(predicate));
                self.engine.new_query_from_term(term)
            }
        };
        Ok(Query::new(inner, host).bound_to(&self.generation))
    }

    /// Query the rule `name` with `args`.
    pub fn query_rule(
        &mut self,
        name: &str,
        args: Vec<HostValue>,
    ) -> PolarResult<Query<E::Query>> {
        self.query(Predicate::new(name, args))
    }

    /// Register a host class and bind its name as a constant.
    ///
    /// Nothing is kept when the engine refuses the constant.
    pub fn register_class(&mut self, class: Class) -> PolarResult<()> {
        let class = self.registry.borrow_mut().register(class)?;
        let name = class.name().to_string();
        if let Err(e) = self.register_constant(&name, HostValue::Class(class)) {
            self.registry.borrow_mut().unregister(&name);
            return Err(e);
        }
        debug!(class = %name, "registered class");
        Ok(())
    }

    /// Bind `name` to `value` in the engine. Kept across `reset`.
    pub fn register_constant(&mut self, name: &str, value: impl Into<HostValue>) -> PolarResult<()> {
        let value = value.into();
        let term = self.host.to_term(&value);
        self.engine.register_constant(Symbol::new(name), term)?;
        self.registry
            .borrow_mut()
            .record_constant(name.to_string(), value);
        Ok(())
    }

    /// Queue the configured sources and adopt the REPL settings.
    pub fn apply_settings(&mut self, settings: &ResolvedConfig) -> PolarResult<()> {
        self.load_files(settings.sources.iter().cloned())?;
        self.repl = settings.repl.clone();
        Ok(())
    }

    pub fn repl_settings(&self) -> &ReplSettings {
        &self.repl
    }

    pub fn registry(&self) -> Ref<'_, ClassRegistry> {
        self.registry.borrow()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub(crate) fn host(&self) -> &Host {
        &self.host
    }
}

/// Load `src` into `engine`, then run every inline query it surfaced.
///
/// Each inline query must produce at least one result; the first one that
/// does not stops loading with `InlineQueryFailed`. Inline queries left over
/// from a failed source are discarded unevaluated.
fn load_source<E: Engine>(
    engine: &mut E,
    host: &Host,
    src: &str,
    filename: Option<&str>,
) -> PolarResult<()> {
    let src = src.strip_suffix('\0').unwrap_or(src);
    if src.contains('\0') {
        return Err(PolarError::EmbeddedNulByte {
            filename: filename.map(str::to_string),
        });
    }

    debug!(filename = filename.unwrap_or("<string>"), "loading policy source");
    engine.load(src, filename)?;

    let mut index = 0;
    while let Some(inline) = engine.next_inline_query() {
        index += 1;
        let mut query = Query::new(inline, host.duplicate());
        let failure = match query.next() {
            Some(Ok(_)) => {
                debug!(index, "inline query passed");
                continue;
            }
            Some(Err(e)) => e,
            None => PolarError::InlineQueryFailed {
                filename: filename.map(str::to_string),
                index,
            },
        };
        let skipped = std::iter::from_fn(|| engine.next_inline_query()).count();
        if skipped > 0 {
            debug!(skipped, "discarded inline queries after failure");
        }
        return Err(failure);
    }
    Ok(())
}
