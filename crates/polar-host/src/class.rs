//! Host classes the engine can refer to by name.
//!
//! A `Class` is a type-erased description of a Rust type: how to build it from
//! engine-supplied arguments, which attributes and methods the engine may call,
//! and whether instances can be compared. Build one with `ClassBuilder`.

use crate::error::{PolarError, PolarResult};
use crate::value::{HostValue, Instance, short_type_name};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

type PositionalFn = Rc<dyn Fn(Vec<HostValue>) -> anyhow::Result<HostValue>>;
type KeywordFn = Rc<dyn Fn(BTreeMap<String, HostValue>) -> anyhow::Result<HostValue>>;
type AttributeFn = Rc<dyn Fn(&dyn Any) -> anyhow::Result<HostValue>>;
type MethodFn = Rc<dyn Fn(&dyn Any, Vec<HostValue>) -> anyhow::Result<HostValue>>;
type EqualityFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;
type OrderingFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> Option<Ordering>>;

/// How the engine's `new Foo(...)` / `Foo{...}` becomes a host value.
#[derive(Clone)]
pub enum Constructor {
    /// Positional arguments. `arity`, when set, is enforced before the call.
    Positional {
        arity: Option<usize>,
        build: PositionalFn,
    },
    /// Keyword arguments (`Foo{field: value}`).
    Keyword(KeywordFn),
    /// Delegate to a class method registered on the same class.
    ClassMethod(String),
}

pub struct Class {
    name: String,
    type_id: TypeId,
    constructor: Option<Constructor>,
    attributes: HashMap<String, AttributeFn>,
    instance_methods: HashMap<String, MethodFn>,
    class_methods: HashMap<String, PositionalFn>,
    equality: Option<EqualityFn>,
    ordering: Option<OrderingFn>,
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn is_instance(&self, instance: &Instance) -> bool {
        instance.type_id() == self.type_id
    }

    fn validate(&self) -> PolarResult<()> {
        if let Some(Constructor::ClassMethod(method)) = &self.constructor
            && !self.class_methods.contains_key(method)
        {
            return Err(PolarError::InvalidConstructor {
                class: self.name.clone(),
                reason: format!("no class method named {method}"),
            });
        }
        Ok(())
    }

    pub(crate) fn construct(&self, args: Vec<HostValue>) -> PolarResult<HostValue> {
        let result = match &self.constructor {
            None => return Err(self.construction_error("no constructor registered")),
            Some(Constructor::Positional { arity, build }) => {
                if let Some(expected) = arity
                    && *expected != args.len()
                {
                    return Err(self.construction_error(format!(
                        "expected {expected} arguments, got {}",
                        args.len()
                    )));
                }
                build(args)
            }
            Some(Constructor::Keyword(build)) if args.is_empty() => build(BTreeMap::new()),
            Some(Constructor::Keyword(_)) => {
                return Err(self.construction_error("constructor takes keyword arguments"));
            }
            Some(Constructor::ClassMethod(method)) => match self.class_methods.get(method) {
                Some(build) => build(args),
                None => return Err(self.construction_error(format!("no class method {method}"))),
            },
        };
        result.map_err(|e| self.construction_error(format!("{e:#}")))
    }

    pub(crate) fn construct_with_fields(
        &self,
        fields: BTreeMap<String, HostValue>,
    ) -> PolarResult<HostValue> {
        match &self.constructor {
            Some(Constructor::Keyword(build)) => {
                build(fields).map_err(|e| self.construction_error(format!("{e:#}")))
            }
            Some(_) if fields.is_empty() => self.construct(Vec::new()),
            Some(_) => Err(self.construction_error("constructor takes positional arguments")),
            None => Err(self.construction_error("no constructor registered")),
        }
    }

    pub(crate) fn get_attribute(&self, instance: &Instance, name: &str) -> PolarResult<HostValue> {
        if let Some(getter) = self.attributes.get(name) {
            return getter(instance.as_any()).map_err(|e| self.method_error(name, e));
        }
        // Zero-argument methods double as attributes.
        if let Some(method) = self.instance_methods.get(name) {
            return method(instance.as_any(), Vec::new()).map_err(|e| self.method_error(name, e));
        }
        Err(PolarError::method(&self.name, name, "no such attribute"))
    }

    pub(crate) fn call_method(
        &self,
        instance: &Instance,
        name: &str,
        args: Vec<HostValue>,
    ) -> PolarResult<HostValue> {
        match self.instance_methods.get(name) {
            Some(method) => method(instance.as_any(), args).map_err(|e| self.method_error(name, e)),
            None => Err(PolarError::method(&self.name, name, "no such method")),
        }
    }

    pub(crate) fn call_class_method(
        &self,
        name: &str,
        args: Vec<HostValue>,
    ) -> PolarResult<HostValue> {
        match self.class_methods.get(name) {
            Some(method) => method(args).map_err(|e| self.method_error(name, e)),
            None => Err(PolarError::method(&self.name, name, "no such class method")),
        }
    }

    /// `None` when the class has no equality hook.
    pub(crate) fn equals(&self, left: &Instance, right: &Instance) -> Option<bool> {
        self.equality
            .as_ref()
            .map(|eq| eq(left.as_any(), right.as_any()))
    }

    /// Outer `None`: no ordering hook. Inner `None`: the two are incomparable.
    pub(crate) fn compare(&self, left: &Instance, right: &Instance) -> Option<Option<Ordering>> {
        self.ordering
            .as_ref()
            .map(|cmp| cmp(left.as_any(), right.as_any()))
    }

    fn construction_error(&self, message: impl Into<String>) -> PolarError {
        PolarError::Construction {
            class: self.name.clone(),
            message: message.into(),
        }
    }

    fn method_error(&self, name: &str, err: anyhow::Error) -> PolarError {
        PolarError::method(&self.name, name, format!("{err:#}"))
    }
}

/// Typed builder for `Class`.
pub struct ClassBuilder<T> {
    class: Class,
    _marker: PhantomData<T>,
}

impl<T: 'static> Default for ClassBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ClassBuilder<T> {
    /// Starts with the type's own name (last path segment) and no constructor.
    pub fn new() -> Self {
        Self {
            class: Class {
                name: short_type_name(std::any::type_name::<T>()).to_string(),
                type_id: TypeId::of::<T>(),
                constructor: None,
                attributes: HashMap::new(),
                instance_methods: HashMap::new(),
                class_methods: HashMap::new(),
                equality: None,
                ordering: None,
            },
            _marker: PhantomData,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.class.name = name.into();
        self
    }

    pub fn set_constructor<F>(mut self, build: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> anyhow::Result<T> + 'static,
    {
        self.class.constructor = Some(Constructor::Positional {
            arity: None,
            build: Rc::new(move |args| build(args).map(HostValue::instance)),
        });
        self
    }

    pub fn set_constructor_with_arity<F>(mut self, arity: usize, build: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> anyhow::Result<T> + 'static,
    {
        self.class.constructor = Some(Constructor::Positional {
            arity: Some(arity),
            build: Rc::new(move |args| build(args).map(HostValue::instance)),
        });
        self
    }

    pub fn set_keyword_constructor<F>(mut self, build: F) -> Self
    where
        F: Fn(BTreeMap<String, HostValue>) -> anyhow::Result<T> + 'static,
    {
        self.class.constructor = Some(Constructor::Keyword(Rc::new(move |fields| {
            build(fields).map(HostValue::instance)
        })));
        self
    }

    /// Construct through the class method `method`. Checked at registration.
    pub fn constructor_method(mut self, method: impl Into<String>) -> Self {
        self.class.constructor = Some(Constructor::ClassMethod(method.into()));
        self
    }

    pub fn add_attribute_getter<F, R>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&T) -> R + 'static,
        R: Into<HostValue>,
    {
        let getter: AttributeFn = Rc::new(move |receiver| Ok(getter(downcast::<T>(receiver)?).into()));
        self.class.attributes.insert(name.to_string(), getter);
        self
    }

    pub fn add_method<F, R>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&T, Vec<HostValue>) -> anyhow::Result<R> + 'static,
        R: Into<HostValue>,
    {
        let method: MethodFn =
            Rc::new(move |receiver, args| Ok(method(downcast::<T>(receiver)?, args)?.into()));
        self.class.instance_methods.insert(name.to_string(), method);
        self
    }

    pub fn add_class_method<F, R>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> anyhow::Result<R> + 'static,
        R: Into<HostValue>,
    {
        let method: PositionalFn = Rc::new(move |args| Ok(method(args)?.into()));
        self.class.class_methods.insert(name.to_string(), method);
        self
    }

    pub fn build(self) -> Class {
        self.class
    }
}

impl<T: Default + 'static> ClassBuilder<T> {
    /// A builder whose zero-argument constructor is `T::default()`.
    pub fn with_default() -> Self {
        Self::new().set_constructor_with_arity(0, |_| Ok(T::default()))
    }
}

impl<T: PartialEq + 'static> ClassBuilder<T> {
    pub fn with_equality_check(mut self) -> Self {
        self.class.equality = Some(Rc::new(|left, right| {
            match (left.downcast_ref::<T>(), right.downcast_ref::<T>()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            }
        }));
        self
    }
}

impl<T: PartialOrd + 'static> ClassBuilder<T> {
    pub fn with_ordering(mut self) -> Self {
        self.class.ordering = Some(Rc::new(|left, right| {
            match (left.downcast_ref::<T>(), right.downcast_ref::<T>()) {
                (Some(l), Some(r)) => l.partial_cmp(r),
                _ => None,
            }
        }));
        self
    }
}

fn downcast<T: 'static>(receiver: &dyn Any) -> anyhow::Result<&T> {
    receiver
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("receiver is not a {}", std::any::type_name::<T>()))
}

/// Registered classes and constants.
///
/// Owned by the runtime facade and shared by every host object cache; it
/// outlives engine handles so a reset does not lose registrations.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Rc<Class>>,
    by_type: HashMap<TypeId, String>,
    constants: IndexMap<String, HostValue>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: Class) -> PolarResult<Rc<Class>> {
        if self.classes.contains_key(&class.name) {
            return Err(PolarError::DuplicateClassAlias { name: class.name });
        }
        class.validate()?;

        let class = Rc::new(class);
        self.by_type
            .entry(class.type_id)
            .or_insert_with(|| class.name.clone());
        self.classes.insert(class.name.clone(), Rc::clone(&class));
        Ok(class)
    }

    /// Undo `register` for `name`.
    pub(crate) fn unregister(&mut self, name: &str) -> Option<Rc<Class>> {
        let class = self.classes.remove(name)?;
        if self.by_type.get(&class.type_id).map(String::as_str) == Some(name) {
            self.by_type.remove(&class.type_id);
            // Hand the type to a remaining alias, if any.
            if let Some(alias) = self
                .classes
                .values()
                .find(|other| other.type_id == class.type_id)
            {
                self.by_type.insert(class.type_id, alias.name.clone());
            }
        }
        Some(class)
    }

    pub fn get(&self, name: &str) -> Option<Rc<Class>> {
        self.classes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// The class an instance was registered under (first name wins for aliases).
    pub fn class_of(&self, instance: &Instance) -> Option<Rc<Class>> {
        self.by_type
            .get(&instance.type_id())
            .and_then(|name| self.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub(crate) fn record_constant(&mut self, name: String, value: HostValue) {
        self.constants.insert(name, value);
    }

    /// Constants in registration order.
    pub fn constants(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), v))
    }
}
