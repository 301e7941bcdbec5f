//! Host-side values: what callers pass in and get back out of queries.

use crate::class::Class;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum HostValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<HostValue>),
    Dictionary(BTreeMap<String, HostValue>),
    Predicate(Predicate),
    Variable(Variable),
    Instance(Instance),
    /// The registered class itself, not an instance of it.
    Class(Rc<Class>),
}

/// A structured query: rule name plus ordered arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub name: String,
    pub args: Vec<HostValue>,
}

/// An unbound query variable; the engine binds it in each result set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Variable(String);

/// An opaque host object.
///
/// Cloning shares the object; equality is identity.
#[derive(Clone)]
pub struct Instance {
    value: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Predicate {
    pub fn new(name: impl Into<String>, args: Vec<HostValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Instance {
    pub fn new<T: 'static>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    pub fn from_rc<T: 'static>(value: Rc<T>) -> Self {
        Self {
            value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `User` for `my_app::model::User`.
    pub fn short_type_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub fn same_object(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        self.value.as_ref()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl HostValue {
    /// Short lowercase name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::List(_) => "list",
            HostValue::Dictionary(_) => "dictionary",
            HostValue::Predicate(_) => "predicate",
            HostValue::Variable(_) => "variable",
            HostValue::Instance(_) => "instance",
            HostValue::Class(_) => "class",
        }
    }

    pub fn instance<T: 'static>(value: T) -> Self {
        HostValue::Instance(Instance::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            HostValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(x) => Some(*x),
            HostValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            HostValue::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<Class>> {
        match self {
            HostValue::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_instance().and_then(Instance::downcast_ref)
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Boolean(a), HostValue::Boolean(b)) => a == b,
            (HostValue::Integer(a), HostValue::Integer(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => a == b,
            (HostValue::Dictionary(a), HostValue::Dictionary(b)) => a == b,
            (HostValue::Predicate(a), HostValue::Predicate(b)) => a == b,
            (HostValue::Variable(a), HostValue::Variable(b)) => a == b,
            (HostValue::Instance(a), HostValue::Instance(b)) => a.same_object(b),
            (HostValue::Class(a), HostValue::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Boolean(b) => write!(f, "{b}"),
            HostValue::Integer(i) => write!(f, "{i}"),
            HostValue::Float(x) => write!(f, "{x:?}"),
            HostValue::String(s) => write!(f, "{s:?}"),
            HostValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            HostValue::Dictionary(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            HostValue::Predicate(p) => {
                write!(f, "{}(", p.name)?;
                for (i, arg) in p.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            HostValue::Variable(v) => f.write_str(v.name()),
            HostValue::Instance(i) => write!(f, "<{}>", i.short_type_name()),
            HostValue::Class(c) => f.write_str(c.name()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Integer(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Integer(i64::from(value))
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        HostValue::Integer(i64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(value: Vec<T>) -> Self {
        HostValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<BTreeMap<String, T>> for HostValue {
    fn from(value: BTreeMap<String, T>) -> Self {
        HostValue::Dictionary(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<Predicate> for HostValue {
    fn from(value: Predicate) -> Self {
        HostValue::Predicate(value)
    }
}

impl From<Variable> for HostValue {
    fn from(value: Variable) -> Self {
        HostValue::Variable(value)
    }
}

impl From<Instance> for HostValue {
    fn from(value: Instance) -> Self {
        HostValue::Instance(value)
    }
}
