//! The engine's value representation.
//!
//! Terms are what crosses the foreign boundary. The JSON shape (externally
//! tagged enums) is stable and described by the schema emitted by `xtask`.

use crate::Symbol;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum Term {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Term>),
    Dictionary(BTreeMap<Symbol, Term>),
    Call(Call),
    Variable(Symbol),
    ExternalInstance(ExternalInstance),
    InstanceLiteral(InstanceLiteral),
}

/// A predicate application: `name(arg, ...)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Call {
    pub name: Symbol,
    pub args: Vec<Term>,
}

/// Reference to a value that lives on the host side.
///
/// `constructor` is set when the engine asks the host to build the value
/// (`new Foo(1)`); `repr` is a display hint for error messages and REPL output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalInstance {
    pub instance_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<Box<Term>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repr: Option<String>,
}

/// `Tag{field: value, ...}`, the keyword form of a constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstanceLiteral {
    pub tag: Symbol,
    pub fields: BTreeMap<Symbol, Term>,
}

/// Comparison operators the engine may delegate to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl Term {
    pub fn call<S: Into<Symbol>>(name: S, args: Vec<Term>) -> Self {
        Term::Call(Call {
            name: name.into(),
            args,
        })
    }

    pub fn var<S: Into<Symbol>>(name: S) -> Self {
        Term::Variable(name.into())
    }

    pub fn external(instance_id: u64) -> Self {
        Term::ExternalInstance(ExternalInstance {
            instance_id,
            constructor: None,
            repr: None,
        })
    }

    /// Short lowercase name of the term's variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Term::Boolean(_) => "boolean",
            Term::Integer(_) => "integer",
            Term::Float(_) => "float",
            Term::String(_) => "string",
            Term::List(_) => "list",
            Term::Dictionary(_) => "dictionary",
            Term::Call(_) => "call",
            Term::Variable(_) => "variable",
            Term::ExternalInstance(_) => "external instance",
            Term::InstanceLiteral(_) => "instance literal",
        }
    }

    pub fn instance_id(&self) -> Option<u64> {
        match self {
            Term::ExternalInstance(e) => Some(e.instance_id),
            _ => None,
        }
    }
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::Lt => "<",
            Operator::Leq => "<=",
            Operator::Gt => ">",
            Operator::Geq => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_separated(f, &self.args)?;
        f.write_str(")")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Boolean(b) => write!(f, "{b}"),
            Term::Integer(i) => write!(f, "{i}"),
            Term::Float(x) => write!(f, "{x:?}"),
            Term::String(s) => write!(f, "{s:?}"),
            Term::List(items) => {
                f.write_str("[")?;
                write_separated(f, items)?;
                f.write_str("]")
            }
            Term::Dictionary(fields) => write_fields(f, "", fields),
            Term::Call(call) => write!(f, "{call}"),
            Term::Variable(name) => write!(f, "{name}"),
            Term::ExternalInstance(e) => match &e.repr {
                Some(repr) => f.write_str(repr),
                None => write!(f, "^{{id: {}}}", e.instance_id),
            },
            Term::InstanceLiteral(lit) => write_fields(f, lit.tag.as_str(), &lit.fields),
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, terms: &[Term]) -> fmt::Result {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{term}")?;
    }
    Ok(())
}

fn write_fields(
    f: &mut fmt::Formatter<'_>,
    tag: &str,
    fields: &BTreeMap<Symbol, Term>,
) -> fmt::Result {
    write!(f, "{tag}{{")?;
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}: {value}")?;
    }
    f.write_str("}")
}
