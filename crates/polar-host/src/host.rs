//! Host object cache and term conversion.
//!
//! Every query gets its own `Host` (see `Host::duplicate`): a private map of
//! instance tokens over the shared class registry. Tokens are drawn from the
//! engine handle's counter so caches never hand out the same id twice.

use crate::class::{Class, ClassRegistry};
use crate::error::{PolarError, PolarResult};
use crate::value::{HostValue, Instance, Predicate, Variable};
use polar_host_types::ids::{
    CLASS_BOOLEAN, CLASS_DICTIONARY, CLASS_FLOAT, CLASS_INTEGER, CLASS_LIST, CLASS_STRING,
};
use polar_host_types::{Call, Counter, ExternalInstance, Operator, Symbol, Term};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct Host {
    registry: Rc<RefCell<ClassRegistry>>,
    instances: HashMap<u64, HostValue>,
    counter: Counter,
}

impl Host {
    pub fn new(registry: Rc<RefCell<ClassRegistry>>, counter: Counter) -> Self {
        Self {
            registry,
            instances: HashMap::new(),
            counter,
        }
    }

    /// A cache for a new query: same registry and counter, copied tokens.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn registry(&self) -> &Rc<RefCell<ClassRegistry>> {
        &self.registry
    }

    pub fn has_instance(&self, id: u64) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn get_instance(&self, id: u64) -> PolarResult<&HostValue> {
        self.instances
            .get(&id)
            .ok_or(PolarError::UnregisteredInstance { id })
    }

    /// Cache `value` under `id`, or under a freshly minted token.
    pub fn cache_instance(&mut self, value: HostValue, id: Option<u64>) -> PolarResult<u64> {
        let id = match id {
            Some(id) if self.has_instance(id) => return Err(PolarError::DuplicateInstance { id }),
            Some(id) => id,
            None => self.counter.next_id(),
        };
        self.instances.insert(id, value);
        Ok(id)
    }

    pub fn get_class(&self, name: &str) -> PolarResult<Rc<Class>> {
        self.registry
            .borrow()
            .get(name)
            .ok_or_else(|| PolarError::UnregisteredClass {
                name: name.to_string(),
            })
    }

    pub fn to_term(&mut self, value: &HostValue) -> Term {
        match value {
            HostValue::Boolean(b) => Term::Boolean(*b),
            HostValue::Integer(i) => Term::Integer(*i),
            HostValue::Float(x) => Term::Float(*x),
            HostValue::String(s) => Term::String(s.clone()),
            HostValue::List(items) => Term::List(items.iter().map(|v| self.to_term(v)).collect()),
            HostValue::Dictionary(fields) => Term::Dictionary(
                fields
                    .iter()
                    .map(|(k, v)| (Symbol::new(k.as_str()), self.to_term(v)))
                    .collect(),
            ),
            HostValue::Predicate(p) => Term::Call(Call {
                name: Symbol::new(p.name.as_str()),
                args: p.args.iter().map(|v| self.to_term(v)).collect(),
            }),
            HostValue::Variable(v) => Term::var(v.name()),
            HostValue::Instance(i) => {
                let repr = self.instance_repr(i);
                self.external(value.clone(), repr)
            }
            HostValue::Class(c) => {
                let repr = c.name().to_string();
                self.external(value.clone(), repr)
            }
        }
    }

    fn external(&mut self, value: HostValue, repr: String) -> Term {
        let instance_id = self.counter.next_id();
        self.instances.insert(instance_id, value);
        Term::ExternalInstance(ExternalInstance {
            instance_id,
            constructor: None,
            repr: Some(repr),
        })
    }

    fn instance_repr(&self, instance: &Instance) -> String {
        match self.registry.borrow().class_of(instance) {
            Some(class) => class.name().to_string(),
            None => instance.short_type_name().to_string(),
        }
    }

    pub fn to_host(&mut self, term: &Term) -> PolarResult<HostValue> {
        Ok(match term {
            Term::Boolean(b) => HostValue::Boolean(*b),
            Term::Integer(i) => HostValue::Integer(*i),
            Term::Float(x) => HostValue::Float(*x),
            Term::String(s) => HostValue::String(s.clone()),
            Term::List(items) => HostValue::List(
                items
                    .iter()
                    .map(|t| self.to_host(t))
                    .collect::<PolarResult<_>>()?,
            ),
            Term::Dictionary(fields) => HostValue::Dictionary(self.fields_to_host(fields)?),
            Term::Call(call) => HostValue::Predicate(Predicate::new(
                call.name.as_str(),
                call.args
                    .iter()
                    .map(|t| self.to_host(t))
                    .collect::<PolarResult<_>>()?,
            )),
            Term::Variable(name) => HostValue::Variable(Variable::new(name.as_str())),
            Term::ExternalInstance(external) => {
                let id = external.instance_id;
                if !self.has_instance(id) {
                    match &external.constructor {
                        Some(constructor) => self.make_instance(constructor, id)?,
                        None => return Err(PolarError::UnregisteredInstance { id }),
                    }
                }
                self.get_instance(id)?.clone()
            }
            Term::InstanceLiteral(_) => {
                return Err(PolarError::UnexpectedTerm {
                    kind: term.kind().to_string(),
                });
            }
        })
    }

    fn fields_to_host(
        &mut self,
        fields: &BTreeMap<Symbol, Term>,
    ) -> PolarResult<BTreeMap<String, HostValue>> {
        fields
            .iter()
            .map(|(k, v)| Ok((k.as_str().to_string(), self.to_host(v)?)))
            .collect()
    }

    /// Build a host value from `constructor` and cache it under `id`.
    pub fn make_instance(&mut self, constructor: &Term, id: u64) -> PolarResult<()> {
        if self.has_instance(id) {
            return Err(PolarError::DuplicateInstance { id });
        }
        let value = match constructor {
            Term::Call(call) => {
                let class = self.get_class(call.name.as_str())?;
                let args = call
                    .args
                    .iter()
                    .map(|t| self.to_host(t))
                    .collect::<PolarResult<Vec<_>>>()?;
                class.construct(args)?
            }
            Term::InstanceLiteral(literal) => {
                let class = self.get_class(literal.tag.as_str())?;
                let fields = self.fields_to_host(&literal.fields)?;
                class.construct_with_fields(fields)?
            }
            other => {
                return Err(PolarError::UnexpectedTerm {
                    kind: other.kind().to_string(),
                });
            }
        };
        self.cache_instance(value, Some(id))?;
        Ok(())
    }

    pub fn isa(&mut self, instance: &Term, class_tag: &str) -> PolarResult<bool> {
        let value = self.to_host(instance)?;
        let builtin = match class_tag {
            CLASS_BOOLEAN => Some(matches!(value, HostValue::Boolean(_))),
            CLASS_INTEGER => Some(matches!(value, HostValue::Integer(_))),
            CLASS_FLOAT => Some(matches!(value, HostValue::Float(_))),
            CLASS_STRING => Some(matches!(value, HostValue::String(_))),
            CLASS_LIST => Some(matches!(value, HostValue::List(_))),
            CLASS_DICTIONARY => Some(matches!(value, HostValue::Dictionary(_))),
            _ => None,
        };
        if let Some(answer) = builtin {
            return Ok(answer);
        }

        let class = self.get_class(class_tag)?;
        Ok(match &value {
            HostValue::Instance(i) => class.is_instance(i),
            _ => false,
        })
    }

    /// Host types have no inheritance: a class is only a subclass of itself.
    pub fn is_subclass(&self, left_tag: &str, right_tag: &str) -> bool {
        left_tag == right_tag && (is_builtin_class(left_tag) || self.registry.borrow().contains(left_tag))
    }

    pub fn unify(&self, left_id: u64, right_id: u64) -> PolarResult<bool> {
        let left = self.cached_operand(left_id)?;
        let right = self.cached_operand(right_id)?;
        Ok(match (left, right) {
            (HostValue::Instance(l), HostValue::Instance(r)) => {
                l.same_object(r) || self.instance_equality(l, r).unwrap_or(false)
            }
            (l, r) => l == r,
        })
    }

    fn cached_operand(&self, id: u64) -> PolarResult<&HostValue> {
        self.instances
            .get(&id)
            .ok_or_else(|| PolarError::comparison(format!("unknown instance {id}")))
    }

    fn instance_equality(&self, left: &Instance, right: &Instance) -> Option<bool> {
        if left.type_id() != right.type_id() {
            return Some(false);
        }
        self.registry
            .borrow()
            .class_of(left)
            .and_then(|class| class.equals(left, right))
    }

    pub fn compare(&mut self, operator: Operator, args: &[Term]) -> PolarResult<bool> {
        let [left, right] = args else {
            return Err(PolarError::comparison(format!(
                "{operator} expects 2 operands, got {}",
                args.len()
            )));
        };
        let left = self.to_host(left)?;
        let right = self.to_host(right)?;

        if let (HostValue::Instance(l), HostValue::Instance(r)) = (&left, &right) {
            return self.compare_instances(operator, l, r);
        }

        let ordering = match (&left, &right) {
            (HostValue::Integer(a), HostValue::Integer(b)) => Some(a.cmp(b)),
            (HostValue::Integer(_) | HostValue::Float(_), HostValue::Integer(_) | HostValue::Float(_)) => {
                match (left.as_float(), right.as_float()) {
                    (Some(a), Some(b)) => match a.partial_cmp(&b) {
                        Some(ordering) => Some(ordering),
                        // NaN is unequal to everything.
                        None => return Ok(operator == Operator::Neq),
                    },
                    _ => None,
                }
            }
            (HostValue::String(a), HostValue::String(b)) => Some(a.cmp(b)),
            (HostValue::Boolean(a), HostValue::Boolean(b)) => Some(a.cmp(b)),
            _ if is_equality(operator) => return Ok((left == right) == (operator == Operator::Eq)),
            _ => None,
        };

        match ordering {
            Some(ordering) => Ok(apply(operator, ordering)),
            None => Err(PolarError::comparison(format!(
                "cannot compare {} {operator} {}",
                left.kind(),
                right.kind()
            ))),
        }
    }

    fn compare_instances(
        &self,
        operator: Operator,
        left: &Instance,
        right: &Instance,
    ) -> PolarResult<bool> {
        let class = self
            .registry
            .borrow()
            .class_of(left)
            .ok_or_else(|| {
                PolarError::comparison(format!(
                    "{} is not a registered class",
                    left.short_type_name()
                ))
            })?;

        if is_equality(operator) {
            if left.same_object(right) {
                return Ok(operator == Operator::Eq);
            }
            if let Some(equal) = class.equals(left, right) {
                return Ok(equal == (operator == Operator::Eq));
            }
        }

        match class.compare(left, right) {
            Some(Some(ordering)) => Ok(apply(operator, ordering)),
            Some(None) if is_equality(operator) => Ok(operator == Operator::Neq),
            Some(None) => Err(PolarError::comparison(format!(
                "{} instances are not comparable with {operator}",
                class.name()
            ))),
            None => Err(PolarError::comparison(format!(
                "{} does not support {operator}",
                class.name()
            ))),
        }
    }

    /// Attribute lookup (`args == None`) or method call on a host value.
    pub fn call_attribute(
        &mut self,
        receiver: &Term,
        attribute: &str,
        args: Option<&[Term]>,
    ) -> PolarResult<Term> {
        let receiver = self.to_host(receiver)?;
        let args = args
            .map(|args| {
                args.iter()
                    .map(|t| self.to_host(t))
                    .collect::<PolarResult<Vec<_>>>()
            })
            .transpose()?;

        let result = match &receiver {
            HostValue::Instance(instance) => {
                let class = self.registry.borrow().class_of(instance).ok_or_else(|| {
                    PolarError::method(
                        instance.short_type_name(),
                        attribute,
                        "instance of an unregistered class",
                    )
                })?;
                match args {
                    None => class.get_attribute(instance, attribute)?,
                    Some(args) => class.call_method(instance, attribute, args)?,
                }
            }
            HostValue::Class(class) => {
                class.call_class_method(attribute, args.unwrap_or_default())?
            }
            HostValue::Dictionary(fields) if args.is_none() => fields
                .get(attribute)
                .cloned()
                .ok_or_else(|| PolarError::method("dictionary", attribute, "no such key"))?,
            other => {
                return Err(PolarError::method(other.kind(), attribute, "no such attribute"));
            }
        };
        Ok(self.to_term(&result))
    }
}

fn is_builtin_class(tag: &str) -> bool {
    matches!(
        tag,
        CLASS_BOOLEAN | CLASS_INTEGER | CLASS_FLOAT | CLASS_STRING | CLASS_LIST | CLASS_DICTIONARY
    )
}

fn is_equality(operator: Operator) -> bool {
    matches!(operator, Operator::Eq | Operator::Neq)
}

fn apply(operator: Operator, ordering: Ordering) -> bool {
    match operator {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Neq => ordering != Ordering::Equal,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Leq => ordering != Ordering::Greater,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Geq => ordering != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use polar_host_types::InstanceLiteral;

    #[derive(Debug, PartialEq, PartialOrd)]
    struct Version(i64);

    #[derive(Debug)]
    struct Opaque;

    fn host() -> Host {
        let mut registry = ClassRegistry::new();
        registry
            .register(
                ClassBuilder::<Version>::new()
                    .set_constructor_with_arity(1, |args| {
                        args[0]
                            .as_integer()
                            .map(Version)
                            .ok_or_else(|| anyhow::anyhow!("version must be an integer"))
                    })
                    .add_attribute_getter("major", |v| v.0)
                    .add_method("newer_than", |v, args| {
                        Ok(args.first().and_then(HostValue::as_integer).is_some_and(|o| v.0 > o))
                    })
                    .add_class_method("zero", |_| Ok(HostValue::instance(Version(0))))
                    .with_equality_check()
                    .with_ordering()
                    .build(),
            )
            .expect("register Version");
        registry
            .register(ClassBuilder::<Opaque>::new().build())
            .expect("register Opaque");
        Host::new(Rc::new(RefCell::new(registry)), Counter::new())
    }

    fn external_id(term: &Term) -> u64 {
        term.instance_id().expect("external instance")
    }

    #[test]
    fn instances_keep_their_identity_across_the_boundary() {
        let mut host = host();
        let value = HostValue::instance(Version(1));
        let term = host.to_term(&value);
        let back = host.to_host(&term).expect("resolve");
        assert_eq!(back, value);
        assert!(back.as_instance().expect("instance").same_object(value.as_instance().expect("instance")));
    }

    #[test]
    fn each_conversion_mints_a_new_token() {
        let mut host = host();
        let value = HostValue::instance(Version(1));
        let a = external_id(&host.to_term(&value));
        let b = external_id(&host.to_term(&value));
        assert_ne!(a, b);
    }

    #[test]
    fn duplicated_caches_share_the_counter_but_not_tokens() {
        let base = host();
        let mut one = base.duplicate();
        let mut two = base.duplicate();
        let a = external_id(&one.to_term(&HostValue::instance(Version(1))));
        let b = external_id(&two.to_term(&HostValue::instance(Version(2))));
        assert_ne!(a, b);
        assert!(one.has_instance(a) && !one.has_instance(b));
        assert!(matches!(
            two.to_host(&Term::external(a)),
            Err(PolarError::UnregisteredInstance { id }) if id == a
        ));
        assert!(!base.has_instance(a));
    }

    #[test]
    fn unknown_tokens_with_a_constructor_are_built_and_cached() {
        let mut host = host();
        let term = Term::ExternalInstance(ExternalInstance {
            instance_id: 40,
            constructor: Some(Box::new(Term::call("Version", vec![Term::Integer(3)]))),
            repr: None,
        });
        let value = host.to_host(&term).expect("construct");
        assert_eq!(value.downcast_ref::<Version>(), Some(&Version(3)));
        assert!(host.has_instance(40));
        assert_eq!(host.to_host(&Term::external(40)).expect("cached"), value);
    }

    #[test]
    fn make_instance_failures() {
        let mut host = host();
        let err = host
            .make_instance(&Term::call("Missing", vec![]), 1)
            .expect_err("unknown class");
        assert!(matches!(err, PolarError::UnregisteredClass { ref name } if name == "Missing"));

        let err = host
            .make_instance(&Term::call("Version", vec![]), 1)
            .expect_err("arity");
        assert!(matches!(err, PolarError::Construction { .. }));

        host.make_instance(&Term::call("Version", vec![Term::Integer(1)]), 1)
            .expect("first");
        let err = host
            .make_instance(&Term::call("Version", vec![Term::Integer(1)]), 1)
            .expect_err("duplicate");
        assert!(matches!(err, PolarError::DuplicateInstance { id: 1 }));
    }

    #[test]
    fn instance_literals_only_appear_as_constructors() {
        let mut host = host();
        let literal = Term::InstanceLiteral(InstanceLiteral {
            tag: Symbol::new("Version"),
            fields: BTreeMap::new(),
        });
        assert!(matches!(
            host.to_host(&literal),
            Err(PolarError::UnexpectedTerm { .. })
        ));
    }

    #[test]
    fn isa_knows_builtin_and_registered_classes() {
        let mut host = host();
        assert!(host.isa(&Term::Integer(1), "Integer").expect("isa"));
        assert!(!host.isa(&Term::Integer(1), "String").expect("isa"));
        assert!(host.isa(&Term::List(vec![]), "List").expect("isa"));

        let version = host.to_term(&HostValue::instance(Version(1)));
        assert!(host.isa(&version, "Version").expect("isa"));
        assert!(!host.isa(&version, "Opaque").expect("isa"));
        assert!(!host.isa(&Term::Integer(1), "Version").expect("isa"));
        assert!(matches!(
            host.isa(&version, "Nope"),
            Err(PolarError::UnregisteredClass { .. })
        ));
    }

    #[test]
    fn subclassing_is_reflexive_only() {
        let host = host();
        assert!(host.is_subclass("Version", "Version"));
        assert!(host.is_subclass("Integer", "Integer"));
        assert!(!host.is_subclass("Version", "Opaque"));
        assert!(!host.is_subclass("Nope", "Nope"));
    }

    #[test]
    fn unify_uses_identity_then_equality_hook() {
        let mut host = host();
        let shared = HostValue::instance(Opaque);
        let a = external_id(&host.to_term(&shared));
        let b = external_id(&host.to_term(&shared));
        let c = external_id(&host.to_term(&HostValue::instance(Opaque)));
        assert!(host.unify(a, b).expect("unify"));
        assert!(!host.unify(a, c).expect("unify"));

        let v1 = external_id(&host.to_term(&HostValue::instance(Version(1))));
        let v1b = external_id(&host.to_term(&HostValue::instance(Version(1))));
        assert!(host.unify(v1, v1b).expect("unify"));
        assert!(!host.unify(v1, a).expect("unify"));

        assert!(matches!(host.unify(v1, 999), Err(PolarError::Comparison { .. })));
    }

    #[test]
    fn compare_primitives_natively() {
        let mut host = host();
        assert!(host.compare(Operator::Lt, &[Term::Integer(1), Term::Float(1.5)]).expect("cmp"));
        assert!(host.compare(Operator::Geq, &[Term::String("b".into()), Term::String("a".into())]).expect("cmp"));
        assert!(host.compare(Operator::Neq, &[Term::Integer(1), Term::String("1".into())]).expect("cmp"));
        assert!(host.compare(Operator::Lt, &[Term::Integer(1), Term::String("1".into())]).is_err());
        assert!(matches!(
            host.compare(Operator::Eq, &[Term::Integer(1)]),
            Err(PolarError::Comparison { .. })
        ));
    }

    #[test]
    fn compare_instances_through_hooks() {
        let mut host = host();
        let v1 = host.to_term(&HostValue::instance(Version(1)));
        let v2 = host.to_term(&HostValue::instance(Version(2)));
        assert!(host.compare(Operator::Lt, &[v1.clone(), v2.clone()]).expect("cmp"));
        assert!(host.compare(Operator::Neq, &[v1, v2]).expect("cmp"));

        let o1 = host.to_term(&HostValue::instance(Opaque));
        let o2 = host.to_term(&HostValue::instance(Opaque));
        assert!(host.compare(Operator::Eq, &[o1.clone(), o1.clone()]).expect("same object"));
        assert!(matches!(
            host.compare(Operator::Eq, &[o1.clone(), o2.clone()]),
            Err(PolarError::Comparison { .. })
        ));
        assert!(matches!(
            host.compare(Operator::Gt, &[o1, o2]),
            Err(PolarError::Comparison { .. })
        ));
    }

    #[test]
    fn call_attribute_dispatches_by_receiver() {
        let mut host = host();
        let version = host.to_term(&HostValue::instance(Version(7)));
        assert_eq!(
            host.call_attribute(&version, "major", None).expect("attr"),
            Term::Integer(7)
        );
        assert_eq!(
            host.call_attribute(&version, "newer_than", Some([Term::Integer(3)].as_slice()))
                .expect("method"),
            Term::Boolean(true)
        );

        let class = host.get_class("Version").expect("class");
        let class_term = host.to_term(&HostValue::Class(class));
        let zero = host
            .call_attribute(&class_term, "zero", Some(&[][..]))
            .expect("class method");
        let zero = host.to_host(&zero).expect("resolve");
        assert_eq!(zero.downcast_ref::<Version>(), Some(&Version(0)));

        let mut fields = BTreeMap::new();
        fields.insert(Symbol::new("k"), Term::String("v".into()));
        assert_eq!(
            host.call_attribute(&Term::Dictionary(fields), "k", None)
                .expect("key"),
            Term::String("v".into())
        );

        assert!(matches!(
            host.call_attribute(&Term::Integer(1), "abs", None),
            Err(PolarError::Method { .. })
        ));
    }
}
