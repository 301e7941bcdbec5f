//! A scripted stand-in for the policy engine.
//!
//! Tests describe what the engine should do (per rule, per query text, per
//! loaded source) with a shared `Script`; every `ScriptedEngine` built from it
//! replays those steps and records what the host sent back. The script outlives
//! engine handles, so tests can observe a reset.

use polar_host_types::{
    Counter, Engine, EngineError, EngineQuery, HostRequest, Operator, StepResult, Symbol, Term,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

type RuleFn = Rc<dyn Fn(&[Term]) -> Vec<Step>>;

/// One scripted action of a query.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Return this result from `step()` as is.
    Emit(StepResult),
    /// Ask the host to construct a value under a freshly minted id.
    MakeExternal(Term),
    /// Yield `{var: <the value made by the last MakeExternal>}`.
    YieldExternal(String),
    /// Yield `{var: <the last call_result value>}`; end the query if it was `None`.
    YieldAnswer(String),
    /// End the query unless the last yes/no callback was answered `true`.
    RequireTrue,
}

impl Step {
    pub fn emit(result: StepResult) -> Self {
        Step::Emit(result)
    }

    pub fn yield_empty() -> Self {
        Step::Emit(StepResult::Yield(BTreeMap::new()))
    }

    pub fn yield_binding(var: &str, term: Term) -> Self {
        Self::yield_bindings([(var, term)])
    }

    pub fn yield_bindings<'a>(bindings: impl IntoIterator<Item = (&'a str, Term)>) -> Self {
        Step::Emit(StepResult::Yield(
            bindings
                .into_iter()
                .map(|(k, v)| (Symbol::new(k), v))
                .collect(),
        ))
    }

    pub fn error(err: EngineError) -> Self {
        Step::Emit(StepResult::Error(err))
    }

    pub fn callback(request: HostRequest) -> Self {
        Step::Emit(StepResult::HostCallback(request))
    }

    pub fn call(call_id: u64, instance: Term, attribute: &str, args: Option<Vec<Term>>) -> Self {
        Self::callback(HostRequest::ExternalCall {
            call_id,
            instance,
            attribute: Symbol::new(attribute),
            args,
        })
    }

    pub fn isa(call_id: u64, instance: Term, class_tag: &str) -> Self {
        Self::callback(HostRequest::ExternalIsa {
            call_id,
            instance,
            class_tag: Symbol::new(class_tag),
        })
    }

    pub fn op(call_id: u64, operator: Operator, args: Vec<Term>) -> Self {
        Self::callback(HostRequest::ExternalOp {
            call_id,
            operator,
            args,
        })
    }
}

/// Parse a JSON array of step results into `Step::Emit` steps.
pub fn steps_from_json(json: &str) -> serde_json::Result<Vec<Step>> {
    let results: Vec<StepResult> = serde_json::from_str(json)?;
    Ok(results.into_iter().map(Step::Emit).collect())
}

/// Something the host handed back to a scripted query.
#[derive(Clone, Debug, PartialEq)]
pub enum Answer {
    Call(u64, Option<Term>),
    Question(u64, bool),
    ApplicationError(String),
}

#[derive(Default)]
struct ScriptState {
    rules: HashMap<String, RuleFn>,
    text: HashMap<String, Vec<Step>>,
    inline: HashMap<String, Vec<Vec<Step>>>,
    load_errors: HashMap<String, EngineError>,
    constant_errors: HashMap<String, EngineError>,
    loads: Vec<(String, Option<String>)>,
    answers: Vec<Answer>,
    engines_created: usize,
}

/// Shared, cloneable description of engine behaviour plus a record of use.
#[derive(Clone, Default)]
pub struct Script(Rc<RefCell<ScriptState>>);

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structured queries for `name` run the steps `rule(args)` returns.
    pub fn rule(&self, name: &str, rule: impl Fn(&[Term]) -> Vec<Step> + 'static) {
        self.0
            .borrow_mut()
            .rules
            .insert(name.to_string(), Rc::new(rule));
    }

    /// Query text `text` parses and runs `steps`.
    pub fn text(&self, text: &str, steps: Vec<Step>) {
        self.0.borrow_mut().text.insert(text.to_string(), steps);
    }

    /// Loading exactly `src` surfaces one inline query per entry of `queries`.
    pub fn inline(&self, src: &str, queries: Vec<Vec<Step>>) {
        self.0.borrow_mut().inline.insert(src.to_string(), queries);
    }

    /// Loading exactly `src` fails with `err`.
    pub fn load_error(&self, src: &str, err: EngineError) {
        self.0
            .borrow_mut()
            .load_errors
            .insert(src.to_string(), err);
    }

    /// The next registration of constant `name`, on any engine, fails with `err`.
    pub fn fail_constant_once(&self, name: &str, err: EngineError) {
        self.0
            .borrow_mut()
            .constant_errors
            .insert(name.to_string(), err);
    }

    /// Every successful or failed `load`, in order.
    pub fn loads(&self) -> Vec<(String, Option<String>)> {
        self.0.borrow().loads.clone()
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.0.borrow().answers.clone()
    }

    pub fn application_errors(&self) -> Vec<String> {
        self.0
            .borrow()
            .answers
            .iter()
            .filter_map(|a| match a {
                Answer::ApplicationError(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn engines_created(&self) -> usize {
        self.0.borrow().engines_created
    }

    /// Engine factory for `Polar::with_factory`.
    pub fn factory(&self) -> impl Fn() -> ScriptedEngine + 'static {
        let script = self.clone();
        move || ScriptedEngine::new(script.clone())
    }

    fn record(&self, answer: Answer) {
        self.0.borrow_mut().answers.push(answer);
    }
}

/// An `Engine` whose behaviour comes from a `Script`.
pub struct ScriptedEngine {
    script: Script,
    counter: Counter,
    constants: BTreeMap<Symbol, Term>,
    pending_inline: VecDeque<ScriptedQuery>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new(Script::new())
    }
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        script.0.borrow_mut().engines_created += 1;
        Self {
            script,
            counter: Counter::new(),
            constants: BTreeMap::new(),
            pending_inline: VecDeque::new(),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Registered constant names, sorted.
    pub fn constant_names(&self) -> Vec<String> {
        self.constants.keys().map(|k| k.as_str().to_string()).collect()
    }

    pub fn constant(&self, name: &str) -> Option<&Term> {
        self.constants.get(name)
    }

    /// Inline queries surfaced by loads but not yet taken.
    pub fn pending_inline(&self) -> usize {
        self.pending_inline.len()
    }

    fn query(&self, steps: Vec<Step>) -> ScriptedQuery {
        ScriptedQuery {
            steps: steps.into(),
            script: self.script.clone(),
            counter: self.counter.clone(),
            last_external: None,
            last_call: None,
            last_question: None,
        }
    }
}

impl Engine for ScriptedEngine {
    type Query = ScriptedQuery;

    fn load(&mut self, src: &str, filename: Option<&str>) -> Result<(), EngineError> {
        let (error, inline) = {
            let mut state = self.script.0.borrow_mut();
            state
                .loads
                .push((src.to_string(), filename.map(str::to_string)));
            (
                state.load_errors.get(src).cloned(),
                state.inline.get(src).cloned().unwrap_or_default(),
            )
        };
        if let Some(err) = error {
            return Err(err);
        }
        for steps in inline {
            let query = self.query(steps);
            self.pending_inline.push_back(query);
        }
        Ok(())
    }

    fn next_inline_query(&mut self) -> Option<Self::Query> {
        self.pending_inline.pop_front()
    }

    fn new_query_from_text(&mut self, text: &str) -> Result<Self::Query, EngineError> {
        let steps = self.script.0.borrow().text.get(text).cloned();
        if let Some(steps) = steps {
            return Ok(self.query(steps));
        }
        // A bare constant name evaluates to its value.
        if let Some(value) = self.constants.get(text) {
            let step = Step::yield_binding(text, value.clone());
            return Ok(self.query(vec![step]));
        }
        Err(EngineError::parse(format!("unexpected token: {text}")))
    }

    fn new_query_from_term(&mut self, term: Term) -> Self::Query {
        let steps = match &term {
            Term::Call(call) => {
                let rule = self.script.0.borrow().rules.get(call.name.as_str()).cloned();
                rule.map(|rule| rule(call.args.as_slice())).unwrap_or_default()
            }
            _ => Vec::new(),
        };
        self.query(steps)
    }

    fn register_constant(&mut self, name: Symbol, value: Term) -> Result<(), EngineError> {
        let failure = self
            .script
            .0
            .borrow_mut()
            .constant_errors
            .remove(name.as_str());
        if let Some(err) = failure {
            return Err(err);
        }
        self.constants.insert(name, value);
        Ok(())
    }

    fn counter(&self) -> Counter {
        self.counter.clone()
    }
}

/// A query replaying scripted steps.
pub struct ScriptedQuery {
    steps: VecDeque<Step>,
    script: Script,
    counter: Counter,
    last_external: Option<u64>,
    last_call: Option<Option<Term>>,
    last_question: Option<bool>,
}

impl ScriptedQuery {
    fn finish(&mut self) -> StepResult {
        self.steps.clear();
        StepResult::Done
    }
}

impl EngineQuery for ScriptedQuery {
    fn step(&mut self) -> StepResult {
        loop {
            let Some(step) = self.steps.pop_front() else {
                return StepResult::Done;
            };
            match step {
                Step::Emit(result) => return result,
                Step::MakeExternal(constructor) => {
                    let instance_id = self.counter.next_id();
                    self.last_external = Some(instance_id);
                    return StepResult::HostCallback(HostRequest::MakeExternal {
                        instance_id,
                        constructor,
                    });
                }
                Step::YieldExternal(var) => match self.last_external {
                    Some(id) => return Step::yield_binding(&var, Term::external(id)).into_result(),
                    None => {
                        return StepResult::Error(EngineError::internal(
                            "no external instance was made",
                        ));
                    }
                },
                Step::YieldAnswer(var) => match self.last_call.take().flatten() {
                    Some(term) => return Step::yield_binding(&var, term).into_result(),
                    None => return self.finish(),
                },
                Step::RequireTrue => {
                    if self.last_question.take() != Some(true) {
                        return self.finish();
                    }
                }
            }
        }
    }

    fn call_result(&mut self, call_id: u64, value: Option<Term>) -> Result<(), EngineError> {
        self.script.record(Answer::Call(call_id, value.clone()));
        self.last_call = Some(value);
        Ok(())
    }

    fn question_result(&mut self, call_id: u64, answer: bool) -> Result<(), EngineError> {
        self.script.record(Answer::Question(call_id, answer));
        self.last_question = Some(answer);
        Ok(())
    }

    fn application_error(&mut self, message: String) -> Result<(), EngineError> {
        self.script.record(Answer::ApplicationError(message));
        Ok(())
    }
}

impl Step {
    fn into_result(self) -> StepResult {
        match self {
            Step::Emit(result) => result,
            _ => StepResult::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_receive_call_arguments() {
        let script = Script::new();
        script.rule("even", |args| match args {
            [Term::Integer(n)] if n % 2 == 0 => vec![Step::yield_empty()],
            _ => vec![],
        });
        let mut engine = ScriptedEngine::new(script.clone());
        let mut query = engine.new_query_from_term(Term::call("even", vec![Term::Integer(4)]));
        assert_eq!(query.step(), StepResult::Yield(BTreeMap::new()));
        assert_eq!(query.step(), StepResult::Done);

        let mut query = engine.new_query_from_term(Term::call("even", vec![Term::Integer(3)]));
        assert_eq!(query.step(), StepResult::Done);
    }

    #[test]
    fn constant_failures_fire_once() {
        let script = Script::new();
        script.fail_constant_once("limit", EngineError::runtime("transient"));
        let mut engine = ScriptedEngine::new(script);
        let err = engine
            .register_constant(Symbol::new("limit"), Term::Integer(1))
            .expect_err("first registration fails");
        assert_eq!(err, EngineError::runtime("transient"));
        assert!(engine.constant("limit").is_none());

        engine
            .register_constant(Symbol::new("limit"), Term::Integer(1))
            .expect("retry succeeds");
        assert_eq!(engine.constant("limit"), Some(&Term::Integer(1)));
    }

    #[test]
    fn make_external_draws_from_the_engine_counter() {
        let engine = ScriptedEngine::default();
        let host_side = engine.counter();
        assert_eq!(host_side.next_id(), 1);

        let mut query = engine.query(vec![
            Step::MakeExternal(Term::call("User", vec![])),
            Step::YieldExternal("u".to_string()),
        ]);
        match query.step() {
            StepResult::HostCallback(HostRequest::MakeExternal { instance_id, .. }) => {
                assert_eq!(instance_id, 2);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(
            query.step(),
            Step::yield_binding("u", Term::external(2)).into_result()
        );
    }

    #[test]
    fn require_true_gates_on_the_last_answer() {
        let engine = ScriptedEngine::default();
        let mut query = engine.query(vec![
            Step::isa(1, Term::Integer(1), "Integer"),
            Step::RequireTrue,
            Step::yield_empty(),
        ]);
        assert!(matches!(query.step(), StepResult::HostCallback(_)));
        query.question_result(1, false).expect("answer");
        assert_eq!(query.step(), StepResult::Done);
        assert_eq!(query.step(), StepResult::Done);
        assert_eq!(engine.script().answers(), vec![Answer::Question(1, false)]);
    }

    #[test]
    fn unknown_text_is_a_parse_error() {
        let mut engine = ScriptedEngine::default();
        let err = engine.new_query_from_text("???").err().expect("parse error");
        assert!(matches!(err, EngineError::Parse(_)));

        engine
            .register_constant(Symbol::new("limit"), Term::Integer(3))
            .expect("constant");
        let mut query = engine.new_query_from_text("limit").expect("constant query");
        assert_eq!(
            query.step(),
            Step::yield_binding("limit", Term::Integer(3)).into_result()
        );
    }

    #[test]
    fn steps_parse_from_json() {
        let steps = steps_from_json(r#"[{"Yield": {"x": {"Integer": 1}}}, "Done"]"#)
            .expect("json steps");
        assert_eq!(
            steps,
            vec![
                Step::yield_binding("x", Term::Integer(1)),
                Step::Emit(StepResult::Done)
            ]
        );
    }
}
