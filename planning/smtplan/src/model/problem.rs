use crate::model::{ActionId, FluentId, Formula, InProblem, SortError};
use crate::smt::{Sort, Value};
use derive_more::derive::Display;
use hashbrown::HashMap;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Name reserved for the goal activation literals of the encoding.
pub const RESERVED_NAME: &str = "goal";

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("invalid name `{0}`")]
    InvalidName(String),
    #[error("`{0}` is reserved")]
    ReservedName(String),
    #[error("`{0}` is declared twice")]
    DuplicateName(String),
    #[error("ill-typed {context}: {error}")]
    IllTyped {
        context: String,
        #[source]
        error: SortError,
    },
    #[error("bounds are only allowed on numeric fluents, but `{0}` is boolean")]
    BoundsOnBoolean(String),
    #[error("invalid bounds [{lower}, {upper}] for fluent `{fluent}`")]
    InvalidBounds { fluent: String, lower: Value, upper: Value },
    #[error("{kind} effect of `{action}` on boolean fluent `{fluent}`")]
    NumericEffectOnBoolean {
        action: String,
        fluent: String,
        kind: EffectKind,
    },
    #[error("value {value} is not valid for fluent `{fluent}`")]
    InvalidInitialValue { fluent: String, value: Value },
    #[error("numeric fluent `{0}` has no initial value")]
    MissingInitialValue(String),
}

/// A grounded state variable, with a value at each timestep.
#[derive(Clone, Debug, PartialEq)]
pub struct Fluent {
    name: String,
    sort: Sort,
    lower: Option<Value>,
    upper: Option<Value>,
}

impl Fluent {
    pub fn new(name: impl Into<String>, sort: Sort) -> Fluent {
        Fluent {
            name: name.into(),
            sort,
            lower: None,
            upper: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn lower_bound(&self) -> Option<Value> {
        self.lower
    }

    pub fn upper_bound(&self) -> Option<Value> {
        self.upper
    }

    pub fn is_bounded(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Returns true if the value is of the fluent's sort and within its bounds.
    pub fn admits(&self, value: Value) -> bool {
        let Some(value) = value.coerce(self.sort) else {
            return false;
        };
        let above = |lb: Value| match (lb.as_rational(), value.as_rational()) {
            (Some(lb), Some(v)) => lb <= v,
            _ => false,
        };
        let below = |ub: Value| match (ub.as_rational(), value.as_rational()) {
            (Some(ub), Some(v)) => v <= ub,
            _ => false,
        };
        self.lower.map_or(true, above) && self.upper.map_or(true, below)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum EffectKind {
    #[display("assign")]
    Assign,
    #[display("increase")]
    Increase,
    #[display("decrease")]
    Decrease,
}

/// A possibly conditional modification of a fluent's value, taking place when the action occurs.
#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    /// Condition under which the effect applies. `None` when the effect is unconditional.
    pub condition: Option<Formula>,
    pub fluent: FluentId,
    pub kind: EffectKind,
    pub value: Formula,
}

impl Effect {
    pub fn assign(fluent: FluentId, value: impl Into<Formula>) -> Effect {
        Effect {
            condition: None,
            fluent,
            kind: EffectKind::Assign,
            value: value.into(),
        }
    }

    pub fn increase(fluent: FluentId, delta: impl Into<Formula>) -> Effect {
        Effect {
            kind: EffectKind::Increase,
            ..Effect::assign(fluent, delta)
        }
    }

    pub fn decrease(fluent: FluentId, delta: impl Into<Formula>) -> Effect {
        Effect {
            kind: EffectKind::Decrease,
            ..Effect::assign(fluent, delta)
        }
    }

    /// Makes the effect conditional, conjoining `condition` with any existing condition.
    pub fn when(self, condition: impl Into<Formula>) -> Effect {
        let condition = match self.condition {
            None => condition.into(),
            Some(existing) => Formula::and([condition.into(), existing]),
        };
        Effect {
            condition: Some(condition),
            ..self
        }
    }

    /// The condition of the effect, `true` when unconditional.
    pub fn condition_or_true(&self) -> Formula {
        self.condition.clone().unwrap_or(Formula::TRUE)
    }

    /// The value of the fluent after the effect, as a formula over the state before it.
    pub fn new_value(&self) -> Formula {
        match self.kind {
            EffectKind::Assign => self.value.clone(),
            EffectKind::Increase => Formula::add(self.fluent, self.value.clone()),
            EffectKind::Decrease => Formula::sub(self.fluent, self.value.clone()),
        }
    }

    /// Fluents whose value in the state before the effect is needed to apply it.
    /// The target only appears if it is increased or decreased.
    pub fn reads(&self) -> BTreeSet<FluentId> {
        let mut reads = self.value.fluents();
        if let Some(c) = &self.condition {
            c.collect_fluents(&mut reads);
        }
        if self.kind != EffectKind::Assign {
            reads.insert(self.fluent);
        }
        reads
    }
}

/// A grounded action.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    name: String,
    pub preconditions: Vec<Formula>,
    pub effects: Vec<Effect>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fluents appearing in the preconditions.
    pub fn precondition_fluents(&self) -> BTreeSet<FluentId> {
        let mut out = BTreeSet::new();
        self.preconditions.iter().for_each(|p| p.collect_fluents(&mut out));
        out
    }

    /// Fluents appearing in the conditions of conditional effects.
    pub fn condition_fluents(&self) -> BTreeSet<FluentId> {
        let mut out = BTreeSet::new();
        for c in self.effects.iter().filter_map(|e| e.condition.as_ref()) {
            c.collect_fluents(&mut out);
        }
        out
    }

    /// Fluents modified by the action.
    pub fn effect_fluents(&self) -> BTreeSet<FluentId> {
        self.effects.iter().map(|e| e.fluent).collect()
    }

    /// Fluents whose value before the action is read: preconditions and everything the effects read.
    pub fn read_fluents(&self) -> BTreeSet<FluentId> {
        let mut reads = self.precondition_fluents();
        for e in &self.effects {
            reads.extend(e.reads());
        }
        reads
    }
}

/// A grounded planning problem. Immutable once built with a [`ProblemBuilder`].
#[derive(Clone, Debug)]
pub struct Problem {
    name: String,
    fluents: Vec<Fluent>,
    actions: Vec<Action>,
    initial_state: Vec<Value>,
    goals: Vec<Formula>,
    names: HashMap<String, Named>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Named {
    Fluent(FluentId),
    Action(ActionId),
}

impl Problem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fluents(&self) -> &[Fluent] {
        &self.fluents
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn num_fluents(&self) -> usize {
        self.fluents.len()
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn fluent(&self, id: FluentId) -> &Fluent {
        &self.fluents[usize::from(id)]
    }

    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[usize::from(id)]
    }

    pub fn fluent_ids(&self) -> impl Iterator<Item = FluentId> + '_ {
        (0..self.fluents.len()).map(FluentId::from)
    }

    pub fn action_ids(&self) -> impl Iterator<Item = ActionId> + '_ {
        (0..self.actions.len()).map(ActionId::from)
    }

    pub fn fluent_id(&self, name: &str) -> Option<FluentId> {
        match self.names.get(name) {
            Some(Named::Fluent(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn action_id(&self, name: &str) -> Option<ActionId> {
        match self.names.get(name) {
            Some(Named::Action(a)) => Some(*a),
            _ => None,
        }
    }

    pub fn initial_value(&self, fluent: FluentId) -> Value {
        self.initial_state[usize::from(fluent)]
    }

    /// Value of every fluent in the initial state, indexed by fluent.
    pub fn initial_state(&self) -> &[Value] {
        &self.initial_state
    }

    pub fn goals(&self) -> &[Formula] {
        &self.goals
    }
}

/// Incremental construction of a [`Problem`], checking names and sorts along the way.
#[derive(Clone, Debug)]
pub struct ProblemBuilder {
    name: String,
    fluents: Vec<Fluent>,
    actions: Vec<Action>,
    initial_state: Vec<Option<Value>>,
    goals: Vec<Formula>,
    names: HashMap<String, Named>,
}

/// A valid name is non-empty and contains neither whitespace nor any of `()|@$`,
/// which are used by the solver variable names.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || "()|@$".contains(c))
}

impl ProblemBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ProblemBuilder {
            name: name.into(),
            fluents: Vec::new(),
            actions: Vec::new(),
            initial_state: Vec::new(),
            goals: Vec::new(),
            names: HashMap::new(),
        }
    }

    fn register(&mut self, name: &str, named: Named) -> Result<(), ModelError> {
        if !is_valid_name(name) {
            return Err(ModelError::InvalidName(name.to_string()));
        }
        if name == RESERVED_NAME {
            return Err(ModelError::ReservedName(name.to_string()));
        }
        if self.names.contains_key(name) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        self.names.insert(name.to_string(), named);
        Ok(())
    }

    fn check_sort(&self, f: &Formula, expected: Sort, context: impl Fn() -> String) -> Result<(), ModelError> {
        let found = f.sort(&self.fluents).map_err(|error| ModelError::IllTyped {
            context: context(),
            error,
        })?;
        if expected.accepts(found) {
            Ok(())
        } else {
            Err(ModelError::IllTyped {
                context: context(),
                error: SortError {
                    expected: match expected {
                        Sort::Bool => "a boolean",
                        Sort::Int => "an integer",
                        Sort::Real => "a number",
                    },
                    found,
                },
            })
        }
    }

    pub fn fluent(&mut self, name: impl Into<String>, sort: Sort) -> Result<FluentId, ModelError> {
        let name = name.into();
        let id = FluentId::from(self.fluents.len());
        self.register(&name, Named::Fluent(id))?;
        self.fluents.push(Fluent::new(name, sort));
        self.initial_state.push(None);
        Ok(id)
    }

    /// Declares a numeric fluent whose value must stay within `[lower, upper]` in every state.
    pub fn bounded_fluent(
        &mut self,
        name: impl Into<String>,
        sort: Sort,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> Result<FluentId, ModelError> {
        let name = name.into();
        if !sort.is_numeric() {
            return Err(ModelError::BoundsOnBoolean(name));
        }
        let (lower, upper) = (lower.into(), upper.into());
        let invalid = || ModelError::InvalidBounds {
            fluent: name.clone(),
            lower,
            upper,
        };
        let lower = lower.coerce(sort).ok_or_else(invalid)?;
        let upper = upper.coerce(sort).ok_or_else(invalid)?;
        if lower.as_rational() > upper.as_rational() {
            return Err(invalid());
        }
        let id = self.fluent(name, sort)?;
        let fluent = &mut self.fluents[usize::from(id)];
        fluent.lower = Some(lower);
        fluent.upper = Some(upper);
        Ok(id)
    }

    pub fn fluent_id(&self, name: &str) -> Option<FluentId> {
        match self.names.get(name) {
            Some(Named::Fluent(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn fluents(&self) -> &[Fluent] {
        &self.fluents
    }

    /// Sets the value of a fluent in the initial state.
    pub fn init(&mut self, fluent: FluentId, value: impl Into<Value>) -> Result<(), ModelError> {
        let value = value.into();
        let decl = &self.fluents[usize::from(fluent)];
        if !decl.admits(value) {
            return Err(ModelError::InvalidInitialValue {
                fluent: decl.name.clone(),
                value,
            });
        }
        self.initial_state[usize::from(fluent)] = value.coerce(decl.sort);
        Ok(())
    }

    pub fn action(
        &mut self,
        name: impl Into<String>,
        preconditions: impl IntoIterator<Item = Formula>,
        effects: impl IntoIterator<Item = Effect>,
    ) -> Result<ActionId, ModelError> {
        let action = Action {
            name: name.into(),
            preconditions: preconditions.into_iter().collect(),
            effects: effects.into_iter().collect(),
        };
        for (i, pre) in action.preconditions.iter().enumerate() {
            self.check_sort(pre, Sort::Bool, || format!("precondition {i} of `{}`", action.name))?;
        }
        for (i, eff) in action.effects.iter().enumerate() {
            let target = &self.fluents[usize::from(eff.fluent)];
            if eff.kind != EffectKind::Assign && !target.sort.is_numeric() {
                return Err(ModelError::NumericEffectOnBoolean {
                    action: action.name.clone(),
                    fluent: target.name.clone(),
                    kind: eff.kind,
                });
            }
            let context = || format!("effect {i} of `{}`", action.name);
            self.check_sort(&eff.value, target.sort, context)?;
            if let Some(c) = &eff.condition {
                self.check_sort(c, Sort::Bool, context)?;
            }
        }
        let id = ActionId::from(self.actions.len());
        self.register(&action.name, Named::Action(id))?;
        self.actions.push(action);
        Ok(id)
    }

    pub fn goal(&mut self, goal: impl Into<Formula>) -> Result<(), ModelError> {
        let goal = goal.into();
        self.check_sort(&goal, Sort::Bool, || format!("goal {}", self.goals.len()))?;
        self.goals.push(goal);
        Ok(())
    }

    /// Completes the initial state and freezes the problem.
    /// Boolean fluents without an initial value are false.
    pub fn build(self) -> Result<Problem, ModelError> {
        let initial_state = self
            .fluents
            .iter()
            .zip(self.initial_state)
            .map(|(fluent, value)| match (value, fluent.sort) {
                (Some(v), _) => Ok(v),
                (None, Sort::Bool) => Ok(Value::FALSE),
                (None, _) => Err(ModelError::MissingInitialValue(fluent.name.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Problem {
            name: self.name,
            fluents: self.fluents,
            actions: self.actions,
            initial_state,
            goals: self.goals,
            names: self.names,
        })
    }
}

impl Display for InProblem<'_, &Effect> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let p = self.problem;
        let e = self.elem;
        if let Some(c) = &e.condition {
            write!(f, "(when {} ", p / c)?;
        }
        write!(f, "({} {} {})", e.kind, p / e.fluent, p / &e.value)?;
        if e.condition.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Problems are displayed in the format accepted by the problem parser.
impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "(problem {}", self.name)?;
        for fl in &self.fluents {
            write!(f, "  (:fluent {} {}", fl.name, fl.sort.to_string().to_lowercase())?;
            if let (Some(lb), Some(ub)) = (fl.lower, fl.upper) {
                write!(f, " {} {}", self / &Formula::Const(lb), self / &Formula::Const(ub))?;
            }
            writeln!(f, ")")?;
        }
        write!(f, "  (:init")?;
        for (fl, v) in self.fluent_ids().zip(&self.initial_state) {
            write!(f, " ({} {})", self / fl, self / &Formula::Const(*v))?;
        }
        writeln!(f, ")")?;
        for a in &self.actions {
            writeln!(f, "  (:action {}", a.name)?;
            writeln!(f, "    :precondition (and {})", a.preconditions.iter().map(|p| self / p).format(" "))?;
            writeln!(f, "    :effect (and {}))", a.effects.iter().map(|e| self / e).format(" "))?;
        }
        writeln!(f, "  (:goal (and {})))", self.goals.iter().map(|g| self / g).format(" "))
    }
}
