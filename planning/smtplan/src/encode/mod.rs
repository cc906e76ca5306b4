//! Encoding of a bounded planning problem into SMT constraints.
//!
//! A plan of length `T` is represented by the states `0..=T`, each fluent having one variable per
//! state, and by the steps `0..T`, each action having one boolean variable per step that is true
//! if the action occurs in the step. Actions never occur at the last state `T`.
//!
//! The constraints of a step depend on the [`Parallelism`] semantics, which decides which actions
//! may occur together in the same step.

pub mod base;
mod forall;
mod index;
pub mod naming;
mod r2exists;
mod there_exists;
mod translate;

pub use forall::*;
pub use index::*;
pub use naming::*;
pub use r2exists::*;
pub use there_exists::*;
pub use translate::*;

use crate::model::{ActionId, Problem};
use crate::smt::{Expr, Var};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("the canonical ordering has {found} actions but the problem has {expected}")]
    OrderingSize { expected: usize, found: usize },
    #[error("the canonical ordering refers to the unknown action #{0}")]
    UnknownAction(u32),
    #[error("action `{0}` appears several times in the canonical ordering")]
    DuplicateInOrdering(String),
}

/// Rule deciding which actions may occur in the same step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Parallelism {
    /// Exactly one action per step.
    #[default]
    Sequential,
    /// Actions of a step may not share any fluent with the effects of the others.
    ForAll,
    /// Actions of a step can be executed in the canonical order, each observing the state at the
    /// start of the step.
    ThereExists,
    /// Actions of a step are executed in the canonical order, each observing the effects of the
    /// previous ones through chained variables.
    RelaxedRelaxedThereExists,
}

impl Parallelism {
    pub fn is_parallel(self) -> bool {
        self != Parallelism::Sequential
    }
}

impl FromStr for Parallelism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(Parallelism::Sequential),
            "forall" | "for-all" => Ok(Parallelism::ForAll),
            "thereexists" | "there-exists" | "exists" => Ok(Parallelism::ThereExists),
            "relaxed_relaxed_thereexists" | "r2exists" | "r2e" => Ok(Parallelism::RelaxedRelaxedThereExists),
            _ => Err(format!(
                "Unknown parallelism: '{s}'. Valid options are: 'sequential', 'ForAll', 'ThereExists', 'relaxed_relaxed_ThereExists'"
            )),
        }
    }
}

impl Display for Parallelism {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Parallelism::Sequential => "sequential",
            Parallelism::ForAll => "ForAll",
            Parallelism::ThereExists => "ThereExists",
            Parallelism::RelaxedRelaxedThereExists => "relaxed_relaxed_ThereExists",
        };
        write!(f, "{name}")
    }
}

/// Constraints of one step, together with the number of them that are mutual exclusions
/// between actions (non-interference or at-most-one constraints).
#[derive(Clone, Debug, Default)]
pub struct StepConstraints {
    pub constraints: Vec<Expr>,
    pub mutexes: usize,
}

impl StepConstraints {
    pub fn push(&mut self, constraint: Expr) {
        self.constraints.push(constraint);
    }

    pub fn push_mutex(&mut self, constraint: Expr) {
        self.constraints.push(constraint);
        self.mutexes += 1;
    }

    pub fn extend(&mut self, constraints: impl IntoIterator<Item = Expr>) {
        self.constraints.extend(constraints);
    }

    pub fn extend_mutexes(&mut self, constraints: impl IntoIterator<Item = Expr>) {
        for c in constraints {
            self.push_mutex(c);
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Read-only data shared by all encoders: the problem, the writers of each fluent and the
/// canonical order of actions.
pub struct EncodingContext<'a> {
    pub problem: &'a Problem,
    pub effects: EffectIndex,
    pub chains: ChainIndex,
}

impl<'a> EncodingContext<'a> {
    /// Builds the context with the given canonical order, which must be a permutation of the actions.
    pub fn new(problem: &'a Problem, ordering: Vec<ActionId>) -> Result<Self, EncodingError> {
        if ordering.len() != problem.num_actions() {
            return Err(EncodingError::OrderingSize {
                expected: problem.num_actions(),
                found: ordering.len(),
            });
        }
        let mut seen = vec![false; problem.num_actions()];
        for &a in &ordering {
            let i = usize::from(a);
            if i >= seen.len() {
                return Err(EncodingError::UnknownAction(a.to_u32()));
            }
            if seen[i] {
                return Err(EncodingError::DuplicateInOrdering(problem.action(a).name().to_string()));
            }
            seen[i] = true;
        }
        let effects = EffectIndex::new(problem);
        let chains = ChainIndex::new(problem, &effects, ordering);
        Ok(EncodingContext {
            problem,
            effects,
            chains,
        })
    }

    pub fn translator(&self) -> Translator<'_> {
        Translator::new(self.problem)
    }

    pub fn chained_translator(&self) -> Translator<'_> {
        Translator::chained(self.problem, &self.chains)
    }
}

/// Constraints specific to a parallelism semantics.
trait Semantics {
    /// Constraints on the actions occurring at `t` and on the transition from `t` to `t + 1`.
    fn step(&self, ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints);

    /// Number of solver variables introduced by each step, besides states and actions.
    fn auxiliary_variables(&self, _ctx: &EncodingContext) -> usize {
        0
    }
}

/// Causal axioms, preconditions, frame axioms and bounds of the next state.
fn transition(ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints) {
    for a in ctx.problem.action_ids() {
        out.push(base::causal_axiom(ctx, a, t));
        out.push(base::precondition_constraint(ctx, a, t));
    }
    out.extend(base::frame_axioms_at(ctx, t));
    out.extend(base::bounds_at(ctx, t + 1));
}

struct SequentialSemantics;

impl Semantics for SequentialSemantics {
    fn step(&self, ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints) {
        transition(ctx, t, out);
        base::exactly_one_at(ctx, t, out);
    }
}

struct ForAllSemantics {
    actions: Vec<ForAllAction>,
}

impl ForAllSemantics {
    fn new(problem: &Problem) -> Self {
        let actions = problem
            .action_ids()
            .map(|a| {
                let mut action = ForAllAction::new(a);
                action.collect_dependency_fluents(problem);
                action
            })
            .collect();
        ForAllSemantics { actions }
    }
}

impl Semantics for ForAllSemantics {
    fn step(&self, ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints) {
        transition(ctx, t, out);
        for a in &self.actions {
            out.extend_mutexes(a.constraints_at(ctx, t));
        }
    }
}

struct ThereExistsSemantics {
    actions: Vec<ThereExistsAction>,
}

impl Semantics for ThereExistsSemantics {
    fn step(&self, ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints) {
        transition(ctx, t, out);
        for a in &self.actions {
            out.extend_mutexes(a.constraints_at(ctx, t));
        }
    }
}

struct R2ExistsSemantics {
    actions: Vec<R2ExistsAction>,
    fluents: Vec<R2ExistsFluent>,
}

impl Semantics for R2ExistsSemantics {
    fn step(&self, ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints) {
        for a in &self.actions {
            out.push(a.causal_axioms_at(ctx, t));
            out.push(a.precondition_constraints_at(ctx, t));
        }
        for f in &self.fluents {
            out.extend(f.links_at(ctx, t));
            out.extend(f.explanatory_axioms_at(ctx, t));
            out.extend(f.bounds_at(ctx, t));
        }
        out.extend(base::bounds_at(ctx, t + 1));
    }

    fn auxiliary_variables(&self, ctx: &EncodingContext) -> usize {
        ctx.problem.fluent_ids().map(|f| ctx.chains.num_links(f)).sum()
    }
}

/// Encodes a problem for a given parallelism semantics.
///
/// The encoding is produced step by step, so that a solver can be extended incrementally when
/// the horizon grows: the constraints of step `t` never change once produced.
pub struct Encoder<'a> {
    ctx: EncodingContext<'a>,
    parallelism: Parallelism,
    semantics: Box<dyn Semantics>,
}

impl<'a> Encoder<'a> {
    /// Encoder whose canonical order is the order of actions in the problem.
    pub fn new(problem: &'a Problem, parallelism: Parallelism) -> Self {
        let effects = EffectIndex::new(problem);
        let chains = ChainIndex::new(problem, &effects, problem.action_ids().collect());
        let ctx = EncodingContext {
            problem,
            effects,
            chains,
        };
        Self::build(ctx, parallelism)
    }

    pub fn with_ordering(
        problem: &'a Problem,
        parallelism: Parallelism,
        ordering: Vec<ActionId>,
    ) -> Result<Self, EncodingError> {
        let ctx = EncodingContext::new(problem, ordering)?;
        Ok(Self::build(ctx, parallelism))
    }

    fn build(ctx: EncodingContext<'a>, parallelism: Parallelism) -> Self {
        let problem = ctx.problem;
        let semantics: Box<dyn Semantics> = match parallelism {
            Parallelism::Sequential => Box::new(SequentialSemantics),
            Parallelism::ForAll => Box::new(ForAllSemantics::new(problem)),
            Parallelism::ThereExists => Box::new(ThereExistsSemantics {
                actions: problem
                    .action_ids()
                    .map(|a| ThereExistsAction::new(problem, a))
                    .collect(),
            }),
            Parallelism::RelaxedRelaxedThereExists => Box::new(R2ExistsSemantics {
                actions: problem.action_ids().map(R2ExistsAction::new).collect(),
                fluents: problem.fluent_ids().map(R2ExistsFluent::new).collect(),
            }),
        };
        Encoder {
            ctx,
            parallelism,
            semantics,
        }
    }

    pub fn problem(&self) -> &'a Problem {
        self.ctx.problem
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// The canonical order of actions.
    pub fn ordering(&self) -> &[ActionId] {
        self.ctx.chains.order()
    }

    pub fn context(&self) -> &EncodingContext<'a> {
        &self.ctx
    }

    pub fn initial_state(&self) -> Vec<Expr> {
        base::initial_state(&self.ctx)
    }

    /// The goals, in the state at `horizon`.
    pub fn goal(&self, horizon: Timestep) -> Expr {
        base::goal(&self.ctx, horizon)
    }

    /// Literal that activates the goal at `horizon` when assumed.
    pub fn goal_activation(&self, horizon: Timestep) -> Var {
        goal_var(horizon)
    }

    /// `goal_@tT => goals_T`
    pub fn activated_goal(&self, horizon: Timestep) -> Expr {
        Expr::implies(Expr::var(self.goal_activation(horizon)), self.goal(horizon))
    }

    /// Constraints of the step `t`, i.e., on the actions occurring at `t`, and on the transition to `t + 1`.
    pub fn step(&self, t: Timestep) -> StepConstraints {
        let mut out = StepConstraints::default();
        self.semantics.step(&self.ctx, t, &mut out);
        out
    }

    /// Complete encoding for a plan of length `horizon`: initial state, all steps and goals.
    pub fn encode(&self, horizon: Timestep) -> Vec<Expr> {
        let mut out = self.initial_state();
        for t in 0..horizon {
            out.extend(self.step(t).constraints);
        }
        out.push(self.goal(horizon));
        out
    }

    /// Number of solver variables of a plan of length `horizon`.
    pub fn num_variables(&self, horizon: Timestep) -> usize {
        let h = horizon as usize;
        self.ctx.problem.num_fluents() * (h + 1)
            + (self.ctx.problem.num_actions() + self.semantics.auxiliary_variables(&self.ctx)) * h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::smt::Sort;

    #[test]
    fn parallelism_names() {
        for p in [
            Parallelism::Sequential,
            Parallelism::ForAll,
            Parallelism::ThereExists,
            Parallelism::RelaxedRelaxedThereExists,
        ] {
            assert_eq!(p.to_string().parse::<Parallelism>(), Ok(p));
        }
        assert_eq!("FORALL".parse::<Parallelism>(), Ok(Parallelism::ForAll));
        assert_eq!("r2e".parse::<Parallelism>(), Ok(Parallelism::RelaxedRelaxedThereExists));
        assert!("parallel".parse::<Parallelism>().is_err());
        assert!(!Parallelism::default().is_parallel());
    }

    fn problem() -> Problem {
        let mut pb = ProblemBuilder::new("ordering");
        let p = pb.fluent("p", Sort::Bool).unwrap();
        pb.action("a", [], [Effect::assign(p, true)]).unwrap();
        pb.action("b", [], [Effect::assign(p, false)]).unwrap();
        pb.goal(p).unwrap();
        pb.build().unwrap()
    }

    #[test]
    fn orderings() {
        let problem = problem();
        let a = ActionId::from_u32(0);
        let b = ActionId::from_u32(1);
        let encoder = Encoder::with_ordering(&problem, Parallelism::ThereExists, vec![b, a]).unwrap();
        assert_eq!(encoder.ordering(), &[b, a]);
        assert_eq!(encoder.context().chains.chain(FluentId::from_u32(0)), &[b, a]);

        assert_eq!(
            EncodingContext::new(&problem, vec![a]).err(),
            Some(EncodingError::OrderingSize { expected: 2, found: 1 })
        );
        assert_eq!(
            EncodingContext::new(&problem, vec![a, a]).err(),
            Some(EncodingError::DuplicateInOrdering("a".to_string()))
        );
        assert_eq!(
            EncodingContext::new(&problem, vec![a, ActionId::from_u32(7)]).err(),
            Some(EncodingError::UnknownAction(7))
        );
    }

    #[test]
    fn steps_are_incremental() {
        let problem = problem();
        for parallelism in [Parallelism::Sequential, Parallelism::ForAll, Parallelism::RelaxedRelaxedThereExists] {
            let encoder = Encoder::new(&problem, parallelism);
            let full = encoder.encode(2);
            let mut parts = encoder.initial_state();
            parts.extend(encoder.step(0).constraints);
            parts.extend(encoder.step(1).constraints);
            parts.push(encoder.goal(2));
            assert_eq!(full, parts);
        }
    }
}
