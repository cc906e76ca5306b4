use crate::encode::naming::{action_var, Timestep};
use crate::encode::EncodingContext;
use crate::model::{ActionId, FluentId, Problem};
use crate::smt::Expr;
use hashbrown::HashSet;
use std::collections::BTreeSet;

/// Non-interference of one action under the ThereExists semantics.
///
/// Actions of a step are executed in the canonical order. An action may not occur together with
/// an action that precedes it in this order and writes one of the fluents it reads, so that each
/// action observes the state at the start of the step.
#[derive(Clone, Debug)]
pub struct ThereExistsAction {
    action: ActionId,
    reads: BTreeSet<FluentId>,
}

impl ThereExistsAction {
    pub fn new(problem: &Problem, action: ActionId) -> Self {
        ThereExistsAction {
            action,
            reads: problem.action(action).read_fluents(),
        }
    }

    /// Fluents read by the action: preconditions, effect conditions, effect values and the
    /// targets of increase/decrease effects.
    pub fn reads(&self) -> &BTreeSet<FluentId> {
        &self.reads
    }

    pub fn constraints_at(&self, ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
        let translator = ctx.translator();
        let rank = ctx.chains.rank(self.action);
        let this = Expr::var(action_var(ctx.problem, self.action, t));
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &f in &self.reads {
            for w in ctx.effects.writers(f) {
                if ctx.chains.rank(w.action) >= rank {
                    continue;
                }
                let mut conjuncts = vec![Expr::var(action_var(ctx.problem, w.action, t)), this.clone()];
                if let Some(c) = &w.get(ctx.problem).condition {
                    conjuncts.push(translator.formula(c, t, None));
                }
                let constraint = Expr::not(Expr::and(conjuncts));
                if seen.insert(constraint.clone()) {
                    out.push(constraint);
                }
            }
        }
        out
    }

    pub fn constraints_up_to(&self, ctx: &EncodingContext, horizon: Timestep) -> Vec<Expr> {
        (0..horizon).flat_map(|t| self.constraints_at(ctx, t)).collect()
    }
}
