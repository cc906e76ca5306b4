use crate::encode::naming::{action_var, Timestep};
use crate::encode::EncodingContext;
use crate::model::{ActionId, FluentId, Problem};
use crate::smt::Expr;
use hashbrown::HashSet;
use std::collections::BTreeSet;

/// Non-interference of one action under the ForAll semantics: the action may not occur together
/// with any other action writing a fluent it depends on.
///
/// The check is syntactic: sharing a fluent is enough to be considered a conflict, regardless of
/// the values actually read or written.
#[derive(Clone, Debug)]
pub struct ForAllAction {
    action: ActionId,
    all_fluents: BTreeSet<FluentId>,
}

impl ForAllAction {
    pub fn new(action: ActionId) -> Self {
        ForAllAction {
            action,
            all_fluents: BTreeSet::new(),
        }
    }

    pub fn action(&self) -> ActionId {
        self.action
    }

    /// Fluents the action depends on or affects: those of the preconditions, of the effect
    /// conditions and of the effect values, and those targeted by the effects.
    pub fn collect_dependency_fluents(&mut self, problem: &Problem) {
        let action = problem.action(self.action);
        let mut fluents = action.read_fluents();
        fluents.extend(action.effect_fluents());
        self.all_fluents = fluents;
    }

    pub fn all_fluents(&self) -> &BTreeSet<FluentId> {
        &self.all_fluents
    }

    /// `NOT(a_t AND b_t AND cond_b_t)` for every effect of another action `b` on a fluent in `all_fluents`.
    pub fn constraints_at(&self, ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
        let translator = ctx.translator();
        let this = Expr::var(action_var(ctx.problem, self.action, t));
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &f in &self.all_fluents {
            for w in ctx.effects.writers(f) {
                if w.action == self.action {
                    continue;
                }
                let mut conjuncts = vec![this.clone(), Expr::var(action_var(ctx.problem, w.action, t))];
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

    /// Constraints for every timestep where the action may occur, `0..horizon`.
    pub fn constraints_up_to(&self, ctx: &EncodingContext, horizon: Timestep) -> Vec<Expr> {
        (0..horizon).flat_map(|t| self.constraints_at(ctx, t)).collect()
    }
}
