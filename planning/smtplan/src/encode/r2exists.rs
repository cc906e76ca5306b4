//! Relaxed-relaxed ThereExists semantics.
//!
//! Within a step, actions are applied in the canonical order and each of them observes the
//! effects of the actions before it. For each fluent, one chained variable per writer holds the
//! value once this writer has been applied, the first chained variable being the value at the
//! start of the step and the last one the value at the next step.

use crate::encode::base;
use crate::encode::naming::{action_var, chained_var, fluent_var, Timestep};
use crate::encode::translate::Chaining;
use crate::encode::EncodingContext;
use crate::model::{ActionId, FluentId};
use crate::smt::{Expr, Var};

#[derive(Copy, Clone, Debug)]
pub struct R2ExistsAction {
    action: ActionId,
}

impl R2ExistsAction {
    pub fn new(action: ActionId) -> Self {
        R2ExistsAction { action }
    }

    pub fn action(&self) -> ActionId {
        self.action
    }

    pub fn chaining(&self, is_effect: bool) -> Chaining {
        Chaining {
            action: self.action,
            is_effect,
        }
    }

    /// `a_t => AND(effects)`, each effect writing the action's own chained variable.
    pub fn causal_axioms_at(&self, ctx: &EncodingContext, t: Timestep) -> Expr {
        let translator = ctx.chained_translator();
        let effects = ctx
            .problem
            .action(self.action)
            .effects
            .iter()
            .map(|e| translator.effect(self.action, e, t));
        Expr::implies(Expr::var(action_var(ctx.problem, self.action, t)), Expr::and(effects))
    }

    pub fn causal_axioms_up_to(&self, ctx: &EncodingContext, horizon: Timestep) -> Vec<Expr> {
        (0..horizon).map(|t| self.causal_axioms_at(ctx, t)).collect()
    }

    /// `a_t => AND(preconditions)`, read in the state left by the writers preceding the action.
    pub fn precondition_constraints_at(&self, ctx: &EncodingContext, t: Timestep) -> Expr {
        let translator = ctx.chained_translator();
        let chaining = Some(self.chaining(false));
        let preconditions = ctx
            .problem
            .action(self.action)
            .preconditions
            .iter()
            .map(|p| translator.formula(p, t, chaining));
        Expr::implies(Expr::var(action_var(ctx.problem, self.action, t)), Expr::and(preconditions))
    }

    pub fn precondition_constraints_up_to(&self, ctx: &EncodingContext, horizon: Timestep) -> Vec<Expr> {
        (0..horizon).map(|t| self.precondition_constraints_at(ctx, t)).collect()
    }
}

/// Chained variables of one fluent.
#[derive(Copy, Clone, Debug)]
pub struct R2ExistsFluent {
    fluent: FluentId,
}

impl R2ExistsFluent {
    pub fn new(fluent: FluentId) -> Self {
        R2ExistsFluent { fluent }
    }

    pub fn chained_vars(&self, ctx: &EncodingContext, t: Timestep) -> Vec<Var> {
        (0..ctx.chains.num_links(self.fluent))
            .map(|k| chained_var(ctx.problem, self.fluent, k, t))
            .collect()
    }

    /// `f_t == f$0_t` and `f_{t+1} == f$n_t`.
    pub fn links_at(&self, ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
        let last = ctx.chains.num_links(self.fluent) - 1;
        vec![
            Expr::eq(
                Expr::var(fluent_var(ctx.problem, self.fluent, t)),
                Expr::var(chained_var(ctx.problem, self.fluent, 0, t)),
            ),
            Expr::eq(
                Expr::var(fluent_var(ctx.problem, self.fluent, t + 1)),
                Expr::var(chained_var(ctx.problem, self.fluent, last, t)),
            ),
        ]
    }

    /// `(f$(k-1)_t != f$k_t) => OR(cond_t AND a_t)` where `a` is the `k`-th writer of the fluent,
    /// and the disjunction ranges over its effects on the fluent.
    pub fn explanatory_axioms_at(&self, ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
        let translator = ctx.chained_translator();
        let chain = ctx.chains.chain(self.fluent);
        chain
            .iter()
            .enumerate()
            .map(|(i, &action)| {
                let changed = Expr::neq(
                    Expr::var(chained_var(ctx.problem, self.fluent, i, t)),
                    Expr::var(chained_var(ctx.problem, self.fluent, i + 1, t)),
                );
                let occurs = Expr::var(action_var(ctx.problem, action, t));
                let chaining = Some(R2ExistsAction::new(action).chaining(false));
                let explanations = ctx.effects.writers_of(self.fluent, action).map(|w| {
                    match &w.get(ctx.problem).condition {
                        None => occurs.clone(),
                        Some(c) => Expr::and([translator.formula(c, t, chaining), occurs.clone()]),
                    }
                });
                Expr::implies(changed, Expr::or(explanations))
            })
            .collect()
    }

    /// Bounds of the fluent on each of its chained variables.
    pub fn bounds_at(&self, ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
        let mut out = Vec::new();
        if ctx.problem.fluent(self.fluent).is_bounded() {
            for var in self.chained_vars(ctx, t) {
                base::bounds(ctx, self.fluent, Expr::var(var), &mut out);
            }
        }
        out
    }
}
