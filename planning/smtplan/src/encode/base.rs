//! Constraints shared by several parallelism semantics.

use crate::encode::naming::{action_var, fluent_var, Timestep};
use crate::encode::{EncodingContext, StepConstraints};
use crate::model::{ActionId, FluentId};
use crate::smt::{Expr, Value};
use itertools::Itertools;

/// `lb <= f_t` and `f_t <= ub` for every bounded fluent.
pub fn bounds_at(ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
    let mut out = Vec::new();
    for f in ctx.problem.fluent_ids() {
        let x = Expr::var(fluent_var(ctx.problem, f, t));
        bounds(ctx, f, x, &mut out);
    }
    out
}

/// Bounds of fluent `f` applied to the expression `x`.
pub fn bounds(ctx: &EncodingContext, f: FluentId, x: Expr, out: &mut Vec<Expr>) {
    let fluent = ctx.problem.fluent(f);
    if let Some(lb) = fluent.lower_bound() {
        out.push(Expr::le(Expr::Const(lb), x.clone()));
    }
    if let Some(ub) = fluent.upper_bound() {
        out.push(Expr::le(x, Expr::Const(ub)));
    }
}

/// Value of every fluent at timestep 0, and bounds of the initial state.
pub fn initial_state(ctx: &EncodingContext) -> Vec<Expr> {
    let mut out = ctx
        .problem
        .fluent_ids()
        .map(|f| {
            let x = Expr::var(fluent_var(ctx.problem, f, 0));
            match ctx.problem.initial_value(f) {
                Value::Bool(true) => x,
                Value::Bool(false) => Expr::not(x),
                v => Expr::eq(x, Expr::Const(v)),
            }
        })
        .collect_vec();
    out.extend(bounds_at(ctx, 0));
    out
}

/// Conjunction of the goals in the state at timestep `t`.
pub fn goal(ctx: &EncodingContext, t: Timestep) -> Expr {
    let translator = ctx.translator();
    Expr::and(ctx.problem.goals().iter().map(|g| translator.formula(g, t, None)))
}

/// `a_t => AND(effects)`, where effects assign the state at `t + 1`.
pub fn causal_axiom(ctx: &EncodingContext, action: ActionId, t: Timestep) -> Expr {
    let translator = ctx.translator();
    let effects = ctx
        .problem
        .action(action)
        .effects
        .iter()
        .map(|e| translator.effect(action, e, t));
    Expr::implies(Expr::var(action_var(ctx.problem, action, t)), Expr::and(effects))
}

/// `a_t => AND(preconditions_t)`.
pub fn precondition_constraint(ctx: &EncodingContext, action: ActionId, t: Timestep) -> Expr {
    let translator = ctx.translator();
    let preconditions = ctx
        .problem
        .action(action)
        .preconditions
        .iter()
        .map(|p| translator.formula(p, t, None));
    Expr::implies(Expr::var(action_var(ctx.problem, action, t)), Expr::and(preconditions))
}

/// `(f_t != f_{t+1}) => OR(a_t AND cond_t)` for each fluent `f`, over the effects that may write it.
pub fn frame_axioms_at(ctx: &EncodingContext, t: Timestep) -> Vec<Expr> {
    let translator = ctx.translator();
    ctx.problem
        .fluent_ids()
        .map(|f| {
            let changed = Expr::neq(
                Expr::var(fluent_var(ctx.problem, f, t)),
                Expr::var(fluent_var(ctx.problem, f, t + 1)),
            );
            let explanations = ctx.effects.writers(f).iter().map(|w| {
                let occurs = Expr::var(action_var(ctx.problem, w.action, t));
                match &w.get(ctx.problem).condition {
                    None => occurs,
                    Some(c) => Expr::and([occurs, translator.formula(c, t, None)]),
                }
            });
            Expr::implies(changed, Expr::or(explanations))
        })
        .collect()
}

/// Exactly one action at timestep `t`: one at-least-one clause and pairwise at-most-one clauses,
/// the latter being counted as mutexes.
pub fn exactly_one_at(ctx: &EncodingContext, t: Timestep, out: &mut StepConstraints) {
    let vars = ctx
        .problem
        .action_ids()
        .map(|a| Expr::var(action_var(ctx.problem, a, t)))
        .collect_vec();
    out.push(Expr::or(vars.iter().cloned()));
    for (a, b) in vars.iter().tuple_combinations() {
        out.push_mutex(Expr::not(Expr::and([a.clone(), b.clone()])));
    }
}
