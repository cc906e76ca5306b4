use crate::encode::index::ChainIndex;
use crate::encode::naming::{chained_var, fluent_var, Timestep};
use crate::model::{ActionId, Effect, FluentId, Formula, Problem};
use crate::smt::Expr;

/// Redirects fluent references to chained variables, on behalf of `action`.
///
/// With `is_effect`, a written fluent refers to the chained variable holding the action's own
/// output. Otherwise a fluent refers to the output of the last action writing it before `action`
/// in the canonical order, or to the value at the start of the step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Chaining {
    pub action: ActionId,
    pub is_effect: bool,
}

/// Translates formulas and effects into solver expressions at a given timestep.
#[derive(Copy, Clone)]
pub struct Translator<'a> {
    problem: &'a Problem,
    chains: Option<&'a ChainIndex>,
}

impl<'a> Translator<'a> {
    /// A translator where each fluent reference at step `t` is the fluent's state variable at `t`.
    pub fn new(problem: &'a Problem) -> Self {
        Translator { problem, chains: None }
    }

    /// A translator that resolves fluent references through chained variables.
    pub fn chained(problem: &'a Problem, chains: &'a ChainIndex) -> Self {
        Translator {
            problem,
            chains: Some(chains),
        }
    }

    pub fn fluent(&self, fluent: FluentId, t: Timestep, chaining: Option<Chaining>) -> Expr {
        match (self.chains, chaining) {
            (Some(chains), Some(c)) => {
                let link = chains.link_for(fluent, c.action, c.is_effect);
                Expr::var(chained_var(self.problem, fluent, link, t))
            }
            _ => Expr::var(fluent_var(self.problem, fluent, t)),
        }
    }

    pub fn formula(&self, formula: &Formula, t: Timestep, chaining: Option<Chaining>) -> Expr {
        formula.to_expr(&|f| self.fluent(f, t, chaining))
    }

    /// `condition => target == new_value` for an effect of `action` occurring at `t`.
    ///
    /// Without chaining, the target is the fluent at `t + 1` and everything else is read at `t`.
    /// With chaining, the target is the action's own chained variable at `t` and everything else
    /// is read through the chaining of the action.
    pub fn effect(&self, action: ActionId, effect: &Effect, t: Timestep) -> Expr {
        let (target, read) = match self.chains {
            Some(_) => (
                self.fluent(
                    effect.fluent,
                    t,
                    Some(Chaining {
                        action,
                        is_effect: true,
                    }),
                ),
                Some(Chaining {
                    action,
                    is_effect: false,
                }),
            ),
            None => (self.fluent(effect.fluent, t + 1, None), None),
        };
        let assignment = Expr::eq(target, self.formula(&effect.new_value(), t, read));
        match &effect.condition {
            None => assignment,
            Some(c) => Expr::implies(self.formula(c, t, read), assignment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::index::EffectIndex;
    use crate::model::*;
    use crate::smt::Sort;

    #[test]
    fn effects() {
        let mut pb = ProblemBuilder::new("translation");
        let x = pb.fluent("x", Sort::Int).unwrap();
        let p = pb.fluent("p", Sort::Bool).unwrap();
        pb.init(x, 0).unwrap();
        let a = pb.action("a", [], [Effect::increase(x, 2).when(p)]).unwrap();
        let b = pb.action("b", [], [Effect::assign(x, 7)]).unwrap();
        let problem = pb.build().unwrap();

        let plain = Translator::new(&problem);
        let eff = &problem.action(a).effects[0];
        assert_eq!(plain.effect(a, eff, 1).to_string(), "(=> p_@t1 (= x_@t2 (+ x_@t1 2)))");

        let effects = EffectIndex::new(&problem);
        let chains = ChainIndex::new(&problem, &effects, vec![b, a]);
        let chained = Translator::chained(&problem, &chains);
        assert_eq!(chained.effect(a, eff, 1).to_string(), "(=> p$0_@t1 (= x$2_@t1 (+ x$1_@t1 2)))");
        let eff_b = &problem.action(b).effects[0];
        assert_eq!(chained.effect(b, eff_b, 0).to_string(), "(= x$1_@t0 7)");

        let read = Chaining {
            action: b,
            is_effect: false,
        };
        assert_eq!(chained.formula(&Formula::fluent(x), 3, Some(read)).to_string(), "x$0_@t3");
        assert_eq!(chained.formula(&Formula::fluent(x), 3, None).to_string(), "x_@t3");
    }
}
