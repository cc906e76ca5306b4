#![allow(dead_code)]

use smtplan::encode::{parse_stated_name, Encoder, Timestep};
use smtplan::model::{ActionId, Effect, FluentId, Formula, Problem, ProblemBuilder};
use smtplan::smt::{Expr, Model, SatResult, Solver, Sort, Value, Var};
use std::collections::{BTreeSet, HashMap};

/// A solver for purely boolean constraints, exploring assignments depth-first.
///
/// Variables are assigned by increasing timestep, and a branch is abandoned as soon as a
/// constraint over its assigned variables evaluates to false.
#[derive(Default)]
pub struct BacktrackingSolver {
    assertions: Vec<Expr>,
}

impl BacktrackingSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assertions(&self) -> &[Expr] {
        &self.assertions
    }
}

struct Search<'a> {
    constraints: &'a [Expr],
    vars: Vec<Var>,
    index: HashMap<Var, usize>,
    /// Constraints in which each variable appears.
    watches: Vec<Vec<usize>>,
    values: Vec<Option<bool>>,
}

impl Search<'_> {
    fn violated(&self, constraint: usize) -> bool {
        let lookup = |v: &Var| self.index.get(v).and_then(|&i| self.values[i]).map(Value::Bool);
        self.constraints[constraint].eval(&lookup) == Some(Value::FALSE)
    }

    fn consistent(&self, var: usize) -> bool {
        self.watches[var].iter().all(|&c| !self.violated(c))
    }

    fn run(&mut self, i: usize) -> bool {
        if i == self.vars.len() {
            return true;
        }
        if self.values[i].is_some() {
            return self.run(i + 1);
        }
        for value in [false, true] {
            self.values[i] = Some(value);
            if self.consistent(i) && self.run(i + 1) {
                return true;
            }
        }
        self.values[i] = None;
        false
    }
}

fn timestep(var: &Var) -> Timestep {
    parse_stated_name(var.name()).map(|(_, t)| t).unwrap_or(0)
}

impl Solver for BacktrackingSolver {
    fn assert(&mut self, constraint: &Expr) -> anyhow::Result<()> {
        self.assertions.push(constraint.clone());
        Ok(())
    }

    fn check(&mut self, assumptions: &[Var]) -> anyhow::Result<SatResult> {
        let mut vars: BTreeSet<Var> = assumptions.iter().cloned().collect();
        for c in &self.assertions {
            c.collect_vars(&mut vars);
        }
        if vars.iter().any(|v| v.sort() != Sort::Bool) {
            return Ok(SatResult::Unknown("numeric variables".to_string()));
        }
        let mut vars: Vec<Var> = vars.into_iter().collect();
        vars.sort_by_key(|v| (timestep(v), v.name().contains('$'), v.name().to_string()));
        let index: HashMap<Var, usize> = vars.iter().cloned().enumerate().map(|(i, v)| (v, i)).collect();
        let mut watches = vec![Vec::new(); vars.len()];
        for (c, constraint) in self.assertions.iter().enumerate() {
            for v in constraint.vars() {
                watches[index[&v]].push(c);
            }
        }
        let mut search = Search {
            constraints: &self.assertions,
            values: vec![None; vars.len()],
            vars,
            index,
            watches,
        };
        for a in assumptions {
            let i = search.index[a];
            search.values[i] = Some(true);
        }
        if (0..self.assertions.len()).any(|c| search.violated(c)) {
            return Ok(SatResult::Unsat);
        }
        if !search.run(0) {
            return Ok(SatResult::Unsat);
        }
        let model = search
            .vars
            .iter()
            .zip(&search.values)
            .map(|(v, value)| (v.name().to_string(), Value::Bool(value.unwrap_or(false))))
            .collect::<Model>();
        Ok(SatResult::Sat(model))
    }

    fn reset(&mut self) -> anyhow::Result<()> {
        self.assertions.clear();
        Ok(())
    }

    fn num_assertions(&self) -> usize {
        self.assertions.len()
    }
}

/// A door that must be unlocked before being opened.
/// The effect of `open` is conditioned on the door being unlocked.
pub fn door() -> Problem {
    let mut pb = ProblemBuilder::new("door");
    let locked = pb.fluent("locked", Sort::Bool).unwrap();
    let opened = pb.fluent("opened", Sort::Bool).unwrap();
    pb.init(locked, true).unwrap();
    pb.action("unlock", [Formula::fluent(locked)], [Effect::assign(locked, false)])
        .unwrap();
    pb.action(
        "open",
        [Formula::not(locked)],
        [Effect::assign(opened, true).when(Formula::not(locked))],
    )
    .unwrap();
    pb.goal(opened).unwrap();
    pb.build().unwrap()
}

/// `copy` sets `x` to the current value of `y`, which `clear` resets. The goal needs `copy` to
/// happen strictly before `clear`, while the problem lists `clear` first.
pub fn copy_then_clear() -> Problem {
    let mut pb = ProblemBuilder::new("copy-then-clear");
    let x = pb.fluent("x", Sort::Bool).unwrap();
    let y = pb.fluent("y", Sort::Bool).unwrap();
    pb.init(y, true).unwrap();
    pb.action("clear", [], [Effect::assign(y, false)]).unwrap();
    pb.action("copy", [], [Effect::assign(x, y)]).unwrap();
    pb.goal(Formula::and([x.into(), Formula::not(y)])).unwrap();
    pb.build().unwrap()
}

/// Two objects moved independently: from A to B and from C to D.
pub fn moves() -> Problem {
    let mut pb = ProblemBuilder::new("moves");
    let [at_a, at_b, at_c, at_d] = ["at-a", "at-b", "at-c", "at-d"].map(|n| pb.fluent(n, Sort::Bool).unwrap());
    pb.init(at_a, true).unwrap();
    pb.init(at_c, true).unwrap();
    pb.action(
        "move-a-b",
        [Formula::fluent(at_a)],
        [Effect::assign(at_a, false), Effect::assign(at_b, true)],
    )
    .unwrap();
    pb.action(
        "move-c-d",
        [Formula::fluent(at_c)],
        [Effect::assign(at_c, false), Effect::assign(at_d, true)],
    )
    .unwrap();
    pb.goal(at_b).unwrap();
    pb.goal(at_d).unwrap();
    pb.build().unwrap()
}

/// Picking up a block with an empty hand.
pub fn pickup() -> Problem {
    let mut pb = ProblemBuilder::new("pickup");
    let handempty = pb.fluent("handempty", Sort::Bool).unwrap();
    let holding = pb.fluent("holding", Sort::Bool).unwrap();
    pb.init(handempty, true).unwrap();
    pb.action(
        "pickup",
        [Formula::fluent(handempty)],
        [Effect::assign(holding, true), Effect::assign(handempty, false)],
    )
    .unwrap();
    pb.action(
        "putdown",
        [Formula::fluent(holding)],
        [Effect::assign(holding, false), Effect::assign(handempty, true)],
    )
    .unwrap();
    pb.goal(holding).unwrap();
    pb.build().unwrap()
}

/// A light that can only be switched on when another one is off: the goal is unreachable.
pub fn unreachable() -> Problem {
    let mut pb = ProblemBuilder::new("unreachable");
    let a = pb.fluent("light-a", Sort::Bool).unwrap();
    let b = pb.fluent("light-b", Sort::Bool).unwrap();
    pb.action("switch-a", [Formula::not(b)], [Effect::assign(a, true)]).unwrap();
    pb.action("switch-b", [Formula::not(a)], [Effect::assign(b, true)]).unwrap();
    pb.goal(Formula::and([a.into(), b.into()])).unwrap();
    pb.build().unwrap()
}

/// A counter incremented by two actions, each with a conditional bonus.
pub fn counter() -> Problem {
    let mut pb = ProblemBuilder::new("counter");
    let x = pb.bounded_fluent("x", Sort::Int, 0, 10).unwrap();
    let bonus = pb.fluent("bonus", Sort::Bool).unwrap();
    pb.init(x, 0).unwrap();
    pb.action("inc", [Formula::le(x, 8)], [Effect::increase(x, 1)]).unwrap();
    pb.action(
        "double",
        [Formula::le(x, 5)],
        [Effect::assign(x, Formula::mul(x, 2)), Effect::assign(bonus, true).when(Formula::lt(3, x))],
    )
    .unwrap();
    pb.goal(Formula::eq(x, 4)).unwrap();
    pb.build().unwrap()
}

pub fn action(problem: &Problem, name: &str) -> ActionId {
    problem.action_id(name).unwrap()
}

pub fn fluent(problem: &Problem, name: &str) -> FluentId {
    problem.fluent_id(name).unwrap()
}

/// Model of the encoding where the given sets of actions occur at each step, with states
/// computed by applying all effects of a step to the state at its start.
pub fn model_of_steps(encoder: &Encoder, steps: &[Vec<ActionId>]) -> Model {
    let problem = encoder.problem();
    let mut model = Model::new();
    let mut state: Vec<Value> = problem.initial_state().to_vec();
    for (t, actions) in steps.iter().enumerate() {
        let t = t as Timestep;
        for f in problem.fluent_ids() {
            model.insert(smtplan::encode::fluent_var(problem, f, t).name(), state[usize::from(f)]);
        }
        for a in problem.action_ids() {
            model.insert(smtplan::encode::action_var(problem, a, t).name(), actions.contains(&a));
        }
        let mut next = state.clone();
        for &a in actions {
            for eff in &problem.action(a).effects {
                let applies = eff.condition.as_ref().map_or(true, |c| c.eval(&state) == Some(Value::TRUE));
                if applies {
                    let sort = problem.fluent(eff.fluent).sort();
                    next[usize::from(eff.fluent)] = eff.new_value().eval(&state).and_then(|v| v.coerce(sort)).unwrap();
                }
            }
        }
        state = next;
    }
    for f in problem.fluent_ids() {
        let var = smtplan::encode::fluent_var(problem, f, steps.len() as Timestep);
        model.insert(var.name(), state[usize::from(f)]);
    }
    model
}
