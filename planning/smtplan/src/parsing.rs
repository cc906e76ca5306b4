//! Reader for grounded problems written as s-expressions.
//!
//! ```text
//! (problem door
//!   (:fluent locked bool)
//!   (:fluent open bool)
//!   (:fluent keys int 0 5)
//!   (:init locked (keys 1))
//!   (:action unlock
//!     :precondition (and locked (> keys 0))
//!     :effect (and (not locked) (decrease keys 1)))
//!   (:action open-door
//!     :precondition (not locked)
//!     :effect open)
//!   (:goal open))
//! ```
//!
//! Fluents must be declared with `:fluent` and are `bool`, `int` or `real`, optionally with bounds.
//! Boolean fluents absent from `:init` are false. Effects are `(assign f v)`, `(increase f v)`,
//! `(decrease f v)`, `f`, `(not f)`, `(when c e)` and conjunctions of them.

use crate::model::{Effect, Formula, Problem, ProblemBuilder};
use crate::smt::sexpr::{self, SExpr};
use crate::smt::{parse_number, RealValue, Sort, Value};
use anyhow::{bail, ensure, Context, Result};
use std::path::Path;

pub fn parse_problem_file(path: &Path) -> Result<Problem> {
    let input = std::fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    parse_problem(&input).with_context(|| format!("In problem file {}", path.display()))
}

pub fn parse_problem(input: &str) -> Result<Problem> {
    let e = sexpr::parse(input)?;
    let items = e
        .as_application_args("problem")
        .context("Expected a (problem NAME ...) expression")?;
    let (name, items) = match items {
        [SExpr::Atom(name), rest @ ..] => (name, rest),
        _ => bail!("Missing problem name"),
    };
    let mut pb = ProblemBuilder::new(name.as_str());

    // fluents first, so that they can be referenced before their declaration
    for item in items {
        if let Some(args) = item.as_application_args(":fluent") {
            declare_fluent(&mut pb, args).with_context(|| format!("In {item}"))?;
        }
    }
    for item in items {
        let (head, args) = match item.as_list() {
            Some([SExpr::Atom(head), args @ ..]) => (head.as_str(), args),
            _ => bail!("Unexpected element: {item}"),
        };
        let res = match head {
            ":fluent" => Ok(()),
            ":init" => args.iter().try_for_each(|a| init(&mut pb, a)),
            ":action" => action(&mut pb, args),
            ":goal" => goals(&pb, args).and_then(|gs| {
                for g in gs {
                    pb.goal(g)?;
                }
                Ok(())
            }),
            _ => Err(anyhow::anyhow!("Unknown element {head}")),
        };
        res.with_context(|| format!("In {item}"))?;
    }
    Ok(pb.build()?)
}

fn declare_fluent(pb: &mut ProblemBuilder, args: &[SExpr]) -> Result<()> {
    let (name, sort, bounds) = match args {
        [SExpr::Atom(name), SExpr::Atom(sort)] => (name, sort, None),
        [SExpr::Atom(name), SExpr::Atom(sort), lb, ub] => (name, sort, Some((lb, ub))),
        _ => bail!("Expected (:fluent NAME SORT [LB UB])"),
    };
    let sort = match sort.as_str() {
        "bool" => Sort::Bool,
        "int" => Sort::Int,
        "real" => Sort::Real,
        other => bail!("Unknown sort {other}"),
    };
    match bounds {
        None => pb.fluent(name.as_str(), sort)?,
        Some((lb, ub)) => pb.bounded_fluent(name.as_str(), sort, constant(lb)?, constant(ub)?)?,
    };
    Ok(())
}

fn init(pb: &mut ProblemBuilder, e: &SExpr) -> Result<()> {
    let (fluent, value) = match e {
        SExpr::Atom(f) => (f, Value::TRUE),
        SExpr::List(l) => match l.as_slice() {
            [SExpr::Atom(not), SExpr::Atom(f)] if not == "not" => (f, Value::FALSE),
            [SExpr::Atom(f), v] => (f, constant(v)?),
            _ => bail!("Invalid initial value: {e}"),
        },
    };
    let id = pb.fluent_id(fluent).with_context(|| format!("Unknown fluent {fluent}"))?;
    pb.init(id, value)?;
    Ok(())
}

fn action(pb: &mut ProblemBuilder, args: &[SExpr]) -> Result<()> {
    let (name, mut rest) = match args {
        [SExpr::Atom(name), rest @ ..] => (name.clone(), rest),
        _ => bail!("Missing action name"),
    };
    let mut preconditions = Vec::new();
    let mut effects = Vec::new();
    while !rest.is_empty() {
        match rest {
            [SExpr::Atom(key), value, tail @ ..] => {
                match key.as_str() {
                    ":precondition" => preconditions.extend(goals(pb, std::slice::from_ref(value))?),
                    ":effect" => effect(pb, value, &mut effects)?,
                    other => bail!("Unknown action key {other}"),
                }
                rest = tail;
            }
            _ => bail!("Expected :precondition or :effect followed by a value"),
        }
    }
    pb.action(name, preconditions, effects)?;
    Ok(())
}

/// Formulas, with top-level conjunctions split into their conjuncts.
fn goals(pb: &ProblemBuilder, args: &[SExpr]) -> Result<Vec<Formula>> {
    let mut out = Vec::new();
    for a in args {
        match a.as_application_args("and") {
            Some(conjuncts) => out.extend(goals(pb, conjuncts)?),
            None => out.push(formula(pb, a)?),
        }
    }
    Ok(out)
}

fn effect(pb: &ProblemBuilder, e: &SExpr, out: &mut Vec<Effect>) -> Result<()> {
    let fluent = |e: &SExpr| -> Result<_> {
        let name = e.as_atom().with_context(|| format!("Expected a fluent but got {e}"))?;
        pb.fluent_id(name).with_context(|| format!("Unknown fluent {name}"))
    };
    let (head, args) = match e {
        SExpr::Atom(_) => {
            out.push(Effect::assign(fluent(e)?, true));
            return Ok(());
        }
        SExpr::List(l) => match l.as_slice() {
            [SExpr::Atom(head), args @ ..] => (head.as_str(), args),
            _ => bail!("Invalid effect: {e}"),
        },
    };
    match (head, args) {
        ("and", conjuncts) => {
            for c in conjuncts {
                effect(pb, c, out)?;
            }
        }
        ("when", [c, inner]) => {
            let c = formula(pb, c)?;
            let mut conditional = Vec::new();
            effect(pb, inner, &mut conditional)?;
            out.extend(conditional.into_iter().map(|eff| eff.when(c.clone())));
        }
        ("not", [f]) => out.push(Effect::assign(fluent(f)?, false)),
        ("assign", [f, v]) => out.push(Effect::assign(fluent(f)?, formula(pb, v)?)),
        ("increase", [f, v]) => out.push(Effect::increase(fluent(f)?, formula(pb, v)?)),
        ("decrease", [f, v]) => out.push(Effect::decrease(fluent(f)?, formula(pb, v)?)),
        _ => bail!("Invalid effect: {e}"),
    }
    Ok(())
}

/// Parses a numeric (`3`, `-1.5`, `1/3`) or boolean constant.
fn constant(e: &SExpr) -> Result<Value> {
    let s = e.as_atom().with_context(|| format!("Expected a constant but got {e}"))?;
    match s {
        "true" => Ok(Value::TRUE),
        "false" => Ok(Value::FALSE),
        _ => match s.split_once('/') {
            Some((num, denom)) => {
                let num: i64 = num.parse().with_context(|| format!("Invalid number {s}"))?;
                let denom: i64 = denom.parse().with_context(|| format!("Invalid number {s}"))?;
                ensure!(denom != 0, "Division by zero in {s}");
                Ok(Value::Real(RealValue::new(num, denom)))
            }
            None => parse_number(s),
        },
    }
}

fn is_number(s: &str) -> bool {
    s.trim_start_matches('-').starts_with(|c: char| c.is_ascii_digit())
}

fn formula(pb: &ProblemBuilder, e: &SExpr) -> Result<Formula> {
    let args = |args: &[SExpr]| args.iter().map(|a| formula(pb, a)).collect::<Result<Vec<_>>>();
    match e {
        SExpr::Atom(a) if a == "true" || a == "false" || is_number(a) => Ok(Formula::Const(constant(e)?)),
        SExpr::Atom(a) => Ok(Formula::fluent(
            pb.fluent_id(a).with_context(|| format!("Unknown fluent {a}"))?,
        )),
        SExpr::List(l) => {
            let (head, rest) = match l.as_slice() {
                [SExpr::Atom(head), rest @ ..] => (head.as_str(), rest),
                _ => bail!("Invalid formula: {e}"),
            };
            let mut xs = args(rest)?;
            let binary = |xs: &mut Vec<Formula>| -> Result<(Formula, Formula)> {
                ensure!(xs.len() == 2, "`{head}` expects two arguments in {e}");
                let b = xs.remove(1);
                let a = xs.remove(0);
                Ok((a, b))
            };
            let fold = |xs: Vec<Formula>, op: fn(Formula, Formula) -> Formula| -> Result<Formula> {
                let mut it = xs.into_iter();
                let first = it.next().with_context(|| format!("`{head}` expects arguments in {e}"))?;
                Ok(it.fold(first, op))
            };
            match head {
                "and" => Ok(Formula::and(xs)),
                "or" => Ok(Formula::or(xs)),
                "not" => {
                    ensure!(xs.len() == 1, "`not` expects a single argument in {e}");
                    Ok(Formula::not(xs.remove(0)))
                }
                "=>" | "imply" | "implies" => binary(&mut xs).map(|(a, b)| Formula::implies(a, b)),
                "iff" => binary(&mut xs).map(|(a, b)| Formula::iff(a, b)),
                "=" => binary(&mut xs).map(|(a, b)| Formula::eq(a, b)),
                "<=" => binary(&mut xs).map(|(a, b)| Formula::le(a, b)),
                "<" => binary(&mut xs).map(|(a, b)| Formula::lt(a, b)),
                ">=" => binary(&mut xs).map(|(a, b)| Formula::ge(a, b)),
                ">" => binary(&mut xs).map(|(a, b)| Formula::gt(a, b)),
                "+" => fold(xs, |a, b| Formula::add(a, b)),
                "*" => fold(xs, |a, b| Formula::mul(a, b)),
                "/" => fold(xs, |a, b| Formula::div(a, b)),
                "-" if xs.len() == 1 => Ok(Formula::sub(Formula::constant(0), xs.remove(0))),
                "-" => fold(xs, |a, b| Formula::sub(a, b)),
                _ => bail!("Unknown operator `{head}` in {e}"),
            }
        }
    }
}
