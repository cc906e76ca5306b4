use crate::model::{Fluent, FluentId, InProblem};
use crate::smt::{Expr, Sort, Value};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Boolean or arithmetic expression over the fluents of a problem, as found in preconditions,
/// effect conditions, effect values and goals.
///
/// A formula is not bound to any timestep: it is only when translated into a solver expression
/// that each fluent reference is replaced by one of the fluent's timestep variables.
#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    Const(Value),
    Fluent(FluentId),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    Eq(Box<Formula>, Box<Formula>),
    Le(Box<Formula>, Box<Formula>),
    Lt(Box<Formula>, Box<Formula>),
    Add(Box<Formula>, Box<Formula>),
    Sub(Box<Formula>, Box<Formula>),
    Mul(Box<Formula>, Box<Formula>),
    Div(Box<Formula>, Box<Formula>),
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("expected {expected} but found an expression of sort {found}")]
pub struct SortError {
    pub expected: &'static str,
    pub found: Sort,
}

fn expect(found: Sort, expected: &'static str, ok: impl Fn(Sort) -> bool) -> Result<Sort, SortError> {
    if ok(found) {
        Ok(found)
    } else {
        Err(SortError { expected, found })
    }
}

fn expect_bool(found: Sort) -> Result<Sort, SortError> {
    expect(found, "a boolean", |s| s == Sort::Bool)
}

fn expect_numeric(found: Sort) -> Result<Sort, SortError> {
    expect(found, "a number", Sort::is_numeric)
}

impl Formula {
    pub const TRUE: Formula = Formula::Const(Value::TRUE);
    pub const FALSE: Formula = Formula::Const(Value::FALSE);

    pub fn constant(value: impl Into<Value>) -> Formula {
        Formula::Const(value.into())
    }
    pub fn fluent(fluent: FluentId) -> Formula {
        Formula::Fluent(fluent)
    }
    #[allow(clippy::should_implement_trait)]
    pub fn not(f: impl Into<Formula>) -> Formula {
        Formula::Not(Box::new(f.into()))
    }
    pub fn and(conjuncts: impl IntoIterator<Item = Formula>) -> Formula {
        Formula::And(conjuncts.into_iter().collect())
    }
    pub fn or(disjuncts: impl IntoIterator<Item = Formula>) -> Formula {
        Formula::Or(disjuncts.into_iter().collect())
    }
    pub fn implies(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Implies(Box::new(a.into()), Box::new(b.into()))
    }
    pub fn iff(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Iff(Box::new(a.into()), Box::new(b.into()))
    }
    #[allow(clippy::should_implement_trait)]
    pub fn eq(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Eq(Box::new(a.into()), Box::new(b.into()))
    }
    pub fn le(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Le(Box::new(a.into()), Box::new(b.into()))
    }
    pub fn lt(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Lt(Box::new(a.into()), Box::new(b.into()))
    }
    pub fn ge(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::le(b, a)
    }
    pub fn gt(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::lt(b, a)
    }
    #[allow(clippy::should_implement_trait)]
    pub fn add(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Add(Box::new(a.into()), Box::new(b.into()))
    }
    #[allow(clippy::should_implement_trait)]
    pub fn sub(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Sub(Box::new(a.into()), Box::new(b.into()))
    }
    #[allow(clippy::should_implement_trait)]
    pub fn mul(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Mul(Box::new(a.into()), Box::new(b.into()))
    }
    #[allow(clippy::should_implement_trait)]
    pub fn div(a: impl Into<Formula>, b: impl Into<Formula>) -> Formula {
        Formula::Div(Box::new(a.into()), Box::new(b.into()))
    }

    /// All fluents referenced anywhere in the formula.
    pub fn fluents(&self) -> BTreeSet<FluentId> {
        let mut out = BTreeSet::new();
        self.collect_fluents(&mut out);
        out
    }

    pub fn collect_fluents(&self, out: &mut BTreeSet<FluentId>) {
        match self {
            Formula::Const(_) => {}
            Formula::Fluent(f) => {
                out.insert(*f);
            }
            Formula::Not(e) => e.collect_fluents(out),
            Formula::And(es) | Formula::Or(es) => es.iter().for_each(|e| e.collect_fluents(out)),
            Formula::Implies(a, b)
            | Formula::Iff(a, b)
            | Formula::Eq(a, b)
            | Formula::Le(a, b)
            | Formula::Lt(a, b)
            | Formula::Add(a, b)
            | Formula::Sub(a, b)
            | Formula::Mul(a, b)
            | Formula::Div(a, b) => {
                a.collect_fluents(out);
                b.collect_fluents(out);
            }
        }
    }

    /// Type checks the formula, returning its sort.
    ///
    /// # Panics
    /// If the formula refers to a fluent that is not in `fluents`.
    pub fn sort(&self, fluents: &[Fluent]) -> Result<Sort, SortError> {
        match self {
            Formula::Const(v) => Ok(v.sort()),
            Formula::Fluent(f) => Ok(fluents[usize::from(*f)].sort()),
            Formula::Not(e) => expect_bool(e.sort(fluents)?),
            Formula::And(es) | Formula::Or(es) => {
                for e in es {
                    expect_bool(e.sort(fluents)?)?;
                }
                Ok(Sort::Bool)
            }
            Formula::Implies(a, b) | Formula::Iff(a, b) => {
                expect_bool(a.sort(fluents)?)?;
                expect_bool(b.sort(fluents)?)
            }
            Formula::Eq(a, b) => {
                let sa = a.sort(fluents)?;
                let sb = b.sort(fluents)?;
                if sa == Sort::Bool {
                    expect_bool(sb)?;
                } else {
                    expect_numeric(sb)?;
                }
                Ok(Sort::Bool)
            }
            Formula::Le(a, b) | Formula::Lt(a, b) => {
                expect_numeric(a.sort(fluents)?)?;
                expect_numeric(b.sort(fluents)?)?;
                Ok(Sort::Bool)
            }
            Formula::Add(a, b) | Formula::Sub(a, b) | Formula::Mul(a, b) => {
                let sa = expect_numeric(a.sort(fluents)?)?;
                let sb = expect_numeric(b.sort(fluents)?)?;
                Ok(sa.join(sb))
            }
            Formula::Div(a, b) => {
                expect_numeric(a.sort(fluents)?)?;
                expect_numeric(b.sort(fluents)?)?;
                Ok(Sort::Real)
            }
        }
    }

    /// Translates the formula into a solver expression, where each fluent reference is replaced
    /// by the expression given by `fluent`.
    pub fn to_expr(&self, fluent: &impl Fn(FluentId) -> Expr) -> Expr {
        let bin = |a: &Formula, b: &Formula, op: fn(Expr, Expr) -> Expr| op(a.to_expr(fluent), b.to_expr(fluent));
        match self {
            Formula::Const(v) => Expr::Const(*v),
            Formula::Fluent(f) => fluent(*f),
            Formula::Not(e) => Expr::not(e.to_expr(fluent)),
            Formula::And(es) => Expr::and(es.iter().map(|e| e.to_expr(fluent))),
            Formula::Or(es) => Expr::or(es.iter().map(|e| e.to_expr(fluent))),
            Formula::Implies(a, b) => bin(a, b, Expr::implies),
            Formula::Iff(a, b) | Formula::Eq(a, b) => bin(a, b, Expr::eq),
            Formula::Le(a, b) => bin(a, b, Expr::le),
            Formula::Lt(a, b) => bin(a, b, Expr::lt),
            Formula::Add(a, b) => bin(a, b, Expr::add),
            Formula::Sub(a, b) => bin(a, b, Expr::sub),
            Formula::Mul(a, b) => bin(a, b, Expr::mul),
            Formula::Div(a, b) => bin(a, b, Expr::div),
        }
    }

    /// Evaluates the formula in a state, given as the value of each fluent.
    /// Returns `None` on a division by zero or an arithmetic overflow.
    pub fn eval(&self, state: &[Value]) -> Option<Value> {
        self.to_expr(&|f| Expr::Const(state[usize::from(f)]))
            .eval(&|_| None)
    }
}

impl From<FluentId> for Formula {
    fn from(f: FluentId) -> Self {
        Formula::Fluent(f)
    }
}

impl From<Value> for Formula {
    fn from(v: Value) -> Self {
        Formula::Const(v)
    }
}

impl From<i32> for Formula {
    fn from(i: i32) -> Self {
        Formula::Const(Value::from(i))
    }
}

impl From<bool> for Formula {
    fn from(b: bool) -> Self {
        Formula::Const(Value::Bool(b))
    }
}

/// Constants are written the way the problem parser reads them back.
fn fmt_constant(f: &mut Formatter<'_>, v: &Value) -> std::fmt::Result {
    match v {
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Real(r) if r.is_integer() => write!(f, "{}.0", r.numer()),
        Value::Real(r) => write!(f, "{}/{}", r.numer(), r.denom()),
    }
}

impl Display for InProblem<'_, &Formula> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let p = self.problem;
        let bin = |f: &mut Formatter<'_>, op: &str, a: &Formula, b: &Formula| write!(f, "({op} {} {})", p / a, p / b);
        match self.elem {
            Formula::Const(v) => fmt_constant(f, v),
            Formula::Fluent(fl) => write!(f, "{}", p / *fl),
            Formula::Not(e) => write!(f, "(not {})", p / e.as_ref()),
            Formula::And(es) => write!(f, "(and {})", es.iter().map(|e| p / e).format(" ")),
            Formula::Or(es) => write!(f, "(or {})", es.iter().map(|e| p / e).format(" ")),
            Formula::Implies(a, b) => bin(f, "=>", a, b),
            Formula::Iff(a, b) => bin(f, "iff", a, b),
            Formula::Eq(a, b) => bin(f, "=", a, b),
            Formula::Le(a, b) => bin(f, "<=", a, b),
            Formula::Lt(a, b) => bin(f, "<", a, b),
            Formula::Add(a, b) => bin(f, "+", a, b),
            Formula::Sub(a, b) => bin(f, "-", a, b),
            Formula::Mul(a, b) => bin(f, "*", a, b),
            Formula::Div(a, b) => bin(f, "/", a, b),
        }
    }
}
