use crate::smt::value::{RealValue, Sort, Value};
use itertools::Itertools;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A named solver variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var {
    name: Arc<str>,
    sort: Sort,
}

impl Var {
    pub fn new(name: impl Into<Arc<str>>, sort: Sort) -> Var {
        Var {
            name: name.into(),
            sort,
        }
    }

    pub fn boolean(name: impl Into<Arc<str>>) -> Var {
        Var::new(name, Sort::Bool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_symbol(f, &self.name)
    }
}

fn is_simple_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c)
}

/// Writes `name` as an SMT-LIB2 symbol, quoting it with `|..|` when it is not a simple symbol.
pub fn fmt_symbol(f: &mut Formatter<'_>, name: &str) -> std::fmt::Result {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(is_simple_symbol_char);
    if simple {
        write!(f, "{name}")
    } else {
        write!(f, "|{name}|")
    }
}

/// Boolean and arithmetic expression in the native language of the SMT solver.
///
/// Expressions are printed in SMT-LIB2 syntax.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(Value),
    Var(Var),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub const TRUE: Expr = Expr::Const(Value::TRUE);
    pub const FALSE: Expr = Expr::Const(Value::FALSE);

    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Const(value.into())
    }

    pub fn var(var: Var) -> Expr {
        Expr::Var(var)
    }

    pub fn and(conjuncts: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(conjuncts.into_iter().collect())
    }

    pub fn or(disjuncts: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(disjuncts.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(e: Expr) -> Expr {
        match e {
            Expr::Const(Value::Bool(b)) => Expr::Const(Value::Bool(!b)),
            e => Expr::Not(Box::new(e)),
        }
    }

    pub fn implies(a: Expr, b: Expr) -> Expr {
        Expr::Implies(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(a: Expr, b: Expr) -> Expr {
        Expr::Eq(Box::new(a), Box::new(b))
    }

    pub fn neq(a: Expr, b: Expr) -> Expr {
        Expr::not(Expr::eq(a, b))
    }

    pub fn le(a: Expr, b: Expr) -> Expr {
        Expr::Le(Box::new(a), Box::new(b))
    }

    pub fn lt(a: Expr, b: Expr) -> Expr {
        Expr::Lt(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::Add(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::Div(Box::new(a), Box::new(b))
    }

    pub fn sort(&self) -> Sort {
        match self {
            Expr::Const(v) => v.sort(),
            Expr::Var(v) => v.sort(),
            Expr::Not(_)
            | Expr::And(_)
            | Expr::Or(_)
            | Expr::Implies(_, _)
            | Expr::Eq(_, _)
            | Expr::Le(_, _)
            | Expr::Lt(_, _) => Sort::Bool,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => a.sort().join(b.sort()),
            Expr::Div(_, _) => Sort::Real,
        }
    }

    /// Set of all variables appearing in the expression.
    pub fn vars(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    pub fn collect_vars(&self, out: &mut BTreeSet<Var>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(v) => {
                out.insert(v.clone());
            }
            Expr::Not(e) => e.collect_vars(out),
            Expr::And(es) | Expr::Or(es) => es.iter().for_each(|e| e.collect_vars(out)),
            Expr::Implies(a, b)
            | Expr::Eq(a, b)
            | Expr::Le(a, b)
            | Expr::Lt(a, b)
            | Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }

    /// Three-valued evaluation of the expression.
    ///
    /// `lookup` gives the value of the variables that are assigned. The result is `None` if the
    /// value of the expression depends on an unassigned variable.
    /// Boolean connectives short-circuit, so that `(and false x)` evaluates to `false` even if `x` is unknown.
    pub fn eval<F: Fn(&Var) -> Option<Value>>(&self, lookup: &F) -> Option<Value> {
        match self {
            Expr::Const(v) => Some(*v),
            Expr::Var(v) => lookup(v),
            Expr::Not(e) => Some(Value::Bool(!e.eval(lookup)?.as_bool()?)),
            Expr::And(es) => {
                let mut unknown = false;
                for e in es {
                    match e.eval(lookup).and_then(|v| v.as_bool()) {
                        Some(false) => return Some(Value::FALSE),
                        Some(true) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(Value::TRUE)
                }
            }
            Expr::Or(es) => {
                let mut unknown = false;
                for e in es {
                    match e.eval(lookup).and_then(|v| v.as_bool()) {
                        Some(true) => return Some(Value::TRUE),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(Value::FALSE)
                }
            }
            Expr::Implies(a, b) => {
                let a = a.eval(lookup).and_then(|v| v.as_bool());
                let b = b.eval(lookup).and_then(|v| v.as_bool());
                match (a, b) {
                    (Some(false), _) | (_, Some(true)) => Some(Value::TRUE),
                    (Some(true), Some(false)) => Some(Value::FALSE),
                    _ => None,
                }
            }
            Expr::Eq(a, b) => {
                let a = a.eval(lookup)?;
                let b = b.eval(lookup)?;
                Some(Value::Bool(a.same(&b)))
            }
            Expr::Le(a, b) => {
                let a = a.eval(lookup)?.as_rational()?;
                let b = b.eval(lookup)?.as_rational()?;
                Some(Value::Bool(a <= b))
            }
            Expr::Lt(a, b) => {
                let a = a.eval(lookup)?.as_rational()?;
                let b = b.eval(lookup)?.as_rational()?;
                Some(Value::Bool(a < b))
            }
            Expr::Add(a, b) => arith(a.eval(lookup)?, b.eval(lookup)?, i64::checked_add, |x, y| x.checked_add(&y)),
            Expr::Sub(a, b) => arith(a.eval(lookup)?, b.eval(lookup)?, i64::checked_sub, |x, y| x.checked_sub(&y)),
            Expr::Mul(a, b) => arith(a.eval(lookup)?, b.eval(lookup)?, i64::checked_mul, |x, y| x.checked_mul(&y)),
            Expr::Div(a, b) => {
                let a = a.eval(lookup)?.as_rational()?;
                let b = b.eval(lookup)?.as_rational()?;
                // also undefined on a null divisor
                a.checked_div(&b).map(Value::Real)
            }
        }
    }
}

/// Applies a binary operation, in integers if both operands are integers. `None` on overflow.
fn arith(
    a: Value,
    b: Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    real_op: impl Fn(RealValue, RealValue) -> Option<RealValue>,
) -> Option<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(x, y).map(Value::Int),
        _ => real_op(a.as_rational()?, b.as_rational()?).map(Value::Real),
    }
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        Expr::Var(v)
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Const(v)
    }
}

/// Writes `e` as an operand that is expected to have sort `target`, inserting an explicit
/// int-to-real conversion when needed.
fn fmt_operand(f: &mut Formatter<'_>, e: &Expr, target: Sort) -> std::fmt::Result {
    if target == Sort::Real && e.sort() == Sort::Int {
        write!(f, "(to_real {e})")
    } else {
        write!(f, "{e}")
    }
}

fn fmt_binary(f: &mut Formatter<'_>, op: &str, a: &Expr, b: &Expr, operand_sort: Sort) -> std::fmt::Result {
    write!(f, "({op} ")?;
    fmt_operand(f, a, operand_sort)?;
    write!(f, " ")?;
    fmt_operand(f, b, operand_sort)?;
    write!(f, ")")
}

fn fmt_nary(f: &mut Formatter<'_>, op: &str, neutral: &str, args: &[Expr]) -> std::fmt::Result {
    match args {
        [] => write!(f, "{neutral}"),
        [single] => write!(f, "{single}"),
        _ => write!(f, "({op} {})", args.iter().format(" ")),
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Not(e) => write!(f, "(not {e})"),
            Expr::And(es) => fmt_nary(f, "and", "true", es),
            Expr::Or(es) => fmt_nary(f, "or", "false", es),
            Expr::Implies(a, b) => write!(f, "(=> {a} {b})"),
            Expr::Eq(a, b) => fmt_binary(f, "=", a, b, a.sort().max(b.sort())),
            Expr::Le(a, b) => fmt_binary(f, "<=", a, b, a.sort().join(b.sort())),
            Expr::Lt(a, b) => fmt_binary(f, "<", a, b, a.sort().join(b.sort())),
            Expr::Add(a, b) => fmt_binary(f, "+", a, b, self.sort()),
            Expr::Sub(a, b) => fmt_binary(f, "-", a, b, self.sort()),
            Expr::Mul(a, b) => fmt_binary(f, "*", a, b, self.sort()),
            Expr::Div(a, b) => fmt_binary(f, "/", a, b, Sort::Real),
        }
    }
}
