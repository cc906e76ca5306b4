use derive_more::derive::Display;
use num_rational::Rational64;
use std::fmt::{Formatter, Write};

pub type IntValue = i64;
pub type RealValue = Rational64;

/// Sort (type) of a solver variable or expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Sort {
    Bool,
    Int,
    Real,
}

impl Sort {
    pub fn is_numeric(self) -> bool {
        matches!(self, Sort::Int | Sort::Real)
    }

    /// Returns true if a value of sort `other` can be stored in a variable of this sort.
    /// Integers are implicitly promoted to reals.
    pub fn accepts(self, other: Sort) -> bool {
        self == other || (self == Sort::Real && other == Sort::Int)
    }

    /// Sort of an arithmetic operation over operands of sorts `self` and `other`.
    pub fn join(self, other: Sort) -> Sort {
        if self == Sort::Real || other == Sort::Real {
            Sort::Real
        } else {
            Sort::Int
        }
    }
}

/// A constant value, as found in a solver model or in a planning problem.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Bool(bool),
    Int(IntValue),
    Real(RealValue),
}

impl Value {
    pub const TRUE: Value = Value::Bool(true);
    pub const FALSE: Value = Value::Bool(false);

    pub fn sort(&self) -> Sort {
        match self {
            Value::Bool(_) => Sort::Bool,
            Value::Int(_) => Sort::Int,
            Value::Real(_) => Sort::Real,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Exact rational view of a numeric value.
    pub fn as_rational(&self) -> Option<RealValue> {
        match self {
            Value::Bool(_) => None,
            Value::Int(i) => Some(RealValue::from_integer(*i)),
            Value::Real(r) => Some(*r),
        }
    }

    /// Converts the value so that it can be stored in a variable of the given sort.
    pub fn coerce(self, sort: Sort) -> Option<Value> {
        match (self, sort) {
            (Value::Bool(_), Sort::Bool) | (Value::Int(_), Sort::Int) | (Value::Real(_), Sort::Real) => Some(self),
            (Value::Int(i), Sort::Real) => Some(Value::Real(RealValue::from_integer(i))),
            (Value::Real(r), Sort::Int) if r.is_integer() => Some(Value::Int(r.to_integer())),
            _ => None,
        }
    }

    /// Semantic equality: `Int(2)` and `Real(2/1)` are the same number.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => match (self.as_rational(), other.as_rational()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<IntValue> for Value {
    fn from(i: IntValue) -> Self {
        Value::Int(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as IntValue)
    }
}
impl From<RealValue> for Value {
    fn from(r: RealValue) -> Self {
        Value::Real(r)
    }
}

fn fmt_decimal(f: &mut Formatter<'_>, i: i64) -> std::fmt::Result {
    write!(f, "{}.0", i)
}

/// Values are displayed in SMT-LIB2 syntax, where negative numbers are written `(- x)`.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) if *i < 0 => write!(f, "(- {})", i.unsigned_abs()),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => {
                let negative = *r.numer() < 0;
                if negative {
                    f.write_str("(- ")?;
                }
                let numer = r.numer().abs();
                if r.is_integer() {
                    fmt_decimal(f, numer)?;
                } else {
                    f.write_str("(/ ")?;
                    fmt_decimal(f, numer)?;
                    f.write_char(' ')?;
                    fmt_decimal(f, *r.denom())?;
                    f.write_char(')')?;
                }
                if negative {
                    f.write_char(')')?;
                }
                Ok(())
            }
        }
    }
}
