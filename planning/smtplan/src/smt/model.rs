use crate::smt::expr::{Expr, Var};
use crate::smt::value::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ModelEvalError {
    #[error("the value of `{0}` depends on variables that are not assigned in the model")]
    Unassigned(String),
}

/// A satisfying assignment returned by the solver: association of variable names to values.
///
/// Iteration is in lexicographic order of names, which makes everything derived from a model deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    values: BTreeMap<String, Value>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    pub fn value_of(&self, var: &Var) -> Option<Value> {
        self.get(var.name())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Names of all boolean variables that are true in the model.
    pub fn true_booleans(&self) -> impl Iterator<Item = &str> + '_ {
        self.values
            .iter()
            .filter(|(_, v)| **v == Value::TRUE)
            .map(|(k, _)| k.as_str())
    }

    /// Evaluates `expr` in the model. All variables the result depends on must be assigned.
    pub fn eval(&self, expr: &Expr) -> Result<Value, ModelEvalError> {
        expr.eval(&|v: &Var| self.value_of(v))
            .ok_or_else(|| ModelEvalError::Unassigned(expr.to_string()))
    }

    /// Returns true if `constraint` evaluates to true in this model.
    pub fn satisfies(&self, constraint: &Expr) -> bool {
        self.eval(constraint) == Ok(Value::TRUE)
    }
}

impl FromIterator<(String, Value)> for Model {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Model {
            values: iter.into_iter().collect(),
        }
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, value) in &self.values {
            writeln!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_booleans_are_sorted() {
        let mut model = Model::new();
        model.insert("b_@t0", true);
        model.insert("a_@t1", true);
        model.insert("a_@t0", false);
        model.insert("x_@t0", 3);
        let names: Vec<_> = model.true_booleans().collect();
        assert_eq!(names, vec!["a_@t1", "b_@t0"]);
    }

    #[test]
    fn evaluation() {
        let mut model = Model::new();
        model.insert("a", true);
        let a = Expr::var(Var::boolean("a"));
        let b = Expr::var(Var::boolean("b"));
        assert!(model.satisfies(&Expr::or([a.clone(), b.clone()])));
        assert!(model.eval(&Expr::and([a, b])).is_err());
    }
}
