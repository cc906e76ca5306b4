//! Naming of the solver variables.
//!
//! Every fluent and every action has one variable per timestep, named `<name>_@t<timestep>`.
//! Chained variables of a fluent `f` are named `f$<k>_@t<timestep>`. Internally, occurrences are
//! always handled as structured [`ActionOccurrence`]s: names are only built and parsed at the
//! solver boundary.

use crate::model::{ActionId, FluentId, Problem, RESERVED_NAME};
use crate::smt::Var;
use thiserror::Error;

pub type Timestep = u32;

/// Separator between the base name of a variable and its timestep.
pub const STEP_SEPARATOR: &str = "_@t";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("variable `{0}` has no `_@t` timestep suffix")]
    MissingTimestep(String),
    #[error("variable `{0}` has an invalid timestep")]
    InvalidTimestep(String),
}

pub fn stated_name(base: &str, t: Timestep) -> String {
    format!("{base}{STEP_SEPARATOR}{t}")
}

/// Splits a variable name into its base name and its timestep.
pub fn parse_stated_name(name: &str) -> Result<(&str, Timestep), NameError> {
    let (base, step) = name
        .rsplit_once(STEP_SEPARATOR)
        .ok_or_else(|| NameError::MissingTimestep(name.to_string()))?;
    if base.is_empty() || step.is_empty() || !step.chars().all(|c| c.is_ascii_digit()) {
        return Err(NameError::InvalidTimestep(name.to_string()));
    }
    let step = step
        .parse()
        .map_err(|_| NameError::InvalidTimestep(name.to_string()))?;
    Ok((base, step))
}

/// An action occurring at a given timestep. Occurrences are ordered by step first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionOccurrence {
    pub step: Timestep,
    pub action: ActionId,
}

impl ActionOccurrence {
    pub fn new(action: ActionId, step: Timestep) -> Self {
        ActionOccurrence { action, step }
    }

    /// Recovers an occurrence from the name of its solver variable.
    /// Returns `Ok(None)` if the base name is not the name of an action of the problem.
    pub fn parse(name: &str, problem: &Problem) -> Result<Option<ActionOccurrence>, NameError> {
        let (base, step) = parse_stated_name(name)?;
        Ok(problem.action_id(base).map(|action| ActionOccurrence { action, step }))
    }

    pub fn var(&self, problem: &Problem) -> Var {
        action_var(problem, self.action, self.step)
    }
}

/// Boolean variable that is true iff the action occurs at timestep `t`.
pub fn action_var(problem: &Problem, action: ActionId, t: Timestep) -> Var {
    Var::boolean(stated_name(problem.action(action).name(), t))
}

/// Value of the fluent in the state at timestep `t`.
pub fn fluent_var(problem: &Problem, fluent: FluentId, t: Timestep) -> Var {
    let fluent = problem.fluent(fluent);
    Var::new(stated_name(fluent.name(), t), fluent.sort())
}

/// Value of the fluent after the `link`-th writer of timestep `t` (0 for the value before any of them).
pub fn chained_var(problem: &Problem, fluent: FluentId, link: usize, t: Timestep) -> Var {
    let fluent = problem.fluent(fluent);
    Var::new(stated_name(&format!("{}${link}", fluent.name()), t), fluent.sort())
}

/// Literal activating the goal at horizon `t`.
pub fn goal_var(t: Timestep) -> Var {
    Var::boolean(stated_name(RESERVED_NAME, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(stated_name("pickup", 3), "pickup_@t3");
        assert_eq!(parse_stated_name("pickup_@t3"), Ok(("pickup", 3)));
        assert_eq!(parse_stated_name("move_a_@t_b_@t12"), Ok(("move_a_@t_b", 12)));
        assert!(matches!(parse_stated_name("pickup"), Err(NameError::MissingTimestep(_))));
        assert!(matches!(parse_stated_name("pickup_@tx"), Err(NameError::InvalidTimestep(_))));
        assert!(matches!(parse_stated_name("pickup_@t"), Err(NameError::InvalidTimestep(_))));
        assert!(matches!(parse_stated_name("_@t1"), Err(NameError::InvalidTimestep(_))));
        assert_eq!(goal_var(4).name(), "goal_@t4");
    }
}
