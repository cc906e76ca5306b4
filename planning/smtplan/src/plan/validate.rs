use crate::model::{Formula, Problem};
use crate::plan::SequentialPlan;
use crate::smt::Value;
use thiserror::Error;

/// Value of each fluent, indexed by fluent.
pub type State = Vec<Value>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("precondition {precondition} of `{action}` does not hold at position {position}")]
    UnsatisfiedPrecondition {
        position: usize,
        action: String,
        precondition: usize,
    },
    #[error("the effects of `{action}` at position {position} cannot be evaluated")]
    UndefinedEffect { position: usize, action: String },
    #[error("`{fluent}` leaves its bounds after `{action}` at position {position}")]
    OutOfBounds {
        position: usize,
        action: String,
        fluent: String,
    },
    #[error("goal {0} does not hold at the end of the plan")]
    UnsatisfiedGoal(usize),
}

fn holds(formula: &Formula, state: &[Value]) -> bool {
    formula.eval(state) == Some(Value::TRUE)
}

/// Simulates the plan from the initial state and checks that it reaches the goals.
///
/// All effects of an action are evaluated in the state before the action, then applied in order.
/// Returns the final state.
pub fn validate(problem: &Problem, plan: &SequentialPlan) -> Result<State, ValidationError> {
    let mut state: State = problem.initial_state().to_vec();
    for (position, a) in plan.iter().enumerate() {
        let action = problem.action(a);
        for (i, pre) in action.preconditions.iter().enumerate() {
            if !holds(pre, &state) {
                return Err(ValidationError::UnsatisfiedPrecondition {
                    position,
                    action: action.name().to_string(),
                    precondition: i,
                });
            }
        }
        let undefined = || ValidationError::UndefinedEffect {
            position,
            action: action.name().to_string(),
        };
        let mut updates = Vec::with_capacity(action.effects.len());
        for eff in &action.effects {
            let applies = match &eff.condition {
                None => true,
                Some(c) => c.eval(&state).and_then(|v| v.as_bool()).ok_or_else(undefined)?,
            };
            if applies {
                let sort = problem.fluent(eff.fluent).sort();
                let value = eff
                    .new_value()
                    .eval(&state)
                    .and_then(|v| v.coerce(sort))
                    .ok_or_else(undefined)?;
                updates.push((eff.fluent, value));
            }
        }
        for (f, value) in updates {
            state[usize::from(f)] = value;
            let fluent = problem.fluent(f);
            if !fluent.admits(value) {
                return Err(ValidationError::OutOfBounds {
                    position,
                    action: action.name().to_string(),
                    fluent: fluent.name().to_string(),
                });
            }
        }
    }
    for (i, goal) in problem.goals().iter().enumerate() {
        if !holds(goal, &state) {
            return Err(ValidationError::UnsatisfiedGoal(i));
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::smt::Sort;

    fn counter() -> (Problem, ActionId, ActionId) {
        let mut pb = ProblemBuilder::new("counter");
        let x = pb.bounded_fluent("x", Sort::Int, 0, 3).unwrap();
        let done = pb.fluent("done", Sort::Bool).unwrap();
        pb.init(x, 0).unwrap();
        let inc = pb.action("inc", [], [Effect::increase(x, 1)]).unwrap();
        let finish = pb
            .action("finish", [Formula::ge(x, 2)], [Effect::assign(done, true)])
            .unwrap();
        pb.goal(done).unwrap();
        (pb.build().unwrap(), inc, finish)
    }

    #[test]
    fn valid_plan() {
        let (problem, inc, finish) = counter();
        let state = validate(&problem, &SequentialPlan::new(vec![inc, inc, finish])).unwrap();
        assert_eq!(state, vec![Value::Int(2), Value::TRUE]);
    }

    #[test]
    fn invalid_plans() {
        let (problem, inc, finish) = counter();
        assert_eq!(
            validate(&problem, &SequentialPlan::new(vec![inc, finish])),
            Err(ValidationError::UnsatisfiedPrecondition {
                position: 1,
                action: "finish".to_string(),
                precondition: 0
            })
        );
        assert_eq!(
            validate(&problem, &SequentialPlan::new(vec![inc, inc])),
            Err(ValidationError::UnsatisfiedGoal(0))
        );
        assert!(matches!(
            validate(&problem, &SequentialPlan::new(vec![inc, inc, inc, inc])),
            Err(ValidationError::OutOfBounds { position: 3, .. })
        ));
    }
}
