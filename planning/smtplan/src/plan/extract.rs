use crate::encode::{ActionOccurrence, NameError, Parallelism, Timestep};
use crate::model::{ActionId, Problem};
use crate::plan::{ActionSteps, PartialOrderPlan, Plan, SequentialPlan};
use crate::smt::Model;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("`{action}` occurs at step {step}, beyond the horizon {horizon}")]
    BeyondHorizon {
        action: String,
        step: Timestep,
        horizon: Timestep,
    },
    #[error("`{first}` and `{second}` both occur at step {step} of a sequential plan")]
    SeveralActions {
        step: Timestep,
        first: String,
        second: String,
    },
}

/// Reads the actions occurring at each step `0..horizon` from a model.
///
/// Every boolean variable that is true in the model and named after an action is an occurrence
/// of this action. Other variables (states, chained variables, goal literals) are ignored.
pub fn extract_actions(
    model: &Model,
    problem: &Problem,
    horizon: Timestep,
    parallelism: Parallelism,
) -> Result<ActionSteps, ExtractionError> {
    let mut occurrences = Vec::new();
    for name in model.true_booleans() {
        let Some(occ) = ActionOccurrence::parse(name, problem)? else {
            continue;
        };
        if occ.step >= horizon {
            return Err(ExtractionError::BeyondHorizon {
                action: problem.action(occ.action).name().to_string(),
                step: occ.step,
                horizon,
            });
        }
        occurrences.push(occ);
    }
    if parallelism.is_parallel() {
        let mut steps = vec![BTreeSet::new(); horizon as usize];
        for occ in occurrences {
            steps[occ.step as usize].insert(occ.action);
        }
        Ok(ActionSteps::Parallel(steps))
    } else {
        let mut steps: Vec<Option<ActionId>> = vec![None; horizon as usize];
        for occ in occurrences {
            let slot = &mut steps[occ.step as usize];
            if let Some(other) = *slot {
                let (first, second) = if other < occ.action {
                    (other, occ.action)
                } else {
                    (occ.action, other)
                };
                return Err(ExtractionError::SeveralActions {
                    step: occ.step,
                    first: problem.action(first).name().to_string(),
                    second: problem.action(second).name().to_string(),
                });
            }
            *slot = Some(occ.action);
        }
        Ok(ActionSteps::Sequential(steps))
    }
}

/// Concatenates the steps, each step being ordered by position of its actions in `ordering`.
pub fn linearize(steps: &[BTreeSet<ActionId>], ordering: &[ActionId]) -> SequentialPlan {
    let rank = |a: &ActionId| ordering.iter().position(|o| o == a).unwrap_or(usize::MAX);
    let mut actions = Vec::with_capacity(steps.iter().map(|s| s.len()).sum());
    for step in steps {
        let mut remaining: Vec<ActionId> = step.iter().copied().collect();
        remaining.sort_by_key(|a| (rank(a), *a));
        actions.extend(remaining);
    }
    SequentialPlan::new(actions)
}

/// Builds the plan corresponding to the actions of each step.
///
/// A partial order is only kept for the ForAll semantics when `keep_sets` is set. Empty steps
/// are skipped, so that its edges link each step to the next non-empty one.
/// Otherwise, parallel steps are linearized following the canonical `ordering`.
pub fn convert_to_plan(
    steps: &ActionSteps,
    keep_sets: bool,
    parallelism: Parallelism,
    ordering: &[ActionId],
) -> Plan {
    match steps {
        ActionSteps::Sequential(slots) => Plan::Sequential(SequentialPlan::new(slots.iter().flatten().copied().collect())),
        ActionSteps::Parallel(sets) if keep_sets && parallelism == Parallelism::ForAll => {
            Plan::PartialOrder(PartialOrderPlan::from_steps(sets))
        }
        ActionSteps::Parallel(sets) => Plan::Sequential(linearize(sets, ordering)),
    }
}
