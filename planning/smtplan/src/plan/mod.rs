//! Plans reconstructed from solver models.

mod extract;
mod validate;

pub use extract::*;
pub use validate::*;

use crate::encode::{ActionOccurrence, Timestep};
use crate::model::{ActionId, InProblem, Problem};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Actions of each step of a solution, as read from a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSteps {
    /// At most one action per step.
    Sequential(Vec<Option<ActionId>>),
    /// A set of concurrent actions per step.
    Parallel(Vec<BTreeSet<ActionId>>),
}

impl ActionSteps {
    /// Number of steps.
    pub fn horizon(&self) -> usize {
        match self {
            ActionSteps::Sequential(steps) => steps.len(),
            ActionSteps::Parallel(steps) => steps.len(),
        }
    }

    /// Total number of action occurrences.
    pub fn num_actions(&self) -> usize {
        match self {
            ActionSteps::Sequential(steps) => steps.iter().flatten().count(),
            ActionSteps::Parallel(steps) => steps.iter().map(|s| s.len()).sum(),
        }
    }
}

/// A totally ordered sequence of actions.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SequentialPlan {
    pub actions: Vec<ActionId>,
}

impl SequentialPlan {
    pub fn new(actions: Vec<ActionId>) -> Self {
        SequentialPlan { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.actions.iter().copied()
    }
}

impl Display for InProblem<'_, &SequentialPlan> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, a) in self.elem.actions.iter().enumerate() {
            writeln!(f, "{i}: {}", self.problem / *a)?;
        }
        Ok(())
    }
}

/// A plan where an action occurrence only precedes the occurrences of the next non-empty step.
///
/// Edges always go from a step to a later one, which makes the relation acyclic.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PartialOrderPlan {
    successors: BTreeMap<ActionOccurrence, Vec<ActionOccurrence>>,
}

impl PartialOrderPlan {
    /// Builds the plan from the set of actions of each step.
    ///
    /// Each occurrence precedes all occurrences of the next non-empty step, i.e. of step `t + 1`
    /// unless that step is empty. Occurrences of the last non-empty step have no successor.
    pub fn from_steps(steps: &[BTreeSet<ActionId>]) -> Self {
        let occurrences = steps
            .iter()
            .enumerate()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(t, actions)| {
                actions
                    .iter()
                    .map(|&a| ActionOccurrence::new(a, t as Timestep))
                    .collect_vec()
            })
            .collect_vec();
        let mut successors = BTreeMap::new();
        for (i, step) in occurrences.iter().enumerate() {
            let next = occurrences.get(i + 1).cloned().unwrap_or_default();
            for &occ in step {
                successors.insert(occ, next.clone());
            }
        }
        PartialOrderPlan { successors }
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// All action occurrences, by increasing step.
    pub fn occurrences(&self) -> impl Iterator<Item = ActionOccurrence> + '_ {
        self.successors.keys().copied()
    }

    /// Occurrences directly following `occurrence`.
    pub fn successors(&self, occurrence: ActionOccurrence) -> &[ActionOccurrence] {
        self.successors.get(&occurrence).map(|s| s.as_slice()).unwrap_or(&[])
    }

    /// Returns true if `before` must precede `after`, directly or transitively.
    pub fn precedes(&self, before: ActionOccurrence, after: ActionOccurrence) -> bool {
        let mut stack = vec![before];
        let mut visited = BTreeSet::new();
        while let Some(occ) = stack.pop() {
            for &next in self.successors(occ) {
                if next == after {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Linearizes the plan: by increasing step, then by canonical order within a step.
    pub fn to_sequential(&self, ordering: &[ActionId]) -> SequentialPlan {
        let steps = self
            .occurrences()
            .chunk_by(|occ| occ.step)
            .into_iter()
            .map(|(_, occs)| occs.map(|occ| occ.action).collect::<BTreeSet<_>>())
            .collect_vec();
        linearize(&steps, ordering)
    }
}

impl Display for InProblem<'_, &PartialOrderPlan> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let p = self.problem;
        for (occ, next) in &self.elem.successors {
            write!(f, "{}@{}", p / occ.action, occ.step)?;
            if !next.is_empty() {
                write!(f, " -> {}", next.iter().map(|n| format!("{}@{}", p / n.action, n.step)).join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plan {
    Sequential(SequentialPlan),
    PartialOrder(PartialOrderPlan),
}

impl Plan {
    pub fn len(&self) -> usize {
        match self {
            Plan::Sequential(p) => p.len(),
            Plan::PartialOrder(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A total order of the plan's actions, compatible with its ordering constraints.
    pub fn to_sequential(&self, ordering: &[ActionId]) -> SequentialPlan {
        match self {
            Plan::Sequential(p) => p.clone(),
            Plan::PartialOrder(p) => p.to_sequential(ordering),
        }
    }
}

impl Display for InProblem<'_, &Plan> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.elem {
            Plan::Sequential(p) => write!(f, "{}", self.problem / p),
            Plan::PartialOrder(p) => write!(f, "{}", self.problem / p),
        }
    }
}

/// Helper for displaying any plan element with its problem.
pub fn format_plan(problem: &Problem, plan: &Plan) -> String {
    (problem / plan).to_string()
}
