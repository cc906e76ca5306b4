use crate::smt::expr::{Expr, Var};
use crate::smt::model::Model;
use std::time::Instant;

/// Answer of a satisfiability check.
#[derive(Clone, Debug, PartialEq)]
pub enum SatResult {
    Sat(Model),
    Unsat,
    /// The solver gave up, with its reason if it provided one.
    Unknown(String),
    /// The check was interrupted at the deadline of the solver.
    Timeout,
}

impl SatResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SatResult::Sat(_))
    }
}

/// Interface to an SMT solver, the only long-running collaborator of the planner.
///
/// Assertions are purely additive until the next [`Solver::reset`].
pub trait Solver {
    /// Adds a boolean constraint to the solver. Variables are declared on first use.
    fn assert(&mut self, constraint: &Expr) -> anyhow::Result<()>;

    /// Checks the satisfiability of all assertions, with each boolean variable of `assumptions`
    /// assumed to be true for this check only.
    fn check(&mut self, assumptions: &[Var]) -> anyhow::Result<SatResult>;

    /// Removes all assertions and declarations.
    fn reset(&mut self) -> anyhow::Result<()>;

    /// Number of assertions since the last reset.
    fn num_assertions(&self) -> usize;

    /// Checks still running at `deadline` are interrupted and answer [`SatResult::Timeout`].
    /// Solvers that cannot be interrupted ignore it.
    fn set_deadline(&mut self, _deadline: Option<Instant>) {}

    fn assert_all<'a>(&mut self, constraints: impl IntoIterator<Item = &'a Expr>) -> anyhow::Result<()>
    where
        Self: Sized,
    {
        for c in constraints {
            self.assert(c)?;
        }
        Ok(())
    }
}
