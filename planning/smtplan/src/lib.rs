//! Planning as satisfiability modulo theories.
//!
//! A grounded [`model::Problem`] is unrolled over an increasing number of steps by an
//! [`encode::Encoder`], whose constraints are handed to an SMT solver (see [`smt`]).
//! The [`planner::Planner`] stops at the first horizon for which the solver finds a model, and
//! turns the model into a validated [`plan::Plan`].
//!
//! Several actions may occur in the same step, subject to one of the [`encode::Parallelism`]
//! semantics.

pub mod encode;
pub mod model;
pub mod params;
pub mod parsing;
pub mod plan;
pub mod planner;
pub mod smt;
