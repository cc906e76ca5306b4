//! Interface with SMT solvers: expressions, models and solver backends.

mod expr;
mod model;
mod process;
pub mod sexpr;
mod solver;
mod value;

pub use expr::*;
pub use model::*;
pub use process::*;
pub use solver::*;
pub use value::*;
