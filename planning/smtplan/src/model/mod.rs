//! Grounded planning problems: fluents, actions with (conditional) effects, initial state and goals.

mod formula;
mod problem;

pub use formula::*;
pub use problem::*;

/// Creates a dense identifier type, usable as an index into the vectors of a [`Problem`].
macro_rules! id_type {
    ($type_name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
        pub struct $type_name(u32);

        impl $type_name {
            pub const fn from_u32(u: u32) -> Self {
                $type_name(u)
            }
            pub const fn to_u32(self) -> u32 {
                self.0
            }
        }
        impl From<usize> for $type_name {
            fn from(u: usize) -> Self {
                Self::from_u32(u as u32)
            }
        }
        impl From<$type_name> for usize {
            fn from(v: $type_name) -> Self {
                v.0 as usize
            }
        }
    };
}

id_type!(FluentId);
id_type!(ActionId);

/// An element of a problem, bundled with the problem for display purposes (`&problem / elem`).
#[derive(Copy, Clone)]
pub struct InProblem<'a, T> {
    pub elem: T,
    pub problem: &'a Problem,
}

impl<'a, T> std::ops::Div<T> for &'a Problem {
    type Output = InProblem<'a, T>;

    fn div(self, rhs: T) -> Self::Output {
        InProblem {
            elem: rhs,
            problem: self,
        }
    }
}

impl std::fmt::Display for InProblem<'_, FluentId> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.problem.fluent(self.elem).name())
    }
}

impl std::fmt::Display for InProblem<'_, ActionId> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.problem.action(self.elem).name())
    }
}
