//! Global parameters that can be set from environment variables.
//!
//! ```
//! use smtplan::params::EnvParam;
//! static MY_PARAM: EnvParam<u32> = EnvParam::new("SMTPLAN_DOC_PARAM", "0");
//!
//! // environment variable not set, using default value "0"
//! assert_eq!(MY_PARAM.get(), 0);
//! ```
//!
//! A parameter is only read once, on first access. Later changes to the environment variable are ignored.

use crate::encode::Parallelism;
use std::str::FromStr;

/// Parallelism semantics used by default.
pub static PARALLELISM: EnvParam<Parallelism> = EnvParam::new("SMTPLAN_PARALLELISM", "sequential");

/// Command line of the SMT solver, which must accept SMT-LIB2 on its standard input.
pub static SOLVER_COMMAND: EnvParam<String> = EnvParam::new("SMTPLAN_SOLVER", "z3 -in -smt2");

/// If true, a single solver instance is extended as the horizon grows. Otherwise the solver is
/// reset and the full encoding is asserted again for each horizon.
pub static INCREMENTAL: EnvParam<bool> = EnvParam::new("SMTPLAN_INCREMENTAL", "true");

/// Maximal plan length to consider. Negative for no limit.
pub static MAX_LENGTH: EnvParam<i64> = EnvParam::new("SMTPLAN_MAX_LENGTH", "-1");

/// If true, ForAll plans are returned as partial orders instead of being linearized.
pub static KEEP_SETS: EnvParam<bool> = EnvParam::new("SMTPLAN_KEEP_SETS", "false");

/// Time limit of the search in seconds. Negative for no limit.
pub static TIMEOUT: EnvParam<f64> = EnvParam::new("SMTPLAN_TIMEOUT", "-1");

pub struct EnvParam<T> {
    value: once_cell::sync::OnceCell<T>,
    env: &'static str,
    default: &'static str,
}

impl<T> EnvParam<T> {
    /// Creates a new parameter that will be initialized from the environment variable `env`, or
    /// from `default` if the variable is not set.
    pub const fn new(env: &'static str, default: &'static str) -> EnvParam<T> {
        EnvParam {
            value: once_cell::sync::OnceCell::new(),
            env,
            default,
        }
    }

    pub fn name(&self) -> &'static str {
        self.env
    }
}

impl<T: FromStr> EnvParam<T> {
    fn read_default(&self) -> T {
        match T::from_str(self.default) {
            Ok(v) => v,
            Err(_) => panic!("{}: invalid default value \"{}\"", self.env, self.default),
        }
    }

    /// Returns the value of the parameter.
    ///
    /// # Panic
    /// If the parameter cannot be parsed from its default value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.get_ref().clone()
    }

    /// Returns a reference to the value of the parameter, reading it on first access.
    /// An invalid value in the environment is reported and replaced by the default.
    pub fn get_ref(&self) -> &T {
        let read = || match std::env::var(self.env) {
            Ok(param) => match T::from_str(&param) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(
                        "Could not parse the value \"{param}\" of {}. Using default: \"{}\"",
                        self.env,
                        self.default
                    );
                    self.read_default()
                }
            },
            Err(std::env::VarError::NotPresent) => self.read_default(),
            Err(err) => {
                tracing::warn!("{}: {err}. Using default: \"{}\"", self.env, self.default);
                self.read_default()
            }
        };
        self.value.get_or_init(read)
    }

    /// Sets the parameter to the given value.
    ///
    /// # Panic
    /// If the parameter is already initialized, which typically means it was previously read.
    pub fn set(&self, value: T) {
        if self.value.set(value).is_err() {
            panic!("Parameter {} is already initialized (i.e. was previously accessed).", self.env);
        }
    }
}
