//! Iterative deepening over the plan length.

use crate::encode::{Encoder, Parallelism, Timestep};
use crate::model::{ActionId, Problem};
use crate::params;
use crate::plan::{convert_to_plan, extract_actions, validate, Plan};
use crate::smt::{Expr, SatResult, Solver};
use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub parallelism: Parallelism,
    /// Extend a single solver instance rather than re-encoding from scratch for each horizon.
    pub incremental: bool,
    /// Largest horizon to try, unbounded if `None`.
    pub max_length: Option<Timestep>,
    /// Keep ForAll plans as partial orders.
    pub keep_sets: bool,
    /// Canonical order of actions. Defaults to the order of the problem.
    pub ordering: Option<Vec<ActionId>>,
    /// Time limit of the whole search, unbounded if `None`.
    pub timeout: Option<Duration>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            parallelism: params::PARALLELISM.get(),
            incremental: params::INCREMENTAL.get(),
            max_length: Timestep::try_from(params::MAX_LENGTH.get()).ok(),
            keep_sets: params::KEEP_SETS.get(),
            ordering: None,
            // negative for no limit
            timeout: Duration::try_from_secs_f64(params::TIMEOUT.get()).ok(),
        }
    }
}

/// Size of the encoding and solving time for one horizon.
#[derive(Clone, Debug)]
pub struct StepStats {
    pub horizon: Timestep,
    pub variables: usize,
    /// Constraints of the encoding up to this horizon.
    pub constraints: usize,
    /// Mutual exclusions among those constraints.
    pub mutexes: usize,
    pub encoding_time: Duration,
    pub solving_time: Duration,
    pub sat: bool,
}

#[derive(Clone, Debug)]
pub enum PlanningOutcome {
    Solved {
        plan: Plan,
        horizon: Timestep,
        stats: Vec<StepStats>,
    },
    /// No plan exists up to the maximal length.
    LengthExhausted { stats: Vec<StepStats> },
    /// The time limit was reached before finding a plan.
    Timeout { stats: Vec<StepStats> },
}

impl PlanningOutcome {
    /// Statistics of every horizon that was tried.
    pub fn stats(&self) -> &[StepStats] {
        match self {
            PlanningOutcome::Solved { stats, .. }
            | PlanningOutcome::LengthExhausted { stats }
            | PlanningOutcome::Timeout { stats } => stats,
        }
    }
}

/// Statistics as CSV, with a header line and one line per horizon. Times are in seconds.
pub fn format_stats(stats: &[StepStats]) -> String {
    let mut out = String::from("horizon,variables,constraints,mutexes,encoding_time,solving_time,sat\n");
    for s in stats {
        out.push_str(&format!(
            "{},{},{},{},{:.6},{:.6},{}\n",
            s.horizon,
            s.variables,
            s.constraints,
            s.mutexes,
            s.encoding_time.as_secs_f64(),
            s.solving_time.as_secs_f64(),
            s.sat
        ));
    }
    out
}

pub struct Planner<'a> {
    problem: &'a Problem,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(problem: &'a Problem, config: PlannerConfig) -> Self {
        Planner { problem, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn encoder(&self) -> Result<Encoder<'a>> {
        Ok(match &self.config.ordering {
            None => Encoder::new(self.problem, self.config.parallelism),
            Some(ordering) => Encoder::with_ordering(self.problem, self.config.parallelism, ordering.clone())?,
        })
    }

    /// Searches for a plan of increasing length, starting from the empty plan.
    ///
    /// The first plan found is validated by simulation before being returned.
    /// With a timeout, no new horizon is started after the deadline and a running check is
    /// interrupted if the solver supports it.
    pub fn solve<S: Solver>(&self, solver: &mut S) -> Result<PlanningOutcome> {
        let deadline = self.config.timeout.and_then(|t| Instant::now().checked_add(t));
        solver.set_deadline(deadline);
        let encoder = self.encoder()?;
        let mut stats: Vec<StepStats> = Vec::new();
        let mut constraints = 0;
        let mut mutexes = 0;

        if self.config.incremental {
            solver.reset()?;
            let init = encoder.initial_state();
            constraints += init.len();
            solver.assert_all(&init)?;
        }

        let mut horizon: Timestep = 0;
        loop {
            if self.config.max_length.is_some_and(|max| horizon > max) {
                return Ok(PlanningOutcome::LengthExhausted { stats });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::debug!("deadline reached before horizon {horizon}");
                return Ok(PlanningOutcome::Timeout { stats });
            }
            let start = Instant::now();
            let (result, encoding_time) = if self.config.incremental {
                if horizon > 0 {
                    let step = encoder.step(horizon - 1);
                    tracing::debug!(
                        "step {}: {} constraints, {} mutexes",
                        horizon - 1,
                        step.len(),
                        step.mutexes
                    );
                    constraints += step.len();
                    mutexes += step.mutexes;
                    solver.assert_all(&step.constraints)?;
                }
                solver.assert(&encoder.activated_goal(horizon))?;
                let encoding_time = start.elapsed();
                let activation = encoder.goal_activation(horizon);
                let result = solver.check(std::slice::from_ref(&activation))?;
                if result == SatResult::Unsat {
                    // the goal literal of this horizon will never be assumed again
                    solver.assert(&Expr::not(Expr::var(activation)))?;
                }
                (result, encoding_time)
            } else {
                solver.reset()?;
                let init = encoder.initial_state();
                constraints = init.len() + 1;
                mutexes = 0;
                solver.assert_all(&init)?;
                for t in 0..horizon {
                    let step = encoder.step(t);
                    tracing::debug!("step {t}: {} constraints, {} mutexes", step.len(), step.mutexes);
                    constraints += step.len();
                    mutexes += step.mutexes;
                    solver.assert_all(&step.constraints)?;
                }
                solver.assert(&encoder.goal(horizon))?;
                let encoding_time = start.elapsed();
                (solver.check(&[])?, encoding_time)
            };
            if self.config.incremental {
                constraints += 1;
            }
            let step_stats = StepStats {
                horizon,
                variables: encoder.num_variables(horizon),
                constraints,
                mutexes,
                encoding_time,
                solving_time: start.elapsed() - encoding_time,
                sat: result.is_sat(),
            };
            tracing::info!(
                "horizon {horizon}: {} variables, {} constraints ({} mutexes), encoded in {:?}, solved in {:?}: {}",
                step_stats.variables,
                step_stats.constraints,
                step_stats.mutexes,
                step_stats.encoding_time,
                step_stats.solving_time,
                match &result {
                    SatResult::Sat(_) => "sat",
                    SatResult::Unsat => "unsat",
                    SatResult::Unknown(_) => "unknown",
                    SatResult::Timeout => "timeout",
                }
            );
            stats.push(step_stats);

            match result {
                SatResult::Sat(model) => {
                    let steps = extract_actions(&model, self.problem, horizon, self.config.parallelism)?;
                    let plan = convert_to_plan(&steps, self.config.keep_sets, self.config.parallelism, encoder.ordering());
                    validate(self.problem, &plan.to_sequential(encoder.ordering()))
                        .with_context(|| format!("Invalid plan found at horizon {horizon}"))?;
                    return Ok(PlanningOutcome::Solved { plan, horizon, stats });
                }
                SatResult::Unsat => horizon += 1,
                SatResult::Unknown(reason) => bail!("The solver could not decide horizon {horizon}: {reason}"),
                SatResult::Timeout => return Ok(PlanningOutcome::Timeout { stats }),
            }
        }
    }
}
