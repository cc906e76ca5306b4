use anyhow::{Context, Result};
use clap::Parser;
use smtplan::encode::Parallelism;
use smtplan::params;
use smtplan::parsing::parse_problem_file;
use smtplan::plan::format_plan;
use smtplan::planner::{format_stats, Planner, PlannerConfig, PlanningOutcome};
use smtplan::smt::SmtLibProcess;
use std::path::PathBuf;
use std::time::Duration;

/// A planner for grounded numeric problems, based on an external SMT solver.
#[derive(Debug, Clone, Parser)]
#[command(name = "smtplan", rename_all = "kebab-case")]
pub struct Opt {
    /// Path to the problem file.
    problem: PathBuf,

    /// If set, the plan will be written to this file.
    #[arg(long = "output", short = 'o')]
    plan_out_file: Option<PathBuf>,

    /// If set, statistics of each horizon will be written to this file as CSV.
    #[arg(long = "stats-output")]
    stats_out_file: Option<PathBuf>,

    /// Which actions may occur in the same step.
    /// Possible values: "sequential", "ForAll", "ThereExists", "relaxed_relaxed_ThereExists".
    #[arg(long, short = 'p')]
    parallelism: Option<Parallelism>,

    /// Maximal plan length (number of steps) to consider.
    #[arg(long)]
    max_length: Option<u32>,

    /// Time limit of the search, in seconds.
    #[arg(long)]
    timeout: Option<f64>,

    /// Command line of the SMT solver, e.g. "z3 -in -smt2" or "cvc5 --incremental".
    #[arg(long)]
    solver: Option<String>,

    /// Re-encode the whole problem for each horizon instead of extending the solver's assertions.
    #[arg(long)]
    reset_solver: bool,

    /// Print ForAll plans as partial orders.
    #[arg(long)]
    keep_sets: bool,

    /// Logging level to use: one of "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(std::time::Instant::now()))
        .with_max_level(opt.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let problem = parse_problem_file(&opt.problem)?;
    tracing::info!(
        "problem {}: {} fluents, {} actions, {} goals",
        problem.name(),
        problem.num_fluents(),
        problem.num_actions(),
        problem.goals().len()
    );

    let mut config = PlannerConfig::default();
    if let Some(parallelism) = opt.parallelism {
        config.parallelism = parallelism;
    }
    if let Some(max_length) = opt.max_length {
        config.max_length = Some(max_length);
    }
    if let Some(timeout) = opt.timeout {
        let timeout = Duration::try_from_secs_f64(timeout).with_context(|| format!("Invalid timeout: {timeout}"))?;
        config.timeout = Some(timeout);
    }
    config.incremental &= !opt.reset_solver;
    config.keep_sets |= opt.keep_sets;

    let command = opt.solver.unwrap_or_else(|| params::SOLVER_COMMAND.get());
    let mut solver = SmtLibProcess::spawn(&command)?;
    tracing::info!("solving with `{}` ({} semantics)", solver.command(), config.parallelism);

    let planner = Planner::new(&problem, config);
    let outcome = planner.solve(&mut solver)?;
    if let Some(stats_out_file) = &opt.stats_out_file {
        std::fs::write(stats_out_file, format_stats(outcome.stats()))
            .with_context(|| format!("Could not write the statistics to {}", stats_out_file.display()))?;
    }
    match outcome {
        PlanningOutcome::Solved { plan, horizon, stats } => {
            let solving_time: Duration = stats.iter().map(|s| s.solving_time).sum();
            tracing::info!(
                "plan of {} actions found at horizon {horizon}, {:?} spent in the solver",
                plan.len(),
                solving_time
            );
            let plan_out = format_plan(&problem, &plan);
            println!("\n{plan_out}");
            if let Some(plan_out_file) = &opt.plan_out_file {
                std::fs::write(plan_out_file, plan_out)
                    .with_context(|| format!("Could not write the plan to {}", plan_out_file.display()))?;
            }
        }
        PlanningOutcome::LengthExhausted { stats } => {
            println!("\nNo plan found (up to length {})", stats.len().saturating_sub(1));
        }
        PlanningOutcome::Timeout { stats } => {
            println!("\nTimeout after {} horizons", stats.len());
        }
    }
    Ok(())
}
