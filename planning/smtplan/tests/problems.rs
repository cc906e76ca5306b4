//! Solves each problem of the `problems` folder.
//!
//! Each `.smtp` problem comes with an `.expected` file giving, for each semantics, the horizon
//! of the first plan found, or `none` if there is no plan of length 4 or less.

mod common;

use common::BacktrackingSolver;
use smtplan::encode::Parallelism;
use smtplan::parsing::parse_problem;
use smtplan::planner::{Planner, PlannerConfig, PlanningOutcome};
use test_each_file::test_each_file;

test_each_file! { for ["smtp", "expected"] in "./planning/smtplan/tests/problems" => test }

fn test([input, expected]: [&str; 2]) {
    let problem = parse_problem(input).unwrap();
    for line in expected.lines().filter(|l| !l.trim().is_empty()) {
        let (semantics, horizon) = line.split_once(' ').unwrap();
        let parallelism: Parallelism = semantics.parse().unwrap();
        let expected = match horizon.trim() {
            "none" => None,
            h => Some(h.parse::<u32>().unwrap()),
        };
        for incremental in [true, false] {
            let config = PlannerConfig {
                parallelism,
                incremental,
                max_length: Some(4),
                keep_sets: false,
                ordering: None,
                timeout: None,
            };
            let mut solver = BacktrackingSolver::new();
            let outcome = Planner::new(&problem, config).solve(&mut solver).unwrap();
            let found = match outcome {
                PlanningOutcome::Solved { horizon, stats, .. } => {
                    assert_eq!(stats.len(), horizon as usize + 1);
                    Some(horizon)
                }
                PlanningOutcome::LengthExhausted { stats } => {
                    assert_eq!(stats.len(), 5);
                    None
                }
                PlanningOutcome::Timeout { .. } => panic!("no time limit was set"),
            };
            assert_eq!(
                found,
                expected,
                "{} with {parallelism} semantics (incremental: {incremental})",
                problem.name()
            );
        }
    }
}
