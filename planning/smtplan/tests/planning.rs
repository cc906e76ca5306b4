mod common;

use common::*;
use smtplan::encode::{ActionOccurrence, Parallelism};
use smtplan::model::Problem;
use smtplan::plan::{format_plan, validate, Plan, SequentialPlan};
use smtplan::planner::{format_stats, Planner, PlannerConfig, PlanningOutcome, StepStats};
use smtplan::smt::Solver;
use std::time::Duration;

fn config(parallelism: Parallelism) -> PlannerConfig {
    PlannerConfig {
        parallelism,
        incremental: true,
        max_length: Some(5),
        keep_sets: false,
        ordering: None,
        timeout: None,
    }
}

fn solve(problem: &Problem, config: PlannerConfig) -> (Plan, u32) {
    let mut solver = BacktrackingSolver::new();
    match Planner::new(problem, config).solve(&mut solver).unwrap() {
        PlanningOutcome::Solved { plan, horizon, .. } => (plan, horizon),
        PlanningOutcome::LengthExhausted { .. } | PlanningOutcome::Timeout { .. } => {
            panic!("no plan found for {}", problem.name())
        }
    }
}

fn names(problem: &Problem, plan: &SequentialPlan) -> Vec<String> {
    plan.iter().map(|a| problem.action(a).name().to_string()).collect()
}

#[test]
fn pickup_plan() {
    let problem = pickup();
    for parallelism in [
        Parallelism::Sequential,
        Parallelism::ForAll,
        Parallelism::ThereExists,
        Parallelism::RelaxedRelaxedThereExists,
    ] {
        let (plan, horizon) = solve(&problem, config(parallelism));
        assert_eq!(horizon, 1);
        let plan = plan.to_sequential(&[]);
        assert_eq!(names(&problem, &plan), vec!["pickup"]);
        assert_eq!(format_plan(&problem, &Plan::Sequential(plan)), "0: pickup\n");
    }
}

#[test]
fn door_plans() {
    let problem = door();
    let (plan, horizon) = solve(&problem, config(Parallelism::Sequential));
    assert_eq!(horizon, 2);
    assert_eq!(names(&problem, &plan.to_sequential(&[])), vec!["unlock", "open"]);

    // both actions in a single step, the door being opened right after being unlocked
    let (plan, horizon) = solve(&problem, config(Parallelism::RelaxedRelaxedThereExists));
    assert_eq!(horizon, 1);
    let plan = plan.to_sequential(&[action(&problem, "unlock"), action(&problem, "open")]);
    assert_eq!(names(&problem, &plan), vec!["unlock", "open"]);
}

#[test]
fn copied_value_is_read_before_being_cleared() {
    let problem = copy_then_clear();
    for parallelism in [
        Parallelism::Sequential,
        Parallelism::ForAll,
        Parallelism::ThereExists,
        Parallelism::RelaxedRelaxedThereExists,
    ] {
        let (plan, horizon) = solve(&problem, config(parallelism));
        assert_eq!(horizon, 2, "{parallelism:?}");
        let plan = plan.to_sequential(&[]);
        assert_eq!(names(&problem, &plan), vec!["copy", "clear"]);
        validate(&problem, &plan).unwrap();
    }
}

#[test]
fn reversed_ordering_forbids_chaining() {
    let problem = door();
    let ordering = vec![action(&problem, "open"), action(&problem, "unlock")];
    let reversed = PlannerConfig {
        ordering: Some(ordering),
        ..config(Parallelism::RelaxedRelaxedThereExists)
    };
    let (plan, horizon) = solve(&problem, reversed);
    assert_eq!(horizon, 2);
    assert_eq!(plan.len(), 2);
}

#[test]
fn invalid_ordering() {
    let problem = door();
    let truncated = PlannerConfig {
        ordering: Some(vec![action(&problem, "open")]),
        ..config(Parallelism::ThereExists)
    };
    let mut solver = BacktrackingSolver::new();
    assert!(Planner::new(&problem, truncated).solve(&mut solver).is_err());
}

#[test]
fn partial_order_plans() {
    let problem = moves();
    let move_ab = action(&problem, "move-a-b");
    let move_cd = action(&problem, "move-c-d");
    let forall_config = PlannerConfig {
        keep_sets: true,
        ..config(Parallelism::ForAll)
    };
    let (plan, horizon) = solve(&problem, forall_config);
    assert_eq!(horizon, 1);
    let Plan::PartialOrder(po) = &plan else {
        panic!("expected a partial order plan");
    };
    let ab = ActionOccurrence::new(move_ab, 0);
    let cd = ActionOccurrence::new(move_cd, 0);
    assert_eq!(po.len(), 2);
    assert!(!po.precedes(ab, cd));
    assert!(!po.precedes(cd, ab));
    assert_eq!(plan.to_sequential(&[move_cd, move_ab]).actions, vec![move_cd, move_ab]);

    // sets are only kept under the ForAll semantics
    let exists_config = PlannerConfig {
        keep_sets: true,
        ..config(Parallelism::ThereExists)
    };
    let (plan, _) = solve(&problem, exists_config);
    assert!(matches!(plan, Plan::Sequential(_)));
}

#[test]
fn unreachable_goal() {
    let problem = unreachable();
    for incremental in [true, false] {
        let bounded = PlannerConfig {
            incremental,
            max_length: Some(3),
            ..config(Parallelism::ForAll)
        };
        let mut solver = BacktrackingSolver::new();
        match Planner::new(&problem, bounded).solve(&mut solver).unwrap() {
            PlanningOutcome::LengthExhausted { stats } => {
                assert_eq!(stats.iter().map(|s| s.horizon).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
                assert!(stats.iter().all(|s| !s.sat));
                assert!(stats.windows(2).all(|w| w[0].constraints < w[1].constraints));
                assert!(stats.windows(2).all(|w| w[0].variables < w[1].variables));
            }
            outcome => panic!("unexpected outcome: {outcome:?}"),
        }
    }
}

#[test]
fn expired_time_limit() {
    let problem = door();
    for incremental in [true, false] {
        let expired = PlannerConfig {
            incremental,
            timeout: Some(Duration::ZERO),
            ..config(Parallelism::ForAll)
        };
        let mut solver = BacktrackingSolver::new();
        let outcome = Planner::new(&problem, expired).solve(&mut solver).unwrap();
        assert!(matches!(outcome, PlanningOutcome::Timeout { .. }));
        assert!(outcome.stats().is_empty());
    }

    // a generous limit does not prevent finding the plan
    let bounded = PlannerConfig {
        timeout: Some(Duration::from_secs(3600)),
        ..config(Parallelism::Sequential)
    };
    let (_, horizon) = solve(&problem, bounded);
    assert_eq!(horizon, 2);
}

#[test]
fn stats_as_csv() {
    let stats = |horizon: u32, sat: bool| StepStats {
        horizon,
        variables: 4 * (horizon as usize + 1),
        constraints: 10,
        mutexes: 2,
        encoding_time: Duration::from_millis(1500),
        solving_time: Duration::from_micros(250),
        sat,
    };
    assert_eq!(
        format_stats(&[stats(0, false), stats(1, true)]),
        "horizon,variables,constraints,mutexes,encoding_time,solving_time,sat\n\
         0,4,10,2,1.500000,0.000250,false\n\
         1,8,10,2,1.500000,0.000250,true\n"
    );

    let mut solver = BacktrackingSolver::new();
    let outcome = Planner::new(&door(), config(Parallelism::Sequential))
        .solve(&mut solver)
        .unwrap();
    let csv = format_stats(outcome.stats());
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.lines().skip(1).map(|l| l.ends_with("true")).eq([false, false, true]));
}

#[test]
fn incremental_and_reset_agree() {
    let problem = door();
    for parallelism in [Parallelism::Sequential, Parallelism::ForAll] {
        let mut incremental = BacktrackingSolver::new();
        let mut reset = BacktrackingSolver::new();
        let a = Planner::new(&problem, config(parallelism)).solve(&mut incremental).unwrap();
        let b = Planner::new(
            &problem,
            PlannerConfig {
                incremental: false,
                ..config(parallelism)
            },
        )
        .solve(&mut reset)
        .unwrap();
        let (
            PlanningOutcome::Solved {
                plan: pa, horizon: ha, ..
            },
            PlanningOutcome::Solved {
                plan: pb, horizon: hb, ..
            },
        ) = (a, b)
        else {
            panic!("both modes should find a plan");
        };
        assert_eq!(ha, hb);
        assert_eq!(pa.len(), pb.len());
        // failed horizons leave a negated goal literal in the incremental solver
        assert!(incremental.num_assertions() > reset.num_assertions());
        validate(&problem, &pa.to_sequential(&[])).unwrap();
    }
}
