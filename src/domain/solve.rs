//! Top-level orchestration: build the solver context, run the assignment
//! solve (or adopt the document's own plan when only restrictions were
//! requested), derive and project restrictions, refine per-day max stays,
//! and classify avoided stays. Problems carrying candidate new reservations
//! are routed to the feasibility runner instead. Every recoverable failure
//! becomes `succeeded = false` with a human-readable message rather than an
//! error the caller has to unwrap.

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use crate::domain::context::{ContextOptions, SolverContext, StayIndex};
use crate::domain::date::DateOrd;
use crate::domain::feasibility_runner;
use crate::domain::final_restrictions::FinalRestrictions;
use crate::domain::initial_plan_solver;
use crate::domain::problem::Problem;
use crate::domain::restriction_solver::{self, CancellationToken, ReOptimizedPlan};
use crate::domain::restrictions;
use crate::domain::result::{self, AvoidedStay, PlanAssignment};
use crate::error::{Error, Result};

/// When the initial solve alone took longer than this, the per-day
/// re-optimization scan is skipped and the fixed-plan bounds are kept.
pub const PLAIN_REOPTIMIZE_THRESHOLD_SECS: f64 = 5.0;
/// Same policy for the Feasibility Runner, which already pays for two full
/// solves before any scan could start.
pub const FEASIBILITY_REOPTIMIZE_THRESHOLD_SECS: f64 = 0.1;

/// Which recoverable failure produced a `succeeded = false` outcome, so a
/// caller (the CLI) can map it to the right exit code without re-deriving it
/// from the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingInitialAssignment,
    ProvenInfeasible,
    NewReservationInfeasible,
    SolverTimeout,
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub problem_id: String,
    pub succeeded: bool,
    pub message: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub current_schedule_infeasible: bool,
    pub new_reservation_infeasible: bool,
    pub initial_optimization_time: f64,
    pub total_time: f64,
    pub schedule_start: DateOrd,
    pub schedule_end: DateOrd,
    pub rooms: Vec<String>,
    pub optimized_plan: Vec<PlanAssignment>,
    pub re_optimized_plans: Vec<ReOptimizedPlan>,
    pub closed_arrivals: Vec<DateOrd>,
    pub closed_departures: Vec<DateOrd>,
    pub min_stays: HashMap<DateOrd, i64>,
    pub max_stays: HashMap<DateOrd, i64>,
    pub non_adjacent_assignments: HashMap<String, Vec<String>>,
    pub stays_avoided_by_ca: HashMap<DateOrd, Vec<AvoidedStay>>,
    pub stays_avoided_by_cd: HashMap<DateOrd, Vec<AvoidedStay>>,
    pub stays_avoided_by_max: HashMap<DateOrd, Vec<AvoidedStay>>,
    pub initial_plan: Option<Vec<PlanAssignment>>,
    pub initial_min_stays: Option<HashMap<DateOrd, i64>>,
    pub quality_comparison: Option<HashMap<i64, (i64, i64)>>,
    pub room_change_comparison: Option<HashMap<String, (i64, i64)>>,
}

impl SolveOutcome {
    pub(crate) fn failed(problem: &Problem, message: String, kind: FailureKind, started: Instant) -> Self {
        let arrivals = problem.reservations.iter().chain(problem.new_reservations.iter());
        let schedule_start = arrivals.clone().map(|r| r.arrival).min().unwrap_or(DateOrd(0));
        let schedule_end = arrivals.map(|r| r.end()).max().unwrap_or(DateOrd(0));
        SolveOutcome {
            problem_id: problem.problem_id.clone(),
            succeeded: false,
            message: Some(message),
            failure_kind: Some(kind),
            current_schedule_infeasible: kind == FailureKind::ProvenInfeasible,
            new_reservation_infeasible: kind == FailureKind::NewReservationInfeasible,
            initial_optimization_time: started.elapsed().as_secs_f64(),
            total_time: started.elapsed().as_secs_f64(),
            schedule_start: problem.request_start_date.map_or(schedule_start, |rs| rs.min(schedule_start)),
            schedule_end: problem.request_end_date.map_or(schedule_end, |re| re.max(schedule_end)),
            rooms: problem.rooms.iter().map(|r| r.number.clone()).collect(),
            optimized_plan: Vec::new(),
            re_optimized_plans: Vec::new(),
            closed_arrivals: Vec::new(),
            closed_departures: Vec::new(),
            min_stays: HashMap::new(),
            max_stays: HashMap::new(),
            non_adjacent_assignments: HashMap::new(),
            stays_avoided_by_ca: HashMap::new(),
            stays_avoided_by_cd: HashMap::new(),
            stays_avoided_by_max: HashMap::new(),
            initial_plan: None,
            initial_min_stays: None,
            quality_comparison: None,
            room_change_comparison: None,
        }
    }
}

pub(crate) fn non_adjacent_names(ctx: &SolverContext, per_group: &HashMap<String, Vec<StayIndex>>) -> HashMap<String, Vec<String>> {
    per_group
        .iter()
        .map(|(group, stays)| (group.clone(), stays.iter().map(|&s| ctx.stays[s.index()].name.clone()).collect()))
        .collect()
}

pub fn run(problem: &Problem) -> Result<SolveOutcome> {
    run_cancellable(problem, &CancellationToken::default())
}

pub fn run_cancellable(problem: &Problem, cancel: &CancellationToken) -> Result<SolveOutcome> {
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    log::debug!("solve run {run_id} started for problem '{}'", problem.problem_id);

    if !problem.new_reservations.is_empty() && !problem.restrictions_for_initial_plan {
        return feasibility_runner::run(problem, cancel, started);
    }

    let mut ctx = SolverContext::build(problem, ContextOptions::default())?;

    let outcome = if problem.restrictions_for_initial_plan {
        if ctx.current_reservations_without_assigned_room > 0 {
            return Ok(SolveOutcome::failed(problem, ctx.exceptions.join("\n"), FailureKind::MissingInitialAssignment, started));
        }
        initial_plan_solver::fixed_plan_outcome(&ctx)
    } else {
        match initial_plan_solver::solve(&mut ctx) {
            Ok(o) => o,
            Err(Error::MissingInitialAssignment(msg)) => return Ok(SolveOutcome::failed(problem, msg, FailureKind::MissingInitialAssignment, started)),
            Err(Error::ProvenInfeasible) => return Ok(SolveOutcome::failed(problem, "Current schedule is provably infeasible".to_string(), FailureKind::ProvenInfeasible, started)),
            Err(Error::SolverTimeout) => return Ok(SolveOutcome::failed(problem, "Solver did not find a result within the time limit".to_string(), FailureKind::SolverTimeout, started)),
            Err(e) => return Err(e),
        }
    };

    let initial_optimization_time = started.elapsed().as_secs_f64();

    let initial_restrictions = restrictions::generate(&ctx, &outcome.assignments);
    let mut final_restrictions = FinalRestrictions::from_initial(&initial_restrictions);
    let reoptimize = initial_optimization_time < PLAIN_REOPTIMIZE_THRESHOLD_SECS;
    if !reoptimize {
        log::info!("initial solve took {initial_optimization_time:.2}s, skipping the per-day re-optimization scan");
    }
    let re_optimized_plans = restriction_solver::run(&mut ctx, &mut final_restrictions, reoptimize, &outcome.non_adjacent_per_group, cancel);
    final_restrictions.fill(&ctx);

    let (stays_avoided_by_ca, stays_avoided_by_cd, stays_avoided_by_max) = result::get_avoided_stays(&ctx, &final_restrictions);

    let optimized_plan = result::coalesce_assignments(&ctx, &outcome.assignments).unwrap_or_default();
    let non_adjacent_assignments = non_adjacent_names(&ctx, &outcome.non_adjacent_per_group);

    let mut closed_arrivals: Vec<DateOrd> = final_restrictions.closed_arrival.keys().copied().collect();
    let mut closed_departures: Vec<DateOrd> = final_restrictions.closed_departure.keys().copied().collect();
    closed_arrivals.sort();
    closed_departures.sort();

    log::debug!("solve run {run_id} finished: {} assignment(s), {} re-optimized plan(s)", optimized_plan.len(), re_optimized_plans.len());

    Ok(SolveOutcome {
        problem_id: problem.problem_id.clone(),
        succeeded: true,
        message: None,
        failure_kind: None,
        current_schedule_infeasible: false,
        new_reservation_infeasible: false,
        initial_optimization_time,
        total_time: started.elapsed().as_secs_f64(),
        schedule_start: ctx.schedule_start,
        schedule_end: ctx.schedule_end,
        rooms: ctx.room_numbers.clone(),
        optimized_plan,
        re_optimized_plans,
        closed_arrivals,
        closed_departures,
        min_stays: final_restrictions.min_stay_covering_day.clone(),
        max_stays: final_restrictions.max_stay_covering_day.clone(),
        non_adjacent_assignments,
        stays_avoided_by_ca,
        stays_avoided_by_cd,
        stays_avoided_by_max,
        initial_plan: None,
        initial_min_stays: None,
        quality_comparison: None,
        room_change_comparison: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ProblemDto, ReservationDto, RoomDto};
    use std::collections::HashMap as Map;

    fn dto(name: &str, arrival: &str, length: i64) -> ReservationDto {
        ReservationDto {
            name: name.to_string(),
            id: None,
            arrival: arrival.to_string(),
            length,
            adjacency_group: None,
            is_locked: false,
            assigned_room: None,
            room_type: None,
            allowable_room_types: vec![],
            type_order: vec![],
            split_group: None,
        }
    }

    fn problem_dto(reservations: Vec<ReservationDto>, rooms: usize) -> ProblemDto {
        ProblemDto {
            problem_id: "P1".to_string(),
            reservations,
            rooms: (0..rooms).map(|i| RoomDto { room_number: format!("10{i}"), room_type: None, adjacent_rooms: vec![] }).collect(),
            new_reservations: vec![],
            minimum_stay: Some(1),
            minimum_stay_by_day: Map::new(),
            minimum_stay_by_date: vec![],
            request_start_date: None,
            request_end_date: None,
            restrictions_for_initial_plan: false,
            test_new_booking: false,
        }
    }

    #[test]
    fn succeeds_and_fills_optimized_plan_for_a_simple_problem() {
        let problem = Problem::from_dto(problem_dto(vec![dto("A", "2026-01-01", 3), dto("B", "2026-01-02", 2)], 2)).unwrap();
        let outcome = run(&problem).unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.optimized_plan.len(), 2);
        assert!(outcome.total_time >= outcome.initial_optimization_time);
    }

    #[test]
    fn restrictions_for_initial_plan_adopts_the_documents_own_assignments() {
        let mut a = dto("A", "2026-01-01", 3);
        a.assigned_room = Some("100".to_string());
        let mut b = dto("B", "2026-01-02", 2);
        b.assigned_room = Some("101".to_string());
        let mut pd = problem_dto(vec![a, b], 2);
        pd.restrictions_for_initial_plan = true;
        let problem = Problem::from_dto(pd).unwrap();
        let outcome = run(&problem).unwrap();
        assert!(outcome.succeeded);
        let room_of = |name: &str| outcome.optimized_plan.iter().find(|p| p.name == name).unwrap().room.clone();
        assert_eq!(room_of("A"), "100");
        assert_eq!(room_of("B"), "101");
    }

    #[test]
    fn restrictions_for_initial_plan_without_rooms_fails_cleanly() {
        let mut pd = problem_dto(vec![dto("A", "2026-01-01", 3)], 1);
        pd.restrictions_for_initial_plan = true;
        let problem = Problem::from_dto(pd).unwrap();
        let outcome = run(&problem).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure_kind, Some(FailureKind::MissingInitialAssignment));
        assert!(outcome.message.is_some());
    }
}
