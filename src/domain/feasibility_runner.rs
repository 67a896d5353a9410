//! Feasibility runner for candidate new reservations. Each candidate's whole
//! length is first checked against the absolute max stay the *existing*
//! bookings alone allow on its arrival day (a closed-form pass, no MIP).
//! Survivors are split into one-night fragments and the assignment MIP runs
//! twice, once with the existing bookings pinned to their current rooms (so
//! the new fragments have to fit around them as-is) and once fully free, so
//! a caller can compare "slot the new guest in without disturbing anyone"
//! against "re-optimize everyone". The free plan is the one the result
//! reports as optimized; the pinned plan and its min-stay projection ride
//! along for the quality comparison.

use std::time::Instant;

use crate::domain::context::{ContextOptions, SolverContext};
use crate::domain::date::DateOrd;
use crate::domain::final_restrictions::FinalRestrictions;
use crate::domain::initial_plan_solver::{self, InitialPlanOutcome};
use crate::domain::problem::Problem;
use crate::domain::reservation::Reservation;
use crate::domain::restriction_solver::{self, CancellationToken};
use crate::domain::restrictions;
use crate::domain::result::{self, PlanAssignment};
use crate::domain::solve::{self, FailureKind, SolveOutcome, FEASIBILITY_REOPTIMIZE_THRESHOLD_SECS};
use crate::error::{Error, Result};

pub fn run(problem: &Problem, cancel: &CancellationToken, started: Instant) -> Result<SolveOutcome> {
    let base_ctx = SolverContext::build(problem, ContextOptions::default())?;
    if base_ctx.current_reservations_without_assigned_room > 0 {
        return Ok(SolveOutcome::failed(problem, base_ctx.exceptions.join("\n"), FailureKind::MissingInitialAssignment, started));
    }

    // A candidate longer than what the existing bookings can ever seat on
    // its arrival day is hopeless, whatever the solver does.
    let baseline = restrictions::absolute_max_ignoring_test(&base_ctx);
    let mut messages = Vec::new();
    for r in &problem.new_reservations {
        let absolute_max = baseline.absolute_max_stay_starting_on_day.get(&r.arrival).copied().unwrap_or(0);
        if r.length > absolute_max {
            messages.push(format!("Stay length {} on date {} conflicts with fully booked days.", r.length, r.arrival.to_iso()));
        }
    }
    if !messages.is_empty() {
        return Ok(SolveOutcome::failed(problem, messages.join("\n"), FailureKind::NewReservationInfeasible, started));
    }

    let mut fragmented = problem.clone();
    fragmented.new_reservations = split_into_one_night_fragments(problem);

    // Variant A: pin every existing booking to its current room and let the
    // solver place only the new fragments. Only attempted when every
    // existing booking actually has a valid room; its infeasibility is a
    // finding, not a failure.
    let mut pinned_ctx = SolverContext::build(&fragmented, ContextOptions { with_additional_room_types: true, fit_new_reservation_in_initial_plan: true })?;
    let pinned_outcome: Option<InitialPlanOutcome> = if pinned_ctx.current_reservations_without_assigned_room > 0 {
        None
    } else {
        match initial_plan_solver::solve(&mut pinned_ctx) {
            Ok(o) => Some(o),
            Err(Error::ProvenInfeasible) | Err(Error::SolverTimeout) | Err(Error::MissingInitialAssignment(_)) => None,
            Err(e) => return Err(e),
        }
    };
    let initial_optimization_time = started.elapsed().as_secs_f64();

    // Variant B: full freedom. This is the plan the result reports; its
    // failure means the new booking genuinely does not fit.
    let mut free_ctx = SolverContext::build(&fragmented, ContextOptions { with_additional_room_types: true, fit_new_reservation_in_initial_plan: false })?;
    let free_started = Instant::now();
    let free_outcome = match initial_plan_solver::solve(&mut free_ctx) {
        Ok(o) => o,
        Err(Error::ProvenInfeasible) => {
            return Ok(SolveOutcome::failed(problem, "Schedule is infeasible with the new booking included".to_string(), FailureKind::NewReservationInfeasible, started));
        }
        Err(Error::SolverTimeout) => {
            return Ok(SolveOutcome::failed(problem, "Solver did not find a result within the time limit".to_string(), FailureKind::SolverTimeout, started));
        }
        Err(Error::MissingInitialAssignment(msg)) => {
            return Ok(SolveOutcome::failed(problem, msg, FailureKind::MissingInitialAssignment, started));
        }
        Err(e) => return Err(e),
    };
    let free_solve_time = free_started.elapsed().as_secs_f64();

    let optimized_plan = result::coalesce_assignments(&free_ctx, &free_outcome.assignments).unwrap_or_default();
    let initial_plan: Option<Vec<PlanAssignment>> = pinned_outcome.as_ref().and_then(|o| result::coalesce_assignments(&pinned_ctx, &o.assignments));

    let free_restrictions = restrictions::generate(&free_ctx, &free_outcome.assignments);
    let mut final_restrictions = FinalRestrictions::from_initial(&free_restrictions);
    let reoptimize = free_solve_time < FEASIBILITY_REOPTIMIZE_THRESHOLD_SECS && !problem.test_new_booking;
    let re_optimized_plans = restriction_solver::run(&mut free_ctx, &mut final_restrictions, reoptimize, &free_outcome.non_adjacent_per_group, cancel);
    final_restrictions.fill(&free_ctx);

    // The "initial" side of the quality comparison: the pinned plan when it
    // exists, otherwise the existing bookings sitting in their current rooms
    // without the new booking at all.
    let (initial_min_stays, initial_fully_booked) = match (&pinned_outcome, &initial_plan) {
        (Some(o), Some(_)) => {
            let r = restrictions::generate(&pinned_ctx, &o.assignments);
            let mut f = FinalRestrictions::from_initial(&r);
            f.fill(&pinned_ctx);
            (Some(f.min_stay_covering_day), r.fully_booked_days)
        }
        _ => {
            let mut existing = problem.clone();
            existing.new_reservations.clear();
            let existing_ctx = SolverContext::build(&existing, ContextOptions::default())?;
            let fixed = initial_plan_solver::fixed_plan_outcome(&existing_ctx);
            if fixed.assignments.len() == existing_ctx.real_stay_count {
                let r = restrictions::generate(&existing_ctx, &fixed.assignments);
                let mut f = FinalRestrictions::from_initial(&r);
                f.fill(&existing_ctx);
                (Some(f.min_stay_covering_day), r.fully_booked_days)
            } else {
                (None, Vec::new())
            }
        }
    };

    let quality_comparison = initial_min_stays
        .as_ref()
        .map(|initial| result::quality_comparison(problem.minimum_stay, initial, &final_restrictions.min_stay_covering_day, &initial_fully_booked));
    let room_change_comparison = result::room_change_comparison(&problem.new_reservations, initial_plan.as_deref(), &optimized_plan);

    let (stays_avoided_by_ca, stays_avoided_by_cd, stays_avoided_by_max) = result::get_avoided_stays(&free_ctx, &final_restrictions);
    let non_adjacent_assignments = solve::non_adjacent_names(&free_ctx, &free_outcome.non_adjacent_per_group);

    let mut closed_arrivals: Vec<DateOrd> = final_restrictions.closed_arrival.keys().copied().collect();
    let mut closed_departures: Vec<DateOrd> = final_restrictions.closed_departure.keys().copied().collect();
    closed_arrivals.sort();
    closed_departures.sort();

    Ok(SolveOutcome {
        problem_id: problem.problem_id.clone(),
        succeeded: true,
        message: None,
        failure_kind: None,
        current_schedule_infeasible: false,
        new_reservation_infeasible: false,
        initial_optimization_time,
        total_time: started.elapsed().as_secs_f64(),
        schedule_start: free_ctx.schedule_start,
        schedule_end: free_ctx.schedule_end,
        rooms: free_ctx.room_numbers.clone(),
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
        initial_plan,
        initial_min_stays,
        quality_comparison,
        room_change_comparison: Some(room_change_comparison),
    })
}

/// Every candidate becomes `length` one-night `Reservation`s sharing a fresh
/// `split_group` id, each still flagged `test`. Fresh ids start past any id
/// already present in the document so an input split group is never silently
/// merged with a new one.
fn split_into_one_night_fragments(problem: &Problem) -> Vec<Reservation> {
    let mut next_group = problem
        .reservations
        .iter()
        .chain(problem.new_reservations.iter())
        .filter_map(|r| r.split_group)
        .max()
        .map(|m| m + 1)
        .unwrap_or(1);

    let mut fragments = Vec::new();
    for r in &problem.new_reservations {
        let group = next_group;
        next_group += 1;
        let mut night = r.arrival;
        for _ in 0..r.length {
            fragments.push(Reservation {
                name: r.name.clone(),
                id: r.id.clone(),
                arrival: night,
                length: 1,
                room_type: r.room_type.clone(),
                requested_allowable_types: r.requested_allowable_types.clone(),
                type_order: r.type_order.clone(),
                adj_group: r.adj_group.clone(),
                locked: r.locked,
                assigned_room: r.assigned_room.clone(),
                test: true,
                split_group: Some(group),
            });
            night = night.add(1);
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ProblemDto, ReservationDto, RoomDto};
    use std::collections::HashMap as Map;

    fn dto(name: &str, arrival: &str, length: i64, assigned: Option<&str>) -> ReservationDto {
        ReservationDto {
            name: name.to_string(),
            id: None,
            arrival: arrival.to_string(),
            length,
            adjacency_group: None,
            is_locked: false,
            assigned_room: assigned.map(str::to_string),
            room_type: None,
            allowable_room_types: vec![],
            type_order: vec![],
            split_group: None,
        }
    }

    fn problem(existing: Vec<ReservationDto>, new: Vec<ReservationDto>, rooms: usize) -> Problem {
        let rooms = (0..rooms).map(|i| RoomDto { room_number: format!("10{i}"), room_type: None, adjacent_rooms: vec![] }).collect();
        Problem::from_dto(ProblemDto {
            problem_id: "P".to_string(),
            reservations: existing,
            rooms,
            new_reservations: new,
            minimum_stay: Some(1),
            minimum_stay_by_day: Map::new(),
            minimum_stay_by_date: vec![],
            request_start_date: None,
            request_end_date: None,
            restrictions_for_initial_plan: false,
            test_new_booking: false,
        })
        .unwrap()
    }

    fn run_now(p: &Problem) -> SolveOutcome {
        run(p, &CancellationToken::default(), Instant::now()).unwrap()
    }

    #[test]
    fn new_reservation_fits_around_existing_bookings_when_a_room_is_free() {
        let p = problem(vec![dto("A", "2026-01-01", 3, Some("100"))], vec![dto("Newcomer", "2026-01-01", 2, None)], 2);
        let outcome = run_now(&p);
        assert!(outcome.succeeded);
        assert!(outcome.optimized_plan.iter().any(|a| a.test));
        assert!(outcome.initial_plan.is_some());
    }

    #[test]
    fn new_reservation_crossing_a_fully_booked_day_is_rejected_by_the_precheck() {
        // Both rooms are taken from 01-04, so a 3-night stay arriving 01-03
        // can never be seated no matter how the plan is rearranged.
        let p = problem(
            vec![dto("A", "2026-01-04", 3, Some("100")), dto("B", "2026-01-04", 3, Some("101"))],
            vec![dto("Newcomer", "2026-01-03", 3, None)],
            2,
        );
        let outcome = run_now(&p);
        assert!(!outcome.succeeded);
        assert!(outcome.new_reservation_infeasible);
        assert!(outcome.message.unwrap().contains("fully booked"));
    }

    #[test]
    fn fragments_share_one_split_group_per_candidate() {
        let p = problem(vec![dto("A", "2026-01-01", 3, None)], vec![dto("N1", "2026-01-04", 2, None), dto("N2", "2026-01-06", 3, None)], 2);
        let fragments = split_into_one_night_fragments(&p);
        assert_eq!(fragments.len(), 5);
        let g1: Vec<i64> = fragments.iter().filter(|f| f.name == "N1").filter_map(|f| f.split_group).collect();
        let g2: Vec<i64> = fragments.iter().filter(|f| f.name == "N2").filter_map(|f| f.split_group).collect();
        assert!(g1.iter().all(|&g| g == g1[0]));
        assert!(g2.iter().all(|&g| g == g2[0]));
        assert_ne!(g1[0], g2[0]);
        assert!(fragments.iter().all(|f| f.test && f.length == 1));
    }
}
