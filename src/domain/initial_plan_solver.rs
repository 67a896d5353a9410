//! The assignment MIP: one binary-or-continuous variable per (stay,
//! allowable room), wired through the [`MipBackend`] abstraction in `mip.rs`
//! rather than talking to `good_lp` directly, and solved with HiGHS via
//! [`HighsBackend`].
//!
//! The same model doubles as the feasibility probe used by the restriction
//! solver and the feasibility runner via [`probe`], with a looser relative
//! gap, a lighter adjacency penalty, and the adjacency slack capped by the
//! *previously observed* non-adjacent count per group instead of the group
//! size: a group the initial solve proved seatable in adjacent rooms stays
//! seated that way in every probe.

use std::collections::HashMap;

use crate::domain::context::{RoomIndex, SolverContext, StayIndex};
use crate::domain::dummy::{self, MAX_DUMMY_MULTIPLE};
use crate::domain::mip::{HighsBackend, LinExpr, MipBackend, Sense, SolveStatus, VarId};
use crate::error::{Error, Result};

/// The result of one assignment solve: a room for every real stay, plus the
/// per-adjacency-group stays that could not be seated next to their group.
/// Every adjacency group appears as a key; a fully seated group maps to an
/// empty list.
#[derive(Debug, Clone)]
pub struct InitialPlanOutcome {
    pub status: SolveStatus,
    pub assignments: HashMap<StayIndex, String>,
    pub non_adjacent_per_group: HashMap<String, Vec<StayIndex>>,
}

/// Builds and solves the initial assignment MIP against `ctx`. Generates its
/// own dummy stays and removes them again before returning, so `ctx` is left
/// exactly as it was handed in.
pub fn solve(ctx: &mut SolverContext) -> Result<InitialPlanOutcome> {
    if ctx.current_reservations_without_assigned_room > 0 {
        return Err(Error::MissingInitialAssignment(ctx.exceptions.join("\n")));
    }

    dummy::generate(ctx);
    let non_adj_penalty = 100.0 * 2f64.powf(ctx.default_minimum_stay as f64);
    let outcome = solve_inner(ctx, 0.01, non_adj_penalty, None);
    ctx.clear_dummy_stays();
    outcome
}

/// The feasibility probe: same model, relative gap 0.5, the lighter
/// `10 · 2^minStay` adjacency penalty, and per-group slack capped by
/// `prior_non_adjacent`. Returns the full assignment on success so the caller
/// can report the proving plan, `None` when no solution was found.
pub fn probe(ctx: &mut SolverContext, prior_non_adjacent: &HashMap<String, Vec<StayIndex>>) -> Option<HashMap<StayIndex, String>> {
    dummy::generate(ctx);
    let penalty = 10.0 * 2f64.powf(ctx.default_minimum_stay as f64);
    let outcome = solve_inner(ctx, 0.5, penalty, Some(prior_non_adjacent));
    ctx.clear_dummy_stays();
    outcome.ok().map(|o| o.assignments)
}

/// The degenerate outcome used when `RestrictionsForInitialPlan` is set:
/// every stay keeps the room the problem document assigned it, no MIP runs,
/// and the adjacency post-pass is evaluated against that fixed plan.
pub fn fixed_plan_outcome(ctx: &SolverContext) -> InitialPlanOutcome {
    let mut assignments = HashMap::new();
    for i in 0..ctx.real_stay_count {
        if let Some(room) = &ctx.stays[i].assigned_room {
            if ctx.room_index.contains_key(room) {
                assignments.insert(StayIndex(i as u32), room.clone());
            }
        }
    }
    let non_adjacent_per_group = check_adjacent_assignments(ctx, &assignments);
    InitialPlanOutcome { status: SolveStatus::Optimal, assignments, non_adjacent_per_group }
}

fn solve_inner(ctx: &SolverContext, relative_gap: f64, non_adjacency_penalty: f64, adjacency_caps: Option<&HashMap<String, Vec<StayIndex>>>) -> Result<InitialPlanOutcome> {
    let mut backend = HighsBackend::new();
    backend.set_relative_gap(relative_gap);
    backend.set_time_limit(60.0);

    let room_indices: Vec<RoomIndex> = (0..ctx.room_count() as u32).map(RoomIndex).collect();

    let mut x: HashMap<(StayIndex, RoomIndex), VarId> = HashMap::new();
    for (i, stay) in ctx.stays.iter().enumerate() {
        let s = StayIndex(i as u32);
        for &r in &room_indices {
            let room_type = &ctx.rooms_to_type[&r];
            if !stay.allowable_types.iter().any(|t| t == room_type) {
                continue;
            }
            let var = if stay.is_dummy { backend.add_continuous_var(0.0, 1.0) } else { backend.add_binary_var() };
            x.insert((s, r), var);
        }
    }

    // Assignment: every real stay occupies exactly one room; a dummy stay
    // may spill into up to `roomCount` rooms at once (it represents idle gap
    // capacity, not a guest).
    for (i, stay) in ctx.stays.iter().enumerate() {
        let s = StayIndex(i as u32);
        let terms: Vec<VarId> = room_indices.iter().filter_map(|r| x.get(&(s, *r)).copied()).collect();
        if stay.is_dummy {
            backend.add_linear_constraint(LinExpr::sum(terms).leq(ctx.room_count() as f64));
        } else {
            backend.add_linear_constraint(LinExpr::sum(terms).eq(1.0));
        }
    }

    // Fixed rooms (locked reservations) and fixed-for-solver rooms (pinned
    // by the caller's `ContextOptions`) are forced to their given room.
    // Pins are emitted in stay order so the model rows come out the same on
    // every build of the same problem.
    let mut pins: Vec<(StayIndex, &String)> = ctx.fixed_rooms.iter().map(|(&s, room)| (s, room)).collect();
    pins.extend(ctx.fixed_for_solver.iter().filter_map(|(&s, room_opt)| room_opt.as_ref().map(|room| (s, room))));
    pins.sort();
    for (s, room) in pins {
        if let Some(&r) = ctx.room_index.get(room) {
            if let Some(&v) = x.get(&(s, r)) {
                backend.add_linear_constraint(LinExpr::from(v).eq(1.0));
            }
        }
    }

    // Clique: every room holds exactly one occupant (real or dummy) on every
    // day of the horizon.
    let mut d = ctx.schedule_start;
    while d < ctx.schedule_end {
        for &r in &room_indices {
            let covering: Vec<VarId> = ctx.stays_covering(d).filter_map(|s| x.get(&(s, r)).copied()).collect();
            backend.add_linear_constraint(LinExpr::sum(covering).eq(1.0));
        }
        d = d.succ();
    }

    let mut dummy_objective = LinExpr::default();
    for (i, stay) in ctx.stays.iter().enumerate() {
        if stay.is_dummy {
            if let Some(coef) = dummy_gap_coefficient(ctx, stay) {
                let terms: Vec<VarId> = room_indices.iter().filter_map(|r| x.get(&(StayIndex(i as u32), *r)).copied()).collect();
                dummy_objective = dummy_objective + LinExpr::sum(terms) * coef;
            }
        }
    }

    // Adjacency: soft-constrained via a slack variable per (stay, candidate
    // room) pair so an unsatisfiable group degrades the objective instead of
    // the model. The group slack cap is the group size on the initial solve
    // and the previously observed non-adjacent count on probes.
    let mut adjacency_slack = LinExpr::default();
    let mut adjacency_groups: Vec<(&String, &Vec<StayIndex>)> = ctx.stay_adjacency_groups.iter().collect();
    adjacency_groups.sort_by_key(|(group, _)| group.as_str());
    let mut adjacent_rooms: Vec<RoomIndex> = ctx.adjacent_rooms.iter().copied().collect();
    adjacent_rooms.sort();
    for (group, members) in adjacency_groups {
        let mut group_slack_vars = Vec::new();
        for &s in members {
            let connected: Vec<StayIndex> = members.iter().copied().filter(|&cs| cs != s).collect();
            let mut coverage_terms = LinExpr::default();
            for &r in &adjacent_rooms {
                if let Some(&v) = x.get(&(s, r)) {
                    coverage_terms = coverage_terms + LinExpr::from(v);
                }
            }
            let mut slack_sum_for_stay = LinExpr::default();
            for &r in &adjacent_rooms {
                let neighbours = &ctx.room_adjacency[&r];
                let o = backend.add_continuous_var(0.0, 1.0);
                group_slack_vars.push(o);
                slack_sum_for_stay = slack_sum_for_stay.clone() + LinExpr::from(o);

                let mut neighbour_terms = LinExpr::default();
                for &cs in &connected {
                    for &ar in neighbours {
                        if let Some(&v) = x.get(&(cs, ar)) {
                            neighbour_terms = neighbour_terms + LinExpr::from(v);
                        }
                    }
                }
                if let Some(&xv) = x.get(&(s, r)) {
                    // x[s,r] - sum(x[connected, neighbours(r)]) - o[s,r] <= 0
                    let lhs = LinExpr::from(xv) - neighbour_terms - LinExpr::from(o);
                    backend.add_linear_constraint(lhs.leq(0.0));
                }
            }
            // At least one adjacent-room placement, unless every candidate is slacked.
            backend.add_linear_constraint((coverage_terms + slack_sum_for_stay).geq(1.0));
        }
        for &o in &group_slack_vars {
            adjacency_slack = adjacency_slack + LinExpr::from(o);
        }
        let cap = match adjacency_caps {
            Some(prior) => prior.get(group).map_or(0, Vec::len),
            None => members.len(),
        };
        backend.add_linear_constraint(LinExpr::sum(group_slack_vars).leq(cap as f64));
    }

    // Split-group coupling: consecutive fragments of a split reservation
    // should land in the same room (connection indicator) and never jump to
    // a meaningfully lower room type (single downgrade indicator per group).
    let mut split_connection = LinExpr::default();
    let mut split_downgrade = LinExpr::default();
    let mut split_groups: Vec<(&i64, &Vec<StayIndex>)> = ctx.split_groups.iter().collect();
    split_groups.sort_by_key(|&(&g, _)| g);
    for (_, members) in split_groups {
        if members.len() < 2 {
            continue;
        }
        let downgrade = backend.add_continuous_var(0.0, 1.0);
        split_downgrade = split_downgrade + LinExpr::from(downgrade);

        let ordered_types = &ctx.stays[members[0].index()].allowable_types;
        let n = ordered_types.len();

        for w in members.windows(2) {
            let (a, b) = (w[0], w[1]);
            let connection = backend.add_continuous_var(0.0, 1.0);
            split_connection = split_connection + LinExpr::from(connection);

            let mut lower_rooms: Vec<RoomIndex> = Vec::new();
            for k in 1..n {
                let higher_type = &ordered_types[n - 1 - k];
                let lower_type = &ordered_types[n - k];
                let higher_rooms = ctx.type_to_rooms.get(higher_type).cloned().unwrap_or_default();
                if let Some(rs) = ctx.type_to_rooms.get(lower_type) {
                    lower_rooms.extend(rs.iter().copied());
                }

                let mut lower_terms = LinExpr::default();
                for &lr in &lower_rooms {
                    if let Some(&v) = x.get(&(b, lr)) {
                        lower_terms = lower_terms + LinExpr::from(v);
                    }
                }
                let mut higher_terms = LinExpr::default();
                for &hr in &higher_rooms {
                    if let Some(&v) = x.get(&(a, hr)) {
                        higher_terms = higher_terms + LinExpr::from(v);
                    }
                }
                // sum(x[b, lower]) - downgrade <= 1 - sum(x[a, higher])
                let lhs = lower_terms - LinExpr::from(downgrade) + higher_terms;
                backend.add_linear_constraint(lhs.leq(1.0));
            }

            for &r in &room_indices {
                if let (Some(&va), Some(&vb)) = (x.get(&(a, r)), x.get(&(b, r))) {
                    backend.add_linear_constraint((LinExpr::from(va) - LinExpr::from(vb) - LinExpr::from(connection)).leq(0.0));
                    backend.add_linear_constraint((LinExpr::from(vb) - LinExpr::from(va) - LinExpr::from(connection)).leq(0.0));
                }
            }
        }
    }

    let objective = dummy_objective + split_connection * 100.0 + split_downgrade + adjacency_slack * non_adjacency_penalty;
    backend.set_objective(Sense::Minimize, objective);

    let status = backend.optimize();
    match status {
        SolveStatus::Infeasible => return Err(Error::ProvenInfeasible),
        SolveStatus::Timeout => return Err(Error::SolverTimeout),
        _ => {}
    }

    let mut assignments = HashMap::new();
    for i in 0..ctx.real_stay_count {
        let s = StayIndex(i as u32);
        for &r in &room_indices {
            if let Some(&v) = x.get(&(s, r)) {
                if backend.value(v) > 0.5 {
                    assignments.insert(s, ctx.room_numbers[r.index()].clone());
                    break;
                }
            }
        }
    }

    let non_adjacent_per_group = check_adjacent_assignments(ctx, &assignments);

    Ok(InitialPlanOutcome { status, assignments, non_adjacent_per_group })
}

/// The objective coefficient a dummy stay of length `stay.length` starting on
/// `stay.start` contributes: an exponentially growing penalty for leaving a
/// short gap relative to that day's minimum stay, zero once the gap touches
/// either schedule edge so boundary dummies are free.
fn dummy_gap_coefficient(ctx: &SolverContext, stay: &crate::domain::context::Stay) -> Option<f64> {
    let start = stay.start;
    let length = stay.length;
    if start.add(length as i32) >= ctx.schedule_end {
        return None;
    }
    if start <= ctx.schedule_start {
        return None;
    }
    let min_stay = ctx.min_stay_on(start);
    let multiplier = MAX_DUMMY_MULTIPLE.max(1);
    if length > min_stay * multiplier {
        return None;
    }
    let extra = if length < min_stay { 1 } else { 0 };
    Some(2f64.powf((min_stay - length + extra) as f64))
}

/// For each adjacency group, a member counts as unseated if none of its
/// group-mates sit in a room on its own room's adjacency list. Every group
/// gets an entry, empty when all members are seated.
pub fn check_adjacent_assignments(ctx: &SolverContext, assignments: &HashMap<StayIndex, String>) -> HashMap<String, Vec<StayIndex>> {
    let mut result = HashMap::new();
    for (group, members) in &ctx.stay_adjacency_groups {
        let mut unseated = Vec::new();
        for &s in members {
            let Some(room) = assignments.get(&s).and_then(|n| ctx.room_index.get(n)) else { continue };
            let neighbours = ctx.room_adjacency.get(room);
            let has_adjacent_member = members.iter().any(|&other| {
                other != s
                    && assignments
                        .get(&other)
                        .and_then(|n| ctx.room_index.get(n))
                        .is_some_and(|other_room| neighbours.is_some_and(|ns| ns.contains(other_room)))
            });
            if !has_adjacent_member {
                unseated.push(s);
            }
        }
        unseated.sort();
        result.insert(group.clone(), unseated);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ProblemDto, ReservationDto, RoomDto};
    use crate::domain::context::ContextOptions;
    use crate::domain::problem::Problem;
    use std::collections::HashMap as Map;

    fn dto(name: &str, arrival: &str, length: i64, adj_group: Option<&str>) -> ReservationDto {
        ReservationDto {
            name: name.to_string(),
            id: None,
            arrival: arrival.to_string(),
            length,
            adjacency_group: adj_group.map(str::to_string),
            is_locked: false,
            assigned_room: None,
            room_type: None,
            allowable_room_types: vec![],
            type_order: vec![],
            split_group: None,
        }
    }

    fn problem(reservations: Vec<ReservationDto>, rooms: Vec<RoomDto>) -> Problem {
        Problem::from_dto(ProblemDto {
            problem_id: "P".to_string(),
            reservations,
            rooms,
            new_reservations: vec![],
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

    #[test]
    fn assigns_every_real_stay_to_a_distinct_room_when_no_overlap() {
        let p = problem(
            vec![dto("A", "2026-01-01", 2, None), dto("B", "2026-01-01", 2, None)],
            vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }, RoomDto { room_number: "102".to_string(), room_type: None, adjacent_rooms: vec![] }],
        );
        let mut ctx = SolverContext::build(&p, ContextOptions::default()).unwrap();
        let outcome = solve(&mut ctx).unwrap();
        assert_eq!(outcome.assignments.len(), 2);
        let rooms: std::collections::HashSet<&String> = outcome.assignments.values().collect();
        assert_eq!(rooms.len(), 2);
    }

    #[test]
    fn overbooked_single_room_is_provably_infeasible() {
        let p = problem(
            vec![dto("A", "2026-01-01", 2, None), dto("B", "2026-01-01", 2, None)],
            vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }],
        );
        let mut ctx = SolverContext::build(&p, ContextOptions::default()).unwrap();
        assert!(matches!(solve(&mut ctx), Err(Error::ProvenInfeasible)));
    }

    #[test]
    fn adjacency_group_lands_in_neighbouring_rooms_when_feasible() {
        let p = problem(
            vec![dto("A", "2026-01-01", 2, Some("G1")), dto("B", "2026-01-01", 2, Some("G1"))],
            vec![
                RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec!["102".to_string()] },
                RoomDto { room_number: "102".to_string(), room_type: None, adjacent_rooms: vec!["101".to_string()] },
            ],
        );
        let mut ctx = SolverContext::build(&p, ContextOptions::default()).unwrap();
        let outcome = solve(&mut ctx).unwrap();
        assert_eq!(outcome.non_adjacent_per_group["G1"], Vec::<StayIndex>::new());
    }

    #[test]
    fn probe_finds_room_for_trial_stay_or_reports_none() {
        let p = problem(
            vec![dto("A", "2026-01-01", 2, None)],
            vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }],
        );
        let mut ctx = SolverContext::build(&p, ContextOptions::default()).unwrap();
        // A trial stay overlapping A in the only room cannot fit.
        let trial = crate::domain::context::Stay {
            name: "Test_Max".to_string(),
            id: "probe".to_string(),
            start: ctx.min_start,
            end: ctx.min_start.add(2),
            length: 2,
            locked: false,
            assigned_room: None,
            allowable_types: ctx.type_to_rooms.keys().cloned().collect(),
            test: true,
            split_group: None,
            is_dummy: false,
        };
        let idx = ctx.push_real_stay(trial);
        assert!(probe(&mut ctx, &HashMap::new()).is_none());
        ctx.remove_last_real_stay(idx);
    }

    #[test]
    fn fixed_plan_outcome_keeps_problem_assignments() {
        let mut a = dto("A", "2026-01-01", 2, None);
        a.assigned_room = Some("101".to_string());
        let p = problem(vec![a], vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }]);
        let ctx = SolverContext::build(&p, ContextOptions::default()).unwrap();
        let outcome = fixed_plan_outcome(&ctx);
        assert_eq!(outcome.assignments[&StayIndex(0)], "101");
    }
}
