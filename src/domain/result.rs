//! Result assembly: turns a solved assignment map into the labeled,
//! split-group-coalesced plan the caller sees, and classifies every
//! schedule-restricted stay length as avoided by closed-arrival,
//! closed-departure, or a max-stay bound (in that precedence order).

use std::collections::HashMap;

use crate::domain::context::{SolverContext, StayIndex};
use crate::domain::date::DateOrd;
use crate::domain::final_restrictions::FinalRestrictions;

#[derive(Debug, Clone)]
pub struct PlanAssignment {
    pub name: String,
    pub is_fixed: bool,
    pub room: String,
    pub arrival: DateOrd,
    pub length: i64,
    pub adjacency_group: Option<String>,
    pub test: bool,
    pub id: String,
    pub split_group: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct AvoidedStay {
    pub arrival: DateOrd,
    pub length: i64,
}

/// Emits one [`PlanAssignment`] per non-split real stay, plus one per
/// maximal run of consecutive same-room fragments within each split group.
/// Returns `None` when `assignments` doesn't cover every real stay (an
/// incomplete or failed solve).
pub fn coalesce_assignments(ctx: &SolverContext, assignments: &HashMap<StayIndex, String>) -> Option<Vec<PlanAssignment>> {
    if assignments.len() != ctx.real_stay_count {
        return None;
    }
    let mut out = Vec::new();

    for i in 0..ctx.real_stay_count {
        let s = StayIndex(i as u32);
        let stay = &ctx.stays[i];
        // Split-group members are emitted below, coalesced per room run.
        if stay.split_group.is_some() {
            continue;
        }
        let Some(room) = assignments.get(&s) else { continue };
        out.push(PlanAssignment {
            name: stay.name.clone(),
            is_fixed: ctx.fixed_rooms.contains_key(&s),
            room: room.clone(),
            arrival: stay.start,
            length: stay.length,
            adjacency_group: ctx.stay_to_adj_group.get(&s).cloned(),
            test: stay.test,
            id: stay.id.clone(),
            split_group: None,
        });
    }

    let mut split_groups: Vec<(&i64, &Vec<StayIndex>)> = ctx.split_groups.iter().collect();
    split_groups.sort_by_key(|&(&g, _)| g);
    for (&g, members) in split_groups {
        let Some(&first) = members.first() else { continue };
        let first_stay = &ctx.stays[first.index()];
        let mut assigned_room = assignments.get(&first).cloned().unwrap_or_default();
        let mut current = PlanAssignment {
            name: format!("{}, split {g}", first_stay.name),
            is_fixed: ctx.fixed_rooms.contains_key(&first),
            room: assigned_room.clone(),
            arrival: first_stay.start,
            length: 1,
            adjacency_group: ctx.stay_to_adj_group.get(&first).cloned(),
            test: first_stay.test,
            id: first_stay.id.clone(),
            split_group: Some(g),
        };

        for w in members.windows(2) {
            let next = w[1];
            let next_room = assignments.get(&next).cloned().unwrap_or_default();
            if next_room == assigned_room {
                current.length += 1;
            } else {
                out.push(current.clone());
                let next_stay = &ctx.stays[next.index()];
                current = PlanAssignment {
                    name: format!("{}, split {g}", first_stay.name),
                    is_fixed: ctx.fixed_rooms.contains_key(&next),
                    room: next_room.clone(),
                    arrival: next_stay.start,
                    length: 1,
                    adjacency_group: ctx.stay_to_adj_group.get(&next).cloned(),
                    test: next_stay.test,
                    id: next_stay.id.clone(),
                    split_group: Some(g),
                };
                assigned_room = next_room;
            }
        }
        out.push(current);
    }

    Some(out)
}

/// For every (day, length) candidate, classifies it as avoided by
/// closed-arrival, closed-departure, or a max-stay bound. A closed-arrival
/// day short-circuits the other two checks for that day entirely.
pub fn get_avoided_stays(ctx: &SolverContext, fr: &FinalRestrictions) -> (HashMap<DateOrd, Vec<AvoidedStay>>, HashMap<DateOrd, Vec<AvoidedStay>>, HashMap<DateOrd, Vec<AvoidedStay>>) {
    let mut by_ca: HashMap<DateOrd, Vec<AvoidedStay>> = HashMap::new();
    let mut by_cd: HashMap<DateOrd, Vec<AvoidedStay>> = HashMap::new();
    let mut by_max: HashMap<DateOrd, Vec<AvoidedStay>> = HashMap::new();

    let mut day = ctx.min_start;
    while day < ctx.max_end {
        if fr.fully_booked_days.contains(&day) {
            day = day.succ();
            continue;
        }

        let abs_max = fr.absolute_max_stay_starting_on_day.get(&day).copied().unwrap_or(0);
        let max_stay = fr.computed_max_stays_starting.get(&day).copied().unwrap_or(abs_max);
        let min_starting = fr.min_stay_starting_on_day.get(&day).copied().unwrap_or(0);
        let max_stay_on_start = fr.max_stay_covering_day.get(&day).copied().unwrap_or(abs_max);

        if fr.closed_arrival.contains_key(&day) {
            let mut avoided = Vec::new();
            let mut min_max_encountered = max_stay_on_start;
            for length in min_starting..=max_stay {
                if let Some(&cov) = fr.max_stay_covering_day.get(&day.add(length as i32)) {
                    min_max_encountered = min_max_encountered.min(cov);
                }
                if length > min_max_encountered {
                    continue;
                }
                if fr.closed_departure.contains_key(&day.add(length as i32)) {
                    continue;
                }
                avoided.push(AvoidedStay { arrival: day, length });
            }
            if !avoided.is_empty() {
                by_ca.insert(day, avoided);
            }
            day = day.succ();
            continue;
        }

        let mut avoided_cd = Vec::new();
        let mut avoided_max = Vec::new();
        let mut min_max_encountered = max_stay_on_start;
        let mut stop = false;
        for length in min_starting..=abs_max {
            if stop {
                continue;
            }
            if length > min_max_encountered {
                avoided_max.push(AvoidedStay { arrival: day, length });
                stop = true;
            }
            if let Some(&cov) = fr.max_stay_covering_day.get(&day.add(length as i32)) {
                min_max_encountered = min_max_encountered.min(cov);
            }
            if fr.closed_departure.contains_key(&day.add(length as i32)) {
                avoided_cd.push(AvoidedStay { arrival: day, length });
                continue;
            }
        }
        if !avoided_cd.is_empty() {
            by_cd.insert(day, avoided_cd);
        }
        if !avoided_max.is_empty() {
            by_max.insert(day, avoided_max);
        }

        day = day.succ();
    }

    (by_ca, by_cd, by_max)
}

/// For every day the pinned plan's covering-min-stay projection reaches
/// (skipping days that plan had already fully booked, and days the free
/// plan's projection does not cover), tallies which bucket each plan's
/// covering min stay falls into. Buckets `1..=minStay` are always present.
pub fn quality_comparison(default_minimum_stay: i64, initial_min_stays: &HashMap<DateOrd, i64>, optimized_min_stays: &HashMap<DateOrd, i64>, initial_fully_booked: &[DateOrd]) -> HashMap<i64, (i64, i64)> {
    let mut buckets: HashMap<i64, (i64, i64)> = (1..=default_minimum_stay.max(1)).map(|d| (d, (0, 0))).collect();
    for (&day, &init_val) in initial_min_stays {
        if initial_fully_booked.contains(&day) {
            continue;
        }
        let Some(&opt_val) = optimized_min_stays.get(&day) else { continue };
        buckets.entry(opt_val).or_insert((0, 0)).1 += 1;
        buckets.entry(init_val).or_insert((0, 0)).0 += 1;
    }
    buckets
}

/// For each candidate new reservation (keyed `Name_Id`), one less than the
/// number of coalesced split segments it occupies in each plan: `0` means it
/// sits in a single room throughout, `-1` that the plan could not place it.
pub fn room_change_comparison(new_reservations: &[crate::domain::reservation::Reservation], initial_plan: Option<&[PlanAssignment]>, optimized_plan: &[PlanAssignment]) -> HashMap<String, (i64, i64)> {
    let mut result: HashMap<String, (i64, i64)> = new_reservations.iter().map(|r| (format!("{}_{}", r.name, r.id), (-1, -1))).collect();

    let mut tally = |plan: &[PlanAssignment], optimized: bool| {
        for a in plan {
            if !a.name.contains("split") {
                continue;
            }
            let key = format!("{}_{}", a.name.split(',').next().unwrap_or(&a.name), a.id);
            if let Some(entry) = result.get_mut(&key) {
                if optimized {
                    entry.1 += 1;
                } else {
                    entry.0 += 1;
                }
            }
        }
    };
    tally(optimized_plan, true);
    if let Some(initial) = initial_plan {
        tally(initial, false);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ProblemDto, ReservationDto, RoomDto};
    use crate::domain::context::ContextOptions;
    use crate::domain::initial_plan_solver;
    use crate::domain::problem::Problem;
    use std::collections::HashMap as Map;

    #[test]
    fn coalesces_single_night_fragments_that_share_a_room() {
        let dto = |name: &str, arrival: &str, split_group: Option<i64>| ReservationDto {
            name: name.to_string(),
            id: None,
            arrival: arrival.to_string(),
            length: 1,
            adjacency_group: None,
            is_locked: false,
            assigned_room: None,
            room_type: None,
            allowable_room_types: vec![],
            type_order: vec![],
            split_group,
        };
        let problem = Problem::from_dto(ProblemDto {
            problem_id: "P".to_string(),
            reservations: vec![dto("A", "2026-01-01", Some(1)), dto("A", "2026-01-02", Some(1))],
            rooms: vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }],
            new_reservations: vec![],
            minimum_stay: Some(1),
            minimum_stay_by_day: Map::new(),
            minimum_stay_by_date: vec![],
            request_start_date: None,
            request_end_date: None,
            restrictions_for_initial_plan: false,
            test_new_booking: false,
        })
        .unwrap();
        let mut ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        let outcome = initial_plan_solver::solve(&mut ctx).unwrap();
        let plan = coalesce_assignments(&ctx, &outcome.assignments).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].length, 2);
    }
}
