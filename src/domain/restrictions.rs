//! Turns a solved room assignment into per-day stay-length bounds (min
//! stay, fixed max stay, absolute max stay) and closed-arrival /
//! closed-departure days, by walking each room's sorted arrival/departure
//! sequence once.

use std::collections::HashMap;

use crate::domain::context::{RoomIndex, SolverContext, StayIndex};
use crate::domain::date::DateOrd;

#[derive(Debug, Clone, Default)]
pub struct InitialRestrictions {
    pub min_stay_starting_on_day: HashMap<DateOrd, i64>,
    pub fixed_max_stay_starting_on_day: HashMap<DateOrd, i64>,
    pub absolute_max_stay_starting_on_day: HashMap<DateOrd, i64>,
    pub occupancy_per_day: HashMap<DateOrd, usize>,
    pub fully_booked_days: Vec<DateOrd>,
    pub first_departure_day: DateOrd,
    pub day_rooms_first_filled: Option<DateOrd>,
    pub number_of_small_gaps_per_day: HashMap<(DateOrd, i64), usize>,
    pub closed_arrival: HashMap<DateOrd, bool>,
    pub closed_departure: HashMap<DateOrd, bool>,
}

/// Falls back to the problem's global minimum stay, not 1: days outside the
/// schedule window, such as the synthetic departure before
/// `scheduleStart - minStay`, have no per-day entry at all.
fn min_stay_or_default(ctx: &SolverContext, day: DateOrd) -> i64 {
    ctx.min_stay_by_day.get(&day).copied().unwrap_or(ctx.default_minimum_stay)
}

pub fn generate(ctx: &SolverContext, assignments: &HashMap<StayIndex, String>) -> InitialRestrictions {
    let room_count = ctx.room_count();
    let mut room_arrivals: HashMap<RoomIndex, Vec<DateOrd>> = HashMap::new();
    let mut room_departures: HashMap<RoomIndex, Vec<DateOrd>> = HashMap::new();
    for j in 0..room_count {
        room_arrivals.insert(RoomIndex(j as u32), Vec::new());
        room_departures.insert(RoomIndex(j as u32), Vec::new());
    }

    let mut first_departure_day = ctx.max_end;
    for (&s, room) in assignments {
        let Some(&r) = ctx.room_index.get(room) else { continue };
        let stay = &ctx.stays[s.index()];
        room_arrivals.get_mut(&r).unwrap().push(stay.start);
        room_departures.get_mut(&r).unwrap().push(stay.end);
        if stay.end < first_departure_day {
            first_departure_day = stay.end;
        }
    }

    let end_of_schedule = ctx.schedule_end.add(ctx.default_minimum_stay as i32 + 1);
    for j in 0..room_count {
        let r = RoomIndex(j as u32);
        room_arrivals.get_mut(&r).unwrap().push(end_of_schedule);
        room_departures.get_mut(&r).unwrap().push(end_of_schedule);
        room_arrivals.get_mut(&r).unwrap().sort();
        room_departures.get_mut(&r).unwrap().sort();
    }

    let mut restrictions = InitialRestrictions { first_departure_day, ..Default::default() };
    fill_occupancy_and_absolute_max(ctx, false, &mut restrictions);
    fill_min_max_stays(ctx, &room_arrivals, &room_departures, &mut restrictions);
    generate_closures(ctx, &room_arrivals, &room_departures, &mut restrictions);
    restrictions
}

/// The per-day occupancy and absolute max stays considering only non-test
/// stays. The feasibility runner's pre-check uses this to bound candidate
/// new reservations against what the *existing* bookings alone can ever
/// seat, without running any MIP.
pub fn absolute_max_ignoring_test(ctx: &SolverContext) -> InitialRestrictions {
    let mut restrictions = InitialRestrictions { first_departure_day: ctx.max_end, ..Default::default() };
    fill_occupancy_and_absolute_max(ctx, true, &mut restrictions);
    restrictions
}

fn fill_occupancy_and_absolute_max(ctx: &SolverContext, ignore_test: bool, out: &mut InitialRestrictions) {
    let room_count = ctx.room_count();
    let mut d = ctx.schedule_start;
    while d < ctx.schedule_end {
        let occ = ctx.stays[..ctx.real_stay_count].iter().filter(|s| !(ignore_test && s.test) && s.covers(d)).count();
        out.occupancy_per_day.insert(d, occ);
        if occ == room_count {
            out.fully_booked_days.push(d);
        }
        d = d.succ();
    }
    out.fully_booked_days.push(ctx.schedule_end);

    let days: Vec<DateOrd> = out.occupancy_per_day.keys().copied().collect::<std::collections::BTreeSet<_>>().into_iter().collect();
    let mut next_full_index = 0usize;
    for day in days {
        if day < out.fully_booked_days[next_full_index] {
            out.absolute_max_stay_starting_on_day.insert(day, (out.fully_booked_days[next_full_index] - day) as i64);
        } else {
            out.absolute_max_stay_starting_on_day.insert(day, 0);
            next_full_index += 1;
        }
    }
}

fn fill_min_max_stays(ctx: &SolverContext, room_arrivals: &HashMap<RoomIndex, Vec<DateOrd>>, room_departures: &HashMap<RoomIndex, Vec<DateOrd>>, out: &mut InitialRestrictions) {
    let room_count = ctx.room_count();
    let days: Vec<DateOrd> = out.occupancy_per_day.keys().copied().collect::<std::collections::BTreeSet<_>>().into_iter().collect();

    let mut next_arrival_idx = vec![0usize; room_count];
    let mut next_departure_idx = vec![0usize; room_count];
    let mut naive_max_stays: HashMap<DateOrd, i64> = HashMap::new();
    let mut min_gaps = vec![(ctx.schedule_end - ctx.schedule_start) as i64; days.len()];
    let mut rooms_filled_for_first_time = vec![false; room_count];

    for (i, &day) in days.iter().enumerate() {
        naive_max_stays.insert(day, 0);
        let mut gaps_observed: HashMap<i64, usize> = HashMap::new();
        let min_stay_for_day = ctx.min_stay_on(day);

        for j in 0..room_count {
            let r = RoomIndex(j as u32);
            let arrivals = &room_arrivals[&r];
            let departures = &room_departures[&r];
            let mut max_r;

            // Room free ahead of its next arrival: the remaining gap
            // `nextArrival - day` bounds both the max and the min stay
            // startable here.
            if day < arrivals[next_arrival_idx[j]] {
                max_r = (arrivals[next_arrival_idx[j]] - day) as i64;
                let min_r = max_r.min(min_stay_for_day);
                if min_r > 0 {
                    min_gaps[i] = min_gaps[i].min(min_r);
                }
                let cur = naive_max_stays[&day];
                naive_max_stays.insert(day, cur.max(max_r));
            }

            if day >= ctx.max_end {
                naive_max_stays.insert(day, (ctx.schedule_end - day) as i64);
            }

            if day >= arrivals[0] {
                rooms_filled_for_first_time[j] = true;
            }

            if day == departures[next_departure_idx[j]] {
                next_arrival_idx[j] += 1;
                next_departure_idx[j] += 1;
                let min_r;
                if next_arrival_idx[j] == arrivals.len() {
                    max_r = 0;
                    min_r = 0;
                } else {
                    max_r = (arrivals[next_arrival_idx[j]] - day) as i64;
                    min_r = max_r.min(min_stay_for_day);
                }
                if min_r > 0 {
                    if min_r < min_stay_for_day {
                        *gaps_observed.entry(min_r).or_insert(0) += 1;
                    }
                    min_gaps[i] = min_gaps[i].min(min_r);
                }
                let cur = naive_max_stays[&day];
                naive_max_stays.insert(day, cur.max(max_r));
            }
        }

        for (g, count) in gaps_observed {
            out.number_of_small_gaps_per_day.insert((day, g), count);
        }
        // A stay can never outlast the horizon, whatever the sentinel gap
        // says.
        let remaining = (ctx.schedule_end - day) as i64;
        let cur = naive_max_stays[&day];
        naive_max_stays.insert(day, cur.min(remaining));
        if rooms_filled_for_first_time.iter().filter(|&&v| v).count() < room_count {
            out.day_rooms_first_filled = Some(day);
        }
    }

    out.fixed_max_stay_starting_on_day = naive_max_stays;

    for (d, &day) in days.iter().enumerate() {
        let min_stay_for_day = ctx.min_stay_on(day);
        let mut value = min_gaps[d].min(min_stay_for_day);
        if day < out.first_departure_day {
            value = min_stay_for_day;
        }
        out.min_stay_starting_on_day.insert(day, value);
    }
}

/// Per-day closed-for-arrival / closed-for-departure flags. A room closes
/// arrival on its own departure day when a gap opens behind it, and closes
/// departure on an arrival day that ends a gap; a room with at least the
/// applicable minimum stay of slack on both sides is open for both. A day is
/// flagged only when every room closes it.
fn generate_closures(ctx: &SolverContext, room_arrivals: &HashMap<RoomIndex, Vec<DateOrd>>, room_departures: &HashMap<RoomIndex, Vec<DateOrd>>, out: &mut InitialRestrictions) {
    let room_count = ctx.room_count();
    let days: Vec<DateOrd> = out.occupancy_per_day.keys().copied().collect::<std::collections::BTreeSet<_>>().into_iter().collect();

    let mut next_arrival_idx = vec![0usize; room_count];
    let mut next_departure_idx = vec![0usize; room_count];
    let starting_departure = ctx.schedule_start.add(-(ctx.default_minimum_stay as i32));

    for (i, &day) in days.iter().enumerate() {
        let min_stay_for_day = ctx.min_stay_on(day);
        let mut room_closed_arrival = vec![false; room_count];
        let mut room_closed_departure = vec![false; room_count];

        for j in 0..room_count {
            let r = RoomIndex(j as u32);
            let arrivals = &room_arrivals[&r];
            let departures = &room_departures[&r];

            if day == departures[next_departure_idx[j]] && next_departure_idx[j] < departures.len() - 1 {
                next_arrival_idx[j] += 1;
                next_departure_idx[j] += 1;
            }

            let previous_departure = if next_departure_idx[j] > 0 { departures[next_departure_idx[j] - 1] } else { starting_departure };
            let next_arrival = arrivals[next_arrival_idx[j].min(arrivals.len() - 1)];

            let since_departure = (day - previous_departure) as i64;
            let until_arrival = (next_arrival - day) as i64;

            if until_arrival > 0 && since_departure == 0 {
                room_closed_arrival[j] = true;
            }
            if until_arrival == 0 && since_departure > 0 {
                room_closed_departure[j] = true;
            }
            if i == days.len() - 1 {
                room_closed_departure[j] = false;
            }
            let min_stay_for_previous = min_stay_or_default(ctx, previous_departure);
            if since_departure >= min_stay_for_previous && until_arrival >= min_stay_for_day {
                room_closed_departure[j] = false;
                room_closed_arrival[j] = false;
            }
        }

        if room_closed_arrival.iter().all(|&v| v) {
            out.closed_arrival.insert(day, true);
        }
        if room_closed_departure.iter().all(|&v| v) {
            out.closed_departure.insert(day, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ProblemDto, ReservationDto, RoomDto};
    use crate::domain::context::{ContextOptions, StayIndex};
    use crate::domain::problem::Problem;
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

    fn two_room_problem(reservations: Vec<ReservationDto>, minimum_stay: i64) -> Problem {
        Problem::from_dto(ProblemDto {
            problem_id: "P".to_string(),
            reservations,
            rooms: vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }, RoomDto { room_number: "102".to_string(), room_type: None, adjacent_rooms: vec![] }],
            new_reservations: vec![],
            minimum_stay: Some(minimum_stay),
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
    fn fully_booked_days_are_detected() {
        let problem = two_room_problem(vec![dto("A", "2026-01-01", 5), dto("B", "2026-01-01", 5)], 2);
        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        let mut assignments = HashMap::new();
        assignments.insert(StayIndex(0), "101".to_string());
        assignments.insert(StayIndex(1), "102".to_string());

        let r = generate(&ctx, &assignments);
        assert_eq!(r.occupancy_per_day[&ctx.schedule_start], 2);
        assert!(r.fully_booked_days.contains(&ctx.schedule_start));
        assert_eq!(r.absolute_max_stay_starting_on_day[&ctx.schedule_start], 0);
    }

    #[test]
    fn gap_before_next_arrival_tightens_min_stay() {
        // A departs 01-04, B arrives 01-05 in the other room: from 01-04 the
        // gap until B is one night, so the min stay startable there is 1.
        let problem = two_room_problem(vec![dto("A", "2026-01-01", 3), dto("B", "2026-01-05", 3)], 5);
        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        let mut assignments = HashMap::new();
        assignments.insert(StayIndex(0), "101".to_string());
        assignments.insert(StayIndex(1), "102".to_string());

        let r = generate(&ctx, &assignments);
        let day = crate::domain::date::DateOrd::parse("2026-01-04").unwrap();
        assert_eq!(r.min_stay_starting_on_day[&day], 1);
        // Before the first departure the min stay is forced to the policy
        // value.
        let early = crate::domain::date::DateOrd::parse("2026-01-02").unwrap();
        assert_eq!(r.min_stay_starting_on_day[&early], 5);
    }

    #[test]
    fn fixed_max_stay_never_exceeds_remaining_horizon() {
        let problem = two_room_problem(vec![dto("A", "2026-01-01", 3), dto("B", "2026-01-05", 3)], 5);
        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        let mut assignments = HashMap::new();
        assignments.insert(StayIndex(0), "101".to_string());
        assignments.insert(StayIndex(1), "102".to_string());

        let r = generate(&ctx, &assignments);
        for (&day, &max) in &r.fixed_max_stay_starting_on_day {
            assert!(max <= (ctx.schedule_end - day) as i64, "day {day}: {max} outlasts horizon");
        }
    }

    #[test]
    fn ignore_test_variant_skips_candidate_stays() {
        let mut problem = two_room_problem(vec![dto("A", "2026-01-01", 3)], 2);
        let mut candidate = dto("N", "2026-01-02", 2);
        candidate.id = Some("N1".to_string());
        problem.new_reservations = vec![crate::domain::reservation::Reservation::from_dto(&candidate, true).unwrap()];

        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        let r = absolute_max_ignoring_test(&ctx);
        // Only A counts, so no day is fully booked before the sentinel.
        assert_eq!(r.fully_booked_days, vec![ctx.schedule_end]);
    }
}
