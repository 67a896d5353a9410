//! Dummy stay generation. The assignment model requires exactly one
//! occupant per room per day, so every idle day is filled with placeholder
//! stays: spans bridging the arrival days before the first departure, spans
//! from each late departure to one day past the schedule end, and short
//! per-day stays up to twice the day's minimum stay in between.

use crate::domain::context::{SolverContext, StayIndex};
use crate::domain::date::DateOrd;

/// How many multiples of a day's minimum stay the mid-horizon dummy lengths
/// are allowed to reach. Below two, stays longer than the minimum would be
/// unfairly penalized by the short stays stacked up to extend a gap.
pub const MAX_DUMMY_MULTIPLE: i64 = 2;

/// Generates dummy stays into `ctx` and returns their indices, so the
/// caller can hand them back to [`SolverContext::clear_dummy_stays`] once
/// the solve is done. All dummy stays are allowable in every room type
/// present in the problem.
pub fn generate(ctx: &mut SolverContext) -> Vec<StayIndex> {
    let room_types: Vec<String> = ctx.type_to_rooms.keys().cloned().collect();
    let fully_booked = ctx.fully_booked_days();
    let real = &ctx.stays[..ctx.real_stay_count];

    let mut indices = Vec::new();

    let first_departure = real.iter().map(|s| s.end).min().expect("at least one real stay");
    let last_arrival = real.iter().map(|s| s.start).max().expect("at least one real stay");

    // Rule 1: dummies spanning each consecutive pair of distinct arrival
    // days at or before the first departure.
    let mut arrivals_before_any_dep: Vec<DateOrd> = real.iter().map(|s| s.start).filter(|&a| a <= first_departure).collect();
    if ctx.schedule_start < ctx.min_start {
        arrivals_before_any_dep.push(ctx.schedule_start);
    }
    arrivals_before_any_dep.push(first_departure);
    arrivals_before_any_dep.sort();
    arrivals_before_any_dep.dedup();

    // Rule 2: dummies spanning every distinct departure day at or after the
    // last arrival, through to one day past scheduleEnd.
    let mut departures_after_last_arrival: Vec<DateOrd> = real.iter().map(|s| s.end).filter(|&d| d >= last_arrival).collect();
    departures_after_last_arrival.push(last_arrival);
    departures_after_last_arrival.sort();
    departures_after_last_arrival.dedup();

    for w in arrivals_before_any_dep.windows(2) {
        let (start, end) = (w[0], w[1]);
        indices.push(ctx.push_dummy(start, end, room_types.clone()));
    }

    for &start in &departures_after_last_arrival {
        let end = ctx.schedule_end.succ();
        indices.push(ctx.push_dummy(start, end, room_types.clone()));
    }

    // Rule 3: between the first departure and the last arrival, fill each
    // day with short dummies up to `minStayByDay[d] * MAX_DUMMY_MULTIPLE`,
    // stopping once a dummy would land on a fully-booked day.
    let mut d = ctx.schedule_start;
    while d < ctx.schedule_end {
        let min_stay_for_day = ctx.min_stay_on(d);
        let mut done = false;
        for length in 1..=(min_stay_for_day * MAX_DUMMY_MULTIPLE) {
            if done {
                continue;
            }
            if check_in_feasibility(ctx, length, d) {
                continue;
            }
            if d < first_departure.add(-(min_stay_for_day as i32)) || d > last_arrival.add(min_stay_for_day as i32) {
                continue;
            }
            if fully_booked.contains(&d) {
                continue;
            }
            if d.add(length as i32) <= ctx.schedule_end.succ() {
                indices.push(ctx.push_dummy(d, d.add(length as i32), room_types.clone()));
            }
            if fully_booked.contains(&d.add(length as i32)) {
                done = true;
            }
        }
        d = d.succ();
    }

    indices
}

/// Every branch returns `false`: no candidate dummy is ever suppressed,
/// including ones that cross the schedule-start boundary, as long as they
/// cover enough of the pre-start region.
fn check_in_feasibility(ctx: &SolverContext, length: i64, day: DateOrd) -> bool {
    if day < ctx.schedule_start && length < (ctx.schedule_start - day) as i64 {
        return false;
    }
    if day.add(length as i32) > ctx.schedule_end {
        return false;
    }
    if day >= ctx.schedule_end.add(-1) && length < (ctx.schedule_end - day) as i64 {
        return false;
    }
    false
}
