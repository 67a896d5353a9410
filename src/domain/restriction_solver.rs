//! Per-day max-stay refinement. For every day from the first real departure
//! through the last departure, scans candidate stay lengths beyond the
//! fixed-plan max stay and keeps the longest one a feasibility probe
//! confirms, stopping at the first infeasible length (treating longer
//! lengths as infeasible too; a later length is never retried after an
//! earlier one fails). Every feasible probe's full assignment is kept as a
//! re-optimized plan, trial stay included.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::context::{SolverContext, Stay, StayIndex};
use crate::domain::date::DateOrd;
use crate::domain::final_restrictions::FinalRestrictions;
use crate::domain::initial_plan_solver;
use crate::domain::result::{self, PlanAssignment};

/// Advisory stop flag checked between (day, length) probe iterations. The
/// MIP backend itself is bounded by its time limit; this token only lets an
/// outer caller cut the scan short between probes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One alternative plan proving a trial stay `(day, test_length)` fits.
#[derive(Debug, Clone)]
pub struct ReOptimizedPlan {
    pub day: DateOrd,
    pub test_length: i64,
    pub plan: Vec<PlanAssignment>,
}

/// Recomputes `restrictions.computed_max_stays_starting` in place and
/// returns the plans backing every newly proved stay length. Pass
/// `reoptimize = false` to skip the length scan and keep the fixed-plan max
/// stays as-is (the fallback when the initial solve already ran long).
pub fn run(
    ctx: &mut SolverContext,
    restrictions: &mut FinalRestrictions,
    reoptimize: bool,
    non_adjacent_per_group: &HashMap<String, Vec<StayIndex>>,
    cancel: &CancellationToken,
) -> Vec<ReOptimizedPlan> {
    restrictions.clear_computed_stays();
    if let Some(&fixed_at_start) = restrictions.fixed_max_stay_starting_on_day.get(&ctx.schedule_start) {
        restrictions.computed_max_stays_starting.insert(ctx.schedule_start, fixed_at_start);
    }

    let mut plans = Vec::new();

    let mut day = ctx.min_start;
    while day < ctx.max_end {
        if day < restrictions.first_departure_day || cancel.is_cancelled() {
            day = day.succ();
            continue;
        }

        let fixed_max = restrictions.fixed_max_stay_starting_on_day.get(&day).copied().unwrap_or(0);
        if fixed_max == 0 || restrictions.closed_arrival.contains_key(&day) {
            day = day.succ();
            continue;
        }

        restrictions.computed_max_stays_starting.insert(day, fixed_max);
        if !reoptimize {
            day = day.succ();
            continue;
        }

        let mut last_feasible = fixed_max;
        let absolute_max = restrictions.absolute_max_stay_starting_on_day.get(&day).copied().unwrap_or(fixed_max);
        let mut stop_checking = fixed_max == absolute_max;

        for next_length in (fixed_max + 1)..=absolute_max {
            if stop_checking || cancel.is_cancelled() {
                break;
            }
            if restrictions.closed_departure.contains_key(&day.add(next_length as i32)) {
                continue;
            }
            if day.add(next_length as i32) > ctx.schedule_end {
                continue;
            }

            match check_feasibility(ctx, day, next_length, non_adjacent_per_group) {
                Some(plan) => {
                    last_feasible = next_length;
                    plans.push(ReOptimizedPlan { day, test_length: next_length, plan });
                    if day.add(next_length as i32) > ctx.max_end {
                        restrictions.computed_max_stays_starting.insert(day, absolute_max);
                        stop_checking = true;
                    } else {
                        restrictions.computed_max_stays_starting.insert(day, last_feasible);
                    }
                }
                None => {
                    // The smallest infeasible length ends the scan for this
                    // day; longer lengths are assumed infeasible too.
                    restrictions.computed_max_stays_starting.insert(day, last_feasible);
                    stop_checking = true;
                }
            }
        }

        day = day.succ();
    }

    plans
}

/// Probes whether a stay of `length` starting on `day`, open to every room
/// type, can be seated alongside every other stay already in `ctx`. On
/// success returns the full proving plan, trial stay included.
fn check_feasibility(ctx: &mut SolverContext, day: DateOrd, length: i64, non_adjacent_per_group: &HashMap<String, Vec<StayIndex>>) -> Option<Vec<PlanAssignment>> {
    let room_types: Vec<String> = ctx.type_to_rooms.keys().cloned().collect();
    let stay = Stay {
        name: "Test_Max".to_string(),
        id: format!("test-max-{}-{length}", day.to_iso()),
        start: day,
        end: day.add(length as i32),
        length,
        locked: false,
        assigned_room: None,
        allowable_types: room_types,
        test: true,
        split_group: None,
        is_dummy: false,
    };
    let probe_idx = ctx.push_real_stay(stay);
    let plan = initial_plan_solver::probe(ctx, non_adjacent_per_group).and_then(|assignments| result::coalesce_assignments(ctx, &assignments));
    ctx.remove_last_real_stay(probe_idx);
    plan
}
