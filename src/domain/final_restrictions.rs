//! Projects the per-day "starting on this day" bounds produced by
//! [`crate::domain::restrictions`] (optionally refined by the restriction
//! solver) into "covering this day" bounds, then prunes
//! closed-arrival/closed-departure flags already implied by those bounds or
//! by a fully-booked day.

use std::collections::{BTreeSet, HashMap};

use crate::domain::context::SolverContext;
use crate::domain::date::DateOrd;
use crate::domain::restrictions::InitialRestrictions;

#[derive(Debug, Clone)]
pub struct FinalRestrictions {
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
    /// Starting-day max stays as refined by the restriction solver, falling
    /// back to `fixed_max_stay_starting_on_day` where unrefined.
    pub computed_max_stays_starting: HashMap<DateOrd, i64>,
    pub computed_min_stays_starting_on_day: HashMap<DateOrd, i64>,
    pub min_stay_covering_day: HashMap<DateOrd, i64>,
    pub max_stay_covering_day: HashMap<DateOrd, i64>,
}

impl FinalRestrictions {
    pub fn from_initial(initial: &InitialRestrictions) -> Self {
        FinalRestrictions {
            min_stay_starting_on_day: initial.min_stay_starting_on_day.clone(),
            fixed_max_stay_starting_on_day: initial.fixed_max_stay_starting_on_day.clone(),
            absolute_max_stay_starting_on_day: initial.absolute_max_stay_starting_on_day.clone(),
            occupancy_per_day: initial.occupancy_per_day.clone(),
            fully_booked_days: initial.fully_booked_days.clone(),
            first_departure_day: initial.first_departure_day,
            day_rooms_first_filled: initial.day_rooms_first_filled,
            number_of_small_gaps_per_day: initial.number_of_small_gaps_per_day.clone(),
            closed_arrival: initial.closed_arrival.clone(),
            closed_departure: initial.closed_departure.clone(),
            computed_max_stays_starting: initial.fixed_max_stay_starting_on_day.clone(),
            computed_min_stays_starting_on_day: initial.min_stay_starting_on_day.clone(),
            min_stay_covering_day: HashMap::new(),
            max_stay_covering_day: HashMap::new(),
        }
    }

    /// Resets the solver-refined bounds before the restriction solver
    /// recomputes them.
    pub fn clear_computed_stays(&mut self) {
        self.computed_max_stays_starting.clear();
        self.computed_min_stays_starting_on_day.clear();
    }

    pub fn fill(&mut self, ctx: &SolverContext) {
        self.fill_min_stays_covering_day(ctx.max_end);
        self.fill_max_stays_covering_day(ctx);
        self.remove_redundant_restrictions(ctx);
    }

    fn fill_min_stays_covering_day(&mut self, max_end: DateOrd) {
        let entries: Vec<(DateOrd, i64)> = self.min_stay_starting_on_day.iter().map(|(&d, &v)| (d, v)).collect();
        for (day, current_min) in entries {
            for d in 0..current_min {
                let covered = day.add(d as i32);
                match self.min_stay_covering_day.get(&covered) {
                    Some(&existing) => {
                        self.min_stay_covering_day.insert(covered, existing.min(current_min));
                    }
                    None if covered < max_end => {
                        self.min_stay_covering_day.insert(covered, current_min);
                    }
                    None => {}
                }
            }
        }
    }

    fn fill_max_stays_covering_day(&mut self, ctx: &SolverContext) {
        if let Some(first_filled) = self.day_rooms_first_filled {
            let mut d = ctx.schedule_start;
            while d <= first_filled {
                self.max_stay_covering_day.insert(d, (ctx.schedule_end - ctx.schedule_start) as i64);
                d = d.succ();
            }
        }

        let entries: Vec<(DateOrd, i64)> = self.computed_max_stays_starting.iter().map(|(&d, &v)| (d, v)).collect();
        for (day, current_max) in entries {
            for d in 0..current_max {
                let covered = day.add(d as i32);
                match self.max_stay_covering_day.get(&covered) {
                    Some(&existing) if current_max > existing => {
                        self.max_stay_covering_day.insert(covered, current_max);
                    }
                    None if covered < ctx.schedule_end => {
                        self.max_stay_covering_day.insert(covered, current_max);
                    }
                    _ => {}
                }
            }
        }

        let dates: Vec<DateOrd> = self.max_stay_covering_day.keys().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let mut days_to_keep = BTreeSet::new();
        for i in 0..dates.len() {
            let day = dates[i];
            if day <= ctx.schedule_start {
                continue;
            }
            let max_stay_starting_this_day = self.computed_max_stays_starting.get(&day).copied().unwrap_or_else(|| self.fixed_max_stay_starting_on_day[&day]);
            if day.add(max_stay_starting_this_day as i32) >= ctx.schedule_end {
                continue;
            }
            let new_max_stay = self.max_stay_covering_day[&day] == max_stay_starting_this_day;
            let change_in_max_stay = i == 0 || self.max_stay_covering_day[&day] != self.max_stay_covering_day[&dates[i - 1]];
            if new_max_stay || change_in_max_stay {
                days_to_keep.insert(day);
            }
        }
        self.max_stay_covering_day.retain(|day, _| days_to_keep.contains(day));
    }

    fn remove_redundant_restrictions(&mut self, ctx: &SolverContext) {
        let closed_arrival_days: Vec<DateOrd> = self.closed_arrival.keys().copied().collect();
        for day in closed_arrival_days {
            if let (Some(&min_cov), Some(&abs_max)) = (self.min_stay_covering_day.get(&day), self.absolute_max_stay_starting_on_day.get(&day)) {
                if day.add(min_cov as i32) > day.add(abs_max as i32) {
                    self.closed_arrival.remove(&day);
                }
            }
        }

        for &day in &self.fully_booked_days.clone() {
            if day > ctx.max_end {
                continue;
            }
            self.closed_arrival.remove(&day);
            self.closed_departure.remove(&day);

            let Some(&min_stay_after) = self.min_stay_starting_on_day.get(&day.succ()) else { continue };
            for d in 0..min_stay_after {
                self.closed_departure.remove(&day.succ().add(d as i32));
            }
        }
    }
}
