//! Derived indices built once from a [`Problem`] and consumed read-mostly by
//! every later stage: room maps, the combined reservation list, per-stay
//! allowable types, fixed/fixed-for-solver bookkeeping, schedule bounds, and
//! the per-day minimum-stay table. Stays and rooms are referenced by dense
//! integer indices into append-only arenas rather than by owning references.

use std::collections::{HashMap, HashSet};

use crate::domain::date::DateOrd;
use crate::domain::problem::Problem;
use crate::domain::reservation::Reservation;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StayIndex(pub u32);

impl StayIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomIndex(pub u32);

impl RoomIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A stay as the solver reasons about it: a `(start, end)` interval keyed by
/// a stable [`StayIndex`], carrying only the fields later components need.
/// Distinct from [`Reservation`], which is the problem-level record this is
/// derived from.
#[derive(Debug, Clone)]
pub struct Stay {
    pub name: String,
    pub id: String,
    pub start: DateOrd,
    pub end: DateOrd,
    pub length: i64,
    pub locked: bool,
    pub assigned_room: Option<String>,
    pub allowable_types: Vec<String>,
    pub test: bool,
    pub split_group: Option<i64>,
    pub is_dummy: bool,
}

impl Stay {
    pub fn covers(&self, day: DateOrd) -> bool {
        self.start <= day && day < self.end
    }
}

/// Flags controlling how allowable-room-types and fixed assignments are
/// resolved. Different solver invocations (plain solve vs. the two
/// feasibility-runner variants) pass different combinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextOptions {
    pub with_additional_room_types: bool,
    pub fit_new_reservation_in_initial_plan: bool,
}

#[derive(Debug, Clone)]
pub struct SolverContext {
    pub stays: Vec<Stay>,
    pub real_stay_count: usize,

    pub room_numbers: Vec<String>,
    pub room_index: HashMap<String, RoomIndex>,
    pub type_to_rooms: HashMap<String, Vec<RoomIndex>>,
    pub rooms_to_type: HashMap<RoomIndex, String>,
    pub room_adjacency: HashMap<RoomIndex, Vec<RoomIndex>>,
    pub adjacent_rooms: HashSet<RoomIndex>,

    pub stay_adjacency_groups: HashMap<String, Vec<StayIndex>>,
    pub stay_to_adj_group: HashMap<StayIndex, String>,
    pub split_groups: HashMap<i64, Vec<StayIndex>>,

    pub fixed_rooms: HashMap<StayIndex, String>,
    pub fixed_for_solver: HashMap<StayIndex, Option<String>>,

    pub min_start: DateOrd,
    pub max_start: DateOrd,
    pub max_end: DateOrd,
    pub schedule_start: DateOrd,
    pub schedule_end: DateOrd,
    pub request_start: Option<DateOrd>,
    pub request_end: Option<DateOrd>,

    pub min_stay_by_day: HashMap<DateOrd, i64>,
    pub default_minimum_stay: i64,

    pub current_reservations_without_assigned_room: usize,
    pub exceptions: Vec<String>,
}

impl SolverContext {
    pub fn build(problem: &Problem, options: ContextOptions) -> Result<Self> {
        let mut room_numbers = Vec::with_capacity(problem.rooms.len());
        let mut room_index = HashMap::new();
        let mut type_to_rooms: HashMap<String, Vec<RoomIndex>> = HashMap::new();
        let mut rooms_to_type = HashMap::new();
        let mut room_adjacency = HashMap::new();
        let mut adjacent_rooms = HashSet::new();

        for room in &problem.rooms {
            let idx = RoomIndex(room_numbers.len() as u32);
            room_numbers.push(room.number.clone());
            room_index.insert(room.number.clone(), idx);
            type_to_rooms.entry(room.room_type.clone()).or_default().push(idx);
            rooms_to_type.insert(idx, room.room_type.clone());
        }
        for room in &problem.rooms {
            let this_idx = room_index[&room.number];
            let neighbours: Vec<RoomIndex> = room.adjacent.iter().filter_map(|n| room_index.get(n).copied()).collect();
            if !neighbours.is_empty() {
                room_adjacency.insert(this_idx, neighbours);
                adjacent_rooms.insert(this_idx);
            }
        }

        let available_room_types: Vec<String> = type_to_rooms.keys().cloned().collect();

        let combined: Vec<&Reservation> = problem.reservations.iter().chain(problem.new_reservations.iter()).collect();

        let mut stays = Vec::with_capacity(combined.len());
        let mut stay_adjacency_groups: HashMap<String, Vec<StayIndex>> = HashMap::new();
        let mut stay_to_adj_group = HashMap::new();
        let mut split_groups: HashMap<i64, Vec<StayIndex>> = HashMap::new();
        for r in &combined {
            if let Some(sg) = r.split_group {
                split_groups.entry(sg).or_default();
            }
        }

        let mut fixed_rooms = HashMap::new();
        let mut fixed_for_solver = HashMap::new();

        let mut start_dates = Vec::with_capacity(combined.len());
        let mut end_dates = Vec::with_capacity(combined.len());

        let mut current_reservations_without_assigned_room = 0usize;
        let mut exceptions = Vec::new();

        for (i, r) in combined.iter().enumerate() {
            let idx = StayIndex(i as u32);
            let start = r.arrival;
            let end = r.end();
            start_dates.push(start);
            end_dates.push(end);

            let allowable_types = resolve_allowable_types(r, &available_room_types, options.with_additional_room_types);

            let room_is_valid = r.assigned_room.as_deref().is_some_and(|n| room_index.contains_key(n));

            if r.locked {
                if let Some(room) = &r.assigned_room {
                    fixed_rooms.insert(idx, room.clone());
                }
                if !room_is_valid {
                    current_reservations_without_assigned_room += 1;
                    exceptions.push(r.name.clone());
                }
            }

            if options.fit_new_reservation_in_initial_plan && !r.test {
                fixed_for_solver.insert(idx, r.assigned_room.clone());
                if !room_is_valid {
                    current_reservations_without_assigned_room += 1;
                    exceptions.push(r.name.clone());
                }
            }

            let before_request = problem.request_start_date.is_some_and(|rs| start < rs);
            let after_request = problem.request_end_date.is_some_and(|re| end > re);
            if before_request || after_request {
                if !room_is_valid {
                    current_reservations_without_assigned_room += 1;
                    exceptions.push(r.name.clone());
                }
                fixed_for_solver.insert(idx, r.assigned_room.clone());
            }
            if after_request {
                fixed_for_solver.insert(idx, r.assigned_room.clone());
            }

            if !room_is_valid && problem.restrictions_for_initial_plan {
                current_reservations_without_assigned_room += 1;
                let new_booking = if r.test { " (New booking)" } else { "" };
                exceptions.push(format!("{}{new_booking}", r.name));
            }

            if let Some(sg) = r.split_group {
                split_groups.entry(sg).or_default().push(idx);
            }

            if let Some(group) = &r.adj_group {
                stay_adjacency_groups.entry(group.clone()).or_default().push(idx);
                stay_to_adj_group.insert(idx, group.clone());
            }

            stays.push(Stay {
                name: r.name.clone(),
                id: r.id.clone(),
                start,
                end,
                length: r.length,
                locked: r.locked,
                assigned_room: r.assigned_room.clone(),
                allowable_types,
                test: r.test,
                split_group: r.split_group,
                is_dummy: false,
            });
        }

        if !exceptions.is_empty() {
            let body: String = exceptions.iter().map(|e| format!("{e}\n")).collect();
            log::warn!("reservations missing a valid assigned room:\n{body}Must be assigned rooms externally, or the optimization must be adjusted to include them.");
        }

        let min_start = *start_dates.iter().min().ok_or_else(|| Error::InvalidInput("no reservations to schedule".to_string()))?;
        let max_start = *start_dates.iter().max().unwrap();
        let max_end = *end_dates.iter().max().unwrap();

        let schedule_start = match problem.request_start_date {
            Some(rs) => rs.min(min_start),
            None => min_start,
        };
        let schedule_end = match problem.request_end_date {
            Some(re) => re.max(max_end),
            None => max_end,
        };

        let mut min_stay_by_day = HashMap::new();
        let mut d = schedule_start;
        while d <= schedule_end {
            min_stay_by_day.insert(d, problem.minimum_stay_on(d));
            d = d.succ();
        }

        let real_stay_count = stays.len();

        Ok(SolverContext {
            stays,
            real_stay_count,
            room_numbers,
            room_index,
            type_to_rooms,
            rooms_to_type,
            room_adjacency,
            adjacent_rooms,
            stay_adjacency_groups,
            stay_to_adj_group,
            split_groups,
            fixed_rooms,
            fixed_for_solver,
            min_start,
            max_start,
            max_end,
            schedule_start,
            schedule_end,
            request_start: problem.request_start_date,
            request_end: problem.request_end_date,
            min_stay_by_day,
            default_minimum_stay: problem.minimum_stay,
            current_reservations_without_assigned_room,
            exceptions,
        })
    }

    pub fn min_stay_on(&self, day: DateOrd) -> i64 {
        self.min_stay_by_day.get(&day).copied().unwrap_or(1)
    }

    pub fn room_count(&self) -> usize {
        self.room_numbers.len()
    }

    /// Appends a real stay (e.g. a one-night fragment produced by the
    /// Feasibility Runner) after the context has already been built. Must
    /// be called before any dummy stay is pushed, so dummies stay at the
    /// tail of the arena.
    pub fn push_real_stay(&mut self, stay: Stay) -> StayIndex {
        debug_assert_eq!(self.stays.len(), self.real_stay_count, "real stays must be appended before dummy stays");
        let idx = StayIndex(self.stays.len() as u32);
        self.stays.push(stay);
        self.real_stay_count += 1;
        idx
    }

    /// Undoes a [`SolverContext::push_real_stay`] call, for probes that add
    /// a candidate stay just to test feasibility and then discard it. Only
    /// valid when `stay` is the most recently pushed real stay and no dummy
    /// stays exist yet.
    pub fn remove_last_real_stay(&mut self, stay: StayIndex) {
        debug_assert_eq!(stay.index(), self.real_stay_count - 1, "can only remove the most recently pushed real stay");
        debug_assert_eq!(self.stays.len(), self.real_stay_count, "dummy stays must be cleared before removing a real stay");
        self.stays.pop();
        self.real_stay_count -= 1;
    }

    pub fn occupancy_on(&self, day: DateOrd) -> usize {
        self.stays[..self.real_stay_count].iter().filter(|s| s.covers(day)).count()
    }

    /// Days within the schedule horizon on which every room is covered by a
    /// real stay, plus a terminal sentinel one day past the schedule end.
    /// The dummy generator and the restrictions deriver both rely on this
    /// notion of a fully occupied day.
    pub fn fully_booked_days(&self) -> Vec<DateOrd> {
        let mut days = Vec::new();
        let mut d = self.schedule_start;
        while d < self.schedule_end {
            if self.occupancy_on(d) == self.room_count() {
                days.push(d);
            }
            d = d.succ();
        }
        days.push(self.schedule_end.succ());
        days
    }

    /// Appends a dummy stay and returns its index. Dummies are always
    /// appended at the tail so [`SolverContext::clear_dummy_stays`] can
    /// remove them by truncation.
    pub fn push_dummy(&mut self, start: DateOrd, end: DateOrd, allowable_types: Vec<String>) -> StayIndex {
        let idx = StayIndex(self.stays.len() as u32);
        self.stays.push(Stay {
            name: format!("Dummy[{},{}]", start.to_iso(), end.to_iso()),
            id: format!("dummy-{}", idx.0),
            start,
            end,
            length: (end - start) as i64,
            locked: false,
            assigned_room: None,
            allowable_types,
            test: false,
            split_group: None,
            is_dummy: true,
        });
        idx
    }

    /// Removes every dummy stay added since the context was built.
    pub fn clear_dummy_stays(&mut self) {
        self.stays.truncate(self.real_stay_count);
    }

    pub fn stays_covering(&self, day: DateOrd) -> impl Iterator<Item = StayIndex> + '_ {
        self.stays.iter().enumerate().filter(move |(_, s)| s.covers(day)).map(|(i, _)| StayIndex(i as u32))
    }
}

/// A reservation with a non-default explicit type, or a non-empty requested
/// list, starts from `[type]` (plus the requested list, only when additional
/// types are allowed for this run); otherwise it may take any room type
/// present in the problem. The result is deduplicated and, when a type order
/// is given, sorted by it; types absent from the order rank first, not last.
fn resolve_allowable_types(r: &Reservation, available_room_types: &[String], with_additional_room_types: bool) -> Vec<String> {
    let mut allowable = if r.room_type != crate::domain::room::DEFAULT_ROOM_TYPE || !r.requested_allowable_types.is_empty() {
        let mut v = vec![r.room_type.clone()];
        if with_additional_room_types {
            v.extend(r.requested_allowable_types.iter().cloned());
        }
        v
    } else {
        available_room_types.to_vec()
    };

    let mut seen = HashSet::new();
    allowable.retain(|t| seen.insert(t.clone()));

    if !r.type_order.is_empty() {
        let order: HashMap<&str, usize> = r.type_order.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();
        allowable.sort_by_key(|t| order.get(t.as_str()).copied().unwrap_or(0));
    }

    allowable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{ProblemDto, ReservationDto, RoomDto};
    use std::collections::HashMap as Map;

    fn dto(name: &str, arrival: &str, length: i64, locked: bool, assigned: Option<&str>) -> ReservationDto {
        ReservationDto {
            name: name.to_string(),
            id: None,
            arrival: arrival.to_string(),
            length,
            adjacency_group: None,
            is_locked: locked,
            assigned_room: assigned.map(str::to_string),
            room_type: None,
            allowable_room_types: vec![],
            type_order: vec![],
            split_group: None,
        }
    }

    fn problem_with(reservations: Vec<ReservationDto>) -> Problem {
        Problem::from_dto(ProblemDto {
            problem_id: "P".to_string(),
            reservations,
            rooms: vec![
                RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec!["102".to_string()] },
                RoomDto { room_number: "102".to_string(), room_type: None, adjacent_rooms: vec!["101".to_string()] },
            ],
            new_reservations: vec![],
            minimum_stay: Some(5),
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
    fn locked_reservation_without_room_is_missing_assignment() {
        let problem = problem_with(vec![dto("A", "2026-01-01", 3, true, Some("101"))]);
        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        assert_eq!(ctx.fixed_rooms[&StayIndex(0)], "101");
        assert_eq!(ctx.current_reservations_without_assigned_room, 0);
    }

    #[test]
    fn adjacency_maps_are_filtered_to_known_rooms() {
        let problem = problem_with(vec![dto("A", "2026-01-01", 3, false, None)]);
        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        assert!(ctx.adjacent_rooms.contains(&ctx.room_index["101"]));
        assert!(ctx.room_adjacency[&ctx.room_index["101"]].contains(&ctx.room_index["102"]));
    }

    #[test]
    fn default_type_with_no_allowable_list_opens_every_room_type() {
        let problem = problem_with(vec![dto("A", "2026-01-01", 3, false, None)]);
        let ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        assert_eq!(ctx.stays[0].allowable_types.len(), 1);
        assert_eq!(ctx.stays[0].allowable_types[0], crate::domain::room::DEFAULT_ROOM_TYPE);
    }

    #[test]
    fn dummy_push_and_clear_round_trips() {
        let problem = problem_with(vec![dto("A", "2026-01-01", 3, false, None)]);
        let mut ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
        let before = ctx.stays.len();
        ctx.push_dummy(DateOrd::parse("2026-01-05").unwrap(), DateOrd::parse("2026-01-06").unwrap(), vec![]);
        assert_eq!(ctx.stays.len(), before + 1);
        ctx.clear_dummy_stays();
        assert_eq!(ctx.stays.len(), before);
    }
}
