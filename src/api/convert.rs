//! Converts domain-level solve results into the wire [`ResultDto`] shape,
//! with every date rendered as an ISO string.

use std::collections::HashMap;

use crate::api::dto::{AssignmentDto, AvoidedStayDto, QualityComparisonEntryDto, ReOptimizedPlanDto, ResultDto, RoomChangeComparisonEntryDto};
use crate::domain::date::DateOrd;
use crate::domain::result::{AvoidedStay, PlanAssignment};
use crate::domain::solve::SolveOutcome;

fn assignment_dto(a: &PlanAssignment) -> AssignmentDto {
    AssignmentDto {
        name: a.name.clone(),
        id: a.id.clone(),
        is_locked: a.is_fixed,
        assigned_room: a.room.clone(),
        arrival: a.arrival.to_iso(),
        length: a.length,
        adjacency_group: a.adjacency_group.clone(),
        test_stay: a.test,
        split_group: a.split_group,
    }
}

fn avoided_map(m: &HashMap<DateOrd, Vec<AvoidedStay>>) -> HashMap<String, Vec<AvoidedStayDto>> {
    m.iter().map(|(day, stays)| (day.to_iso(), stays.iter().map(|s| AvoidedStayDto { arrival: s.arrival.to_iso(), length: s.length }).collect())).collect()
}

fn date_keyed(m: &HashMap<DateOrd, i64>) -> HashMap<String, i64> {
    m.iter().map(|(d, v)| (d.to_iso(), *v)).collect()
}

fn flag_map(days: &[DateOrd]) -> HashMap<String, i64> {
    days.iter().map(|d| (d.to_iso(), 1)).collect()
}

pub fn to_result_dto(outcome: &SolveOutcome) -> ResultDto {
    ResultDto {
        problem_id: outcome.problem_id.clone(),
        succeeded: outcome.succeeded,
        message: outcome.message.clone(),
        current_schedule_infeasible: outcome.current_schedule_infeasible,
        new_reservation_infeasible: outcome.new_reservation_infeasible,
        initial_optimization_time: outcome.initial_optimization_time,
        total_time: outcome.total_time,
        schedule_start: outcome.schedule_start.to_iso(),
        schedule_end: outcome.schedule_end.to_iso(),
        rooms: outcome.rooms.clone(),
        optimized_plan: outcome.optimized_plan.iter().map(assignment_dto).collect(),
        re_optimized_plans: outcome
            .re_optimized_plans
            .iter()
            .map(|p| ReOptimizedPlanDto { day: p.day.to_iso(), test_length: p.test_length, optimized_plan: p.plan.iter().map(assignment_dto).collect() })
            .collect(),
        closed_arrivals: flag_map(&outcome.closed_arrivals),
        closed_departures: flag_map(&outcome.closed_departures),
        min_stays: date_keyed(&outcome.min_stays),
        max_stays: date_keyed(&outcome.max_stays),
        non_adjacent_assignments: outcome.non_adjacent_assignments.clone(),
        stays_avoided_by_ca: avoided_map(&outcome.stays_avoided_by_ca),
        stays_avoided_by_cd: avoided_map(&outcome.stays_avoided_by_cd),
        stays_avoided_by_max: avoided_map(&outcome.stays_avoided_by_max),
        initial_plan: outcome.initial_plan.as_ref().map(|plan| plan.iter().map(assignment_dto).collect()),
        initial_min_stays: outcome.initial_min_stays.as_ref().map(date_keyed),
        quality_comparison: outcome
            .quality_comparison
            .as_ref()
            .map(|q| q.iter().map(|(&k, &(initial, optimized))| (k, QualityComparisonEntryDto { initial, optimized })).collect()),
        room_change_comparison: outcome
            .room_change_comparison
            .as_ref()
            .map(|q| q.iter().map(|(k, &(initial, optimized))| (k.clone(), RoomChangeComparisonEntryDto { initial, optimized })).collect()),
    }
}
