use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire representation of a single reservation (existing or candidate new).
///
/// Mirrors the problem document's `Reservations`/`NewReservations` entries.
/// Unknown keys are ignored rather than rejected, so documents produced by a
/// newer writer still parse.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReservationDto {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    pub arrival: String,
    pub length: i64,
    #[serde(default)]
    pub adjacency_group: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub assigned_room: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub allowable_room_types: Vec<String>,
    #[serde(default)]
    pub type_order: Vec<String>,
    #[serde(default)]
    pub split_group: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomDto {
    pub room_number: String,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub adjacent_rooms: Vec<String>,
}

/// One `{Start, End, MinimumStay}` entry of `MinimumStayByDate`, inclusive on
/// both ends.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinimumStayByDateDto {
    pub start: String,
    pub end: String,
    pub minimum_stay: i64,
}

/// Problem document accepted by the optimizer core.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProblemDto {
    pub problem_id: String,
    pub reservations: Vec<ReservationDto>,
    pub rooms: Vec<RoomDto>,
    #[serde(default)]
    pub new_reservations: Vec<ReservationDto>,
    #[serde(default)]
    pub minimum_stay: Option<i64>,
    #[serde(default)]
    pub minimum_stay_by_day: HashMap<String, i64>,
    #[serde(default)]
    pub minimum_stay_by_date: Vec<MinimumStayByDateDto>,
    #[serde(default)]
    pub request_start_date: Option<String>,
    #[serde(default)]
    pub request_end_date: Option<String>,
    #[serde(default)]
    pub restrictions_for_initial_plan: bool,
    #[serde(default)]
    pub test_new_booking: bool,
}

/// Wire representation of one coalesced assignment in an output plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentDto {
    pub name: String,
    pub id: String,
    pub is_locked: bool,
    pub assigned_room: String,
    pub arrival: String,
    pub length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjacency_group: Option<String>,
    pub test_stay: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_group: Option<i64>,
}

/// A full alternative plan proving that a trial stay of `TestLength` nights
/// arriving on `Day` can be seated alongside every existing reservation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReOptimizedPlanDto {
    pub day: String,
    pub test_length: i64,
    pub optimized_plan: Vec<AssignmentDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AvoidedStayDto {
    pub arrival: String,
    pub length: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QualityComparisonEntryDto {
    pub initial: i64,
    pub optimized: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomChangeComparisonEntryDto {
    pub initial: i64,
    pub optimized: i64,
}

/// Output document produced by the optimizer core.
///
/// Restriction dictionaries are keyed by ISO date strings; the
/// closed-arrival/closed-departure entries carry the value `1`, matching the
/// flag dictionaries the downstream distribution systems consume.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultDto {
    pub problem_id: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub current_schedule_infeasible: bool,
    pub new_reservation_infeasible: bool,
    pub initial_optimization_time: f64,
    pub total_time: f64,
    pub schedule_start: String,
    pub schedule_end: String,
    pub rooms: Vec<String>,
    pub optimized_plan: Vec<AssignmentDto>,
    pub re_optimized_plans: Vec<ReOptimizedPlanDto>,
    pub closed_arrivals: HashMap<String, i64>,
    pub closed_departures: HashMap<String, i64>,
    pub min_stays: HashMap<String, i64>,
    pub max_stays: HashMap<String, i64>,
    pub non_adjacent_assignments: HashMap<String, Vec<String>>,
    pub stays_avoided_by_ca: HashMap<String, Vec<AvoidedStayDto>>,
    pub stays_avoided_by_cd: HashMap<String, Vec<AvoidedStayDto>>,
    pub stays_avoided_by_max: HashMap<String, Vec<AvoidedStayDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_plan: Option<Vec<AssignmentDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_min_stays: Option<HashMap<String, i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_comparison: Option<HashMap<i64, QualityComparisonEntryDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_change_comparison: Option<HashMap<String, RoomChangeComparisonEntryDto>>,
}
