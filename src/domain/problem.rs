use std::collections::HashMap;

use crate::api::dto::ProblemDto;
use crate::domain::date::{DateOrd, DAY_KEYS};
use crate::domain::reservation::Reservation;
use crate::domain::room::{validate_adjacency, Room};
use crate::error::{Error, Result};

/// A date-range override of the default minimum stay, inclusive on both ends.
#[derive(Debug, Clone)]
pub struct MinStayByDate {
    pub start: DateOrd,
    pub end: DateOrd,
    pub minimum_stay: i64,
}

/// The immutable, parsed representation of a problem document.
///
/// Built once from the input JSON and never mutated afterwards; every
/// downstream component only reads from it.
#[derive(Debug, Clone)]
pub struct Problem {
    pub problem_id: String,
    pub reservations: Vec<Reservation>,
    pub new_reservations: Vec<Reservation>,
    pub rooms: Vec<Room>,
    pub minimum_stay: i64,
    pub minimum_stay_by_day: HashMap<&'static str, i64>,
    pub minimum_stay_by_date: Vec<MinStayByDate>,
    pub request_start_date: Option<DateOrd>,
    pub request_end_date: Option<DateOrd>,
    pub restrictions_for_initial_plan: bool,
    pub test_new_booking: bool,
}

impl Problem {
    pub fn from_dto(dto: ProblemDto) -> Result<Self> {
        if dto.problem_id.trim().is_empty() {
            return Err(Error::InvalidInput("Input data requires a problem ID".to_string()));
        }
        if dto.reservations.is_empty() {
            return Err(Error::InvalidInput("Input data does not contain reservations".to_string()));
        }
        if dto.rooms.is_empty() {
            return Err(Error::InvalidInput("Input data must contain room information".to_string()));
        }

        let reservations = dto.reservations.iter().map(|r| Reservation::from_dto(r, false)).collect::<Result<Vec<_>>>()?;
        // Candidate new reservations are always marked `test`, independent of
        // `testNewBooking` (which instead gates restriction re-optimization downstream).
        let new_reservations = dto.new_reservations.iter().map(|r| Reservation::from_dto(r, true)).collect::<Result<Vec<_>>>()?;

        let rooms: Vec<Room> = dto.rooms.iter().map(Room::from_dto).collect();
        validate_adjacency(&rooms)?;

        let minimum_stay = dto.minimum_stay.unwrap_or(5);
        if minimum_stay < 1 {
            return Err(Error::InvalidInput("min stay must be a positive integer".to_string()));
        }

        for (key, value) in &dto.minimum_stay_by_day {
            if !DAY_KEYS.contains(&key.as_str()) {
                return Err(Error::InvalidInput(format!("unknown day-of-week key '{key}' in MinimumStayByDay")));
            }
            if *value < 1 {
                return Err(Error::InvalidInput(format!("min stay for '{key}' must be a positive integer")));
            }
        }
        let mut minimum_stay_by_day: HashMap<&'static str, i64> = HashMap::new();
        for key in DAY_KEYS {
            let v = dto.minimum_stay_by_day.get(key).copied().unwrap_or(minimum_stay);
            minimum_stay_by_day.insert(key, v);
        }

        let mut minimum_stay_by_date = Vec::with_capacity(dto.minimum_stay_by_date.len());
        for entry in &dto.minimum_stay_by_date {
            if entry.minimum_stay < 1 {
                return Err(Error::InvalidInput(format!("min stay for range {}..{} must be a positive integer", entry.start, entry.end)));
            }
            minimum_stay_by_date.push(MinStayByDate {
                start: DateOrd::parse(&entry.start)?,
                end: DateOrd::parse(&entry.end)?,
                minimum_stay: entry.minimum_stay,
            });
        }

        let request_start_date = dto.request_start_date.as_deref().map(DateOrd::parse).transpose()?;
        let request_end_date = dto.request_end_date.as_deref().map(DateOrd::parse).transpose()?;

        Ok(Problem {
            problem_id: dto.problem_id,
            reservations,
            new_reservations,
            rooms,
            minimum_stay,
            minimum_stay_by_day,
            minimum_stay_by_date,
            request_start_date,
            request_end_date,
            restrictions_for_initial_plan: dto.restrictions_for_initial_plan,
            test_new_booking: dto.test_new_booking,
        })
    }

    /// The minimum stay in effect on `day`: the problem default, overridden
    /// by the day-of-week table, overridden by any matching date range.
    pub fn minimum_stay_on(&self, day: DateOrd) -> i64 {
        let mut value = self.minimum_stay;
        if let Some(v) = self.minimum_stay_by_day.get(day.weekday_key()) {
            value = *v;
        }
        for range in &self.minimum_stay_by_date {
            if day >= range.start && day <= range.end {
                value = range.minimum_stay;
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::{MinimumStayByDateDto, ReservationDto, RoomDto};

    fn base_dto() -> ProblemDto {
        ProblemDto {
            problem_id: "P1".to_string(),
            reservations: vec![ReservationDto {
                name: "A".to_string(),
                id: None,
                arrival: "2026-01-01".to_string(),
                length: 3,
                adjacency_group: None,
                is_locked: false,
                assigned_room: None,
                room_type: None,
                allowable_room_types: vec![],
                type_order: vec![],
                split_group: None,
            }],
            rooms: vec![RoomDto { room_number: "101".to_string(), room_type: None, adjacent_rooms: vec![] }],
            new_reservations: vec![],
            minimum_stay: None,
            minimum_stay_by_day: HashMap::new(),
            minimum_stay_by_date: vec![],
            request_start_date: None,
            request_end_date: None,
            restrictions_for_initial_plan: false,
            test_new_booking: false,
        }
    }

    #[test]
    fn rejects_missing_problem_id() {
        let mut dto = base_dto();
        dto.problem_id = "".to_string();
        assert!(Problem::from_dto(dto).is_err());
    }

    #[test]
    fn rejects_unknown_day_key() {
        let mut dto = base_dto();
        dto.minimum_stay_by_day.insert("Funday".to_string(), 3);
        assert!(Problem::from_dto(dto).is_err());
    }

    #[test]
    fn date_range_override_wins_over_day_of_week() {
        let mut dto = base_dto();
        dto.minimum_stay_by_day.insert("Thu".to_string(), 2);
        dto.minimum_stay_by_date.push(MinimumStayByDateDto { start: "2026-01-01".to_string(), end: "2026-01-07".to_string(), minimum_stay: 7 });
        let problem = Problem::from_dto(dto).unwrap();
        // 2026-01-01 is a Thursday; the date-range override must still win.
        assert_eq!(problem.minimum_stay_on(DateOrd::parse("2026-01-01").unwrap()), 7);
    }

    #[test]
    fn rejects_locked_reservation_without_room() {
        let mut dto = base_dto();
        dto.reservations[0].is_locked = true;
        assert!(Problem::from_dto(dto).is_err());
    }
}
