use crate::api::dto::ReservationDto;
use crate::domain::date::DateOrd;
use crate::domain::room::DEFAULT_ROOM_TYPE;
use crate::error::{Error, Result};

/// A single reservation, as carried inside the solver after parsing.
///
/// Distinct from a [`crate::domain::context::Stay`]: a `Reservation` is the
/// problem-level record (name, policy fields); a `Stay` is the derived
/// `(start, end)` interval keyed by a stable internal index that the solver
/// actually reasons about. `requested_allowable_types` is resolved into the
/// final allowable-type list when the solver context is built, since that
/// resolution depends on a per-run flag (whether additional types may be
/// considered), not on the reservation alone.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub name: String,
    pub id: String,
    pub arrival: DateOrd,
    pub length: i64,
    pub room_type: String,
    pub requested_allowable_types: Vec<String>,
    pub type_order: Vec<String>,
    pub adj_group: Option<String>,
    pub locked: bool,
    pub assigned_room: Option<String>,
    pub test: bool,
    pub split_group: Option<i64>,
}

impl Reservation {
    pub fn from_dto(dto: &ReservationDto, test: bool) -> Result<Self> {
        if dto.length < 1 {
            return Err(Error::InvalidInput(format!("reservation '{}' has non-positive length {}", dto.name, dto.length)));
        }
        let arrival = DateOrd::parse(&dto.arrival)?;
        let room_type = dto.room_type.clone().unwrap_or_else(|| DEFAULT_ROOM_TYPE.to_string());

        if dto.is_locked && dto.assigned_room.is_none() {
            return Err(Error::InvalidInput(format!("locked reservation '{}' has no assigned room", dto.name)));
        }

        Ok(Reservation {
            name: dto.name.clone(),
            id: dto.id.clone().unwrap_or_else(|| dto.name.clone()),
            arrival,
            length: dto.length,
            room_type,
            requested_allowable_types: dto.allowable_room_types.clone(),
            type_order: dto.type_order.clone(),
            adj_group: dto.adjacency_group.clone().filter(|g| !g.is_empty() && g != "None"),
            locked: dto.is_locked,
            assigned_room: dto.assigned_room.clone(),
            test,
            split_group: dto.split_group,
        })
    }

    pub fn end(&self) -> DateOrd {
        self.arrival.add(self.length as i32)
    }
}
