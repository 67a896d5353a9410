use std::collections::HashSet;

use crate::api::dto::RoomDto;
use crate::error::{Error, Result};

pub const DEFAULT_ROOM_TYPE: &str = "Default";

/// A physical room: its type and the set of room numbers it is adjacent to.
#[derive(Debug, Clone)]
pub struct Room {
    pub number: String,
    pub room_type: String,
    pub adjacent: HashSet<String>,
}

impl Room {
    pub fn from_dto(dto: &RoomDto) -> Self {
        Room {
            number: dto.room_number.clone(),
            room_type: dto.room_type.clone().unwrap_or_else(|| DEFAULT_ROOM_TYPE.to_string()),
            adjacent: dto.adjacent_rooms.iter().cloned().collect(),
        }
    }
}

/// Validates that every `adjacent` entry names a room that actually exists.
pub fn validate_adjacency(rooms: &[Room]) -> Result<()> {
    let numbers: HashSet<&str> = rooms.iter().map(|r| r.number.as_str()).collect();
    for r in rooms {
        for adj in &r.adjacent {
            if !numbers.contains(adj.as_str()) {
                return Err(Error::InvalidInput(format!("room '{}' lists adjacent room '{adj}' which does not exist", r.number)));
            }
        }
    }
    Ok(())
}
