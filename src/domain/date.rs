use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// A day ordinal, counted from a fixed epoch (`chrono`'s proleptic Gregorian
/// day number). All horizon arithmetic is plain integer arithmetic on this
/// type; ISO "YYYY-MM-DD" strings are parsed/formatted only at the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateOrd(pub i32);

impl DateOrd {
    pub fn parse(s: &str) -> Result<Self> {
        let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| Error::InvalidInput(format!("not a valid ISO date: '{s}'")))?;
        Ok(DateOrd(d.num_days_from_ce()))
    }

    pub fn to_iso(self) -> String {
        NaiveDate::from_num_days_from_ce_opt(self.0).map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| format!("<invalid-ord-{}>", self.0))
    }

    pub fn weekday_key(self) -> &'static str {
        let d = NaiveDate::from_num_days_from_ce_opt(self.0).expect("ordinal constructed from a valid date");
        match d.format("%a").to_string().as_str() {
            "Mon" => "Mon",
            "Tue" => "Tue",
            "Wed" => "Wed",
            "Thu" => "Thu",
            "Fri" => "Fri",
            "Sat" => "Sat",
            _ => "Sun",
        }
    }

    pub fn succ(self) -> DateOrd {
        DateOrd(self.0 + 1)
    }

    pub fn add(self, days: i32) -> DateOrd {
        DateOrd(self.0 + days)
    }
}

impl std::ops::Sub for DateOrd {
    type Output = i32;
    fn sub(self, rhs: DateOrd) -> i32 {
        self.0 - rhs.0
    }
}

impl std::fmt::Display for DateOrd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_iso())
    }
}

pub const DAY_KEYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
