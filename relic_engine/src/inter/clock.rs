use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

use crate::vars::{VarError, VariableStore};

/// Broken-down UTC time; `month` and `day` start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WallClock {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl WallClock {
    pub fn from_datetime(time: &DateTime<Utc>) -> Self {
        WallClock {
            year: u32::try_from(time.year()).unwrap_or(0),
            month: time.month(),
            day: time.day(),
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }

    /// `None` when `seconds` is outside the range chrono can represent.
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(|time| Self::from_datetime(&time))
    }

    /// Writes the clock into numbered variables 5 to 11.
    pub fn store(&self, vars: &mut VariableStore) -> Result<(), VarError> {
        vars.write_var(5, self.year)?;
        vars.write_var(6, self.month)?;
        vars.write_var(7, 0)?;
        vars.write_var(8, self.day)?;
        vars.write_var(9, self.hour)?;
        vars.write_var(10, self.minute)?;
        vars.write_var(11, self.second)
    }
}

pub trait TimeSource {
    fn now(&self) -> WallClock;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> WallClock {
        WallClock::from_datetime(&Utc::now())
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub WallClock);

impl TimeSource for FixedClock {
    fn now(&self) -> WallClock {
        self.0
    }
}
