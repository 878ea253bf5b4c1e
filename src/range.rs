use std::str::FromStr;

use anyhow::{Error, bail};
use chrono::{DateTime, Months, TimeDelta, Utc};

/// Look-back windows offered by the dashboard's history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastHour => "1h",
            TimeRange::LastDay => "24h",
            TimeRange::LastWeek => "7d",
            TimeRange::LastMonth => "1m",
            TimeRange::All => "all",
        }
    }

    /// Start of the window ending at `now`, or `None` for the whole history.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::LastHour => Some(now - TimeDelta::hours(1)),
            TimeRange::LastDay => Some(now - TimeDelta::hours(24)),
            TimeRange::LastWeek => Some(now - TimeDelta::days(7)),
            TimeRange::LastMonth => Some(
                now.checked_sub_months(Months::new(1))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
            TimeRange::All => None,
        }
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeRange::LastHour),
            "24h" => Ok(TimeRange::LastDay),
            "7d" => Ok(TimeRange::LastWeek),
            "1m" => Ok(TimeRange::LastMonth),
            "all" => Ok(TimeRange::All),
            _ => bail!("unknown time range: {} (expected 1h, 24h, 7d, 1m or all)", s),
        }
    }
}
