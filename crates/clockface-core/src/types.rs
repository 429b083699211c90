use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage and wire format for event timestamps. Lexicographic order matches
/// chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date prefix of [`TIMESTAMP_FORMAT`], used as the day key.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Display name used when an identity has no profile or no first name.
pub const FALLBACK_NAME: &str = "Employee";

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

/// Format a day as `YYYY-MM-DD`.
pub fn format_day(day: &NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Profile attributes collected at enrollment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl Profile {
    /// Name shown on the terminal: the first name, or [`FALLBACK_NAME`].
    pub fn display_name(&self) -> &str {
        let name = self.first_name.trim();
        if name.is_empty() {
            FALLBACK_NAME
        } else {
            name
        }
    }
}

/// An enrolled person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub person_id: String,
    pub profile: Profile,
    /// Face template reference held by the recognition service.
    /// `None` until the template has been indexed.
    pub face_id: Option<String>,
    #[serde(with = "timestamp_serde")]
    pub created_at: NaiveDateTime,
}

/// Attendance action recorded for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Login,
    Logout,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "LOGIN",
            Action::Logout => "LOGOUT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown attendance action: {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN" => Ok(Action::Login),
            "LOGOUT" => Ok(Action::Logout),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// One append-only attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub person_id: String,
    #[serde(with = "timestamp_serde")]
    pub timestamp: NaiveDateTime,
    pub action: Action,
}

impl AttendanceEvent {
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// The events of `history` dated `day`, in timestamp order.
pub fn daily_window(history: &[AttendanceEvent], day: NaiveDate) -> Vec<AttendanceEvent> {
    let mut window: Vec<AttendanceEvent> = history
        .iter()
        .filter(|e| e.day() == day)
        .cloned()
        .collect();
    window.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    window
}

/// Serde adapter for `YYYY-MM-DD HH:MM:SS` timestamps.
pub mod timestamp_serde {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
