//! Backup schedule document: choice vocabularies, validation of user
//! overrides, the client-side merge, and the wire format.
//!
//! The compute API replaces the whole schedule on every POST, so a partial
//! update only works if the caller fetches the current document, merges the
//! overrides onto it with [`ScheduleSpec::merge`], and submits the result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ScheduleError, ValidationError};

/// Key wrapping the schedule in request and response bodies.
pub const WIRE_KEY: &str = "backupSchedule";

/// Allowed values for the weekly backup day, in wire form.
pub const DAY_CHOICES: [&str; 8] = [
    "DISABLED",
    "SUNDAY",
    "MONDAY",
    "TUESDAY",
    "WEDNESDAY",
    "THURSDAY",
    "FRIDAY",
    "SATURDAY",
];

/// Allowed values for the daily backup window, in wire form.
pub const HOUR_CHOICES: [&str; 13] = [
    "DISABLED",
    "H_0000_0200",
    "H_0200_0400",
    "H_0400_0600",
    "H_0600_0800",
    "H_0800_1000",
    "H_1000_1200",
    "H_1200_1400",
    "H_1400_1600",
    "H_1600_1800",
    "H_1800_2000",
    "H_2000_2200",
    "H_2200_0000",
];

/// Format choices for display: `'A', 'B', 'C'`.
pub fn pretty_choice_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("'{}'", item))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Case-insensitive lookup of `value` in `choices`, returning its index.
fn choice_index(choices: &[&str], value: &str) -> Option<usize> {
    let value = value.trim();
    choices
        .iter()
        .position(|choice| choice.eq_ignore_ascii_case(value))
}

// =============================================================================
// Weekly choice
// =============================================================================

/// Day of the week for the weekly backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeeklyChoice {
    #[default]
    Disabled,
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl WeeklyChoice {
    /// Same order as [`DAY_CHOICES`]
    pub const ALL: [WeeklyChoice; 8] = [
        WeeklyChoice::Disabled,
        WeeklyChoice::Sunday,
        WeeklyChoice::Monday,
        WeeklyChoice::Tuesday,
        WeeklyChoice::Wednesday,
        WeeklyChoice::Thursday,
        WeeklyChoice::Friday,
        WeeklyChoice::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        DAY_CHOICES[*self as usize]
    }

    /// Parse a user or wire value (case-insensitive)
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        choice_index(&DAY_CHOICES, value)
            .map(|idx| Self::ALL[idx])
            .ok_or_else(|| ValidationError {
                field: "weekly",
                value: value.to_string(),
                expected: format!("one of: {}", pretty_choice_list(&DAY_CHOICES)),
            })
    }
}

// =============================================================================
// Daily choice
// =============================================================================

/// Two-hour window for the daily backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DailyChoice {
    #[default]
    Disabled,
    Hours0000To0200,
    Hours0200To0400,
    Hours0400To0600,
    Hours0600To0800,
    Hours0800To1000,
    Hours1000To1200,
    Hours1200To1400,
    Hours1400To1600,
    Hours1600To1800,
    Hours1800To2000,
    Hours2000To2200,
    Hours2200To0000,
}

impl DailyChoice {
    /// Same order as [`HOUR_CHOICES`]
    pub const ALL: [DailyChoice; 13] = [
        DailyChoice::Disabled,
        DailyChoice::Hours0000To0200,
        DailyChoice::Hours0200To0400,
        DailyChoice::Hours0400To0600,
        DailyChoice::Hours0600To0800,
        DailyChoice::Hours0800To1000,
        DailyChoice::Hours1000To1200,
        DailyChoice::Hours1200To1400,
        DailyChoice::Hours1400To1600,
        DailyChoice::Hours1600To1800,
        DailyChoice::Hours1800To2000,
        DailyChoice::Hours2000To2200,
        DailyChoice::Hours2200To0000,
    ];

    pub fn as_str(&self) -> &'static str {
        HOUR_CHOICES[*self as usize]
    }

    /// Parse a user or wire value (case-insensitive)
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        choice_index(&HOUR_CHOICES, value)
            .map(|idx| Self::ALL[idx])
            .ok_or_else(|| ValidationError {
                field: "daily",
                value: value.to_string(),
                expected: format!("one of: {}", pretty_choice_list(&HOUR_CHOICES)),
            })
    }
}

macro_rules! choice_traits {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::parse(s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                <$ty>::parse(&raw).map_err(de::Error::custom)
            }
        }
    };
}

choice_traits!(WeeklyChoice);
choice_traits!(DailyChoice);

// =============================================================================
// Schedule document
// =============================================================================

/// One backup schedule as stored by the compute API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub enabled: bool,
    pub weekly: WeeklyChoice,
    pub daily: DailyChoice,
    pub rotation: u32,
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            weekly: WeeklyChoice::Disabled,
            daily: DailyChoice::Disabled,
            rotation: 0,
        }
    }
}

/// Response shape, with anything beyond the four known fields collected
/// so it can be reported instead of vanishing.
#[derive(Debug, Deserialize)]
struct WireSchedule {
    #[serde(flatten)]
    spec: ScheduleSpec,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl ScheduleSpec {
    /// Take each override that is set, keep the base value otherwise.
    pub fn merge(&self, overrides: &ScheduleOverrides) -> ScheduleSpec {
        ScheduleSpec {
            enabled: overrides.enabled.unwrap_or(self.enabled),
            weekly: overrides.weekly.unwrap_or(self.weekly),
            daily: overrides.daily.unwrap_or(self.daily),
            rotation: overrides.rotation.unwrap_or(self.rotation),
        }
    }

    /// Request body for `POST /servers/{id}/backup_schedule`.
    pub fn to_wire(&self) -> Value {
        json!({ WIRE_KEY: self })
    }

    /// Decode a `GET /servers/{id}/backup_schedule` response body.
    pub fn from_wire(body: &Value) -> Result<ScheduleSpec, ScheduleError> {
        let inner = body
            .get(WIRE_KEY)
            .ok_or_else(|| ScheduleError::Decode(format!("missing `{}` object", WIRE_KEY)))?;

        let wire = WireSchedule::deserialize(inner)
            .map_err(|e| ScheduleError::Decode(format!("invalid backup schedule: {}", e)))?;

        if !wire.extra.is_empty() {
            let ignored: Vec<&str> = wire.extra.keys().map(String::as_str).collect();
            tracing::debug!("ignoring unknown backup schedule fields: {}", ignored.join(", "));
        }

        Ok(wire.spec)
    }

    /// Key/value pairs for display, sorted by key
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("daily", self.daily.to_string()),
            ("enabled", self.enabled.to_string()),
            ("rotation", self.rotation.to_string()),
            ("weekly", self.weekly.to_string()),
        ]
    }
}

// =============================================================================
// Overrides
// =============================================================================

/// Unvalidated overrides as they arrive from the command line
#[derive(Debug, Clone, Default)]
pub struct RawOverrides {
    pub enabled: Option<bool>,
    pub weekly: Option<String>,
    pub daily: Option<String>,
    pub rotation: Option<String>,
}

/// Validated partial update; unset fields keep their current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleOverrides {
    pub enabled: Option<bool>,
    pub weekly: Option<WeeklyChoice>,
    pub daily: Option<DailyChoice>,
    pub rotation: Option<u32>,
}

impl ScheduleOverrides {
    /// Check every provided field; the first invalid one is reported.
    pub fn validate(raw: &RawOverrides) -> Result<ScheduleOverrides, ValidationError> {
        let weekly = raw.weekly.as_deref().map(WeeklyChoice::parse).transpose()?;
        let daily = raw.daily.as_deref().map(DailyChoice::parse).transpose()?;
        let rotation = raw.rotation.as_deref().map(parse_rotation).transpose()?;

        Ok(ScheduleOverrides {
            enabled: raw.enabled,
            weekly,
            daily,
            rotation,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.weekly.is_none()
            && self.daily.is_none()
            && self.rotation.is_none()
    }
}

fn parse_rotation(value: &str) -> Result<u32, ValidationError> {
    value.trim().parse::<u32>().map_err(|_| ValidationError {
        field: "rotation",
        value: value.to_string(),
        expected: "a non-negative integer".to_string(),
    })
}
