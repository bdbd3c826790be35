//! Simulated-time helpers.
//!
//! Durations and target times arrive from the presentation layer as strings
//! such as `15m`, `2h 30m`, or `y1 d12`. Simulated time is measured in
//! seconds of universal time (UT) as `f64`.
//!
//! Two readings exist:
//! - **Span**: a length of time (`1d` is one day).
//! - **Date**: a calendar date, 1-based for years and days (`1y 1d` is UT 0).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Replacement for a non-positive duration: one thousand Earth years.
pub const UNBOUNDED_DURATION: f64 = 1000.0 * 365.0 * 86_400.0;

/// Calendar used to interpret day and year units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calendar {
    /// Seconds per day.
    pub day_seconds: f64,
    /// Seconds per year.
    pub year_seconds: f64,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            day_seconds: 21_600.0,
            year_seconds: 9_201_600.0,
        }
    }
}

/// How a time string is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeReading {
    /// A length of time.
    Span,
    /// A calendar date; years and days count from 1.
    Date,
}

fn unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Value then unit (`3d`) or unit then value (`d3`).
        Regex::new(r"(?i)(?:(\d+(?:\.\d+)?)\s*([ydhms])|([ydhms])\s*(\d+(?:\.\d+)?))")
            .expect("time unit regex is valid")
    })
}

impl Calendar {
    fn unit_seconds(&self, unit: char) -> f64 {
        match unit.to_ascii_lowercase() {
            'y' => self.year_seconds,
            'd' => self.day_seconds,
            'h' => 3600.0,
            'm' => 60.0,
            _ => 1.0,
        }
    }

    /// Parses a time string into seconds.
    ///
    /// A bare number is taken as seconds (or as UT for a date). Otherwise the
    /// string must consist only of `<value><unit>` groups with units
    /// `y d h m s`, case-insensitive, separated by optional whitespace.
    pub fn parse(&self, input: &str, reading: TimeReading) -> Result<f64, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidTimeString {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        if let Ok(seconds) = trimmed.parse::<f64>() {
            return if seconds.is_finite() {
                Ok(seconds)
            } else {
                Err(invalid("not finite"))
            };
        }

        let mut total = 0.0;
        let mut consumed = 0;
        let mut matched_any = false;
        for caps in unit_pattern().captures_iter(trimmed) {
            let whole = caps.get(0).ok_or_else(|| invalid("no match"))?;
            if !trimmed[consumed..whole.start()].trim().is_empty() {
                return Err(invalid("unrecognized text"));
            }
            consumed = whole.end();
            matched_any = true;

            let (value, unit) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
                (Some(v), Some(u), _, _) | (_, _, Some(u), Some(v)) => (v.as_str(), u.as_str()),
                _ => return Err(invalid("malformed unit group")),
            };
            let mut value: f64 = value.parse().map_err(|_| invalid("bad number"))?;
            let unit = unit.chars().next().ok_or_else(|| invalid("missing unit"))?;
            if reading == TimeReading::Date && matches!(unit.to_ascii_lowercase(), 'y' | 'd') {
                value -= 1.0;
            }
            total += value * self.unit_seconds(unit);
        }

        if !matched_any || !trimmed[consumed..].trim().is_empty() {
            return Err(invalid("unrecognized text"));
        }
        Ok(total)
    }

    /// Parses a duration, replacing non-positive values with
    /// [`UNBOUNDED_DURATION`].
    pub fn parse_duration(&self, input: &str) -> Result<f64, ValidationError> {
        Ok(normalize_duration(self.parse(input, TimeReading::Span)?))
    }
}

/// Replaces a non-positive duration with [`UNBOUNDED_DURATION`].
#[must_use]
pub fn normalize_duration(seconds: f64) -> f64 {
    if seconds <= 0.0 || seconds.is_nan() {
        UNBOUNDED_DURATION
    } else {
        seconds
    }
}
