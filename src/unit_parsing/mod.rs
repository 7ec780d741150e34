// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to parse strings into plain numbers or some quantity with a unit.

mod error;

pub(crate) use error::*;

use hifitime::Duration;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, EnumString, IntoStaticStr)]
pub(crate) enum TimeFormat {
    /// Seconds
    S,

    /// Milliseconds
    Ms,

    /// Minutes
    Min,

    /// Hours
    H,

    NoUnit,
}

impl TimeFormat {
    fn to_duration(self, number: f64) -> Duration {
        match self {
            TimeFormat::S | TimeFormat::NoUnit => Duration::from_seconds(number),
            TimeFormat::Ms => Duration::from_milliseconds(number),
            TimeFormat::Min => Duration::from_seconds(number * 60.0),
            TimeFormat::H => Duration::from_seconds(number * 3600.0),
        }
    }
}

/// Parse a string that may have a unit of time attached to it. A naked number
/// is taken to be in seconds.
pub(crate) fn parse_time(s: &str) -> Result<(f64, TimeFormat), UnitParseError> {
    // Try to parse a naked number.
    let maybe_number: Option<f64> = s.trim().parse().ok();
    if let Some(number) = maybe_number {
        return Ok((number, TimeFormat::NoUnit));
    };

    // That didn't work; let's search over our supported formats.
    let suffix = s
        .trim()
        .trim_start_matches(|c| char::is_numeric(c) || c == '.')
        .trim();
    for time_format in TimeFormat::iter().filter(|&tf| tf != TimeFormat::NoUnit) {
        let time_format_str: &'static str = time_format.into();
        if suffix.to_uppercase() == time_format_str.to_uppercase() {
            let prefix = s.trim().trim_end_matches(char::is_alphabetic).trim();
            let number: f64 = match prefix.parse() {
                Ok(n) => n,
                Err(_) => {
                    return Err(UnitParseError::GotTimeUnitButCantParse {
                        input: s.to_string(),
                        unit: time_format_str,
                    })
                }
            };
            return Ok((number, time_format));
        }
    }

    // If we made it this far, we don't know how to parse the string.
    Err(UnitParseError::Unknown {
        input: s.to_string(),
        unit_type: "time",
    })
}

/// Parse a string into a [`Duration`]. Negative durations are rejected.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, UnitParseError> {
    let (number, format) = parse_time(s)?;
    if number < 0.0 || !number.is_finite() {
        return Err(UnitParseError::Negative {
            input: s.to_string(),
        });
    }
    Ok(format.to_duration(number))
}
