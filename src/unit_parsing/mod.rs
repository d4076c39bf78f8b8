// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to parse strings into plain numbers or some quantity with a unit.

mod error;
#[cfg(test)]
mod tests;

pub(crate) use error::*;

use hifitime::Duration;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, EnumString, IntoStaticStr)]
pub(crate) enum TimeFormat {
    /// Milliseconds
    Ms,

    /// Seconds
    S,

    /// Minutes
    Min,

    /// Hours
    H,
}

impl TimeFormat {
    fn to_seconds(self, value: f64) -> f64 {
        match self {
            TimeFormat::Ms => value / 1e3,
            TimeFormat::S => value,
            TimeFormat::Min => value * 60.0,
            TimeFormat::H => value * 3600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, EnumString, IntoStaticStr)]
#[allow(non_camel_case_types)]
pub(crate) enum FreqFormat {
    /// Hertz
    Hz,

    /// kiloHertz
    kHz,

    /// MegaHertz
    MHz,

    /// GigaHertz
    GHz,
}

impl FreqFormat {
    fn to_hz(self, value: f64) -> f64 {
        match self {
            FreqFormat::Hz => value,
            FreqFormat::kHz => value * 1e3,
            FreqFormat::MHz => value * 1e6,
            FreqFormat::GHz => value * 1e9,
        }
    }
}

/// Split a string like "30 s" into its numerical part and its (possibly
/// empty) alphabetic suffix.
fn split_unit(s: &str) -> (&str, &str) {
    let s = s.trim();
    let prefix = s.trim_end_matches(char::is_alphabetic);
    (prefix.trim(), s[prefix.len()..].trim())
}

/// Parse a string that may have a unit of time attached to it.
pub(crate) fn parse_time(s: &str) -> Result<(f64, Option<TimeFormat>), UnitParseError> {
    // Try to parse a naked number.
    let maybe_number: Option<f64> = s.trim().parse().ok();
    if let Some(number) = maybe_number {
        return Ok((number, None));
    };

    // That didn't work; let's search over our supported formats.
    let (prefix, suffix) = split_unit(s);
    for time_format in TimeFormat::iter() {
        let time_format_str: &'static str = time_format.into();
        if suffix.to_uppercase() == time_format_str.to_uppercase() {
            let number: f64 = match prefix.parse() {
                Ok(n) => n,
                Err(_) => return Err(UnitParseError::GotTimeUnitButCantParse(s.to_string())),
            };
            return Ok((number, Some(time_format)));
        }
    }

    // If we made it this far, we don't know how to parse the string.
    Err(UnitParseError::Unknown {
        input: s.to_string(),
        unit_type: "time",
    })
}

/// Parse a string that may have a unit of frequency attached to it.
pub(crate) fn parse_freq(s: &str) -> Result<(f64, Option<FreqFormat>), UnitParseError> {
    // Try to parse a naked number.
    let maybe_number: Option<f64> = s.trim().parse().ok();
    if let Some(number) = maybe_number {
        return Ok((number, None));
    };

    // That didn't work; let's search over our supported formats.
    let (prefix, suffix) = split_unit(s);
    for freq_format in FreqFormat::iter() {
        let freq_format_str: &'static str = freq_format.into();
        if suffix.to_uppercase() == freq_format_str.to_uppercase() {
            let number: f64 = match prefix.parse() {
                Ok(n) => n,
                Err(_) => return Err(UnitParseError::GotFreqUnitButCantParse(s.to_string())),
            };
            return Ok((number, Some(freq_format)));
        }
    }

    // If we made it this far, we don't know how to parse the string.
    Err(UnitParseError::Unknown {
        input: s.to_string(),
        unit_type: "frequency",
    })
}

/// Parse a string into a [`Duration`]. A number without a unit is interpreted
/// as seconds.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, UnitParseError> {
    let seconds = match parse_time(s)? {
        (n, None) => n,
        (n, Some(unit)) => unit.to_seconds(n),
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(UnitParseError::NotPositive(s.to_string()));
    }
    Ok(Duration::from_seconds(seconds))
}

/// Parse a string into a frequency \[Hz\]. A number without a unit is
/// interpreted as Hz.
pub(crate) fn parse_freq_hz(s: &str) -> Result<f64, UnitParseError> {
    let hz = match parse_freq(s)? {
        (n, None) => n,
        (n, Some(unit)) => unit.to_hz(n),
    };
    if !hz.is_finite() || hz <= 0.0 {
        return Err(UnitParseError::NotPositive(s.to_string()));
    }
    Ok(hz)
}
