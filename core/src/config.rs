//! Dive log settings and their text representation.
//!
//! The format is one `key = value` pair per line. Blank lines and `#`
//! comments are ignored.
//!
//! ```text
//! # group dives less than two and a half days apart
//! trip_threshold = 2d 12h
//! autogroup = on
//! units = metric
//! ```

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, one_of, space0},
    combinator::{all_consuming, map_res, opt, rest, value},
    multi::many1,
    sequence::{delimited, terminated},
    IResult, Parser,
};
use tracing::warn;

use crate::error::ConfigError;

/// Default gap that still keeps two dives in the same trip: three days.
pub const DEFAULT_TRIP_THRESHOLD_SEC: i64 = 3 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiveLogConfig {
    /// Maximum start-to-start gap between consecutive dives of one trip.
    pub trip_threshold_sec: i64,
    pub autogroup: bool,
    /// Display only; never changes computed values.
    pub units: UnitSystem,
}

impl Default for DiveLogConfig {
    fn default() -> Self {
        Self {
            trip_threshold_sec: DEFAULT_TRIP_THRESHOLD_SEC,
            autogroup: false,
            units: UnitSystem::Metric,
        }
    }
}

impl DiveLogConfig {
    /// Parse configuration text, starting from the defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let (key, val) = match parse_assignment(line) {
                Ok((_, pair)) => pair,
                Err(_) => {
                    return Err(ConfigError::Syntax {
                        line: line_no,
                        message: format!("expected 'key = value', got '{}'", line),
                    })
                }
            };

            let invalid = || ConfigError::InvalidValue {
                line: line_no,
                key: key.to_string(),
                value: val.to_string(),
            };

            match key {
                "trip_threshold" => {
                    config.trip_threshold_sec = parse_duration(val).ok_or_else(invalid)?;
                }
                "autogroup" => {
                    config.autogroup = parse_bool(val).map_err(|_| invalid())?;
                }
                "units" => {
                    config.units = parse_units(val).map_err(|_| invalid())?;
                }
                other => {
                    warn!(line = line_no, key = other, "ignoring unknown config key");
                }
            }
        }

        Ok(config)
    }
}

impl FromStr for DiveLogConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_assignment(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, key) = delimited(
        multispace0,
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        multispace0,
    )
    .parse(input)?;
    let (input, _) = char('=').parse(input)?;
    let (input, val) = rest(input)?;
    Ok((input, (key, val.trim())))
}

/// Durations like `3d`, `72h`, `2d 12h`, `90m` or bare seconds.
///
/// `None` when the text does not parse or the total overflows `i64`.
fn parse_duration(input: &str) -> Option<i64> {
    let term = (
        map_res(digit1::<&str, nom::error::Error<&str>>, |digits: &str| digits.parse::<i64>()),
        opt(one_of("dhmsDHMS")),
    );
    let (_, terms) = all_consuming(many1(terminated(term, space0)))
        .parse(input)
        .ok()?;
    terms.into_iter().try_fold(0i64, |total, (amount, unit)| {
        let scale = match unit.map(|u| u.to_ascii_lowercase()) {
            Some('d') => 24 * 60 * 60,
            Some('h') => 60 * 60,
            Some('m') => 60,
            _ => 1,
        };
        total.checked_add(amount.checked_mul(scale)?)
    })
}

fn parse_bool(input: &str) -> Result<bool, nom::Err<nom::error::Error<&str>>> {
    let (_, flag) = all_consuming(alt((
        value(
            true,
            alt((tag_no_case("true"), tag_no_case("yes"), tag_no_case("on"))),
        ),
        value(
            false,
            alt((tag_no_case("false"), tag_no_case("no"), tag_no_case("off"))),
        ),
    )))
    .parse(input)?;
    Ok(flag)
}

fn parse_units(input: &str) -> Result<UnitSystem, nom::Err<nom::error::Error<&str>>> {
    let (_, units) = all_consuming(alt((
        value(UnitSystem::Metric, tag_no_case("metric")),
        value(UnitSystem::Imperial, tag_no_case("imperial")),
    )))
    .parse(input)?;
    Ok(units)
}
