//! Schedule edit form parsing.
//!
//! The edit page posts one field set per segment (`mode_i`, `tempGoal_i`,
//! `timeToNextPoint_i`, `segmentIsUsed_i`) plus `scheduleName`.  Nothing
//! is rejected: missing or malformed values fall back to OFF / 0 / unused
//! and numbers are clamped to their bounds.

use core::fmt::Write as _;

use super::{
    ControlMode, MAX_OVEN_TEMP_C, MAX_SEGMENT_MINUTES, MIN_OVEN_TEMP_C,
    MIN_SEGMENT_MINUTES, Schedule, ScheduleSegment,
};

/// Borrowed view over decoded `name=value` pairs.
#[derive(Debug, Clone, Copy)]
pub struct FormFields<'a> {
    pairs: &'a [(&'a str, &'a str)],
}

impl<'a> FormFields<'a> {
    pub const EMPTY: FormFields<'static> = FormFields { pairs: &[] };

    pub fn new(pairs: &'a [(&'a str, &'a str)]) -> Self {
        Self { pairs }
    }

    /// First value posted under `name`.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn indexed(&self, prefix: &str, index: usize) -> Option<&'a str> {
        let mut name: heapless::String<32> = heapless::String::new();
        write!(name, "{}_{}", prefix, index).ok()?;
        self.get(&name)
    }
}

pub fn parse_mode(value: Option<&str>) -> ControlMode {
    match value.map(str::trim) {
        Some("hold") => ControlMode::Hold,
        Some("ramp") => ControlMode::Ramp,
        _ => ControlMode::Off,
    }
}

pub fn parse_goal(value: Option<&str>) -> f32 {
    value
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map_or(MIN_OVEN_TEMP_C, |v| v.clamp(MIN_OVEN_TEMP_C, MAX_OVEN_TEMP_C))
}

/// Whole minutes from the leading integer of the value, so "12.5" is 12.
pub fn parse_duration(value: Option<&str>) -> u16 {
    value
        .and_then(leading_integer)
        .map_or(MIN_SEGMENT_MINUTES, |v| {
            v.clamp(i64::from(MIN_SEGMENT_MINUTES), i64::from(MAX_SEGMENT_MINUTES)) as u16
        })
}

/// Optional sign and the digits that follow it; anything after is ignored.
/// Saturates instead of overflowing.
fn leading_integer(value: &str) -> Option<i64> {
    let v = value.trim_start();
    let (negative, digits) = match v.as_bytes().first() {
        Some(b'-') => (true, &v[1..]),
        Some(b'+') => (false, &v[1..]),
        _ => (false, v),
    };
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    let magnitude = digits[..len].bytes().fold(0i64, |acc, d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// Segment `index` as posted.
pub fn parse_segment(fields: &FormFields<'_>, index: usize) -> ScheduleSegment {
    ScheduleSegment {
        mode: parse_mode(fields.indexed("mode", index)),
        goal_c: parse_goal(fields.indexed("tempGoal", index)),
        duration_min: parse_duration(fields.indexed("timeToNextPoint", index)),
        in_use: fields.indexed("segmentIsUsed", index).is_some(),
    }
}

/// Build a whole schedule from a posted edit form.
pub fn parse_schedule(fields: &FormFields<'_>) -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_name(fields.get("scheduleName").unwrap_or(""));
    for (i, segment) in schedule.segments.iter_mut().enumerate() {
        *segment = parse_segment(fields, i);
    }
    schedule
}
