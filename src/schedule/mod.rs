//! Firing schedules: ordered temperature segments with hold/ramp semantics.
//!
//! ```text
//!   Schedule "Bisque"                       goal
//!   ┌────┬──────┬────────┬────────┐          ▲      ┌─────┐
//!   │ #0 │ RAMP │ 600 °C │ 240min │          │     /       \
//!   │ #1 │ HOLD │ 600 °C │  30min │          │    /         \
//!   │ #2 │ OFF  │   0 °C │   0min │          │___/           \___
//!   └────┴──────┴────────┴────────┘          └──────────────────▶ t
//! ```
//!
//! - [`store`] persists the fixed table of schedules as blob records.
//! - [`engine`] executes the selected schedule against the heater loop.
//! - [`form`] turns web form fields into bounded segment values.

pub mod engine;
pub mod form;
pub mod store;

use serde::{Deserialize, Serialize};

/// Segments per schedule.
pub const MAX_SEGMENTS: usize = 20;
/// Schedule slots in the store.
pub const MAX_SCHEDULES: usize = 20;
/// Longest schedule name in bytes.
pub const NAME_CAPACITY: usize = 63;

pub const MIN_OVEN_TEMP_C: f32 = 0.0;
pub const MAX_OVEN_TEMP_C: f32 = 1500.0;
pub const MIN_SEGMENT_MINUTES: u16 = 0;
/// One day.
pub const MAX_SEGMENT_MINUTES: u16 = 24 * 60;

/// What the heater does during a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Heater off, goal 0 °C.
    #[default]
    Off,
    /// Jump to the goal and hold it.
    Hold,
    /// Interpolate linearly from the previous goal over the duration.
    Ramp,
}

impl ControlMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "SWITCHED_OFF",
            Self::Hold => "HOLD",
            Self::Ramp => "RAMP",
        }
    }
}

/// One step of a schedule.  Unused segments are skipped during a run but
/// keep their values so they can be re-enabled in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleSegment {
    pub mode: ControlMode,
    pub goal_c: f32,
    pub duration_min: u16,
    pub in_use: bool,
}

impl ScheduleSegment {
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_min) * 60_000
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub name: heapless::String<NAME_CAPACITY>,
    pub segments: [ScheduleSegment; MAX_SEGMENTS],
}

impl Schedule {
    /// True when no segment is in use.
    pub fn is_empty(&self) -> bool {
        !self.segments.iter().any(|s| s.in_use)
    }

    /// Index of the first in-use segment at or after `from`.
    pub fn next_in_use(&self, from: usize) -> Option<usize> {
        self.segments
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, s)| s.in_use)
            .map(|(i, _)| i)
    }

    /// Replace the name, truncating at a character boundary to fit.
    pub fn set_name(&mut self, name: &str) {
        self.name.clear();
        for ch in name.chars() {
            if self.name.push(ch).is_err() {
                break;
            }
        }
    }
}
