//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; the log sink prints them and renders
//! reports as JSON.

use serde::Serialize;

use crate::access::StateId;
use crate::error::StartRefused;
use crate::schedule::NAME_CAPACITY;
use crate::schedule::engine::ShutdownReason;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries the initial access state).
    Started(StateId),

    /// A requested access transition was registered.
    AccessStateChanged { from: StateId, to: StateId },

    /// An access state exceeded its dwell time.
    AccessTimeout { state: StateId, next: StateId },

    /// The REBOOT state asked for a restart.
    RebootRequested,

    OvenSwitchedOn { schedule: usize },

    OvenSwitchedOff { reason: ShutdownReason },

    StartRefused(StartRefused),

    /// One or more safety faults were raised.
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// Periodic status snapshot.
    Report(NodeReport),
}

/// Key/value status snapshot, reported periodically and on request of
/// the access machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub state: &'static str,
    pub approved_cards: u32,
    pub rejected_cards: u32,
    /// Dotted quad, empty before the first connect.
    pub ip: heapless::String<16>,
    pub oven_on: bool,
    pub schedule: usize,
    pub schedule_name: heapless::String<NAME_CAPACITY>,
    pub segment: usize,
    pub mode: &'static str,
    pub goal_c: f32,
    pub setpoint_c: f32,
    pub thermocouple_c: f32,
    pub cold_junction_c: f32,
    pub temp_fault: bool,
    pub fault_flags: u8,
    pub time_left_s: u64,
}
