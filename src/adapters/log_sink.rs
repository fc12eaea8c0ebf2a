//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART / USB-CDC in production).  Status reports are rendered
//! as one JSON line so a serial capture can be parsed directly.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::SafetyFault;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Report(report) => match serde_json::to_string(report) {
                Ok(json) => info!("REPORT | {}", json),
                Err(e) => warn!("REPORT | encode failed: {}", e),
            },
            AppEvent::AccessStateChanged { from, to } => {
                info!("ACCESS | {} -> {}", from.label(), to.label());
            }
            AppEvent::AccessTimeout { state, next } => {
                warn!("ACCESS | timeout in {}, -> {}", state.label(), next.label());
            }
            AppEvent::RebootRequested => {
                warn!("ACCESS | reboot requested");
            }
            AppEvent::OvenSwitchedOn { schedule } => {
                info!("OVEN | on, schedule {}", schedule);
            }
            AppEvent::OvenSwitchedOff { reason } => {
                info!("OVEN | off ({})", reason);
            }
            AppEvent::StartRefused(why) => {
                warn!("OVEN | start refused: {}", why);
            }
            AppEvent::FaultDetected(flags) => {
                warn!(
                    "FAULT | detected, flags=0b{:08b} (thermocouple={} run_time={})",
                    flags,
                    flags & SafetyFault::ThermocoupleFault.mask() != 0,
                    flags & SafetyFault::RunTimeExceeded.mask() != 0,
                );
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state.label());
            }
        }
    }
}
