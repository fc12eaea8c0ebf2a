//! Blackboard shared by every access state handler.
//!
//! Handlers never touch hardware.  They write [`DoorCommands`]; the
//! service applies them to the actuators after each tick.

/// Outputs requested by the access handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorCommands {
    /// Door lock relay energised (door can be opened).
    pub door_open: bool,
    /// Auxiliary relay, toggled from outside the machine.
    pub aux_relay: bool,
}

/// The shared context passed to every state handler function.
pub struct AccessContext {
    // -- Timing --
    /// Monotonic time of the pass being run (ms).
    pub now_ms: u64,
    /// Time since the current state was registered (ms).
    pub ms_in_state: u64,

    // -- Outputs --
    pub commands: DoorCommands,

    // -- Counters (telemetry) --
    pub approved_cards: u32,
    pub rejected_cards: u32,

    // -- One-shot requests, consumed by the service --
    /// Set by the REBOOT state; the binary restarts the chip.
    pub reboot_requested: bool,
    /// Set when a state's periodic self-report is due.
    pub report_requested: bool,

    /// First network connect already seen this boot.
    pub connected_once: bool,
}

impl Default for AccessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessContext {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            ms_in_state: 0,
            commands: DoorCommands::default(),
            approved_cards: 0,
            rejected_cards: 0,
            reboot_requested: false,
            report_requested: false,
            connected_once: false,
        }
    }

    /// Read-and-clear the reboot request.
    pub fn take_reboot_request(&mut self) -> bool {
        core::mem::take(&mut self.reboot_requested)
    }

    /// Read-and-clear the self-report request.
    pub fn take_report_request(&mut self) -> bool {
        core::mem::take(&mut self.report_requested)
    }
}
