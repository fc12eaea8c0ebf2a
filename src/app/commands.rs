//! Inbound commands to the node service.
//!
//! These represent actions requested by the outside world (access
//! backend callbacks, card reader, web pages) that the
//! [`NodeService`](super::service::NodeService) interprets and acts upon.

use crate::config::SystemConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    // ── Access signals ────────────────────────────────────────
    /// A card was presented at the reader.
    CardSwiped,
    /// Backend approved the presented card.
    ApprovalGranted,
    /// Backend denied the presented card.
    ApprovalDenied,
    /// Network link came up.
    NetworkConnected { ip: [u8; 4] },
    /// Backend protocol error.
    NetworkError,

    // ── Oven ──────────────────────────────────────────────────
    /// Set the approval flag gating oven switch-on directly.
    SetUserApproved(bool),
    SwitchOvenOn,
    SwitchOvenOff,
    /// Step the selected schedule (refused while running).
    SelectSchedule { forward: bool },

    // ── Outputs ───────────────────────────────────────────────
    SetAuxRelay(bool),

    // ── Configuration ─────────────────────────────────────────
    /// Hot-reload configuration (refused while the oven runs).
    UpdateConfig(SystemConfig),

    /// Persist the current config on the next auto-save check.
    SaveConfig,
}
