//! Concrete access state handlers and table builder.
//!
//! ```text
//!  BOOTING ──[first connect]──▶ WAITING_FOR_CARD ◀─────────────────┐
//!     │                               │                             │
//!  [120 s]                         [swipe]                          │
//!     ▼                               ▼                             │
//!  REBOOT        REJECTED ◀──[deny / 5 s]── CHECKING_CARD           │
//!                   │                         │                     │
//!                   └──────▶ (WAITING)     [approve]                │
//!                                             ▼                     │
//!                 APPROVED ──▶ LOCK_OPEN ──[door time]──▶ LOCK_CLOSED
//! ```
//!
//! Dwell limits and fail states live in the table, not in the handlers:
//! the engine performs timeout transitions before calling `on_update`.

use super::context::AccessContext;
use super::{StateDescriptor, StateId};
use crate::config::SystemConfig;
use log::{info, warn};

const BOOT_LIMIT_MS: u64 = 120_000;
const ERROR_REPORT_MS: u64 = 5 * 60_000;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table.  Rebuilt when the door-open time changes.
pub fn build_state_table(config: &SystemConfig) -> [StateDescriptor; StateId::COUNT] {
    let door_open_ms = u64::from(config.door_open_secs) * 1000;
    [
        StateDescriptor {
            id: StateId::Booting,
            max_dwell_ms: Some(BOOT_LIMIT_MS),
            fail_state: StateId::Reboot,
            report_every_ms: None,
            on_enter: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::OutOfOrder,
            max_dwell_ms: Some(BOOT_LIMIT_MS),
            fail_state: StateId::Reboot,
            report_every_ms: Some(ERROR_REPORT_MS),
            on_enter: Some(lock_door_enter),
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::Reboot,
            max_dwell_ms: Some(BOOT_LIMIT_MS),
            fail_state: StateId::Reboot,
            report_every_ms: None,
            on_enter: Some(reboot_enter),
            on_update: reboot_update,
        },
        StateDescriptor {
            id: StateId::TransientError,
            max_dwell_ms: Some(5_000),
            fail_state: StateId::WaitingForCard,
            report_every_ms: Some(ERROR_REPORT_MS),
            on_enter: Some(lock_door_enter),
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::NoConn,
            max_dwell_ms: None,
            fail_state: StateId::NoConn,
            report_every_ms: None,
            on_enter: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::WaitingForCard,
            max_dwell_ms: None,
            fail_state: StateId::WaitingForCard,
            report_every_ms: None,
            on_enter: Some(lock_door_enter),
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::CheckingCard,
            max_dwell_ms: Some(5_000),
            fail_state: StateId::Rejected,
            report_every_ms: None,
            on_enter: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::ClearStatus,
            max_dwell_ms: None,
            fail_state: StateId::WaitingForCard,
            report_every_ms: None,
            on_enter: Some(lock_door_enter),
            on_update: back_to_waiting_update,
        },
        StateDescriptor {
            id: StateId::Approved,
            max_dwell_ms: Some(60_000),
            fail_state: StateId::ClearStatus,
            report_every_ms: None,
            on_enter: Some(approved_enter),
            on_update: approved_update,
        },
        StateDescriptor {
            id: StateId::Rejected,
            max_dwell_ms: Some(5_000),
            fail_state: StateId::ClearStatus,
            report_every_ms: None,
            on_enter: None,
            on_update: back_to_waiting_update,
        },
        StateDescriptor {
            id: StateId::LockOpen,
            max_dwell_ms: Some(door_open_ms),
            fail_state: StateId::LockClosed,
            report_every_ms: None,
            on_enter: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::LockClosed,
            max_dwell_ms: None,
            fail_state: StateId::LockClosed,
            report_every_ms: None,
            on_enter: None,
            on_update: lock_closed_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Nothing to do; leave on a signal or a timeout.
fn idle_update(_ctx: &mut AccessContext) -> Option<StateId> {
    None
}

fn back_to_waiting_update(_ctx: &mut AccessContext) -> Option<StateId> {
    Some(StateId::WaitingForCard)
}

fn lock_door_enter(ctx: &mut AccessContext) {
    if ctx.commands.door_open {
        warn!("Door lock forced closed");
    }
    ctx.commands.door_open = false;
}

// ═══════════════════════════════════════════════════════════════════════════
//  REBOOT
// ═══════════════════════════════════════════════════════════════════════════

fn reboot_enter(ctx: &mut AccessContext) {
    ctx.commands.door_open = false;
    warn!("REBOOT: restart requested");
}

fn reboot_update(ctx: &mut AccessContext) -> Option<StateId> {
    ctx.reboot_requested = true;
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  APPROVED → LOCK_OPEN → LOCK_CLOSED
// ═══════════════════════════════════════════════════════════════════════════

fn approved_enter(ctx: &mut AccessContext) {
    ctx.commands.door_open = true;
    info!("User is approved and the door is opened");
}

fn approved_update(ctx: &mut AccessContext) -> Option<StateId> {
    ctx.commands.door_open = true;
    Some(StateId::LockOpen)
}

fn lock_closed_update(ctx: &mut AccessContext) -> Option<StateId> {
    ctx.commands.door_open = false;
    info!("Door is closed");
    Some(StateId::WaitingForCard)
}
