//! Inbound access signals.
//!
//! Network and card-reader callbacks run outside the main loop.  They only
//! push a one-byte [`AccessSignal`] here; the main loop drains the queue
//! before each pass and turns the signals into
//! [`AppCommand`](crate::app::commands::AppCommand)s, so all state
//! mutation stays on the loop.
//!
//! Producers sit on different tasks (the station monitor on the loop,
//! card-reader and approval callbacks on their own), so the queue is a
//! multi-producer [`heapless::mpmc`] queue.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ card reader  │────▶│                │     │              │
//! │ backend cb   │────▶│  SignalQueue   │────▶│  Main loop   │
//! │ link monitor │────▶│  (MPMC, 16)    │     │  (consumer)  │
//! └──────────────┘     └────────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicUsize, Ordering};

use heapless::mpmc::Q16;

use crate::app::commands::AppCommand;

/// Pending signal capacity, that of [`Q16`].
pub const SIGNAL_QUEUE_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessSignal {
    CardSwiped = 1,
    ApprovalGranted = 2,
    ApprovalDenied = 3,
    NetworkConnected = 4,
    NetworkError = 5,
}

impl AccessSignal {
    /// The command this signal maps to.  `ip` is the current station
    /// address, used for `NetworkConnected`.
    pub fn into_command(self, ip: [u8; 4]) -> AppCommand {
        match self {
            Self::CardSwiped => AppCommand::CardSwiped,
            Self::ApprovalGranted => AppCommand::ApprovalGranted,
            Self::ApprovalDenied => AppCommand::ApprovalDenied,
            Self::NetworkConnected => AppCommand::NetworkConnected { ip },
            Self::NetworkError => AppCommand::NetworkError,
        }
    }
}

// ── Queue ───────────────────────────────────────────────────

pub struct SignalQueue {
    queue: Q16<AccessSignal>,
    pending: AtomicUsize,
}

/// Queue shared by the callbacks registered in `main`.
pub static SIGNALS: SignalQueue = SignalQueue::new();

impl Default for SignalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalQueue {
    pub const fn new() -> Self {
        Self {
            queue: Q16::new(),
            pending: AtomicUsize::new(0),
        }
    }

    /// Push a signal.  Returns `false` if the queue is full (signal dropped).
    pub fn push(&self, signal: AccessSignal) -> bool {
        // Counted before it is visible, so a racing pop never underflows.
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.queue.enqueue(signal).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Pop the oldest signal, `None` when empty.
    pub fn pop(&self) -> Option<AccessSignal> {
        let signal = self.queue.dequeue()?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(signal)
    }

    /// Drain all pending signals in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(AccessSignal)) {
        while let Some(signal) = self.pop() {
            handler(signal);
        }
    }

    /// Pending count.  Only a snapshot while producers are running.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
