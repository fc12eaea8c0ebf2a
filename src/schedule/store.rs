//! Schedule table and its persistent records.
//!
//! Each of the [`MAX_SCHEDULES`] slots is stored as one fixed-size blob
//! under namespace `sched`, key `schedules{n}`:
//!
//! ```text
//!  byte 0      1..3           3..3+len            ..RECORD_SIZE
//!  ┌───────┬────────────┬─────────────────────┬──────────────┐
//!  │version│ len (u16LE)│ postcard(Schedule)  │ zero padding │
//!  └───────┴────────────┴─────────────────────┴──────────────┘
//! ```
//!
//! Storage failures never take the node down: a slot that fails to load
//! keeps its previous contents and is flagged as not loaded, and a failed
//! save leaves the in-memory edit in place.

use core::fmt::Write as _;

use log::{info, warn};

use super::{MAX_OVEN_TEMP_C, MAX_SCHEDULES, MAX_SEGMENT_MINUTES, MIN_OVEN_TEMP_C, Schedule};
use crate::app::ports::{StorageError, StoragePort};
use crate::error::StorageFault;

pub const SCHEDULE_NAMESPACE: &str = "sched";
pub const RECORD_VERSION: u8 = 1;
pub const RECORD_SIZE: usize = 256;
const HEADER_LEN: usize = 3;

// ── Record codec ──────────────────────────────────────────────

/// Storage key of slot `index`.
pub fn record_key(index: usize) -> heapless::String<16> {
    let mut key = heapless::String::new();
    // "schedules" + at most two digits always fits.
    let _ = write!(key, "schedules{}", index);
    key
}

pub fn encode_record(schedule: &Schedule) -> Result<[u8; RECORD_SIZE], StorageFault> {
    let mut record = [0u8; RECORD_SIZE];
    let len = postcard::to_slice(schedule, &mut record[HEADER_LEN..])
        .map_err(|_| StorageFault::Encode)?
        .len();
    record[0] = RECORD_VERSION;
    record[1..HEADER_LEN].copy_from_slice(&(len as u16).to_le_bytes());
    Ok(record)
}

/// Decode a full record, rejecting foreign versions, bad lengths and
/// segment values outside their bounds.
pub fn decode_record(record: &[u8]) -> Result<Schedule, StorageFault> {
    if record.len() < HEADER_LEN || record[0] != RECORD_VERSION {
        return Err(StorageFault::Corrupted);
    }
    let len = usize::from(u16::from_le_bytes([record[1], record[2]]));
    let payload = record
        .get(HEADER_LEN..HEADER_LEN + len)
        .ok_or(StorageFault::Corrupted)?;
    let schedule: Schedule = postcard::from_bytes(payload).map_err(|_| StorageFault::Corrupted)?;

    let in_bounds = schedule.segments.iter().all(|s| {
        (MIN_OVEN_TEMP_C..=MAX_OVEN_TEMP_C).contains(&s.goal_c)
            && s.duration_min <= MAX_SEGMENT_MINUTES
    });
    if !in_bounds {
        return Err(StorageFault::Corrupted);
    }
    Ok(schedule)
}

pub fn read_record(
    storage: &(impl StoragePort + ?Sized),
    index: usize,
) -> Result<Schedule, StorageFault> {
    if index >= MAX_SCHEDULES {
        return Err(StorageFault::BadIndex(index));
    }
    let mut record = [0u8; RECORD_SIZE];
    let got = storage
        .read(SCHEDULE_NAMESPACE, &record_key(index), &mut record)
        .map_err(|e| match e {
            StorageError::NotFound => StorageFault::NotFound,
            StorageError::Full | StorageError::IoError => StorageFault::Unavailable,
        })?;
    if got < RECORD_SIZE {
        return Err(StorageFault::ShortRead { got });
    }
    decode_record(&record)
}

pub fn write_record(
    storage: &mut (impl StoragePort + ?Sized),
    index: usize,
    schedule: &Schedule,
) -> Result<(), StorageFault> {
    if index >= MAX_SCHEDULES {
        return Err(StorageFault::BadIndex(index));
    }
    let record = encode_record(schedule)?;
    let written = storage
        .write(SCHEDULE_NAMESPACE, &record_key(index), &record)
        .map_err(|_| StorageFault::Unavailable)?;
    if written < RECORD_SIZE {
        return Err(StorageFault::ShortWrite { written });
    }
    Ok(())
}

// ── Schedule table ────────────────────────────────────────────

/// Owner of every schedule slot.
pub struct ScheduleStore {
    schedules: [Schedule; MAX_SCHEDULES],
    loaded: [bool; MAX_SCHEDULES],
    /// Slot shown on the edit page.
    edit_cursor: usize,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore {
    /// All slots empty and not loaded.
    pub fn new() -> Self {
        Self {
            schedules: core::array::from_fn(|_| Schedule::default()),
            loaded: [false; MAX_SCHEDULES],
            edit_cursor: 0,
        }
    }

    /// Schedule in slot `index`; out-of-range indices wrap.
    pub fn get(&self, index: usize) -> &Schedule {
        &self.schedules[index % MAX_SCHEDULES]
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.loaded.get(index).copied().unwrap_or(false)
    }

    /// Load one slot.  On failure the slot keeps its previous contents.
    pub fn load(
        &mut self,
        index: usize,
        storage: &(impl StoragePort + ?Sized),
    ) -> Result<(), StorageFault> {
        match read_record(storage, index) {
            Ok(schedule) => {
                self.schedules[index] = schedule;
                self.loaded[index] = true;
                Ok(())
            }
            Err(fault) => {
                if let Some(flag) = self.loaded.get_mut(index) {
                    *flag = false;
                }
                if fault != StorageFault::NotFound {
                    warn!("Schedule {}: load failed ({})", index, fault);
                }
                Err(fault)
            }
        }
    }

    /// Load every slot.  Returns how many loaded.
    pub fn load_all(&mut self, storage: &(impl StoragePort + ?Sized)) -> usize {
        let count = (0..MAX_SCHEDULES)
            .filter(|&i| self.load(i, storage).is_ok())
            .count();
        info!("Schedules: {}/{} loaded from storage", count, MAX_SCHEDULES);
        count
    }

    /// Persist one slot.
    pub fn save(
        &self,
        index: usize,
        storage: &mut (impl StoragePort + ?Sized),
    ) -> Result<(), StorageFault> {
        write_record(storage, index, self.get(index)).inspect_err(|fault| {
            warn!("Schedule {}: NOT stored ({})", index, fault);
        })
    }

    /// Replace a slot in memory.
    pub fn replace(&mut self, index: usize, schedule: Schedule) -> Result<(), StorageFault> {
        let slot = self
            .schedules
            .get_mut(index)
            .ok_or(StorageFault::BadIndex(index))?;
        *slot = schedule;
        Ok(())
    }

    // ── Edit cursor ───────────────────────────────────────────

    pub fn edit_cursor(&self) -> usize {
        self.edit_cursor
    }

    /// Move the edit cursor one slot, wrapping at both ends.
    pub fn step_edit_cursor(&mut self, forward: bool) -> usize {
        self.edit_cursor = step_index(self.edit_cursor, forward);
        self.edit_cursor
    }
}

/// Neighbouring slot index with wrap-around.
pub fn step_index(index: usize, forward: bool) -> usize {
    if forward {
        (index + 1) % MAX_SCHEDULES
    } else {
        (index + MAX_SCHEDULES - 1) % MAX_SCHEDULES
    }
}
