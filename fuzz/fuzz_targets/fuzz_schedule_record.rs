//! Fuzz target: schedule record decoder
//!
//! Feeds arbitrary bytes to `decode_record` as if they came back from NVS
//! and verifies:
//! - No panics on truncated, oversized or foreign records
//! - Every accepted record holds in-range goals and durations
//! - Accepted records re-encode and decode to the same schedule
//!
//! cargo fuzz run fuzz_schedule_record

#![no_main]

use kilnnode::schedule::store::{decode_record, encode_record};
use kilnnode::schedule::{MAX_OVEN_TEMP_C, MAX_SEGMENT_MINUTES, MIN_OVEN_TEMP_C};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(schedule) = decode_record(data) else {
        return;
    };

    for seg in schedule.segments.iter() {
        assert!(
            (MIN_OVEN_TEMP_C..=MAX_OVEN_TEMP_C).contains(&seg.goal_c),
            "accepted goal {} out of range",
            seg.goal_c
        );
        assert!(seg.duration_min <= MAX_SEGMENT_MINUTES);
    }

    let record = encode_record(&schedule).expect("decoded schedule must re-encode");
    assert_eq!(decode_record(&record).ok(), Some(schedule));
});
