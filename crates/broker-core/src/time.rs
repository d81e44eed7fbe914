//! Epoch-seconds timestamps. Every timestamp in the wire protocol (§6) is a
//! `f64` count of seconds since the Unix epoch, matching the distilled
//! spec's `time.time()` semantics rather than a structured clock type.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}
