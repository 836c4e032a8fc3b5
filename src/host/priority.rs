//! Priority-bucket mapping between the normalised scale and Host's native scale.
//!
//! Host's reminder priority is a 0-9 integer where 0 means none, 1-4 is "high", 5 is
//! "medium" and 6-9 is "low" -- the inverse of what the numbers suggest at a glance.

/// Normalised {0,1,5,9} -> Host native bucket.
pub fn to_host_priority(normalized: u8) -> u8 {
    match normalized {
        0 => 0,
        1..=3 => 9, // low
        4..=6 => 5, // medium
        _ => 1,     // high
    }
}

/// Host native bucket -> normalised {0,1,5,9}.
pub fn from_host_priority(host: u8) -> u8 {
    match host {
        0 => 0,
        h if h >= 6 => 1, // low -> our low
        5 => 5,           // medium -> our medium
        _ => 9,           // 1..4 -> our high
    }
}
