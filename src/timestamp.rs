use std::cmp;
use std::fmt;
use std::time;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_NANOSEC: u32 = 1_999_999_999;

/// Size of an encoded timestamp: 8-byte seconds, 4-byte nanoseconds, both
/// little-endian.
pub const TIMESTAMP_LEN: usize = 12;

/// UTC time as seconds since the UNIX epoch plus nanoseconds past the second.
/// Nanoseconds may run up to 1_999_999_999 to represent a leap second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from a raw seconds + nanoseconds value.
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp { sec, nano: 0 }
    }

    /// The current UTC time.
    pub fn now() -> Timestamp {
        match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
            Ok(elapsed) => Timestamp {
                sec: elapsed.as_secs() as i64,
                nano: elapsed.subsec_nanos(),
            },
            Err(before) => Timestamp {
                sec: -(before.duration().as_secs() as i64),
                nano: 0,
            },
        }
    }

    /// Seconds since the UNIX epoch.
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    /// Whole seconds elapsed from this timestamp up to `now`. Negative if this
    /// timestamp lies in the future.
    pub fn age_seconds(&self, now: Timestamp) -> i64 {
        now.sec.saturating_sub(self.sec)
    }

    /// Encode into exactly [`TIMESTAMP_LEN`] bytes.
    pub fn write(&self, target: &mut [u8]) {
        LittleEndian::write_i64(&mut target[0..8], self.sec);
        LittleEndian::write_u32(&mut target[8..12], self.nano);
    }

    /// Decode from exactly [`TIMESTAMP_LEN`] bytes.
    pub fn read(buf: &[u8]) -> Result<Timestamp> {
        if buf.len() != TIMESTAMP_LEN {
            return Err(Error::bad_encoding(
                "read timestamp",
                format!("expected {} bytes, got {}", TIMESTAMP_LEN, buf.len()),
            ));
        }
        let sec = LittleEndian::read_i64(&buf[0..8]);
        let nano = LittleEndian::read_u32(&buf[8..12]);
        Timestamp::from_utc(sec, nano)
            .ok_or_else(|| Error::bad_encoding("read timestamp", "nanoseconds out of range"))
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.sec
            .cmp(&other.sec)
            .then_with(|| self.nano.cmp(&other.nano))
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.nano == 0 {
            write!(f, "{}s", self.sec)
        } else {
            write!(f, "{}s+{}ns", self.sec, self.nano)
        }
    }
}
