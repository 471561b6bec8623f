use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Seconds between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA_SECS: u64 = 11_644_473_600;

/// A timestamp in 100-nanosecond intervals since 1601-01-01 (UTC).
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Copy, Clone)]
pub struct FileTime(u64);

impl FileTime {
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    pub fn intervals(&self) -> u64 {
        self.0
    }

    pub fn from_intervals(intervals: u64) -> Self {
        Self(intervals)
    }
}

impl From<SystemTime> for FileTime {
    fn from(value: SystemTime) -> Self {
        let since_epoch = value
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let intervals = (since_epoch.as_secs() + EPOCH_DELTA_SECS) * 10_000_000
            + u64::from(since_epoch.subsec_nanos()) / 100;
        Self(intervals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_offset() {
        let epoch: FileTime = UNIX_EPOCH.into();
        assert_eq!(epoch.intervals(), EPOCH_DELTA_SECS * 10_000_000);
    }

    #[test]
    fn now_is_monotonic_enough() {
        let a = FileTime::now();
        let b = FileTime::now();
        assert!(a <= b);
    }
}
