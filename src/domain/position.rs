//! Log positions: the ordered tokens the purge log hands out on append.

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

use super::error::DomainError;

/// Position of an entry in the purge log, rendered as `millis-seq`.
///
/// Positions order by `(millis, seq)`. The log assigns them on append and
/// never reuses one; clients treat the textual form as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogPosition {
    millis: u64,
    seq: u64,
}

impl LogPosition {
    /// The position preceding every entry.
    pub const ZERO: LogPosition = LogPosition { millis: 0, seq: 0 };

    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    pub const fn millis(&self) -> u64 {
        self.millis
    }

    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Position a fresh consumer starts from: `at` truncated to whole seconds.
    pub fn bootstrap_at(at: OffsetDateTime) -> Self {
        let secs = u64::try_from(at.unix_timestamp()).unwrap_or(0);
        Self::new(secs.saturating_mul(1000), 0)
    }

    /// Position following `last` for an append observed at `now_millis`.
    ///
    /// The clock may run backwards; the millisecond part never does.
    pub fn successor(last: LogPosition, now_millis: u64) -> Self {
        if now_millis > last.millis {
            Self::new(now_millis, 0)
        } else {
            Self::new(last.millis, last.seq + 1)
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for LogPosition {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (millis, seq) = value
            .split_once('-')
            .ok_or_else(|| DomainError::invalid_position(value))?;
        let millis = millis
            .parse()
            .map_err(|_| DomainError::invalid_position(value))?;
        let seq = seq
            .parse()
            .map_err(|_| DomainError::invalid_position(value))?;
        Ok(Self { millis, seq })
    }
}

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn orders_by_millis_then_seq() {
        let a = LogPosition::new(1_000, 5);
        let b = LogPosition::new(1_000, 6);
        let c = LogPosition::new(1_001, 0);

        assert!(LogPosition::ZERO < a);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn parses_and_prints_textual_form() {
        let position: LogPosition = "1700000000123-7".parse().expect("valid position");
        assert_eq!(position, LogPosition::new(1_700_000_000_123, 7));
        assert_eq!(position.to_string(), "1700000000123-7");
    }

    #[test]
    fn rejects_malformed_positions() {
        for raw in ["", "12", "12-", "-3", "a-1", "1-b", "1-2-3"] {
            assert!(raw.parse::<LogPosition>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn bootstrap_truncates_to_whole_seconds() {
        let at = datetime!(2024-03-01 12:00:05.987 UTC);
        let position = LogPosition::bootstrap_at(at);
        assert_eq!(position.millis(), at.unix_timestamp() as u64 * 1000);
        assert_eq!(position.seq(), 0);
    }

    #[test]
    fn successor_bumps_seq_when_clock_stalls() {
        let last = LogPosition::new(5_000, 2);

        assert_eq!(LogPosition::successor(last, 6_000), LogPosition::new(6_000, 0));
        assert_eq!(LogPosition::successor(last, 5_000), LogPosition::new(5_000, 3));
        assert_eq!(LogPosition::successor(last, 4_000), LogPosition::new(5_000, 3));
    }
}
