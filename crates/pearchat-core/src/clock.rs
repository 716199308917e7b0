//! Time source abstraction and message timestamps.
//!
//! Decouples ledger logic from the system clock so tests can run with a
//! manually advanced clock while production uses `chrono::Utc::now()`.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock time source.
///
/// Implementations may go backwards (NTP adjustments, manual clocks);
/// [`Stamper`] is responsible for turning readings into unique stamps.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Clock frozen at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::default())
    }

    /// Move the clock forward (or backward, for negative deltas).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// ISO-8601 creation instant of a message or reaction.
///
/// Locally produced stamps use millisecond precision with a `Z` suffix
/// (`2024-05-01T12:00:00.000Z`). Stamps received from peers are kept
/// verbatim; the ledger only ever compares them for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Wrap a stamp received from elsewhere.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Format an instant with millisecond precision.
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Stamp as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces strictly increasing timestamps from a [`Clock`].
///
/// Two stamps taken within the same millisecond, or after the clock moved
/// backwards, are pushed forward one millisecond past the previous stamp.
#[derive(Debug, Clone)]
pub struct Stamper<C: Clock> {
    clock: C,
    last_millis: Option<i64>,
}

impl<C: Clock> Stamper<C> {
    /// Create a stamper reading from `clock`.
    pub fn new(clock: C) -> Self {
        Self { clock, last_millis: None }
    }

    /// Underlying clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Next unique timestamp.
    pub fn stamp(&mut self) -> Timestamp {
        let now = self.clock.now();
        let mut millis = now.timestamp_millis();
        if let Some(last) = self.last_millis
            && millis <= last
        {
            millis = last + 1;
        }
        self.last_millis = Some(millis);

        let instant = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(now);
        Timestamp::from_datetime(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_iso_string() {
        let stamp = Timestamp::from_datetime(DateTime::<Utc>::default());
        assert_eq!(stamp.as_str(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn stamps_within_same_millisecond_are_unique() {
        let clock = ManualClock::at_epoch();
        let mut stamper = Stamper::new(clock);

        let a = stamper.stamp();
        let b = stamper.stamp();
        let c = stamper.stamp();

        assert_eq!(a.as_str(), "1970-01-01T00:00:00.000Z");
        assert_eq!(b.as_str(), "1970-01-01T00:00:00.001Z");
        assert_eq!(c.as_str(), "1970-01-01T00:00:00.002Z");
    }

    #[test]
    fn clock_going_backwards_never_repeats_a_stamp() {
        let clock = ManualClock::at_epoch();
        clock.advance(TimeDelta::seconds(10));
        let mut stamper = Stamper::new(clock.clone());

        let before = stamper.stamp();
        clock.advance(TimeDelta::seconds(-5));
        let after = stamper.stamp();

        assert!(after > before);
    }

    #[test]
    fn stamps_follow_the_clock_when_it_moves_forward() {
        let clock = ManualClock::at_epoch();
        let mut stamper = Stamper::new(clock.clone());

        let _ = stamper.stamp();
        clock.advance(TimeDelta::minutes(1));

        assert_eq!(stamper.stamp().as_str(), "1970-01-01T00:01:00.000Z");
    }
}
