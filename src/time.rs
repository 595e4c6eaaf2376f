//! Durations and the one-shot timer used while waiting for PA sync.
//!
//! The delegator never waits in a blocking fashion. When it asks the synchronization engine for a
//! PA sync, it arms a [`Timer`] for that Receive State slot and the host calls back into
//! `ScanDelegator::sync_timeout` if the timer fires first.
//!
//! [`Timer`]: trait.Timer.html

use core::fmt;

/// A duration with microsecond resolution.
///
/// This can represent a maximum duration of about 1 hour, which is well above the longest PA sync
/// timeout (163.84 seconds).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u32);

impl Duration {
    /// Creates a [`Duration`] from a number of microseconds.
    pub fn from_micros(micros: u32) -> Self {
        Duration(micros)
    }

    /// Creates a [`Duration`] representing the given number of milliseconds.
    pub fn from_millis(millis: u16) -> Self {
        Duration(u32::from(millis) * 1_000)
    }

    /// Creates a [`Duration`] representing a number of seconds.
    pub fn from_secs(secs: u16) -> Self {
        Duration(u32::from(secs) * 1_000_000)
    }

    /// Creates a [`Duration`] from a controller timeout given in 10 ms units.
    pub fn from_10ms_ticks(ticks: u16) -> Self {
        Duration(u32::from(ticks) * 10_000)
    }

    /// Returns the number of whole seconds that fit in `self`.
    pub fn whole_secs(&self) -> u32 {
        self.0 / 1_000_000
    }

    /// Returns the number of whole milliseconds that fit in `self`.
    pub fn whole_millis(&self) -> u32 {
        self.0 / 1_000
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000 {
            let (secs, subsec_millis) = (self.whole_secs(), (self.0 % 1_000_000) / 1_000);
            if subsec_millis == 0 {
                write!(f, "{}s", secs)
            } else {
                write!(f, "{}.{:03}s", secs, subsec_millis)
            }
        } else if self.0 >= 1000 {
            write!(f, "{}ms", self.whole_millis())
        } else {
            write!(f, "{}µs", self.0)
        }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// One-shot timers, one per Receive State slot.
///
/// Starting a timer for a slot that is already armed restarts it. Cancelling an idle slot is a
/// no-op. When a timer expires, the host must call `ScanDelegator::sync_timeout` with the slot.
pub trait Timer {
    /// Arms the timer of `slot` to fire once after `after`.
    fn start(&mut self, slot: usize, after: Duration);

    /// Disarms the timer of `slot`.
    fn cancel(&mut self, slot: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks() {
        assert_eq!(Duration::from_10ms_ticks(0x4000).whole_millis(), 163_840);
        assert_eq!(Duration::from_10ms_ticks(10), Duration::from_millis(100));
    }

    #[test]
    fn display() {
        assert_eq!(Duration::from_secs(10).to_string(), "10s");
        assert_eq!(Duration::from_10ms_ticks(0x4000).to_string(), "163.840s");
        assert_eq!(Duration::from_millis(250).to_string(), "250ms");
        assert_eq!(Duration::from_micros(150).to_string(), "150µs");
    }
}
