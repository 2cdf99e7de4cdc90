//! Logical time.
//!
//! This module provides most notably:
//!
//! * [`MonotonicTime`]: a monotonic timestamp based on the [TAI] time standard,
//! * [`Tag`]: a logical tag made of a timestamp and a microstep, which orders
//!   the logical steps of a program.
//!
//! [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time
//!
//!
//! # Examples
//!
//! Delays are applied to tags with [`Tag::delay`]. A zero delay does not stay
//! at the current tag but moves to the next microstep, so that a delayed value
//! is always observed in a later propagation pass:
//!
//! ```
//! use std::time::Duration;
//! use reactorflow::time::{MonotonicTime, Tag};
//!
//! let t0 = Tag::from_time(MonotonicTime::EPOCH);
//!
//! assert_eq!(t0.delay(Duration::ZERO), Tag::new(MonotonicTime::EPOCH, 1));
//! assert_eq!(
//!     t0.delay(Duration::from_secs(10)),
//!     Tag::from_time(MonotonicTime::EPOCH + Duration::from_secs(10))
//! );
//! ```

use std::fmt;
use std::time::Duration;

pub use tai_time::MonotonicTime;

/// A logical tag.
///
/// Tags are ordered by timestamp first and by microstep second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    time: MonotonicTime,
    microstep: u64,
}

impl Tag {
    /// The tag at the TAI epoch, with a zero microstep.
    pub const EPOCH: Tag = Tag {
        time: MonotonicTime::EPOCH,
        microstep: 0,
    };

    /// Creates a tag from a timestamp and a microstep.
    pub const fn new(time: MonotonicTime, microstep: u64) -> Self {
        Self { time, microstep }
    }

    /// Creates a tag with a zero microstep.
    pub const fn from_time(time: MonotonicTime) -> Self {
        Self { time, microstep: 0 }
    }

    /// Returns the timestamp of this tag.
    pub fn time(&self) -> MonotonicTime {
        self.time
    }

    /// Returns the microstep of this tag.
    pub fn microstep(&self) -> u64 {
        self.microstep
    }

    /// Returns the tag at which an event delayed by `delay` is observed.
    ///
    /// A non-zero delay yields the delayed timestamp with a zero microstep
    /// while a zero delay yields the next microstep at the same timestamp.
    ///
    /// # Panics
    ///
    /// This method panics if the resulting timestamp or microstep overflows.
    pub fn delay(&self, delay: Duration) -> Tag {
        if delay.is_zero() {
            Tag {
                time: self.time,
                microstep: self.microstep + 1,
            }
        } else {
            Tag::from_time(self.time + delay)
        }
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "({:.9}, {})", self.time, self.microstep)
    }
}
