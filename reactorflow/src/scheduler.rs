//! Interface to the logical-time scheduler.
//!
//! Delayed connections rely on a [`Scheduler`] to learn the current logical
//! tag and to request future firings. The scheduler is an external
//! collaborator: this crate only consumes the trait.
//!
//! [`EventQueue`] is a simple, deterministic single-process implementation
//! that can be stepped explicitly, see
//! [`Environment::step`](crate::Environment::step). Actions due at the same
//! tag are returned in action declaration order, regardless of the order in
//! which concurrent writers scheduled them.

use std::error::Error;
use std::fmt;

use crossbeam_utils::atomic::AtomicCell;
use tracing::{trace, warn};

use crate::element::ActionId;
use crate::loom_exports::sync::{Mutex, PoisonError};
use crate::time::{MonotonicTime, Tag};
use crate::util::priority_queue::PriorityQueue;

/// Logical-time services consumed by delayed connections.
pub trait Scheduler: Send + Sync {
    /// Returns the tag of the logical step being executed.
    fn logical_tag(&self) -> Tag;

    /// Requests a firing of `action` at `tag`.
    ///
    /// The tag is expected to lie in the future of the current logical tag.
    fn schedule(&self, action: ActionId, tag: Tag);
}

/// Error returned when an action cannot be scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SchedulingError {
    /// The scheduled tag does not lie in the future of the current logical
    /// tag.
    InvalidScheduledTime,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidScheduledTime => write!(
                fmt,
                "the scheduled tag should be in the future of the current logical tag"
            ),
        }
    }
}

impl Error for SchedulingError {}

/// A deterministic queue of scheduled action firings.
///
/// Firings are keyed by `(tag, action)`, so that actions due at the same tag
/// are pulled in increasing action identifier order.
pub struct EventQueue {
    queue: Mutex<PriorityQueue<(Tag, ActionId), ()>>,
    tag: AtomicCell<Tag>,
}

impl EventQueue {
    /// Creates an empty queue whose logical tag is the first microstep of
    /// `start`.
    pub fn new(start: MonotonicTime) -> Self {
        Self {
            queue: Mutex::new(PriorityQueue::new()),
            tag: AtomicCell::new(Tag::from_time(start)),
        }
    }

    /// Schedules a firing of `action` at `tag`.
    ///
    /// An error is returned if `tag` is not strictly after the current
    /// logical tag.
    pub fn try_schedule(&self, action: ActionId, tag: Tag) -> Result<(), SchedulingError> {
        if tag <= self.tag.load() {
            return Err(SchedulingError::InvalidScheduledTime);
        }

        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tag, action), ());

        Ok(())
    }

    /// Advances the logical tag to the earliest scheduled tag and returns it
    /// along with all actions due at that tag.
    ///
    /// An action scheduled several times for the same tag is only returned
    /// once. `None` is returned if the queue is empty.
    pub fn next_tag(&self) -> Option<(Tag, Vec<ActionId>)> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);

        let ((tag, first), ()) = queue.pull()?;
        let mut actions = vec![first];
        while let Some(&(next_tag, action)) = queue.peek_key() {
            if next_tag != tag {
                break;
            }
            queue.pull();
            if actions.last() != Some(&action) {
                actions.push(action);
            }
        }
        self.tag.store(tag);
        trace!(%tag, actions = actions.len(), "logical tag advanced");

        Some((tag, actions))
    }

    /// Returns the number of scheduled firings.
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no firing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Scheduler for EventQueue {
    fn logical_tag(&self) -> Tag {
        self.tag.load()
    }

    fn schedule(&self, action: ActionId, tag: Tag) {
        if let Err(e) = self.try_schedule(action, tag) {
            warn!(%action, %tag, current = %self.tag.load(), "{e}; firing dropped");
        }
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("tag", &self.tag.load())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
