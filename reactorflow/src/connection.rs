//! Delayed connections between ports.
//!
//! A delayed connection is a schedulable action that forwards the value of a
//! source port to a sink port after a fixed logical delay. When the source is
//! set, the connection captures its value and asks the [`Scheduler`] for a
//! firing at the current tag offset by the delay; the value is then written
//! into the sink when the scheduler delivers the action at that tag.
//!
//! A zero delay does not write the sink synchronously: the delivery is
//! scheduled for the next microstep of the current time.
//!
//! [`Scheduler`]: crate::scheduler::Scheduler

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::{trace, warn};

use crate::element::{ActionId, PortId};
use crate::loom_exports::sync::{Mutex, PoisonError};
use crate::ports::{PortGraph, PortRef};
use crate::time::Tag;
use crate::validation::ValidationError;
use crate::value::ImmutableValue;

/// Kind of a connection between two ports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionKind {
    /// A plain binding: the sink forwards from the source within the step.
    #[default]
    Normal,
    /// A delayed connection: the sink observes the source's value after the
    /// specified logical delay.
    Delayed(Duration),
}

/// Properties of a connection between two ports.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use reactorflow::connection::{ConnectionKind, ConnectionProperties};
///
/// let props = ConnectionProperties::delayed(Duration::from_millis(10));
/// assert_eq!(props.kind(), ConnectionKind::Delayed(Duration::from_millis(10)));
/// assert_eq!(ConnectionProperties::default().kind(), ConnectionKind::Normal);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionProperties {
    kind: ConnectionKind,
}

impl ConnectionProperties {
    /// Properties of a plain binding.
    pub fn normal() -> Self {
        Self {
            kind: ConnectionKind::Normal,
        }
    }

    /// Properties of a delayed connection.
    pub fn delayed(delay: Duration) -> Self {
        Self {
            kind: ConnectionKind::Delayed(delay),
        }
    }

    /// Returns the kind of connection.
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }
}

impl From<ConnectionKind> for ConnectionProperties {
    fn from(kind: ConnectionKind) -> Self {
        Self { kind }
    }
}

/// Type-erased interface of a delayed connection.
pub(crate) trait ErasedConnection: Send + Sync + 'static {
    /// Captures the value of the source port and schedules its delivery.
    fn trigger(&self, graph: &PortGraph);

    /// Writes the value scheduled for `tag`, if any, into the sink port.
    fn deliver(&self, graph: &PortGraph, tag: Tag) -> Result<(), ValidationError>;

    /// Discards all pending deliveries and returns their number.
    fn cancel_pending(&self) -> usize;

    fn source(&self) -> PortId;

    fn sink(&self) -> PortId;

    fn delay(&self) -> Duration;
}

/// A connection forwarding values of type `T` with a fixed delay.
pub(crate) struct Connection<T> {
    action: ActionId,
    source: PortRef<T>,
    sink: PortRef<T>,
    delay: Duration,
    /// Values awaiting delivery, keyed by delivery tag.
    pending: Mutex<BTreeMap<Tag, ImmutableValue<T>>>,
}

impl<T: Send + Sync + 'static> Connection<T> {
    pub(crate) fn new(
        action: ActionId,
        source: PortRef<T>,
        sink: PortRef<T>,
        delay: Duration,
    ) -> Self {
        Self {
            action,
            source,
            sink,
            delay,
            pending: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T: Send + Sync + 'static> ErasedConnection for Connection<T> {
    fn trigger(&self, graph: &PortGraph) {
        let Some(value) = graph.get(self.source) else {
            return;
        };
        let Some(scheduler) = graph.scheduler() else {
            warn!(
                action = %self.action,
                "delayed connection triggered before a scheduler was installed; value dropped"
            );
            return;
        };

        let tag = scheduler.logical_tag().delay(self.delay);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag, value);
        scheduler.schedule(self.action, tag);

        trace!(action = %self.action, %tag, "delivery scheduled");
    }

    fn deliver(&self, graph: &PortGraph, tag: Tag) -> Result<(), ValidationError> {
        let value = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tag);

        match value {
            Some(value) => {
                trace!(action = %self.action, %tag, "value delivered");
                graph.set_value(self.sink, Some(value))
            }
            None => Ok(()),
        }
    }

    fn cancel_pending(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let count = pending.len();
        pending.clear();

        count
    }

    fn source(&self) -> PortId {
        self.source.id()
    }

    fn sink(&self) -> PortId {
        self.sink.id()
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

/// A standalone delayed connection with its own interface ports.
///
/// Values set on (or forwarded to) the incoming port are observed on the
/// outgoing port after the channel delay.
pub struct Channel<T> {
    action: ActionId,
    incoming: PortRef<T>,
    outgoing: PortRef<T>,
}

impl<T> Channel<T> {
    pub(crate) fn new(action: ActionId, incoming: PortRef<T>, outgoing: PortRef<T>) -> Self {
        Self {
            action,
            incoming,
            outgoing,
        }
    }

    /// Returns the action implementing the channel.
    pub fn action(&self) -> ActionId {
        self.action
    }

    /// Returns the input port of the channel.
    pub fn incoming(&self) -> PortRef<T> {
        self.incoming
    }

    /// Returns the output port of the channel.
    pub fn outgoing(&self) -> PortRef<T> {
        self.outgoing
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            action: self.action,
            incoming: self.incoming,
            outgoing: self.outgoing,
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("action", &self.action)
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .finish()
    }
}
