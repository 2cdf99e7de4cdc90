//! Validation errors and the validation toggle.
//!
//! All contract violations detected by this crate are reported through
//! [`ValidationError`]. None of them is recoverable: they denote either a
//! faulty assembly or a programming error in a reaction, so callers are
//! expected to abort rather than retry.
//!
//! Checks are performed by [`validate`], which is compiled to a full check
//! when the `validation` feature is enabled (the default) and to a debug
//! assertion otherwise.

use std::error::Error;
use std::fmt;

use crate::element::{PortId, ReactionId};
use crate::environment::Phase;

/// Error raised when an assembly or runtime contract is violated.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ValidationError {
    /// The sink port already has a producer, either an inward binding or a
    /// delayed connection.
    BindingConflict {
        /// Source of the rejected binding.
        source: PortId,
        /// Sink that already has a producer.
        sink: PortId,
    },
    /// An attempt was made to set a port to an absent value.
    NullValueRejected(PortId),
    /// More ports of a multiport were activated within one step than the
    /// bank has reserved slots for.
    CapacityExceeded {
        /// Member port whose activation overflowed the bank.
        port: PortId,
        /// Reserved capacity of the bank.
        capacity: usize,
    },
    /// A value was written to a port that forwards from an inward binding.
    BoundPortWrite(PortId),
    /// The value type of a port handle does not match the port it designates.
    PortTypeMismatch(PortId),
    /// A reaction declared a relation to a port it is not allowed to access.
    InvalidDependency {
        /// Port the relation was declared on.
        port: PortId,
        /// Reaction that declared the relation.
        reaction: ReactionId,
        /// Description of the violated rule.
        reason: &'static str,
    },
    /// The operation is not permitted in the current lifecycle phase.
    InvalidPhase {
        /// Phase the operation requires.
        expected: Phase,
        /// Actual phase of the environment.
        actual: Phase,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindingConflict { source, sink } => write!(
                fmt,
                "cannot bind {source} to {sink}: the sink port already has a producer"
            ),
            Self::NullValueRejected(port) => {
                write!(fmt, "port {port} may not be set to an absent value")
            }
            Self::CapacityExceeded { port, capacity } => write!(
                fmt,
                "activation of port {port} exceeds the reserved multiport capacity of {capacity}"
            ),
            Self::BoundPortWrite(port) => write!(
                fmt,
                "port {port} has an inward binding and may not be set directly"
            ),
            Self::PortTypeMismatch(port) => {
                write!(fmt, "the handle type does not match the value type of port {port}")
            }
            Self::InvalidDependency {
                port,
                reaction,
                reason,
            } => write!(
                fmt,
                "invalid relation between {reaction} and port {port}: {reason}"
            ),
            Self::InvalidPhase { expected, actual } => write!(
                fmt,
                "operation requires the {expected:?} phase but the environment is in the {actual:?} phase"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Returns the error built by `err` if `condition` does not hold.
///
/// Without the `validation` feature the condition is only checked by a debug
/// assertion and `Ok(())` is always returned.
#[inline]
pub(crate) fn validate<F>(condition: bool, err: F) -> Result<(), ValidationError>
where
    F: FnOnce() -> ValidationError,
{
    if cfg!(feature = "validation") {
        if !condition {
            return Err(err());
        }
    } else {
        debug_assert!(condition, "{}", err());
    }

    Ok(())
}
