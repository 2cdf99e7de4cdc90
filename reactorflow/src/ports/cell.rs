//! Type-erased storage for port values.

use std::any::Any;

use crate::loom_exports::sync::{Mutex, PoisonError};
use crate::value::ImmutableValue;

/// Type-erased value slot of a port.
pub(crate) trait ValueCell: Send + Sync + 'static {
    /// Drops the stored value, if any.
    fn clear(&self);

    /// Upcasts the cell for downcasting to its typed form.
    fn as_any(&self) -> &dyn Any;
}

/// Value slot holding an optional `ImmutableValue<T>`.
///
/// The mutex is never contended as long as each port has a single writer per
/// step and is only read after its writer completed, which the scheduler
/// guarantees through its precedence graph.
pub(crate) struct TypedCell<T> {
    value: Mutex<Option<ImmutableValue<T>>>,
}

impl<T: Send + Sync + 'static> TypedCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    pub(crate) fn store(&self, value: ImmutableValue<T>) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub(crate) fn load(&self) -> Option<ImmutableValue<T>> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: Send + Sync + 'static> ValueCell for TypedCell<T> {
    fn clear(&self) {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcasts an erased cell to its typed form.
pub(crate) fn downcast<T: Send + Sync + 'static>(cell: &dyn ValueCell) -> Option<&TypedCell<T>> {
    cell.as_any().downcast_ref::<TypedCell<T>>()
}
