//! Reference-counted port values.
//!
//! Values written to ports are shared between all readers of a port without
//! copying. An [`ImmutableValue`] can be cloned cheaply and read from any
//! thread; obtaining a [`MutableValue`] from it only clones the inner value if
//! it is still shared.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// An immutable, reference-counted value.
pub struct ImmutableValue<T> {
    inner: Arc<T>,
}

impl<T> ImmutableValue<T> {
    /// Wraps a value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Returns `true` if both handles refer to the same allocation.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }
}

impl<T: Clone> ImmutableValue<T> {
    /// Converts this value into a mutable one.
    ///
    /// The inner value is moved out if this handle is the only one, and
    /// cloned otherwise.
    pub fn into_mutable(self) -> MutableValue<T> {
        let value = Arc::try_unwrap(self.inner).unwrap_or_else(|shared| (*shared).clone());

        MutableValue {
            inner: Box::new(value),
        }
    }

    /// Returns a mutable copy of the value, leaving this handle untouched.
    pub fn to_mutable(&self) -> MutableValue<T> {
        MutableValue {
            inner: Box::new((*self.inner).clone()),
        }
    }
}

impl<T> Clone for ImmutableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Deref for ImmutableValue<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for ImmutableValue<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<MutableValue<T>> for ImmutableValue<T> {
    fn from(value: MutableValue<T>) -> Self {
        Self {
            inner: Arc::from(value.inner),
        }
    }
}

impl<T: PartialEq> PartialEq for ImmutableValue<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.inner == *other.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for ImmutableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImmutableValue").field(&*self.inner).finish()
    }
}

/// A uniquely owned value that can be mutated before being published.
pub struct MutableValue<T> {
    inner: Box<T>,
}

impl<T> MutableValue<T> {
    /// Wraps a value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Box::new(value),
        }
    }

    /// Freezes the value so it can be shared.
    pub fn into_immutable(self) -> ImmutableValue<T> {
        self.into()
    }
}

impl<T> Deref for MutableValue<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MutableValue<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableValue").field(&*self.inner).finish()
    }
}
