#[cfg(reactorflow_loom)]
pub(crate) mod sync {
    pub(crate) use loom::sync::Mutex;
    pub(crate) use std::sync::PoisonError;

    pub(crate) mod atomic {
        pub(crate) use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    }
}
#[cfg(not(reactorflow_loom))]
pub(crate) mod sync {
    pub(crate) use std::sync::{Mutex, PoisonError};

    pub(crate) mod atomic {
        pub(crate) use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    }
}
