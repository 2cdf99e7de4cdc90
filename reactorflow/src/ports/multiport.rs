//! Multiports and their adaptive activation tracking.
//!
//! A multiport is a bank of ports of the same type treated as one unit. Per
//! step, typically only a few members of a wide bank receive a value, so the
//! bank keeps track of its active members in a pre-reserved index list that
//! writers append to without locking. Once the share of active members
//! crosses a threshold, the bank stops recording indices and reports the
//! whole bank as active instead, since a dense scan is then cheaper than the
//! sparse bookkeeping.

use std::fmt;
use std::ops::{Index, Range};

use tracing::debug;

use crate::element::PortId;
use crate::loom_exports::sync::atomic::{AtomicBool, Ordering};
use crate::ports::PortRef;
use crate::util::index_list::{CapacityOverflow, IndexList};

/// Default share of active members, in percent, above which a bank switches
/// to the dense strategy.
pub const DEFAULT_DENSE_THRESHOLD_PERCENT: usize = 20;

/// Identifier of a multiport bank.
///
/// Identifiers are never reused within a graph, so the handle of a removed
/// bank keeps designating nothing even after other banks are created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BankId {
    pub(crate) key: usize,
    pub(crate) serial: u64,
}

/// Strategy used to enumerate the active members of a bank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Active members are enumerated from the recorded index list.
    Sparse,
    /// All members are reported as active.
    Dense,
}

/// What happens to the strategy of a bank when it is cleared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StrategyPolicy {
    /// Revert to the sparse strategy on every clear.
    #[default]
    ResetOnClear,
    /// Once dense, stay dense for the lifetime of the bank.
    Persist,
}

/// Configuration of a multiport bank.
///
/// # Examples
///
/// ```
/// use reactorflow::ports::{BankConfig, StrategyPolicy};
///
/// let config = BankConfig::default()
///     .with_capacity(64)
///     .with_dense_threshold_percent(50)
///     .with_policy(StrategyPolicy::Persist);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BankConfig {
    capacity: Option<usize>,
    dense_threshold_percent: usize,
    policy: StrategyPolicy,
}

impl BankConfig {
    /// Sets the number of active-index slots reserved per step.
    ///
    /// Defaults to twice the width of the bank.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the share of active members, in percent, above which the bank
    /// switches to the dense strategy.
    pub fn with_dense_threshold_percent(mut self, percent: usize) -> Self {
        self.dense_threshold_percent = percent;
        self
    }

    /// Sets the strategy reset policy.
    pub fn with_policy(mut self, policy: StrategyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the capacity reserved for a bank of the specified width.
    pub fn capacity_for(&self, width: usize) -> usize {
        self.capacity.unwrap_or(2 * width)
    }

    /// Returns the dense threshold in percent.
    pub fn dense_threshold_percent(&self) -> usize {
        self.dense_threshold_percent
    }

    /// Returns the strategy reset policy.
    pub fn policy(&self) -> StrategyPolicy {
        self.policy
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            dense_threshold_percent: DEFAULT_DENSE_THRESHOLD_PERCENT,
            policy: StrategyPolicy::default(),
        }
    }
}

/// Active members of a bank for the current step.
///
/// The order of sparse indices is the order in which members were activated,
/// which is unspecified when members are set concurrently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveIndices {
    /// Only the listed members are active.
    Sparse(Vec<usize>),
    /// Every member of the range may be active and must be checked.
    Dense(Range<usize>),
}

impl ActiveIndices {
    /// Returns the number of reported indices.
    pub fn len(&self) -> usize {
        match self {
            Self::Sparse(indices) => indices.len(),
            Self::Dense(range) => range.len(),
        }
    }

    /// Returns `true` if no index is reported.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the reported indices.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let (sparse, dense) = match self {
            Self::Sparse(indices) => (Some(indices.iter().copied()), None),
            Self::Dense(range) => (None, Some(range.clone())),
        };

        sparse.into_iter().flatten().chain(dense.into_iter().flatten())
    }
}

/// Shared activation state of a bank.
pub(crate) struct Bank {
    members: Vec<PortId>,
    /// Set while the member is recorded in `active`.
    recorded: Vec<AtomicBool>,
    active: IndexList,
    dense: AtomicBool,
    config: BankConfig,
}

impl Bank {
    pub(crate) fn new(width: usize, config: BankConfig) -> Self {
        Self {
            members: Vec::with_capacity(width),
            recorded: Vec::with_capacity(width),
            active: IndexList::with_capacity(config.capacity_for(width)),
            dense: AtomicBool::new(false),
            config,
        }
    }

    pub(crate) fn push_member(&mut self, port: PortId) {
        self.members.push(port);
        self.recorded.push(AtomicBool::new(false));
    }

    pub(crate) fn members(&self) -> &[PortId] {
        &self.members
    }

    pub(crate) fn width(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.active.capacity()
    }

    pub(crate) fn reserve(&mut self, capacity: usize) {
        for flag in &self.recorded {
            flag.store(false, Ordering::Relaxed);
        }
        self.active.reserve(capacity);
    }

    pub(crate) fn strategy(&self) -> Strategy {
        if self.dense.load(Ordering::Acquire) {
            Strategy::Dense
        } else {
            Strategy::Sparse
        }
    }

    /// Records member `index` as active.
    ///
    /// Returns `Ok(false)` if the bank is dense or if the member is already
    /// recorded, in which case nothing is recorded.
    pub(crate) fn activate(&self, index: usize) -> Result<bool, CapacityOverflow> {
        if self.strategy() == Strategy::Dense {
            return Ok(false);
        }
        if self.recorded[index].swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let slot = match self.active.push(index) {
            Ok(slot) => slot,
            Err(e) => {
                self.recorded[index].store(false, Ordering::Release);
                return Err(e);
            }
        };

        let width = self.width().max(1);
        if (slot + 1) * 100 / width > self.config.dense_threshold_percent
            && !self.dense.swap(true, Ordering::AcqRel)
        {
            debug!(
                active = slot + 1,
                width, "multiport switched to the dense strategy"
            );
        }

        Ok(true)
    }

    pub(crate) fn active_indices(&self) -> ActiveIndices {
        match self.strategy() {
            Strategy::Dense => ActiveIndices::Dense(0..self.width()),
            Strategy::Sparse => ActiveIndices::Sparse(self.active.iter().collect()),
        }
    }

    /// Resets the activation state for the next step.
    ///
    /// This is idempotent.
    pub(crate) fn clear(&self) {
        if !self.active.is_empty() {
            for index in self.active.iter() {
                self.recorded[index].store(false, Ordering::Release);
            }
            self.active.clear();
        }
        if self.config.policy == StrategyPolicy::ResetOnClear {
            self.dense.store(false, Ordering::Release);
        }
    }
}

impl fmt::Debug for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bank")
            .field("width", &self.width())
            .field("strategy", &self.strategy())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// A bank of ports of the same type.
///
/// The handle is cheap to clone; it designates ports stored in a
/// [`PortGraph`](crate::ports::PortGraph).
pub struct Multiport<T> {
    bank: BankId,
    ports: Vec<PortRef<T>>,
}

impl<T> Multiport<T> {
    pub(crate) fn new(bank: BankId, ports: Vec<PortRef<T>>) -> Self {
        Self { bank, ports }
    }

    /// Returns the identifier of the shared bank state.
    pub fn bank(&self) -> BankId {
        self.bank
    }

    /// Returns the number of ports in the bank.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Returns `true` if the bank has no ports.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Returns the member at `index`, if any.
    pub fn get(&self, index: usize) -> Option<PortRef<T>> {
        self.ports.get(index).copied()
    }

    /// Returns an iterator over the member ports.
    pub fn iter(&self) -> impl Iterator<Item = PortRef<T>> + '_ {
        self.ports.iter().copied()
    }
}

impl<T> Index<usize> for Multiport<T> {
    type Output = PortRef<T>;

    fn index(&self, index: usize) -> &PortRef<T> {
        &self.ports[index]
    }
}

impl<T> Clone for Multiport<T> {
    fn clone(&self) -> Self {
        Self {
            bank: self.bank,
            ports: self.ports.clone(),
        }
    }
}

impl<T> fmt::Debug for Multiport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiport")
            .field("bank", &self.bank)
            .field("width", &self.ports.len())
            .finish_non_exhaustive()
    }
}
