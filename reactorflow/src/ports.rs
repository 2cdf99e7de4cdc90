//! Typed ports and their binding graph.
//!
//! A port is a single-assignment-per-step value cell. All ports of an
//! environment live in a [`PortGraph`] arena and are designated by cheap,
//! copyable [`PortRef`] handles that carry the value type.
//!
//! Ports can be *bound* to one another: a port with an inward binding does not
//! store any value itself but forwards presence and value from its upstream
//! port, so that a value written into an output port is observed without copy
//! by every transitively bound input port. A port has at most one inward
//! binding but any number of outward bindings.
//!
//! Setting a port notifies its listeners synchronously and then propagates
//! the notification along its outward bindings. Listeners are either the
//! multiport bank a port belongs to, which records the port as active, or a
//! delayed connection whose source is the port, which schedules a future
//! delivery. Every port reached by a notification is recorded in a touched
//! list, so that the end-of-step [`PortGraph::cleanup`] only visits the ports
//! that were actually used during the step.
//!
//! #### Example
//!
//! ```
//! use reactorflow::Environment;
//!
//! let mut env = Environment::new("env");
//! let reactor = env.add_reactor("top", ()).unwrap();
//! let output = env.add_output::<u32>(reactor, "out").unwrap();
//! let input = env.add_input::<u32>(reactor, "in").unwrap();
//! env.bind(output, input).unwrap();
//!
//! let ports = env.ports();
//! ports.set(output, 42).unwrap();
//! assert!(ports.is_present(input));
//! assert_eq!(ports.get(input).as_deref(), Some(&42));
//!
//! ports.cleanup();
//! assert!(!ports.is_present(input));
//! assert_eq!(ports.get(input), None);
//! ```

mod cell;
mod multiport;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use slab::Slab;
use tracing::{debug, trace};

use crate::connection::ErasedConnection;
use crate::element::{ActionId, ElementInfo, ElementRef, PortId, ReactionId, ReactorId};
use crate::loom_exports::sync::atomic::{AtomicBool, Ordering};
use crate::scheduler::Scheduler;
use crate::time::Tag;
use crate::util::index_list::IndexList;
use crate::validation::{validate, ValidationError};
use crate::value::ImmutableValue;

use cell::{downcast, TypedCell, ValueCell};
use multiport::Bank;

pub use multiport::{
    ActiveIndices, BankConfig, BankId, Multiport, Strategy, StrategyPolicy,
    DEFAULT_DENSE_THRESHOLD_PERCENT,
};

/// Minimum capacity of the touched-port list.
const MIN_TOUCHED_CAPACITY: usize = 16;

/// Direction of a port, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// A port read by the reactions of its container.
    Input,
    /// A port written by the reactions of its container.
    Output,
}

/// A typed handle to a port of a [`PortGraph`].
pub struct PortRef<T> {
    id: PortId,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> PortRef<T> {
    pub(crate) fn new(id: PortId) -> Self {
        Self {
            id,
            _phantom: PhantomData,
        }
    }

    /// Returns the untyped identifier of the port.
    pub fn id(&self) -> PortId {
        self.id
    }
}

impl<T> Clone for PortRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PortRef<T> {}

impl<T> PartialEq for PortRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for PortRef<T> {}

impl<T> Hash for PortRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for PortRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PortRef").field(&self.id).finish()
    }
}

impl<T> From<PortRef<T>> for PortId {
    fn from(port: PortRef<T>) -> Self {
        port.id
    }
}

impl<T> From<PortRef<T>> for ElementRef {
    fn from(port: PortRef<T>) -> Self {
        ElementRef::Port(port.id)
    }
}

/// Reactions related to a port.
///
/// Every trigger is also a dependency.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencySets {
    triggers: BTreeSet<ReactionId>,
    dependencies: BTreeSet<ReactionId>,
    anti_dependencies: BTreeSet<ReactionId>,
}

impl DependencySets {
    /// Reactions that fire when the port is present.
    pub fn triggers(&self) -> &BTreeSet<ReactionId> {
        &self.triggers
    }

    /// Reactions that may read the port.
    pub fn dependencies(&self) -> &BTreeSet<ReactionId> {
        &self.dependencies
    }

    /// Reactions that may write the port.
    pub fn anti_dependencies(&self) -> &BTreeSet<ReactionId> {
        &self.anti_dependencies
    }
}

/// Element notified when a port is set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PortListener {
    /// Member `index` of a multiport bank.
    Bank { bank: BankId, index: usize },
    /// Delayed connection sourced at the port.
    Connection(ActionId),
}

/// Capability to sever the back-references held by an element before the
/// state they point to is released.
pub(crate) trait Deactivatable {
    /// Drops every reference to shared activation state.
    fn deactivate(&mut self);
}

struct PortNode {
    info: ElementInfo,
    direction: Direction,
    inward: Option<PortId>,
    outward: Vec<PortId>,
    /// Delayed connection producing values for this port, if any.
    feeding_connection: Option<ActionId>,
    dependencies: DependencySets,
    listeners: Vec<PortListener>,
    present: AtomicBool,
    /// Set once listeners have run, until the port is cleared.
    notified: AtomicBool,
    /// Set while the port is recorded in the touched list.
    touched: AtomicBool,
    cell: Box<dyn ValueCell>,
}

impl PortNode {
    fn bank_slot(&self) -> Option<(BankId, usize)> {
        self.listeners.iter().find_map(|l| match *l {
            PortListener::Bank { bank, index } => Some((bank, index)),
            PortListener::Connection(_) => None,
        })
    }

    fn has_producer(&self) -> bool {
        self.inward.is_some() || self.feeding_connection.is_some()
    }
}

impl Deactivatable for PortNode {
    fn deactivate(&mut self) {
        self.listeners
            .retain(|l| !matches!(l, PortListener::Bank { .. }));
    }
}

/// Bank state along with the serial number of its identifier.
struct BankEntry {
    serial: u64,
    bank: Bank,
}

/// Action stored in the graph along with its name.
struct ActionNode {
    info: ElementInfo,
    connection: Box<dyn ErasedConnection>,
}

/// Arena of ports, bindings, multiport banks and delayed connections.
///
/// Assembly operations require exclusive access while value operations only
/// need a shared reference, so that reactions executed concurrently within a
/// step may set distinct ports, including distinct members of one multiport.
pub struct PortGraph {
    nodes: Vec<PortNode>,
    banks: Slab<BankEntry>,
    next_bank_serial: u64,
    actions: Vec<ActionNode>,
    touched: IndexList,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl PortGraph {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            banks: Slab::new(),
            next_bank_serial: 0,
            actions: Vec::new(),
            touched: IndexList::with_capacity(MIN_TOUCHED_CAPACITY),
            scheduler: None,
        }
    }

    /// Creates a new port and returns its handle.
    pub(crate) fn add_port<T>(&mut self, info: ElementInfo, direction: Direction) -> PortRef<T>
    where
        T: Send + Sync + 'static,
    {
        let id = PortId(self.nodes.len());
        self.nodes.push(PortNode {
            info,
            direction,
            inward: None,
            outward: Vec::new(),
            feeding_connection: None,
            dependencies: DependencySets::default(),
            listeners: Vec::new(),
            present: AtomicBool::new(false),
            notified: AtomicBool::new(false),
            touched: AtomicBool::new(false),
            cell: Box::new(TypedCell::<T>::new()),
        });

        if self.nodes.len() > self.touched.capacity() {
            self.grow_touched_list();
        }

        PortRef::new(id)
    }

    /// Creates a bank of `width` ports named `name[i]`.
    pub(crate) fn add_multiport<T>(
        &mut self,
        name: &str,
        container: ReactorId,
        direction: Direction,
        width: usize,
        config: BankConfig,
    ) -> Multiport<T>
    where
        T: Send + Sync + 'static,
    {
        let bank_id = BankId {
            key: self.banks.vacant_key(),
            serial: self.next_bank_serial,
        };
        self.next_bank_serial += 1;
        let mut bank = Bank::new(width, config);

        let ports: Vec<PortRef<T>> = (0..width)
            .map(|index| {
                let info = ElementInfo::new(format!("{name}[{index}]"), Some(container));
                let port = self.add_port::<T>(info, direction);
                self.nodes[port.id.0].listeners.push(PortListener::Bank {
                    bank: bank_id,
                    index,
                });
                bank.push_member(port.id);

                port
            })
            .collect();

        debug!(
            multiport = name,
            width,
            capacity = bank.capacity(),
            "multiport created"
        );
        let key = self.banks.insert(BankEntry {
            serial: bank_id.serial,
            bank,
        });
        debug_assert_eq!(key, bank_id.key);

        Multiport::new(bank_id, ports)
    }

    /// Binds `sink` so that it forwards from `source`.
    pub(crate) fn bind(&mut self, source: PortId, sink: PortId) -> Result<(), ValidationError> {
        validate(!self.nodes[sink.0].has_producer(), || {
            ValidationError::BindingConflict { source, sink }
        })?;

        self.nodes[sink.0].inward = Some(source);
        self.nodes[source.0].outward.push(sink);
        debug!(
            source = %self.nodes[source.0].info.name,
            sink = %self.nodes[sink.0].info.name,
            "ports bound"
        );

        Ok(())
    }

    /// Registers a delayed connection and returns its action identifier.
    pub(crate) fn add_connection(
        &mut self,
        info: ElementInfo,
        build: impl FnOnce(ActionId) -> Box<dyn ErasedConnection>,
    ) -> Result<ActionId, ValidationError> {
        let action = ActionId(self.actions.len());
        let connection = build(action);
        let (source, sink) = (connection.source(), connection.sink());

        validate(!self.nodes[sink.0].has_producer(), || {
            ValidationError::BindingConflict { source, sink }
        })?;

        self.nodes[source.0]
            .listeners
            .push(PortListener::Connection(action));
        self.nodes[sink.0].feeding_connection = Some(action);
        debug!(
            connection = %info.name,
            source = %self.nodes[source.0].info.name,
            sink = %self.nodes[sink.0].info.name,
            delay = ?connection.delay(),
            "delayed connection created"
        );
        self.actions.push(ActionNode { info, connection });

        Ok(action)
    }

    /// Installs the scheduler used by delayed connections.
    pub(crate) fn set_scheduler(&mut self, scheduler: Arc<dyn Scheduler>) {
        self.scheduler = Some(scheduler);
    }

    /// Returns the installed scheduler, if any.
    pub(crate) fn scheduler(&self) -> Option<&dyn Scheduler> {
        self.scheduler.as_deref()
    }

    /// Sets the value of a port.
    ///
    /// This is equivalent to [`set_value`](PortGraph::set_value) with a
    /// present value.
    pub fn set<T>(
        &self,
        port: PortRef<T>,
        value: impl Into<ImmutableValue<T>>,
    ) -> Result<(), ValidationError>
    where
        T: Send + Sync + 'static,
    {
        self.set_value(port, Some(value.into()))
    }

    /// Sets the value of a port and notifies its listeners and bound ports.
    ///
    /// An error is returned if the value is absent, if the port forwards from
    /// an inward binding, if the handle does not match the port's value type,
    /// or if the port is a multiport member whose bank ran out of reserved
    /// activation slots.
    ///
    /// Listeners are only notified on the first write of a port since it was
    /// last cleared.
    pub fn set_value<T>(
        &self,
        port: PortRef<T>,
        value: Option<ImmutableValue<T>>,
    ) -> Result<(), ValidationError>
    where
        T: Send + Sync + 'static,
    {
        let id = port.id;
        let value = value.ok_or(ValidationError::NullValueRejected(id))?;
        let node = self
            .nodes
            .get(id.0)
            .ok_or(ValidationError::PortTypeMismatch(id))?;
        validate(node.inward.is_none(), || ValidationError::BoundPortWrite(id))?;
        let cell =
            downcast::<T>(node.cell.as_ref()).ok_or(ValidationError::PortTypeMismatch(id))?;

        cell.store(value);
        node.present.store(true, Ordering::Release);
        trace!(port = %node.info.name, "port set");

        self.notify(id)
    }

    /// Runs the listeners of a port and of all ports bound downstream of it.
    fn notify(&self, id: PortId) -> Result<(), ValidationError> {
        let node = &self.nodes[id.0];
        if node.notified.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if !node.touched.swap(true, Ordering::AcqRel) {
            let pushed = self.touched.push(id.0);
            debug_assert!(pushed.is_ok(), "touched-port list overflow");
        }

        for listener in &node.listeners {
            match *listener {
                PortListener::Bank { bank, index } => {
                    if let Some(bank) = self.bank(bank) {
                        bank.activate(index)
                            .map_err(|e| ValidationError::CapacityExceeded {
                                port: id,
                                capacity: e.capacity,
                            })?;
                    }
                }
                PortListener::Connection(action) => {
                    self.actions[action.0].connection.trigger(self);
                }
            }
        }

        for &sink in &node.outward {
            self.notify(sink)?;
        }

        Ok(())
    }

    /// Follows the inward bindings of a port up to the port storing its
    /// value.
    fn root(&self, mut id: PortId) -> &PortNode {
        loop {
            let node = &self.nodes[id.0];
            match node.inward {
                Some(upstream) => id = upstream,
                None => return node,
            }
        }
    }

    /// Returns `true` if a value is present on the port or on its ultimate
    /// upstream port.
    pub fn is_present(&self, port: impl Into<PortId>) -> bool {
        self.root(port.into()).present.load(Ordering::Acquire)
    }

    /// Returns the value of the port, if present.
    ///
    /// `None` is returned when the port is absent in the current step, as
    /// well as when the handle does not match the port's value type.
    pub fn get<T>(&self, port: PortRef<T>) -> Option<ImmutableValue<T>>
    where
        T: Send + Sync + 'static,
    {
        let root = self.root(port.id);
        if !root.present.load(Ordering::Acquire) {
            return None;
        }

        downcast::<T>(root.cell.as_ref())?.load()
    }

    /// Clears the value and presence of a port.
    ///
    /// If the port belongs to a multiport, the activation state of the whole
    /// bank is reset as well. The next write to the port, or to the port it
    /// forwards from, notifies its listeners again.
    pub fn clear(&self, port: impl Into<PortId>) {
        let id = port.into();
        let node = &self.nodes[id.0];
        node.present.store(false, Ordering::Release);
        node.cell.clear();

        if let Some(bank) = node.bank_slot().and_then(|(b, _)| self.bank(b)) {
            bank.clear();
        }
        self.rearm(id);
    }

    /// Resets the notification state of a port and of all ports bound
    /// downstream of it.
    fn rearm(&self, id: PortId) {
        let node = &self.nodes[id.0];
        node.notified.store(false, Ordering::Release);
        for &sink in &node.outward {
            self.rearm(sink);
        }
    }

    /// Clears every port touched during the current step.
    ///
    /// This must only be called once all writers of the step have completed.
    pub fn cleanup(&self) {
        let mut count = 0;
        for index in self.touched.iter() {
            self.clear(PortId(index));
            self.nodes[index].touched.store(false, Ordering::Release);
            count += 1;
        }
        self.touched.clear();

        trace!(ports = count, "ports cleaned up");
    }

    /// Records a multiport member as active in its bank.
    ///
    /// Returns `Ok(false)` if the port is not part of a live bank, if the
    /// bank is in the dense strategy, or if the member is already recorded
    /// for the current step, which is always the case once it was set.
    pub fn activate(&self, port: impl Into<PortId>) -> Result<bool, ValidationError> {
        let id = port.into();
        let Some((bank, index)) = self.nodes[id.0].bank_slot() else {
            return Ok(false);
        };
        let Some(bank) = self.bank(bank) else {
            return Ok(false);
        };

        bank.activate(index)
            .map_err(|e| ValidationError::CapacityExceeded {
                port: id,
                capacity: e.capacity,
            })
    }

    /// Severs the reference of a port to its bank state.
    pub(crate) fn deactivate(&mut self, port: PortId) {
        self.nodes[port.0].deactivate();
    }

    /// Returns the active members of a bank, or `None` if the bank was
    /// removed.
    pub fn active_indices(&self, bank: BankId) -> Option<ActiveIndices> {
        self.bank(bank).map(Bank::active_indices)
    }

    /// Returns the current strategy of a bank, or `None` if the bank was
    /// removed.
    pub fn strategy(&self, bank: BankId) -> Option<Strategy> {
        self.bank(bank).map(Bank::strategy)
    }

    /// Returns the reserved activation capacity of a bank, or `None` if the
    /// bank was removed.
    pub fn capacity(&self, bank: BankId) -> Option<usize> {
        self.bank(bank).map(Bank::capacity)
    }

    /// Replaces the activation storage of a bank with one of the specified
    /// capacity.
    pub(crate) fn reserve(&mut self, bank: BankId, capacity: usize) {
        if let Some(entry) = self.banks.get_mut(bank.key) {
            if entry.serial == bank.serial {
                entry.bank.reserve(capacity);
            }
        }
    }

    /// Deactivates every member of a bank and releases the bank state.
    pub(crate) fn remove_multiport(&mut self, bank: BankId) {
        let Some(members) = self.bank(bank).map(|b| b.members().to_vec()) else {
            return;
        };
        for member in members {
            self.deactivate(member);
        }
        self.banks.remove(bank.key);

        debug!(bank = bank.serial, "multiport removed");
    }

    /// Returns the direction of a port.
    pub fn direction(&self, port: impl Into<PortId>) -> Direction {
        self.nodes[port.into().0].direction
    }

    /// Returns `true` for an input port.
    pub fn is_input(&self, port: impl Into<PortId>) -> bool {
        self.direction(port) == Direction::Input
    }

    /// Returns `true` for an output port.
    pub fn is_output(&self, port: impl Into<PortId>) -> bool {
        self.direction(port) == Direction::Output
    }

    /// Returns the port this port forwards from, if any.
    pub fn inward_binding(&self, port: impl Into<PortId>) -> Option<PortId> {
        self.nodes[port.into().0].inward
    }

    /// Returns the ports forwarding from this port.
    pub fn outward_bindings(&self, port: impl Into<PortId>) -> &[PortId] {
        &self.nodes[port.into().0].outward
    }

    /// Returns `true` if the port forwards from another port.
    pub fn has_inward_binding(&self, port: impl Into<PortId>) -> bool {
        self.inward_binding(port).is_some()
    }

    /// Returns `true` if at least one port forwards from this port.
    pub fn has_outward_bindings(&self, port: impl Into<PortId>) -> bool {
        !self.outward_bindings(port).is_empty()
    }

    /// Returns the reactions related to a port.
    pub fn dependencies(&self, port: impl Into<PortId>) -> &DependencySets {
        &self.nodes[port.into().0].dependencies
    }

    /// Returns the number of ports in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no ports.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Records a reaction as reading, and possibly triggered by, a port.
    pub(crate) fn register_dependency(
        &mut self,
        port: PortId,
        reaction: ReactionId,
        is_trigger: bool,
    ) {
        let sets = &mut self.nodes[port.0].dependencies;
        sets.dependencies.insert(reaction);
        if is_trigger {
            sets.triggers.insert(reaction);
        }
    }

    /// Records a reaction as possibly writing a port.
    pub(crate) fn register_antidependency(
        &mut self,
        port: PortId,
        reaction: ReactionId,
    ) -> Result<(), ValidationError> {
        validate(self.nodes[port.0].inward.is_none(), || {
            ValidationError::InvalidDependency {
                port,
                reaction,
                reason: "anti-dependencies may not be declared on ports with an inward binding",
            }
        })?;
        self.nodes[port.0].dependencies.anti_dependencies.insert(reaction);

        Ok(())
    }

    /// Delivers the value a delayed connection scheduled for `tag`.
    pub(crate) fn deliver(&self, action: ActionId, tag: Tag) -> Result<(), ValidationError> {
        match self.actions.get(action.0) {
            Some(node) => node.connection.deliver(self, tag),
            None => Ok(()),
        }
    }

    /// Discards the pending deliveries of a delayed connection.
    pub(crate) fn cancel_pending(&self, action: ActionId) -> usize {
        self.actions[action.0].connection.cancel_pending()
    }

    pub(crate) fn port_info(&self, port: PortId) -> &ElementInfo {
        &self.nodes[port.0].info
    }

    pub(crate) fn action_info(&self, action: ActionId) -> &ElementInfo {
        &self.actions[action.0].info
    }

    /// Returns the state of a live bank.
    fn bank(&self, bank: BankId) -> Option<&Bank> {
        self.banks
            .get(bank.key)
            .filter(|entry| entry.serial == bank.serial)
            .map(|entry| &entry.bank)
    }

    /// Moves the touched list to a larger storage, keeping its entries.
    fn grow_touched_list(&mut self) {
        let capacity = (2 * self.touched.capacity()).max(MIN_TOUCHED_CAPACITY);
        let list = IndexList::with_capacity(capacity);
        for index in self.touched.iter() {
            let pushed = list.push(index);
            debug_assert!(pushed.is_ok());
        }
        self.touched = list;
    }
}

impl fmt::Debug for PortGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortGraph")
            .field("ports", &self.nodes.len())
            .field("banks", &self.banks.len())
            .field("actions", &self.actions.len())
            .field("touched", &self.touched)
            .finish_non_exhaustive()
    }
}
