//! Container tree and lifecycle.
//!
//! An [`Environment`] owns every element of a reactor program: containers
//! (reactors), ports, reactions and actions. Elements are stored in arenas
//! and designated by copyable identifiers; each keeps a back-reference to its
//! owning container, which is used to compute fully-qualified names and to
//! check the legality of dependency declarations.
//!
//! The environment goes through a fixed sequence of phases:
//!
//! 1. *construction*: top-level reactors are added,
//! 2. *assembly*: every reactor's [`Reactor::assemble`] method is called
//!    exactly once to create its ports, reactions, sub-reactors and
//!    connections, and to declare dependencies,
//! 3. *startup*: ports are reset and startup hooks are called,
//! 4. *execution*: values are set and delivered step by step,
//! 5. *shutdown*: pending deliveries are discarded and shutdown hooks are
//!    called.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use reactorflow::connection::ConnectionProperties;
//! use reactorflow::environment::AssemblyContext;
//! use reactorflow::ports::PortRef;
//! use reactorflow::scheduler::EventQueue;
//! use reactorflow::time::MonotonicTime;
//! use reactorflow::{Environment, Reactor, ValidationError};
//!
//! #[derive(Default)]
//! struct Relay {
//!     input: Option<PortRef<u64>>,
//!     output: Option<PortRef<u64>>,
//! }
//!
//! impl Reactor for Relay {
//!     fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
//!         let input = cx.add_input("in")?;
//!         let output = cx.add_output("out")?;
//!         cx.connect(input, output, ConnectionProperties::delayed(Duration::from_secs(1)))?;
//!         self.input = Some(input);
//!         self.output = Some(output);
//!
//!         Ok(())
//!     }
//! }
//!
//! let mut env = Environment::new("demo");
//! let relay = env.add_reactor("relay", Relay::default()).unwrap();
//! env.assemble().unwrap();
//! assert_eq!(env.fqn(env.inputs(relay)[0]), "relay.in");
//!
//! let queue = Arc::new(EventQueue::new(MonotonicTime::EPOCH));
//! env.startup(queue.clone()).unwrap();
//!
//! let (input, output) = {
//!     let relay = env.reactor::<Relay>(relay).unwrap();
//!     (relay.input.unwrap(), relay.output.unwrap())
//! };
//! env.ports().set(input, 7).unwrap();
//! assert!(!env.ports().is_present(output));
//!
//! let tag = env.step(&queue).unwrap().unwrap();
//! assert_eq!(tag.time(), MonotonicTime::EPOCH + Duration::from_secs(1));
//! assert_eq!(env.ports().get(output).as_deref(), Some(&7));
//!
//! env.shutdown().unwrap();
//! ```

mod assembly;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::connection::{Channel, Connection, ConnectionKind, ConnectionProperties};
use crate::element::{
    ActionId, ElementInfo, ElementRef, PortId, ReactionId, ReactorId, FQN_SEPARATOR,
};
use crate::ports::{BankConfig, BankId, Direction, Multiport, PortGraph, PortRef};
use crate::scheduler::{EventQueue, Scheduler};
use crate::time::Tag;
use crate::validation::{validate, ValidationError};

pub use assembly::AssemblyContext;

/// Lifecycle phase of an [`Environment`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Top-level reactors are being added.
    Construction,
    /// Reactors are being assembled.
    Assembly,
    /// Ports are reset and startup hooks are running.
    Startup,
    /// Logical steps are being executed.
    Execution,
    /// The program is shutting down.
    Shutdown,
}

/// A reactor, i.e. a container of ports, reactions, actions and
/// sub-reactors.
///
/// All methods have a default implementation that does nothing.
pub trait Reactor: Send + 'static {
    /// Creates the elements owned by this reactor and wires them.
    ///
    /// This method is called exactly once per reactor by
    /// [`Environment::assemble`], including for sub-reactors created during
    /// assembly.
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        let _ = cx;

        Ok(())
    }

    /// Called once during startup, after all owned elements were started.
    fn startup(&mut self, ports: &PortGraph) {
        let _ = ports;
    }

    /// Called once during shutdown, before any owned element is shut down.
    fn shutdown(&mut self, ports: &PortGraph) {
        let _ = ports;
    }
}

impl Reactor for () {}

/// Object-safe view of a [`Reactor`].
trait AnyReactor: Send {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError>;
    fn startup(&mut self, ports: &PortGraph);
    fn shutdown(&mut self, ports: &PortGraph);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R: Reactor> AnyReactor for R {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        Reactor::assemble(self, cx)
    }

    fn startup(&mut self, ports: &PortGraph) {
        Reactor::startup(self, ports);
    }

    fn shutdown(&mut self, ports: &PortGraph) {
        Reactor::shutdown(self, ports);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct ReactorNode {
    info: ElementInfo,
    actions: Vec<ActionId>,
    inputs: Vec<PortId>,
    outputs: Vec<PortId>,
    reactions: Vec<ReactionId>,
    reactors: Vec<ReactorId>,
    /// Taken out while the reactor is being assembled.
    behavior: Option<Box<dyn AnyReactor>>,
}

/// A reaction and the ports it relates to.
#[derive(Clone, Debug)]
pub struct Reaction {
    info: ElementInfo,
    container: ReactorId,
    priority: usize,
    triggers: Vec<PortId>,
    dependencies: Vec<PortId>,
    anti_dependencies: Vec<PortId>,
}

impl Reaction {
    /// Returns the name of the reaction.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the reactor owning the reaction.
    pub fn container(&self) -> ReactorId {
        self.container
    }

    /// Returns the priority of the reaction within its container.
    ///
    /// Priorities start at 1 and follow declaration order.
    pub fn priority(&self) -> usize {
        self.priority
    }

    /// Ports triggering the reaction.
    pub fn triggers(&self) -> &[PortId] {
        &self.triggers
    }

    /// Ports read by the reaction, including its triggers.
    pub fn dependencies(&self) -> &[PortId] {
        &self.dependencies
    }

    /// Ports possibly written by the reaction.
    pub fn anti_dependencies(&self) -> &[PortId] {
        &self.anti_dependencies
    }
}

/// Owner of all the elements of a reactor program.
pub struct Environment {
    name: String,
    phase: Phase,
    reactors: Vec<ReactorNode>,
    top_level: Vec<ReactorId>,
    reactions: Vec<Reaction>,
    ports: PortGraph,
    bank_config: BankConfig,
}

impl Environment {
    /// Creates an empty environment in the construction phase.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: Phase::Construction,
            reactors: Vec::new(),
            top_level: Vec::new(),
            reactions: Vec::new(),
            ports: PortGraph::new(),
            bank_config: BankConfig::default(),
        }
    }

    /// Sets the configuration used for multiports created without an
    /// explicit configuration.
    pub fn with_bank_config(mut self, config: BankConfig) -> Self {
        self.bank_config = config;
        self
    }

    /// Returns the name of the environment.
    pub fn env_name(&self) -> &str {
        &self.name
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the port graph.
    pub fn ports(&self) -> &PortGraph {
        &self.ports
    }

    /// Adds a top-level reactor.
    pub fn add_reactor<R: Reactor>(
        &mut self,
        name: impl Into<String>,
        reactor: R,
    ) -> Result<ReactorId, ValidationError> {
        self.require_phase(Phase::Construction)?;

        Ok(self.insert_reactor(name.into(), None, Box::new(reactor)))
    }

    /// Creates an input port owned by `container`.
    pub fn add_input<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: impl Into<String>,
    ) -> Result<PortRef<T>, ValidationError> {
        self.add_port(container, name.into(), Direction::Input)
    }

    /// Creates an output port owned by `container`.
    pub fn add_output<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: impl Into<String>,
    ) -> Result<PortRef<T>, ValidationError> {
        self.add_port(container, name.into(), Direction::Output)
    }

    /// Creates a bank of `width` input ports owned by `container`.
    pub fn add_input_multiport<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: &str,
        width: usize,
    ) -> Result<Multiport<T>, ValidationError> {
        let config = self.bank_config;
        self.add_multiport_with(container, name, Direction::Input, width, config)
    }

    /// Creates a bank of `width` output ports owned by `container`.
    pub fn add_output_multiport<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: &str,
        width: usize,
    ) -> Result<Multiport<T>, ValidationError> {
        let config = self.bank_config;
        self.add_multiport_with(container, name, Direction::Output, width, config)
    }

    /// Creates a bank of `width` ports named `name[i]` with an explicit
    /// configuration.
    pub fn add_multiport_with<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: &str,
        direction: Direction,
        width: usize,
        config: BankConfig,
    ) -> Result<Multiport<T>, ValidationError> {
        self.require_assembly()?;

        let multiport = self
            .ports
            .add_multiport::<T>(name, container, direction, width, config);
        let node = &mut self.reactors[container.0];
        let ports = match direction {
            Direction::Input => &mut node.inputs,
            Direction::Output => &mut node.outputs,
        };
        ports.extend(multiport.iter().map(|p| p.id()));

        Ok(multiport)
    }

    /// Replaces the activation storage of a bank with one able to hold
    /// `capacity` active members per step.
    pub fn reserve(&mut self, bank: BankId, capacity: usize) -> Result<(), ValidationError> {
        self.require_assembly()?;
        self.ports.reserve(bank, capacity);

        Ok(())
    }

    /// Releases the activation state of a bank.
    ///
    /// Every member is deactivated first, so member ports remain usable as
    /// plain ports afterwards.
    pub fn remove_multiport(&mut self, bank: BankId) {
        self.ports.remove_multiport(bank);
    }

    /// Creates a reaction owned by `container`.
    pub fn add_reaction(
        &mut self,
        container: ReactorId,
        name: impl Into<String>,
    ) -> Result<ReactionId, ValidationError> {
        self.require_assembly()?;

        let id = ReactionId(self.reactions.len());
        let node = &mut self.reactors[container.0];
        node.reactions.push(id);
        self.reactions.push(Reaction {
            info: ElementInfo::new(name, Some(container)),
            container,
            priority: node.reactions.len(),
            triggers: Vec::new(),
            dependencies: Vec::new(),
            anti_dependencies: Vec::new(),
        });

        Ok(id)
    }

    /// Creates a delayed channel owned by `container`.
    ///
    /// The channel owns two new ports named `{name}_in` and `{name}_out`.
    pub fn add_channel<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: &str,
        delay: Duration,
    ) -> Result<Channel<T>, ValidationError> {
        let incoming = self.add_input::<T>(container, format!("{name}_in"))?;
        let outgoing = self.add_output::<T>(container, format!("{name}_out"))?;
        let action = self.add_connection(container, name.into(), incoming, outgoing, delay)?;

        Ok(Channel::new(action, incoming, outgoing))
    }

    /// Binds `sink` so that it forwards from `source`.
    pub fn bind<T>(&mut self, source: PortRef<T>, sink: PortRef<T>) -> Result<(), ValidationError> {
        self.require_assembly()?;

        self.ports.bind(source.id(), sink.id())
    }

    /// Connects two ports with either a binding or a delayed connection.
    ///
    /// A delayed connection is owned by the container of the source port.
    pub fn connect<T: Send + Sync + 'static>(
        &mut self,
        source: PortRef<T>,
        sink: PortRef<T>,
        properties: impl Into<ConnectionProperties>,
    ) -> Result<(), ValidationError> {
        match self.ports.port_info(source.id()).container {
            Some(container) => self.connect_in(container, source, sink, properties.into()),
            None => self.bind(source, sink),
        }
    }

    pub(crate) fn connect_in<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        source: PortRef<T>,
        sink: PortRef<T>,
        properties: ConnectionProperties,
    ) -> Result<(), ValidationError> {
        match properties.kind() {
            ConnectionKind::Normal => self.bind(source, sink),
            ConnectionKind::Delayed(delay) => {
                let name = format!(
                    "{}->{}",
                    self.ports.port_info(source.id()).name,
                    self.ports.port_info(sink.id()).name
                );
                self.add_connection(container, name, source, sink, delay)
                    .map(|_| ())
            }
        }
    }

    fn add_connection<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: String,
        source: PortRef<T>,
        sink: PortRef<T>,
        delay: Duration,
    ) -> Result<ActionId, ValidationError> {
        self.require_assembly()?;

        let action = self
            .ports
            .add_connection(ElementInfo::new(name, Some(container)), |action| {
                Box::new(Connection::new(action, source, sink, delay))
            })?;
        self.reactors[container.0].actions.push(action);

        Ok(action)
    }

    /// Declares that `reaction` is triggered by, and reads, `port`.
    pub fn declare_trigger(
        &mut self,
        reaction: ReactionId,
        port: impl Into<PortId>,
    ) -> Result<(), ValidationError> {
        self.register_dependency(reaction, port.into(), true)
    }

    /// Declares that `reaction` reads `port` without being triggered by it.
    pub fn declare_dependency(
        &mut self,
        reaction: ReactionId,
        port: impl Into<PortId>,
    ) -> Result<(), ValidationError> {
        self.register_dependency(reaction, port.into(), false)
    }

    /// Declares that `reaction` may write `port`.
    pub fn declare_antidependency(
        &mut self,
        reaction: ReactionId,
        port: impl Into<PortId>,
    ) -> Result<(), ValidationError> {
        let port = port.into();
        self.require_phase(Phase::Assembly)?;

        let container = self.reactions[reaction.0].container;
        if self.ports.is_output(port) {
            validate(self.port_container(port) == Some(container), || {
                ValidationError::InvalidDependency {
                    port,
                    reaction,
                    reason: "anti-dependent output ports must belong to the same reactor as the reaction",
                }
            })?;
        } else {
            validate(self.port_grand_container(port) == Some(container), || {
                ValidationError::InvalidDependency {
                    port,
                    reaction,
                    reason: "anti-dependent input ports must belong to a contained reactor",
                }
            })?;
        }

        self.ports.register_antidependency(port, reaction)?;
        self.reactions[reaction.0].anti_dependencies.push(port);

        Ok(())
    }

    fn register_dependency(
        &mut self,
        reaction: ReactionId,
        port: PortId,
        is_trigger: bool,
    ) -> Result<(), ValidationError> {
        self.require_phase(Phase::Assembly)?;

        let container = self.reactions[reaction.0].container;
        if self.ports.is_input(port) {
            validate(self.port_container(port) == Some(container), || {
                ValidationError::InvalidDependency {
                    port,
                    reaction,
                    reason: "dependent input ports must belong to the same reactor as the reaction",
                }
            })?;
        } else {
            validate(self.port_grand_container(port) == Some(container), || {
                ValidationError::InvalidDependency {
                    port,
                    reaction,
                    reason: "dependent output ports must belong to a contained reactor",
                }
            })?;
        }

        self.ports.register_dependency(port, reaction, is_trigger);
        let reaction = &mut self.reactions[reaction.0];
        if is_trigger {
            reaction.triggers.push(port);
        }
        reaction.dependencies.push(port);

        Ok(())
    }

    fn port_container(&self, port: PortId) -> Option<ReactorId> {
        self.ports.port_info(port).container
    }

    fn port_grand_container(&self, port: PortId) -> Option<ReactorId> {
        self.port_container(port)
            .and_then(|c| self.reactors[c.0].info.container)
    }

    /// Runs the assembly of every reactor.
    ///
    /// Reactors created during assembly are assembled as well, each exactly
    /// once.
    pub fn assemble(&mut self) -> Result<(), ValidationError> {
        self.require_phase(Phase::Construction)?;
        self.transition(Phase::Assembly);

        let mut index = 0;
        while index < self.reactors.len() {
            let id = ReactorId(index);
            if let Some(mut behavior) = self.reactors[index].behavior.take() {
                let result = behavior.assemble(&mut AssemblyContext::new(self, id));
                self.reactors[index].behavior = Some(behavior);
                result?;
                debug!(reactor = %self.fqn(id), "reactor assembled");
            }
            index += 1;
        }

        Ok(())
    }

    /// Installs the scheduler, resets all ports and runs the startup hooks.
    pub fn startup(&mut self, scheduler: Arc<dyn Scheduler>) -> Result<(), ValidationError> {
        self.require_phase(Phase::Assembly)?;
        self.transition(Phase::Startup);

        self.ports.set_scheduler(scheduler);
        self.ports.cleanup();
        let top_level = self.top_level.clone();
        for &id in &top_level {
            self.reset_reactor(id);
        }
        for &id in &top_level {
            self.startup_reactor(id);
        }

        self.transition(Phase::Execution);

        Ok(())
    }

    fn reset_reactor(&self, id: ReactorId) {
        let node = &self.reactors[id.0];
        for &port in node.inputs.iter().chain(&node.outputs) {
            self.ports.clear(port);
        }
        for &action in &node.actions {
            self.ports.cancel_pending(action);
        }

        for &child in &node.reactors {
            self.reset_reactor(child);
        }
    }

    fn startup_reactor(&mut self, id: ReactorId) {
        for child in self.reactors[id.0].reactors.clone() {
            self.startup_reactor(child);
        }

        if let Some(behavior) = self.reactors[id.0].behavior.as_mut() {
            behavior.startup(&self.ports);
        }
    }

    /// Runs the shutdown hooks and discards all pending deliveries.
    pub fn shutdown(&mut self) -> Result<(), ValidationError> {
        self.require_phase(Phase::Execution)?;
        self.transition(Phase::Shutdown);

        for id in self.top_level.clone() {
            self.shutdown_reactor(id);
        }
        self.ports.cleanup();

        Ok(())
    }

    fn shutdown_reactor(&mut self, id: ReactorId) {
        if let Some(behavior) = self.reactors[id.0].behavior.as_mut() {
            behavior.shutdown(&self.ports);
        }
        for child in self.reactors[id.0].reactors.clone() {
            self.shutdown_reactor(child);
        }

        let node = &self.reactors[id.0];
        for &action in &node.actions {
            let cancelled = self.ports.cancel_pending(action);
            if cancelled != 0 {
                debug!(
                    action = %self.ports.action_info(action).name,
                    cancelled,
                    "pending deliveries discarded"
                );
            }
        }
        for &port in node.inputs.iter().chain(&node.outputs) {
            self.ports.clear(port);
        }
    }

    /// Delivers the values scheduled at `tag` by the specified actions.
    pub fn trigger_actions(&self, tag: Tag, actions: &[ActionId]) -> Result<(), ValidationError> {
        self.require_phase(Phase::Execution)?;
        trace!(%tag, actions = actions.len(), "triggering actions");

        for &action in actions {
            self.ports.deliver(action, tag)?;
        }

        Ok(())
    }

    /// Ends the current step and executes the deliveries of the next
    /// scheduled tag.
    ///
    /// The queue is expected to be the scheduler installed at startup.
    /// Returns the new tag, or `None` if nothing is scheduled.
    pub fn step(&self, queue: &EventQueue) -> Result<Option<Tag>, ValidationError> {
        self.require_phase(Phase::Execution)?;

        self.ports.cleanup();
        let Some((tag, actions)) = queue.next_tag() else {
            return Ok(None);
        };
        self.trigger_actions(tag, &actions)?;

        Ok(Some(tag))
    }

    /// Clears every port touched during the current step.
    pub fn cleanup(&self) {
        self.ports.cleanup();
    }

    /// Returns the name of an element.
    pub fn name(&self, element: impl Into<ElementRef>) -> &str {
        &self.info(element.into()).name
    }

    /// Returns the container of an element, or `None` for a top-level
    /// reactor.
    pub fn container(&self, element: impl Into<ElementRef>) -> Option<ReactorId> {
        self.info(element.into()).container
    }

    /// Returns the fully-qualified name of an element.
    pub fn fqn(&self, element: impl Into<ElementRef>) -> String {
        let info = self.info(element.into());
        let mut names = vec![info.name.as_str()];
        let mut container = info.container;
        while let Some(id) = container {
            let info = &self.reactors[id.0].info;
            names.push(&info.name);
            container = info.container;
        }

        let mut fqn = String::new();
        for name in names.iter().rev() {
            if !fqn.is_empty() {
                fqn.push(FQN_SEPARATOR);
            }
            fqn.push_str(name);
        }

        fqn
    }

    fn info(&self, element: ElementRef) -> &ElementInfo {
        match element {
            ElementRef::Reactor(id) => &self.reactors[id.0].info,
            ElementRef::Port(id) => self.ports.port_info(id),
            ElementRef::Reaction(id) => &self.reactions[id.0].info,
            ElementRef::Action(id) => self.ports.action_info(id),
        }
    }

    /// Returns the top-level reactors in declaration order.
    pub fn top_level_reactors(&self) -> &[ReactorId] {
        &self.top_level
    }

    /// Returns the actions owned by a reactor in declaration order.
    pub fn actions(&self, reactor: ReactorId) -> &[ActionId] {
        &self.reactors[reactor.0].actions
    }

    /// Returns the input ports owned by a reactor in declaration order.
    pub fn inputs(&self, reactor: ReactorId) -> &[PortId] {
        &self.reactors[reactor.0].inputs
    }

    /// Returns the output ports owned by a reactor in declaration order.
    pub fn outputs(&self, reactor: ReactorId) -> &[PortId] {
        &self.reactors[reactor.0].outputs
    }

    /// Returns the reactions owned by a reactor in declaration order.
    pub fn reactions(&self, reactor: ReactorId) -> &[ReactionId] {
        &self.reactors[reactor.0].reactions
    }

    /// Returns the sub-reactors of a reactor in declaration order.
    pub fn reactors(&self, reactor: ReactorId) -> &[ReactorId] {
        &self.reactors[reactor.0].reactors
    }

    /// Returns a reaction.
    pub fn reaction(&self, id: ReactionId) -> &Reaction {
        &self.reactions[id.0]
    }

    /// Returns the user object of a reactor if it has type `R`.
    pub fn reactor<R: Reactor>(&self, id: ReactorId) -> Option<&R> {
        self.reactors
            .get(id.0)?
            .behavior
            .as_ref()?
            .as_any()
            .downcast_ref()
    }

    /// Returns the user object of a reactor mutably if it has type `R`.
    pub fn reactor_mut<R: Reactor>(&mut self, id: ReactorId) -> Option<&mut R> {
        self.reactors
            .get_mut(id.0)?
            .behavior
            .as_mut()?
            .as_any_mut()
            .downcast_mut()
    }

    fn insert_reactor(
        &mut self,
        name: String,
        container: Option<ReactorId>,
        behavior: Box<dyn AnyReactor>,
    ) -> ReactorId {
        let id = ReactorId(self.reactors.len());
        self.reactors.push(ReactorNode {
            info: ElementInfo::new(name, container),
            actions: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            reactions: Vec::new(),
            reactors: Vec::new(),
            behavior: Some(behavior),
        });
        match container {
            Some(parent) => self.reactors[parent.0].reactors.push(id),
            None => self.top_level.push(id),
        }

        id
    }

    fn add_port<T: Send + Sync + 'static>(
        &mut self,
        container: ReactorId,
        name: String,
        direction: Direction,
    ) -> Result<PortRef<T>, ValidationError> {
        self.require_assembly()?;

        let port = self
            .ports
            .add_port::<T>(ElementInfo::new(name, Some(container)), direction);
        let node = &mut self.reactors[container.0];
        match direction {
            Direction::Input => node.inputs.push(port.id()),
            Direction::Output => node.outputs.push(port.id()),
        }

        Ok(port)
    }

    fn require_phase(&self, expected: Phase) -> Result<(), ValidationError> {
        validate(self.phase == expected, || ValidationError::InvalidPhase {
            expected,
            actual: self.phase,
        })
    }

    /// Checks that the environment is not yet started.
    fn require_assembly(&self) -> Result<(), ValidationError> {
        validate(self.phase <= Phase::Assembly, || {
            ValidationError::InvalidPhase {
                expected: Phase::Assembly,
                actual: self.phase,
            }
        })
    }

    fn transition(&mut self, phase: Phase) {
        debug!(env = %self.name, from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("reactors", &self.reactors.len())
            .field("reactions", &self.reactions.len())
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}
