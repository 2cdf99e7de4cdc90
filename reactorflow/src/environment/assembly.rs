use std::fmt;
use std::time::Duration;

use crate::connection::{Channel, ConnectionProperties};
use crate::element::{PortId, ReactionId, ReactorId};
use crate::ports::{BankConfig, BankId, Direction, Multiport, PortGraph, PortRef};
use crate::validation::ValidationError;

use super::{Environment, Reactor};

/// Context handed to [`Reactor::assemble`].
///
/// All elements created through an `AssemblyContext` are owned by the reactor
/// being assembled.
///
/// # Examples
///
/// A reactor fanning out a value to a bank of outputs from a reaction
/// triggered by its input.
///
/// ```
/// use reactorflow::environment::AssemblyContext;
/// use reactorflow::{Reactor, ValidationError};
///
/// struct FanOut {
///     width: usize,
/// }
///
/// impl Reactor for FanOut {
///     fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
///         let input = cx.add_input::<f64>("in")?;
///         let outputs = cx.add_output_multiport::<f64>("out", self.width)?;
///
///         let reaction = cx.add_reaction("dispatch")?;
///         cx.declare_trigger(reaction, input)?;
///         for port in outputs.iter() {
///             cx.declare_antidependency(reaction, port)?;
///         }
///
///         Ok(())
///     }
/// }
/// ```
pub struct AssemblyContext<'a> {
    env: &'a mut Environment,
    container: ReactorId,
}

impl<'a> AssemblyContext<'a> {
    pub(super) fn new(env: &'a mut Environment, container: ReactorId) -> Self {
        Self { env, container }
    }

    /// Returns the reactor being assembled.
    pub fn container(&self) -> ReactorId {
        self.container
    }

    /// Returns the environment.
    pub fn env(&self) -> &Environment {
        self.env
    }

    /// Returns the port graph.
    pub fn ports(&self) -> &PortGraph {
        self.env.ports()
    }

    /// Creates an input port.
    pub fn add_input<T: Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<PortRef<T>, ValidationError> {
        self.env.add_input(self.container, name)
    }

    /// Creates an output port.
    pub fn add_output<T: Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<PortRef<T>, ValidationError> {
        self.env.add_output(self.container, name)
    }

    /// Creates a bank of input ports with the environment's default bank
    /// configuration.
    pub fn add_input_multiport<T: Send + Sync + 'static>(
        &mut self,
        name: &str,
        width: usize,
    ) -> Result<Multiport<T>, ValidationError> {
        self.env.add_input_multiport(self.container, name, width)
    }

    /// Creates a bank of output ports with the environment's default bank
    /// configuration.
    pub fn add_output_multiport<T: Send + Sync + 'static>(
        &mut self,
        name: &str,
        width: usize,
    ) -> Result<Multiport<T>, ValidationError> {
        self.env.add_output_multiport(self.container, name, width)
    }

    /// Creates a bank of ports with an explicit configuration.
    pub fn add_multiport_with<T: Send + Sync + 'static>(
        &mut self,
        name: &str,
        direction: Direction,
        width: usize,
        config: BankConfig,
    ) -> Result<Multiport<T>, ValidationError> {
        self.env
            .add_multiport_with(self.container, name, direction, width, config)
    }

    /// Replaces the activation storage of a bank.
    pub fn reserve(&mut self, bank: BankId, capacity: usize) -> Result<(), ValidationError> {
        self.env.reserve(bank, capacity)
    }

    /// Creates a reaction.
    pub fn add_reaction(&mut self, name: impl Into<String>) -> Result<ReactionId, ValidationError> {
        self.env.add_reaction(self.container, name)
    }

    /// Creates a sub-reactor, which is assembled after the current reactor.
    pub fn add_reactor<R: Reactor>(
        &mut self,
        name: impl Into<String>,
        reactor: R,
    ) -> Result<ReactorId, ValidationError> {
        self.env.require_phase(super::Phase::Assembly)?;

        Ok(self
            .env
            .insert_reactor(name.into(), Some(self.container), Box::new(reactor)))
    }

    /// Creates a delayed channel with its own interface ports.
    pub fn add_channel<T: Send + Sync + 'static>(
        &mut self,
        name: &str,
        delay: Duration,
    ) -> Result<Channel<T>, ValidationError> {
        self.env.add_channel(self.container, name, delay)
    }

    /// Binds `sink` so that it forwards from `source`.
    pub fn bind<T>(&mut self, source: PortRef<T>, sink: PortRef<T>) -> Result<(), ValidationError> {
        self.env.bind(source, sink)
    }

    /// Connects two ports with either a binding or a delayed connection
    /// owned by the reactor being assembled.
    pub fn connect<T: Send + Sync + 'static>(
        &mut self,
        source: PortRef<T>,
        sink: PortRef<T>,
        properties: impl Into<ConnectionProperties>,
    ) -> Result<(), ValidationError> {
        self.env
            .connect_in(self.container, source, sink, properties.into())
    }

    /// Declares that `reaction` is triggered by, and reads, `port`.
    pub fn declare_trigger(
        &mut self,
        reaction: ReactionId,
        port: impl Into<PortId>,
    ) -> Result<(), ValidationError> {
        self.env.declare_trigger(reaction, port)
    }

    /// Declares that `reaction` reads `port` without being triggered by it.
    pub fn declare_dependency(
        &mut self,
        reaction: ReactionId,
        port: impl Into<PortId>,
    ) -> Result<(), ValidationError> {
        self.env.declare_dependency(reaction, port)
    }

    /// Declares that `reaction` may write `port`.
    pub fn declare_antidependency(
        &mut self,
        reaction: ReactionId,
        port: impl Into<PortId>,
    ) -> Result<(), ValidationError> {
        self.env.declare_antidependency(reaction, port)
    }
}

impl fmt::Debug for AssemblyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyContext")
            .field("container", &self.env.fqn(self.container))
            .finish_non_exhaustive()
    }
}
