//! The dataflow core of a deterministic, logical-time reactive runtime.
//!
//! Reactorflow provides the primitives through which the reactions of a
//! reactor program communicate: typed ports, the binding graph that forwards
//! port values across the container hierarchy, multiports with adaptive
//! activation tracking, and delayed connections. It also exposes the
//! dependencies declared between reactions and ports, from which an external
//! scheduler builds its precedence graph.
//!
//! Reactorflow does not decide when a logical step occurs, does not order
//! reactions and does not manage threads. It only guarantees that values
//! propagate deterministically through arbitrarily nested compositions, that
//! wide multiports remain cheap when only a few of their members are used in a
//! step, and that distinct ports can be set concurrently within one step.
//!
//! # A practical overview
//!
//! Using reactorflow typically involves three activities:
//!
//! 1. the definition of reactors, i.e. containers that create their ports,
//!    reactions and sub-reactors when assembled,
//! 2. the assembly of an [`Environment`], during which ports are bound or
//!    connected and reactions declare the ports they read and write,
//! 3. the execution of logical steps, during which reactions set ports and a
//!    [`Scheduler`](scheduler::Scheduler) delivers delayed values.
//!
//! ## Defining reactors
//!
//! Reactors implement the [`Reactor`] trait. Its
//! [`assemble`](Reactor::assemble) method receives an
//! [`AssemblyContext`](environment::AssemblyContext) through which the
//! reactor creates the elements it owns. Ports are designated by typed
//! [`PortRef`](ports::PortRef) handles which a reactor usually keeps as member
//! variables.
//!
//! ```
//! use reactorflow::environment::AssemblyContext;
//! use reactorflow::ports::{Multiport, PortRef};
//! use reactorflow::{Reactor, ValidationError};
//!
//! // A reactor with a single output.
//! #[derive(Default)]
//! pub struct Sensor {
//!     pub output: Option<PortRef<f64>>,
//! }
//!
//! impl Reactor for Sensor {
//!     fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
//!         self.output = Some(cx.add_output("value")?);
//!
//!         Ok(())
//!     }
//! }
//!
//! // A reactor gathering the values of many sensors.
//! pub struct Collector {
//!     pub width: usize,
//!     pub inputs: Option<Multiport<f64>>,
//! }
//!
//! impl Reactor for Collector {
//!     fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
//!         let inputs = cx.add_input_multiport("samples", self.width)?;
//!         let reaction = cx.add_reaction("collect")?;
//!         for port in inputs.iter() {
//!             cx.declare_trigger(reaction, port)?;
//!         }
//!         self.inputs = Some(inputs);
//!
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Assembling an environment
//!
//! Top-level reactors are added to an [`Environment`], which is then
//! assembled. Ports of different reactors can be bound (the sink forwards
//! from the source within the same step) or connected with a logical delay.
//! A port accepts at most one producer.
//!
//! ```
//! # use reactorflow::environment::AssemblyContext;
//! # use reactorflow::ports::{Multiport, PortRef};
//! # use reactorflow::{Reactor, ValidationError};
//! # #[derive(Default)]
//! # pub struct Sensor { pub output: Option<PortRef<f64>> }
//! # impl Reactor for Sensor {
//! #     fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
//! #         self.output = Some(cx.add_output("value")?);
//! #         Ok(())
//! #     }
//! # }
//! # pub struct Collector { pub width: usize, pub inputs: Option<Multiport<f64>> }
//! # impl Reactor for Collector {
//! #     fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
//! #         self.inputs = Some(cx.add_input_multiport("samples", self.width)?);
//! #         Ok(())
//! #     }
//! # }
//! use std::sync::Arc;
//!
//! use reactorflow::ports::{ActiveIndices, Strategy};
//! use reactorflow::scheduler::EventQueue;
//! use reactorflow::time::MonotonicTime;
//! use reactorflow::Environment;
//!
//! const WIDTH: usize = 100;
//!
//! let mut env = Environment::new("bench");
//! let sensors: Vec<_> = (0..WIDTH)
//!     .map(|i| env.add_reactor(format!("sensor{i}"), Sensor::default()).unwrap())
//!     .collect();
//! let collector = env
//!     .add_reactor("collector", Collector { width: WIDTH, inputs: None })
//!     .unwrap();
//! env.assemble().unwrap();
//!
//! let inputs = env.reactor::<Collector>(collector).unwrap().inputs.clone().unwrap();
//! let outputs: Vec<_> = sensors
//!     .iter()
//!     .map(|&s| env.reactor::<Sensor>(s).unwrap().output.unwrap())
//!     .collect();
//! for (i, &output) in outputs.iter().enumerate() {
//!     env.bind(output, inputs[i]).unwrap();
//! }
//!
//! // Execute one step in which 3 sensors out of 100 produce a value.
//! env.startup(Arc::new(EventQueue::new(MonotonicTime::EPOCH))).unwrap();
//! for i in [4, 42, 77] {
//!     env.ports().set(outputs[i], i as f64).unwrap();
//! }
//!
//! let ports = env.ports();
//! assert_eq!(ports.strategy(inputs.bank()), Some(Strategy::Sparse));
//! let Some(ActiveIndices::Sparse(mut active)) = ports.active_indices(inputs.bank()) else {
//!     panic!("the bank should be sparse");
//! };
//! active.sort();
//! assert_eq!(active, vec![4, 42, 77]);
//!
//! env.cleanup();
//! assert_eq!(env.ports().active_indices(inputs.bank()), Some(ActiveIndices::Sparse(Vec::new())));
//! ```
//!
//! ## Executing steps
//!
//! Once started, ports may be set from reactions running concurrently as long
//! as each port has a single writer per step. The end of a step is signaled
//! with [`Environment::cleanup`], which resets every port touched during the
//! step. Values sent through delayed connections are delivered by
//! [`Environment::trigger_actions`] when the scheduler reaches their tag;
//! [`Environment::step`] combines both operations for the reference
//! [`EventQueue`](scheduler::EventQueue).
//!
//! # Modules documentation
//!
//! * the [`ports`] module discusses bindings, value propagation and the
//!   sparse/dense activation strategy of multiports,
//! * the [`connection`] module discusses delayed connections and channels,
//! * the [`environment`] module discusses the lifecycle of a reactor program,
//! * the [`time`] module discusses logical tags.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod connection;
pub mod element;
pub mod environment;
mod loom_exports;
pub mod ports;
pub mod scheduler;
pub mod time;
pub(crate) mod util;
pub mod validation;
pub mod value;

pub use environment::{Environment, Reactor};
pub use validation::ValidationError;
