//! Example: a network of sensors reporting to a hub over delayed links.
//!
//! This example demonstrates in particular:
//!
//! * reactor assembly and dependency declarations,
//! * multiports,
//! * delayed connections,
//! * adaptive activation tracking of multiports,
//! * explicit stepping with an event queue.
//!
//! ```text
//!  ┌────────────┐
//!  │ Sensor 0   ├──────┐
//!  └────────────┘      │  delayed links (5ms)     ┌───────────────┐
//!       ...            ├─────────────────────────►│ Hub           │
//!  ┌────────────┐      │                          │ samples[0:N]  │
//!  │ Sensor N-1 ├──────┘                          └───────────────┘
//!  └────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use reactorflow::connection::ConnectionProperties;
use reactorflow::environment::AssemblyContext;
use reactorflow::ports::{ActiveIndices, Multiport, PortRef, Strategy};
use reactorflow::scheduler::EventQueue;
use reactorflow::time::MonotonicTime;
use reactorflow::{Environment, Reactor, ValidationError};

/// Number of sensors.
const SENSORS: usize = 64;

/// Latency of the links between sensors and hub.
const LINK_DELAY: Duration = Duration::from_millis(5);

/// A sensor publishing samples.
#[derive(Default)]
pub struct Sensor {
    pub sample: Option<PortRef<f64>>,
}

impl Reactor for Sensor {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        let sample = cx.add_output("sample")?;
        let measure = cx.add_reaction("measure")?;
        cx.declare_antidependency(measure, sample)?;
        self.sample = Some(sample);

        Ok(())
    }
}

/// A hub collecting the samples of all sensors.
pub struct Hub {
    width: usize,
    pub samples: Option<Multiport<f64>>,
}

impl Hub {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            samples: None,
        }
    }
}

impl Reactor for Hub {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        let samples = cx.add_input_multiport("samples", self.width)?;
        let collect = cx.add_reaction("collect")?;
        for port in samples.iter() {
            cx.declare_trigger(collect, port)?;
        }
        self.samples = Some(samples);

        Ok(())
    }
}

/// Deterministic stand-in for a physical measurement.
fn reading(sensor: usize, round: usize) -> f64 {
    20.0 + ((sensor * 7 + round * 13) % 50) as f64 / 10.0
}

/// Logs the samples received by the hub and returns their count.
fn collect(env: &Environment, samples: &Multiport<f64>) -> usize {
    let ports = env.ports();
    let active = ports.active_indices(samples.bank()).unwrap();
    let strategy = ports.strategy(samples.bank()).unwrap();

    // In the dense strategy, every member must be checked for presence.
    let received: Vec<(usize, f64)> = active
        .iter()
        .filter_map(|i| ports.get(samples[i]).map(|v| (i, *v)))
        .collect();
    info!(
        ?strategy,
        scanned = active.len(),
        received = received.len(),
        "hub collected samples"
    );

    received.len()
}

fn main() -> Result<(), ValidationError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ---------------
    // Assembly.
    // ---------------

    let mut env = Environment::new("network");
    let sensors: Vec<_> = (0..SENSORS)
        .map(|i| env.add_reactor(format!("sensor{i}"), Sensor::default()))
        .collect::<Result<_, _>>()?;
    let hub = env.add_reactor("hub", Hub::new(SENSORS))?;
    env.assemble()?;

    let samples = env.reactor::<Hub>(hub).unwrap().samples.clone().unwrap();
    let outputs: Vec<PortRef<f64>> = sensors
        .iter()
        .map(|&s| env.reactor::<Sensor>(s).unwrap().sample.unwrap())
        .collect();
    for (i, &output) in outputs.iter().enumerate() {
        env.connect(output, samples[i], ConnectionProperties::delayed(LINK_DELAY))?;
    }

    // ----------
    // Execution.
    // ----------

    let t0 = MonotonicTime::EPOCH;
    let queue = Arc::new(EventQueue::new(t0));
    env.startup(queue.clone())?;

    // Round 1: a handful of sensors report.
    for i in [3, 17, 58] {
        env.ports().set(outputs[i], reading(i, 1))?;
    }
    let tag = env.step(&queue)?.unwrap();
    assert_eq!(tag.time(), t0 + LINK_DELAY);
    assert_eq!(env.ports().strategy(samples.bank()), Some(Strategy::Sparse));
    assert_eq!(collect(&env, &samples), 3);

    // Round 2: a burst in which half of the sensors report.
    for i in (0..SENSORS).step_by(2) {
        env.ports().set(outputs[i], reading(i, 2))?;
    }
    let tag = env.step(&queue)?.unwrap();
    assert_eq!(tag.time(), t0 + 2 * LINK_DELAY);
    assert_eq!(
        env.ports().active_indices(samples.bank()),
        Some(ActiveIndices::Dense(0..SENSORS))
    );
    assert_eq!(collect(&env, &samples), SENSORS / 2);

    // Round 3: back to a quiet network.
    env.ports().set(outputs[9], reading(9, 3))?;
    env.step(&queue)?;
    assert_eq!(env.ports().strategy(samples.bank()), Some(Strategy::Sparse));
    assert_eq!(collect(&env, &samples), 1);

    assert_eq!(env.step(&queue)?, None);
    env.shutdown()?;

    Ok(())
}
