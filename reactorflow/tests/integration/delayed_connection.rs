//! Delivery of values through delayed connections.

use std::sync::Arc;
use std::time::Duration;

use reactorflow::connection::{Channel, ConnectionKind, ConnectionProperties};
use reactorflow::environment::AssemblyContext;
use reactorflow::ports::{ActiveIndices, PortRef};
use reactorflow::scheduler::{EventQueue, Scheduler};
use reactorflow::time::{MonotonicTime, Tag};
use reactorflow::{Environment, Reactor, ValidationError};

use crate::init_tracing;

fn t0() -> MonotonicTime {
    MonotonicTime::new(100, 0).unwrap()
}

/// Ports of a reactor with one source feeding two sinks with different
/// delays.
struct Ports {
    source: PortRef<String>,
    slow: PortRef<String>,
    fast: PortRef<String>,
}

fn two_delay_env(slow: Duration, fast: Duration) -> (Environment, Arc<EventQueue>, Ports) {
    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let source = env.add_output::<String>(top, "source").unwrap();
    let slow_sink = env.add_input::<String>(top, "slow").unwrap();
    let fast_sink = env.add_input::<String>(top, "fast").unwrap();
    env.connect(source, slow_sink, ConnectionProperties::delayed(slow))
        .unwrap();
    env.connect(source, fast_sink, ConnectionKind::Delayed(fast))
        .unwrap();
    env.assemble().unwrap();

    let queue = Arc::new(EventQueue::new(t0()));
    env.startup(queue.clone()).unwrap();

    (
        env,
        queue,
        Ports {
            source,
            slow: slow_sink,
            fast: fast_sink,
        },
    )
}

#[test]
fn delayed_connection_delivers_at_exact_tag() {
    init_tracing();

    let (env, queue, ports) = two_delay_env(Duration::from_secs(10), Duration::from_secs(5));
    let graph = env.ports();

    graph.set(ports.source, String::from("sample")).unwrap();
    assert!(!graph.is_present(ports.slow));
    assert!(!graph.is_present(ports.fast));
    assert_eq!(queue.len(), 2);

    // Intermediate tag: only the fast connection delivers.
    let tag = env.step(&queue).unwrap();
    assert_eq!(tag, Some(Tag::from_time(t0() + Duration::from_secs(5))));
    assert!(!graph.is_present(ports.source));
    assert!(graph.is_present(ports.fast));
    assert!(!graph.is_present(ports.slow));
    assert_eq!(graph.get(ports.slow), None);

    let tag = env.step(&queue).unwrap();
    assert_eq!(tag, Some(Tag::from_time(t0() + Duration::from_secs(10))));
    assert!(!graph.is_present(ports.fast));
    assert_eq!(graph.get(ports.slow).as_deref().map(String::as_str), Some("sample"));

    assert_eq!(env.step(&queue).unwrap(), None);
    assert!(!graph.is_present(ports.slow));
}

#[test]
fn zero_delay_connection_defers_delivery() {
    init_tracing();

    let (env, queue, ports) = two_delay_env(Duration::ZERO, Duration::ZERO);
    let graph = env.ports();

    graph.set(ports.source, String::from("now")).unwrap();
    assert!(!graph.is_present(ports.slow));
    assert!(!graph.is_present(ports.fast));

    let tag = env.step(&queue).unwrap();
    assert_eq!(tag, Some(Tag::new(t0(), 1)));
    assert_eq!(queue.logical_tag(), Tag::new(t0(), 1));
    assert!(graph.is_present(ports.slow));
    assert!(graph.is_present(ports.fast));
}

#[test]
fn delayed_connection_keeps_latest_value_per_tag() {
    init_tracing();

    let (env, queue, ports) = two_delay_env(Duration::from_secs(1), Duration::from_secs(2));
    let graph = env.ports();

    graph.set(ports.source, String::from("first")).unwrap();
    env.cleanup();
    graph.set(ports.source, String::from("second")).unwrap();

    env.step(&queue).unwrap();
    assert_eq!(graph.get(ports.slow).as_deref().map(String::as_str), Some("second"));
    env.step(&queue).unwrap();
    assert_eq!(graph.get(ports.fast).as_deref().map(String::as_str), Some("second"));
    assert_eq!(env.step(&queue).unwrap(), None);
}

#[test]
fn cleared_source_triggers_connection_again() {
    init_tracing();

    let (env, queue, ports) = two_delay_env(Duration::from_secs(1), Duration::from_secs(2));
    let graph = env.ports();

    graph.set(ports.source, String::from("first")).unwrap();
    graph.clear(ports.source);
    graph.set(ports.source, String::from("second")).unwrap();
    // Each connection was scheduled once per write.
    assert_eq!(queue.len(), 4);

    env.step(&queue).unwrap();
    assert_eq!(graph.get(ports.slow).as_deref().map(String::as_str), Some("second"));
    env.step(&queue).unwrap();
    assert_eq!(graph.get(ports.fast).as_deref().map(String::as_str), Some("second"));
    assert_eq!(env.step(&queue).unwrap(), None);
}

#[test]
fn equal_delays_are_ordered_by_declaration() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let sources: Vec<PortRef<u32>> = (0..3)
        .map(|i| env.add_output(top, format!("src{i}")).unwrap())
        .collect();
    let sinks: Vec<PortRef<u32>> = (0..3)
        .map(|i| env.add_input(top, format!("dst{i}")).unwrap())
        .collect();
    for (&source, &sink) in sources.iter().zip(&sinks) {
        env.connect(source, sink, ConnectionProperties::delayed(Duration::from_millis(3)))
            .unwrap();
    }
    env.assemble().unwrap();
    let queue = Arc::new(EventQueue::new(t0()));
    env.startup(queue.clone()).unwrap();

    for (i, &source) in sources.iter().enumerate().rev() {
        env.ports().set(source, i as u32).unwrap();
    }

    let (tag, actions) = queue.next_tag().unwrap();
    assert_eq!(tag, Tag::from_time(t0() + Duration::from_millis(3)));
    assert_eq!(actions, env.actions(top));

    env.cleanup();
    env.trigger_actions(tag, &actions).unwrap();
    for (i, &sink) in sinks.iter().enumerate() {
        assert_eq!(env.ports().get(sink).as_deref(), Some(&(i as u32)));
    }
}

// A reactor relaying its input to its output through a delayed channel.
struct Relay {
    delay: Duration,
    input: Option<PortRef<u64>>,
    output: Option<PortRef<u64>>,
    channel: Option<Channel<u64>>,
}

impl Relay {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            input: None,
            output: None,
            channel: None,
        }
    }
}

impl Reactor for Relay {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        let input = cx.add_input("in")?;
        let output = cx.add_output("out")?;
        let channel = cx.add_channel::<u64>("line", self.delay)?;
        cx.bind(input, channel.incoming())?;
        cx.bind(channel.outgoing(), output)?;

        self.input = Some(input);
        self.output = Some(output);
        self.channel = Some(channel);

        Ok(())
    }
}

#[test]
fn channel_relays_through_bindings() {
    init_tracing();

    let mut env = Environment::new("env");
    let relay = env
        .add_reactor("relay", Relay::new(Duration::from_secs(2)))
        .unwrap();
    let sink = env.add_reactor("sink", ()).unwrap();
    let bank = env.add_input_multiport::<u64>(sink, "in", 10).unwrap();
    env.assemble().unwrap();

    let (input, output, channel) = {
        let relay = env.reactor::<Relay>(relay).unwrap();
        (
            relay.input.unwrap(),
            relay.output.unwrap(),
            relay.channel.clone().unwrap(),
        )
    };
    env.bind(output, bank[6]).unwrap();
    assert_eq!(env.fqn(channel.incoming()), "relay.line_in");
    assert_eq!(env.fqn(channel.action()), "relay.line");
    assert_eq!(env.actions(relay), &[channel.action()]);

    let queue = Arc::new(EventQueue::new(t0()));
    env.startup(queue.clone()).unwrap();

    env.ports().set(input, 64).unwrap();
    assert!(env.ports().is_present(channel.incoming()));
    assert!(!env.ports().is_present(bank[6]));

    let tag = env.step(&queue).unwrap().unwrap();
    assert_eq!(tag.time(), t0() + Duration::from_secs(2));
    assert_eq!(env.ports().get(bank[6]).as_deref(), Some(&64));
    assert_eq!(
        env.ports().active_indices(bank.bank()),
        Some(ActiveIndices::Sparse(vec![6]))
    );
}

#[test]
fn connection_without_scheduler_drops_the_value() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let source = env.add_output::<u8>(top, "source").unwrap();
    let sink = env.add_input::<u8>(top, "sink").unwrap();
    env.connect(source, sink, ConnectionProperties::delayed(Duration::ZERO))
        .unwrap();

    env.ports().set(source, 1).unwrap();
    assert!(env.ports().is_present(source));
    assert!(!env.ports().is_present(sink));

    // The value set before startup is discarded by the startup reset.
    env.assemble().unwrap();
    let queue = Arc::new(EventQueue::new(t0()));
    env.startup(queue.clone()).unwrap();
    assert!(!env.ports().is_present(source));
    assert!(queue.is_empty());
}
