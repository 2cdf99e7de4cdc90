//! Value propagation through the port binding graph.

use std::sync::Arc;
use std::time::Duration;

use reactorflow::connection::ConnectionProperties;
use reactorflow::environment::AssemblyContext;
use reactorflow::ports::PortRef;
use reactorflow::scheduler::EventQueue;
use reactorflow::time::MonotonicTime;
use reactorflow::value::ImmutableValue;
use reactorflow::{Environment, Reactor, ValidationError};

use crate::init_tracing;

// A reactor forwarding its input to a nested reactor of the same kind, down to
// the requested depth.
struct Nest {
    depth: usize,
    upstream: Option<PortRef<String>>,
    input: Option<PortRef<String>>,
}

impl Nest {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            upstream: None,
            input: None,
        }
    }
}

impl Reactor for Nest {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        let input = cx.add_input("in")?;
        if let Some(upstream) = self.upstream {
            cx.bind(upstream, input)?;
        }
        if self.depth > 0 {
            let child = Nest {
                depth: self.depth - 1,
                upstream: Some(input),
                input: None,
            };
            cx.add_reactor(format!("level{}", self.depth - 1), child)?;
        }
        self.input = Some(input);

        Ok(())
    }
}

/// Returns the input ports of the nest, from the outermost to the innermost.
fn nest_inputs(env: &Environment, top: reactorflow::element::ReactorId) -> Vec<PortRef<String>> {
    let mut inputs = Vec::new();
    let mut current = Some(top);
    while let Some(id) = current {
        inputs.push(env.reactor::<Nest>(id).unwrap().input.unwrap());
        current = env.reactors(id).first().copied();
    }

    inputs
}

#[test]
fn binding_chain_forwards_presence_and_value() {
    init_tracing();

    const DEPTH: usize = 6;

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", Nest::new(DEPTH)).unwrap();
    env.assemble().unwrap();
    env.startup(Arc::new(EventQueue::new(MonotonicTime::EPOCH)))
        .unwrap();

    let inputs = nest_inputs(&env, top);
    assert_eq!(inputs.len(), DEPTH + 1);
    let innermost = *inputs.last().unwrap();
    assert_eq!(
        env.fqn(innermost),
        "top.level5.level4.level3.level2.level1.level0.in"
    );

    let value = ImmutableValue::new(String::from("payload"));
    env.ports().set(inputs[0], value.clone()).unwrap();

    for &input in &inputs {
        assert!(env.ports().is_present(input));
        let observed = env.ports().get(input).unwrap();
        assert_eq!(*observed, "payload");
        assert!(ImmutableValue::ptr_eq(&observed, &value));
    }
    assert_eq!(env.ports().inward_binding(innermost), Some(inputs[DEPTH - 1].id()));
}

#[test]
fn binding_accepts_a_single_producer() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let a = env.add_output::<u32>(top, "a").unwrap();
    let b = env.add_output::<u32>(top, "b").unwrap();
    let sink = env.add_input::<u32>(top, "sink").unwrap();
    let delayed_sink = env.add_input::<u32>(top, "delayed_sink").unwrap();

    env.bind(a, sink).unwrap();
    assert_eq!(
        env.bind(b, sink),
        Err(ValidationError::BindingConflict {
            source: b.id(),
            sink: sink.id()
        })
    );
    assert_eq!(
        env.connect(b, sink, ConnectionProperties::delayed(Duration::from_secs(1))),
        Err(ValidationError::BindingConflict {
            source: b.id(),
            sink: sink.id()
        })
    );

    env.connect(a, delayed_sink, ConnectionProperties::delayed(Duration::ZERO))
        .unwrap();
    assert!(matches!(
        env.bind(b, delayed_sink),
        Err(ValidationError::BindingConflict { .. })
    ));

    assert_eq!(env.ports().outward_bindings(a), &[sink.id()]);
    assert!(!env.ports().has_outward_bindings(b));
    assert!(env.ports().has_inward_binding(sink));
    assert!(!env.ports().has_inward_binding(delayed_sink));
}

#[test]
fn fan_out_shares_a_single_value() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let output = env.add_output::<Vec<u8>>(top, "out").unwrap();
    let inputs: Vec<PortRef<Vec<u8>>> = (0..3)
        .map(|i| env.add_input(top, format!("in{i}")).unwrap())
        .collect();
    for &input in &inputs {
        env.bind(output, input).unwrap();
    }

    env.ports().set(output, vec![1, 2, 3]).unwrap();

    let source = env.ports().get(output).unwrap();
    for &input in &inputs {
        assert!(ImmutableValue::ptr_eq(
            &env.ports().get(input).unwrap(),
            &source
        ));
    }

    // Copy-on-write: mutating a copy leaves the shared value untouched.
    let mut copy = env.ports().get(inputs[0]).unwrap().to_mutable();
    copy.push(4);
    assert_eq!(*env.ports().get(inputs[1]).unwrap(), vec![1, 2, 3]);
}

#[test]
fn cleanup_resets_every_port() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let output = env.add_output::<u32>(top, "out").unwrap();
    let input = env.add_input::<u32>(top, "in").unwrap();
    let idle = env.add_output::<u32>(top, "idle").unwrap();
    env.bind(output, input).unwrap();

    for step in 0..3 {
        env.ports().set(output, step).unwrap();
        assert_eq!(env.ports().get(input).as_deref(), Some(&step));

        env.cleanup();
        for port in [output, input, idle] {
            assert!(!env.ports().is_present(port));
            assert_eq!(env.ports().get(port), None);
        }
    }

    // Clearing a port that was never set is harmless.
    env.ports().clear(idle);
    assert!(!env.ports().is_present(idle));
}

#[test]
fn bound_port_cannot_be_set() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let output = env.add_output::<u32>(top, "out").unwrap();
    let input = env.add_input::<u32>(top, "in").unwrap();
    env.bind(output, input).unwrap();

    assert_eq!(
        env.ports().set(input, 1),
        Err(ValidationError::BoundPortWrite(input.id()))
    );
    assert_eq!(
        env.ports().set_value::<u32>(output, None),
        Err(ValidationError::NullValueRejected(output.id()))
    );
    assert!(!env.ports().is_present(input));
}
