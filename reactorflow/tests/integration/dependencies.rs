//! Declaration of reaction dependencies on ports.

use std::sync::Arc;

use reactorflow::element::{ReactionId, ReactorId};
use reactorflow::environment::{AssemblyContext, Phase};
use reactorflow::ports::PortRef;
use reactorflow::scheduler::EventQueue;
use reactorflow::time::MonotonicTime;
use reactorflow::{Environment, Reactor, ValidationError};

use crate::init_tracing;

#[derive(Default)]
struct Parent {
    child: Option<ReactorId>,
}

impl Reactor for Parent {
    fn assemble(&mut self, cx: &mut AssemblyContext<'_>) -> Result<(), ValidationError> {
        self.child = Some(cx.add_reactor("child", ())?);

        Ok(())
    }
}

struct Bench {
    env: Environment,
    reaction: ReactionId,
    parent_in: PortRef<i32>,
    parent_out: PortRef<i32>,
    child_in: PortRef<i32>,
    child_out: PortRef<i32>,
}

fn bench() -> Bench {
    let mut env = Environment::new("env");
    let parent = env.add_reactor("parent", Parent::default()).unwrap();
    env.assemble().unwrap();
    let child = env.reactor::<Parent>(parent).unwrap().child.unwrap();

    let parent_in = env.add_input(parent, "in").unwrap();
    let parent_out = env.add_output(parent, "out").unwrap();
    let child_in = env.add_input(child, "in").unwrap();
    let child_out = env.add_output(child, "out").unwrap();
    let reaction = env.add_reaction(parent, "react").unwrap();

    Bench {
        env,
        reaction,
        parent_in,
        parent_out,
        child_in,
        child_out,
    }
}

fn is_invalid_dependency(result: Result<(), ValidationError>) -> bool {
    matches!(result, Err(ValidationError::InvalidDependency { .. }))
}

#[test]
fn dependency_sets_are_recorded() {
    init_tracing();

    let Bench {
        mut env,
        reaction,
        parent_in,
        parent_out,
        child_in,
        child_out,
    } = bench();

    env.declare_trigger(reaction, parent_in).unwrap();
    env.declare_dependency(reaction, child_out).unwrap();
    env.declare_antidependency(reaction, parent_out).unwrap();
    env.declare_antidependency(reaction, child_in).unwrap();

    let sets = env.ports().dependencies(parent_in);
    assert!(sets.triggers().contains(&reaction));
    assert!(sets.dependencies().contains(&reaction));

    let sets = env.ports().dependencies(child_out);
    assert!(sets.triggers().is_empty());
    assert!(sets.dependencies().contains(&reaction));

    assert!(env
        .ports()
        .dependencies(parent_out)
        .anti_dependencies()
        .contains(&reaction));

    let reaction = env.reaction(reaction);
    assert_eq!(reaction.name(), "react");
    assert_eq!(reaction.triggers(), &[parent_in.id()]);
    assert_eq!(reaction.dependencies(), &[parent_in.id(), child_out.id()]);
    assert_eq!(
        reaction.anti_dependencies(),
        &[parent_out.id(), child_in.id()]
    );
}

#[test]
fn dependency_container_rules() {
    init_tracing();

    let Bench {
        mut env,
        reaction,
        parent_in,
        parent_out,
        child_in,
        child_out,
    } = bench();

    // Inputs must belong to the reaction's reactor, outputs to a contained
    // reactor.
    assert!(is_invalid_dependency(env.declare_trigger(reaction, child_in)));
    assert!(is_invalid_dependency(env.declare_dependency(reaction, parent_out)));

    // And conversely for anti-dependencies.
    assert!(is_invalid_dependency(env.declare_antidependency(reaction, parent_in)));
    assert!(is_invalid_dependency(env.declare_antidependency(reaction, child_out)));

    assert!(env.reaction(reaction).dependencies().is_empty());
    assert!(env.ports().dependencies(child_in).triggers().is_empty());
}

#[test]
fn antidependency_on_bound_port_is_rejected() {
    init_tracing();

    let Bench {
        mut env,
        reaction,
        parent_in,
        child_in,
        ..
    } = bench();

    env.bind(parent_in, child_in).unwrap();
    assert_eq!(
        env.declare_antidependency(reaction, child_in),
        Err(ValidationError::InvalidDependency {
            port: child_in.id(),
            reaction,
            reason: "anti-dependencies may not be declared on ports with an inward binding",
        })
    );
}

#[test]
fn dependencies_require_the_assembly_phase() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let input = env.add_input::<i32>(top, "in").unwrap();
    let reaction = env.add_reaction(top, "react").unwrap();

    assert_eq!(
        env.declare_trigger(reaction, input),
        Err(ValidationError::InvalidPhase {
            expected: Phase::Assembly,
            actual: Phase::Construction
        })
    );

    env.assemble().unwrap();
    env.declare_trigger(reaction, input).unwrap();

    env.startup(Arc::new(EventQueue::new(MonotonicTime::EPOCH)))
        .unwrap();
    assert_eq!(
        env.declare_dependency(reaction, input),
        Err(ValidationError::InvalidPhase {
            expected: Phase::Assembly,
            actual: Phase::Execution
        })
    );
    assert!(matches!(
        env.add_input::<i32>(top, "late"),
        Err(ValidationError::InvalidPhase { .. })
    ));
}
