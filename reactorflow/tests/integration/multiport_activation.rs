//! Activation tracking of multiport banks.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use reactorflow::element::ReactorId;
use reactorflow::ports::{
    ActiveIndices, BankConfig, Direction, Multiport, Strategy, StrategyPolicy,
};
use reactorflow::scheduler::EventQueue;
use reactorflow::time::MonotonicTime;
use reactorflow::{Environment, ValidationError};

use crate::init_tracing;

const WIDTH: usize = 100;

/// An environment with a single reactor owning an input bank.
fn bank_env(config: BankConfig) -> (Environment, ReactorId, Multiport<u64>) {
    let mut env = Environment::new("env").with_bank_config(config);
    let top = env.add_reactor("top", ()).unwrap();
    let bank = env.add_input_multiport::<u64>(top, "in", WIDTH).unwrap();
    env.assemble().unwrap();
    env.startup(Arc::new(EventQueue::new(MonotonicTime::EPOCH)))
        .unwrap();

    (env, top, bank)
}

fn active_set(env: &Environment, bank: &Multiport<u64>) -> BTreeSet<usize> {
    env.ports()
        .active_indices(bank.bank())
        .unwrap()
        .iter()
        .collect()
}

#[test]
fn multiport_members_are_named_by_index() {
    init_tracing();

    let (env, top, bank) = bank_env(BankConfig::default());

    assert_eq!(bank.len(), WIDTH);
    assert_eq!(env.inputs(top).len(), WIDTH);
    assert_eq!(env.name(bank[7]), "in[7]");
    assert_eq!(env.fqn(bank[42]), "top.in[42]");
    assert_eq!(env.ports().capacity(bank.bank()), Some(2 * WIDTH));
}

#[test]
fn multiport_sparse_activation() {
    init_tracing();

    let (env, _, bank) = bank_env(BankConfig::default());

    for k in [1, 5, 15] {
        let indices: BTreeSet<usize> = (0..k).map(|i| (i * 37 + 11) % WIDTH).collect();
        assert_eq!(indices.len(), k);
        for &i in &indices {
            env.ports().set(bank[i], i as u64).unwrap();
        }

        assert_eq!(env.ports().strategy(bank.bank()), Some(Strategy::Sparse));
        let active = env.ports().active_indices(bank.bank()).unwrap();
        assert!(matches!(active, ActiveIndices::Sparse(_)));
        assert_eq!(active.len(), k);
        assert_eq!(active_set(&env, &bank), indices);

        env.cleanup();
        assert!(env.ports().active_indices(bank.bank()).unwrap().is_empty());
    }
}

#[test]
fn multiport_switches_to_dense() {
    init_tracing();

    let (env, _, bank) = bank_env(BankConfig::default());

    for i in 0..25 {
        env.ports().set(bank[i * 4], 0).unwrap();
    }

    assert_eq!(env.ports().strategy(bank.bank()), Some(Strategy::Dense));
    assert_eq!(
        env.ports().active_indices(bank.bank()),
        Some(ActiveIndices::Dense(0..WIDTH))
    );

    // Reset on clear is the default policy.
    env.cleanup();
    assert_eq!(env.ports().strategy(bank.bank()), Some(Strategy::Sparse));
    env.ports().set(bank[3], 0).unwrap();
    assert_eq!(active_set(&env, &bank), BTreeSet::from([3]));
}

#[test]
fn multiport_member_cleared_mid_step() {
    init_tracing();

    let (env, _, bank) = bank_env(BankConfig::default());

    env.ports().set(bank[3], 3).unwrap();
    env.ports().clear(bank[3]);
    env.ports().set(bank[7], 7).unwrap();
    env.ports().set(bank[3], 3).unwrap();

    assert_eq!(active_set(&env, &bank), BTreeSet::from([3, 7]));
    env.cleanup();
    assert!(active_set(&env, &bank).is_empty());
}

#[test]
fn multiport_explicit_activation_is_idempotent() {
    init_tracing();

    let config = BankConfig::default()
        .with_capacity(2)
        .with_dense_threshold_percent(100);
    let (env, _, bank) = bank_env(config);

    env.ports().set(bank[3], 0).unwrap();
    for _ in 0..4 {
        assert_eq!(env.ports().activate(bank[3]), Ok(false));
    }
    assert_eq!(
        env.ports().active_indices(bank.bank()),
        Some(ActiveIndices::Sparse(vec![3]))
    );

    // The remaining slot is still available.
    env.ports().set(bank[9], 0).unwrap();
    assert_eq!(active_set(&env, &bank), BTreeSet::from([3, 9]));
}

#[test]
fn multiport_persistent_dense_strategy() {
    init_tracing();

    let (env, _, bank) = bank_env(BankConfig::default().with_policy(StrategyPolicy::Persist));

    for i in 0..21 {
        env.ports().set(bank[i], 0).unwrap();
    }
    assert_eq!(env.ports().strategy(bank.bank()), Some(Strategy::Dense));

    env.cleanup();
    assert_eq!(env.ports().strategy(bank.bank()), Some(Strategy::Dense));
    assert!(!env.ports().is_present(bank[0]));
}

#[test]
fn multiport_capacity_overflow() {
    init_tracing();

    let config = BankConfig::default()
        .with_capacity(10)
        .with_dense_threshold_percent(100);
    let (env, _, bank) = bank_env(config);

    for i in 0..10 {
        env.ports().set(bank[i], 0).unwrap();
    }
    assert_eq!(
        env.ports().set(bank[10], 0),
        Err(ValidationError::CapacityExceeded {
            port: bank[10].id(),
            capacity: 10
        })
    );
}

#[test]
fn multiport_reserve() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let bank = env
        .add_multiport_with::<u64>(
            top,
            "out",
            Direction::Output,
            8,
            BankConfig::default().with_dense_threshold_percent(100),
        )
        .unwrap();
    env.reserve(bank.bank(), 2).unwrap();
    assert_eq!(env.ports().capacity(bank.bank()), Some(2));
    assert_eq!(env.outputs(top).len(), 8);

    env.assemble().unwrap();
    env.startup(Arc::new(EventQueue::new(MonotonicTime::EPOCH)))
        .unwrap();
    assert!(matches!(
        env.reserve(bank.bank(), 16),
        Err(ValidationError::InvalidPhase { .. })
    ));

    env.ports().set(bank[0], 0).unwrap();
    env.ports().set(bank[1], 0).unwrap();
    assert!(matches!(
        env.ports().set(bank[2], 0),
        Err(ValidationError::CapacityExceeded { capacity: 2, .. })
    ));
}

#[test]
fn multiport_activation_through_bindings() {
    init_tracing();

    let mut env = Environment::new("env");
    let source = env.add_reactor("source", ()).unwrap();
    let sink = env.add_reactor("sink", ()).unwrap();
    let outputs = env.add_output_multiport::<u64>(source, "out", WIDTH).unwrap();
    let inputs = env.add_input_multiport::<u64>(sink, "in", WIDTH).unwrap();
    for (output, input) in outputs.iter().zip(inputs.iter()) {
        env.bind(output, input).unwrap();
    }
    env.assemble().unwrap();
    env.startup(Arc::new(EventQueue::new(MonotonicTime::EPOCH)))
        .unwrap();

    for i in [2, 50, 99] {
        env.ports().set(outputs[i], i as u64).unwrap();
    }

    let expected = BTreeSet::from([2, 50, 99]);
    assert_eq!(active_set(&env, &outputs), expected);
    assert_eq!(active_set(&env, &inputs), expected);
    assert_eq!(env.ports().get(inputs[50]).as_deref(), Some(&50));

    env.cleanup();
    assert!(active_set(&env, &inputs).is_empty());
}

#[test]
fn multiport_concurrent_writers() {
    init_tracing();

    const THREADS: usize = 4;
    const PER_THREAD: usize = 4;

    let (env, _, bank) = bank_env(BankConfig::default());
    let ports = env.ports();

    thread::scope(|s| {
        for t in 0..THREADS {
            let bank = &bank;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let index = (t * PER_THREAD + i) * 6;
                    ports.set(bank[index], index as u64).unwrap();
                }
            });
        }
    });

    let expected: BTreeSet<usize> = (0..THREADS * PER_THREAD).map(|i| i * 6).collect();
    assert_eq!(env.ports().strategy(bank.bank()), Some(Strategy::Sparse));
    assert_eq!(active_set(&env, &bank), expected);
    for &i in &expected {
        assert_eq!(env.ports().get(bank[i]).as_deref(), Some(&(i as u64)));
    }
}

#[test]
fn multiport_teardown() {
    init_tracing();

    let (mut env, _, bank) = bank_env(BankConfig::default());
    env.ports().set(bank[1], 1).unwrap();
    env.cleanup();

    env.remove_multiport(bank.bank());
    assert_eq!(env.ports().active_indices(bank.bank()), None);
    assert_eq!(env.ports().strategy(bank.bank()), None);

    // Surviving members behave as plain ports.
    for i in 0..WIDTH {
        env.ports().set(bank[i], i as u64).unwrap();
        assert_eq!(env.ports().activate(bank[i]), Ok(false));
    }
    assert_eq!(env.ports().get(bank[99]).as_deref(), Some(&99));
    env.cleanup();
    assert!(!env.ports().is_present(bank[99]));

    // Removing twice is a no-op.
    env.remove_multiport(bank.bank());
}

#[test]
fn multiport_removed_handle_stays_stale() {
    init_tracing();

    let mut env = Environment::new("env");
    let top = env.add_reactor("top", ()).unwrap();
    let old = env.add_input_multiport::<u64>(top, "old", 10).unwrap();
    env.remove_multiport(old.bank());
    let new = env.add_input_multiport::<u64>(top, "new", WIDTH).unwrap();

    assert_eq!(env.ports().active_indices(old.bank()), None);
    assert_eq!(env.ports().capacity(old.bank()), None);
    assert_eq!(env.ports().capacity(new.bank()), Some(2 * WIDTH));

    env.reserve(old.bank(), 1).unwrap();
    assert_eq!(env.ports().capacity(new.bank()), Some(2 * WIDTH));
}
