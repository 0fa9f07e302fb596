use commonware_macros::test_traced;
use egress_arbiter::{
    arrival::{Fixed, Silent},
    Arbiter, Config, Queue, CREDIT_UNIT,
};
use rand::{rngs::StdRng, SeedableRng};

/// Two queues that receive exactly one message of `size` bytes every cycle.
fn saturated(total_bandwidth: u64, min_bandwidth: u64, size: u64) -> Config {
    Config {
        queues: 2,
        total_bandwidth,
        min_bandwidth,
        increase_bandwidth: 1,
        receive_time: 1,
        probability_mean: 1.0,
        probability_std: 0.0,
        min_size: size,
        max_size: size,
    }
}

#[test_traced]
fn test_both_queues_drain_in_one_pass() {
    let mut arbiter = Arbiter::new(StdRng::seed_from_u64(0), saturated(4, 2, 100)).unwrap();
    assert_eq!(arbiter.probabilities(), vec![1.0, 1.0]);
    assert_eq!(arbiter.bandwidths(), vec![2, 2]);

    arbiter.cycle();
    assert_eq!(arbiter.port().sent, vec![200]);
    assert_eq!(arbiter.port().remaining, vec![0]);
    for record in arbiter.records() {
        assert_eq!(record.sent, vec![100]);
        assert_eq!(record.backlog_count, vec![0]);
        assert_eq!(record.backlog_size, vec![0]);
        assert_eq!(record.total, 100);
    }
    assert!(!arbiter.last_pass().finished_early);
}

#[test_traced]
fn test_buffer_starvation_keeps_priority() {
    // Each queue holds 64 credit (enough to start a 100 byte send) but the shared
    // buffer only holds 128 bytes.
    let mut arbiter = Arbiter::new(StdRng::seed_from_u64(0), saturated(2, 1, 100)).unwrap();
    assert_eq!(arbiter.capacity(), 128);

    arbiter.cycle();
    assert_eq!(arbiter.port().sent, vec![100]);
    assert_eq!(arbiter.port().remaining, vec![100]);
    let starved = &arbiter.records()[1];
    assert_eq!(starved.sent, vec![0]);
    assert_eq!(starved.backlog_count, vec![1]);
    assert_eq!(starved.backlog_size, vec![100]);
    assert!(arbiter.last_pass().finished_early);
    assert_eq!(arbiter.cursor(), 1);

    // The starved queue is visited first
    arbiter.cycle();
    assert_eq!(arbiter.last_pass().visited[0], 1);
    assert_eq!(arbiter.records()[1].sent, vec![0, 100]);
    assert_eq!(arbiter.records()[0].sent, vec![100, 0]);
}

#[test_traced]
fn test_oversized_message_blocks_port() {
    // A message larger than the shared buffer can never be sent
    let queues = vec![Queue::new(1, Fixed(1000)), Queue::new(1, Fixed(10))];
    let mut arbiter = Arbiter::with_queues(StdRng::seed_from_u64(0), 2, 1, queues).unwrap();
    for cycle in 1..=5 {
        arbiter.cycle();
        assert_eq!(arbiter.cursor(), 0);
        assert_eq!(arbiter.last_pass().visited, vec![0]);
        assert_eq!(arbiter.records()[0].backlog_count.last(), Some(&cycle));
    }
    assert_eq!(arbiter.port().sent, vec![0; 5]);
}

#[test_traced]
fn test_huge_messages_saturate_instead_of_overflowing() {
    // Queue 0's messages never fit the buffer, so queue 1 accrues credit forever
    let total_bandwidth = i64::MAX as u64 / 128;
    let queues = vec![
        Queue::new(1, Fixed(u64::MAX / 4)),
        Queue::new(total_bandwidth, Fixed(10)),
    ];
    let mut arbiter =
        Arbiter::with_queues(StdRng::seed_from_u64(0), total_bandwidth, 1, queues).unwrap();
    assert!(u64::MAX / 4 > arbiter.capacity());
    for _ in 0..10 {
        arbiter.cycle();
        assert_eq!(arbiter.last_pass().visited, vec![0]);
    }
    assert_eq!(arbiter.queues()[1].credit(), i64::MAX);
    assert_eq!(arbiter.records()[0].backlog_size.last(), Some(&u64::MAX));
    assert_eq!(arbiter.port().remaining.last(), Some(&u64::MAX));
    assert_eq!(arbiter.port().sent, vec![0; 10]);
}

#[test]
fn test_huge_size_bound_is_rejected() {
    let cfg = Config {
        queues: 2,
        total_bandwidth: 64,
        min_bandwidth: 1,
        max_size: u64::MAX,
        ..Config::default()
    };
    assert!(matches!(
        Arbiter::new(StdRng::seed_from_u64(0), cfg),
        Err(egress_arbiter::Error::MessageTooLarge(u64::MAX))
    ));
}

#[test]
fn test_idle_credit_ceiling() {
    let cfg = Config {
        queues: 4,
        total_bandwidth: 64,
        probability_mean: 0.0,
        probability_std: 0.0,
        ..Config::default()
    };
    let mut arbiter = Arbiter::new(StdRng::seed_from_u64(0), cfg).unwrap();
    for _ in 0..1_000 {
        arbiter.cycle();
        for queue in arbiter.queues() {
            assert!(queue.is_empty());
            assert_eq!(queue.credit(), queue.credit_default());
        }
    }
    assert!(arbiter.port().sent.iter().all(|sent| *sent == 0));
}

#[test]
fn test_idle_queues_with_custom_policy() {
    let silent = vec![Queue::new(3, Silent); 3];
    let mut arbiter = Arbiter::with_queues(StdRng::seed_from_u64(0), 9, 3, silent).unwrap();
    for _ in 0..100 {
        arbiter.cycle();
        for queue in arbiter.queues() {
            assert!(queue.credit() <= queue.credit_default());
        }
    }
    assert_eq!(arbiter.port().remaining, vec![0; 100]);
}

#[test]
fn test_capacity_is_never_exceeded() {
    for seed in 0..20 {
        let cfg = Config {
            queues: 16,
            total_bandwidth: 400,
            min_bandwidth: 8,
            increase_bandwidth: 3,
            ..Config::default()
        };
        let mut arbiter = Arbiter::new(StdRng::seed_from_u64(seed), cfg).unwrap();
        for _ in 0..200 {
            arbiter.cycle();
            let pass = arbiter.last_pass();
            assert!(pass.total <= arbiter.capacity());
            assert_eq!(pass.total, pass.sent.values().sum::<u64>());
        }
        for cycle in 0..200 {
            let sent: u64 = arbiter.records().iter().map(|r| r.sent[cycle]).sum();
            assert_eq!(arbiter.port().sent[cycle], sent);
        }
    }
}

#[test_traced]
fn test_rotation_resumes_where_it_stopped() {
    let cfg = Config {
        queues: 8,
        total_bandwidth: 64,
        min_bandwidth: 4,
        increase_bandwidth: 2,
        ..Config::default()
    };
    let mut arbiter = Arbiter::new(StdRng::seed_from_u64(7), cfg).unwrap();
    let mut early = 0;
    for _ in 0..500 {
        let cursor = arbiter.cursor();
        arbiter.cycle();
        let pass = arbiter.last_pass().clone();
        assert_eq!(pass.visited[0], cursor);
        assert!(pass.visited.len() <= 8);
        if pass.finished_early {
            early += 1;
            assert_eq!(arbiter.cursor(), *pass.visited.last().unwrap());
        }
    }

    // Demand exceeds the port so the buffer is regularly the bottleneck
    assert!(early > 0);
}

#[test]
fn test_determinism() {
    let run = |seed| {
        let mut arbiter = Arbiter::new(StdRng::seed_from_u64(seed), Config::default()).unwrap();
        for _ in 0..250 {
            arbiter.cycle();
        }
        (
            arbiter.auditor().state(),
            arbiter.records().to_vec(),
            arbiter.port().clone(),
            arbiter.bandwidths(),
            arbiter.probabilities(),
        )
    };
    for seed in 0..5 {
        assert_eq!(run(seed), run(seed));
    }
    assert_ne!(run(1).0, run(2).0);
}

#[test]
fn test_usage_proportional_to_bandwidth() {
    // Small messages and heavy arrivals keep every queue backlogged
    let cfg = Config {
        queues: 8,
        total_bandwidth: 256,
        min_bandwidth: 16,
        increase_bandwidth: 4,
        receive_time: 60,
        probability_mean: 1.0,
        probability_std: 0.0,
        min_size: 64,
        max_size: 128,
    };
    let cycles = 300;
    let mut arbiter = Arbiter::new(StdRng::seed_from_u64(3), cfg).unwrap();
    assert_eq!(arbiter.bandwidths().iter().sum::<u64>(), 256);
    for _ in 0..cycles {
        arbiter.cycle();
    }
    for (queue, record) in arbiter.queues().iter().zip(arbiter.records()) {
        let granted = queue.bandwidth() * CREDIT_UNIT * cycles;
        let usage = record.total as f64 / granted as f64;
        assert!((0.9..=1.01).contains(&usage), "usage={usage}");
    }
    let sent: u64 = arbiter.port().sent.iter().sum();
    assert!(sent as f64 / (arbiter.capacity() * cycles) as f64 > 0.9);
}
