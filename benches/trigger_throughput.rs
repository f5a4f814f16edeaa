use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use eventstate::{EventScope, EventTracker, ExecutionSpec, TrackerConfig};

/// Tracker with `listeners` keep-alive executions on "count", half of them gated.
fn make_tracker(config: TrackerConfig, listeners: usize) -> (EventTracker, Arc<AtomicU64>) {
    let tracker = EventTracker::new(config).unwrap();
    tracker.register_event("count", 0, EventScope::Session).unwrap();
    tracker.register_event("ready", false, EventScope::Instance).unwrap();

    let runs = Arc::new(AtomicU64::new(0));
    for i in 0..listeners {
        let seen = Arc::clone(&runs);
        let spec = ExecutionSpec::new(format!("listener-{i}"), ["count"], move |_, _| {
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .keep_alive(true);
        let spec = if i % 2 == 0 {
            spec.when(|_, t| t.integer_value_for_event("count") % 2 == 0)
        } else {
            spec
        };
        tracker.add_execution_block(spec);
    }
    (tracker, runs)
}

fn bench_trigger_no_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger");
    group.throughput(Throughput::Elements(1));

    group.bench_function("no_listeners_thread", |b| {
        b.iter_custom(|iters| {
            let (tracker, _) = make_tracker(TrackerConfig::default(), 0);
            let start = Instant::now();
            for _ in 0..iters {
                tracker.trigger_event("count");
            }
            tracker.flush().unwrap();
            start.elapsed()
        });
    });
    group.finish();
}

fn bench_trigger_with_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger_dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("16_listeners_thread", |b| {
        b.iter_custom(|iters| {
            // Fresh tracker per sample so the counter does not leak between samples.
            let (tracker, _runs) = make_tracker(TrackerConfig::default(), 16);
            let start = Instant::now();
            for _ in 0..iters {
                tracker.trigger_event("count");
            }
            tracker.flush().unwrap();
            start.elapsed()
        });
    });

    group.bench_function("16_listeners_host", |b| {
        b.iter_custom(|iters| {
            let (tracker, _runs) = make_tracker(TrackerConfig::host(), 16);
            let start = Instant::now();
            for _ in 0..iters {
                tracker.trigger_event("count");
            }
            tracker.flush().unwrap();
            start.elapsed()
        });
    });
    group.finish();
}

fn bench_add_and_run(c: &mut Criterion) {
    c.bench_function("add_and_run/one_shot", |b| {
        b.iter_custom(|iters| {
            let (tracker, _) = make_tracker(TrackerConfig::default(), 0);
            tracker.set_event("ready", true);
            tracker.flush().unwrap();

            let start = Instant::now();
            for i in 0..iters {
                let spec = ExecutionSpec::new(format!("once-{i}"), ["ready"], |_, _| {})
                    .when(|_, t| t.bool_value_for_event("ready"));
                tracker.add_and_run_execution_block(spec).unwrap();
            }
            start.elapsed()
        });
    });
}

fn bench_read_integer(c: &mut Criterion) {
    let (tracker, _) = make_tracker(TrackerConfig::default(), 0);
    c.bench_function("read/integer_value_for_event", |b| {
        b.iter(|| criterion::black_box(tracker.integer_value_for_event("count")));
    });
}

criterion_group!(
    trigger_throughput,
    bench_trigger_no_listeners,
    bench_trigger_with_listeners,
    bench_add_and_run,
    bench_read_integer
);
criterion_main!(trigger_throughput);
