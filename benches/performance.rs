//! Performance benchmarks for the event bus and subscription manager.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tradesync::{
    default_watches, BusSubscription, ChangeEvent, ChangeKind, EventBus, MemoryFeed,
    SubscriptionManager, Table, TenantContext,
};

fn quote_event(n: usize) -> ChangeEvent {
    ChangeEvent::new(
        Table::Quotes,
        ChangeKind::Insert,
        json!({
            "id": format!("q{}", n),
            "buyer_id": "b1",
            "supplier_id": "s1",
            "status": "submitted",
            "unit_price": "10",
            "quantity": "5"
        }),
    )
}

/// Benchmark synchronous publish with varying listener counts
fn bench_bus_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_publish");

    for listeners in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, &listeners| {
                let bus = EventBus::new();
                let counter = Arc::new(AtomicUsize::new(0));
                let _subs: Vec<BusSubscription> = (0..listeners)
                    .map(|_| {
                        let counter = Arc::clone(&counter);
                        bus.subscribe(move |_| {
                            counter.fetch_add(1, Ordering::Relaxed);
                        })
                    })
                    .collect();
                let event = quote_event(0);

                b.iter(|| black_box(bus.publish(event.clone())));
            },
        );
    }

    group.finish();
}

/// Benchmark feed-to-bus routing through a live channel
fn bench_change_routing(c: &mut Criterion) {
    let feed = Arc::new(MemoryFeed::new());
    let bus = Arc::new(EventBus::new());
    let manager = SubscriptionManager::new(feed.clone(), bus.clone(), "bench");
    manager.start(&TenantContext::new("acme", "b1"), &default_watches());
    let _sub = bus.subscribe(|event| {
        black_box(event);
    });

    let mut n = 0;
    c.bench_function("change_routing", |b| {
        b.iter(|| {
            n += 1;
            black_box(feed.emit(quote_event(n)))
        })
    });
}

/// Benchmark context switches (teardown plus open)
fn bench_manager_switch(c: &mut Criterion) {
    let feed = Arc::new(MemoryFeed::new());
    let bus = Arc::new(EventBus::new());
    let manager = SubscriptionManager::new(feed, bus, "bench");
    let contexts = [
        TenantContext::new("acme", "u1"),
        TenantContext::new("acme", "u2"),
    ];
    let watches = default_watches();

    let mut flip = 0;
    c.bench_function("manager_switch", |b| {
        b.iter(|| {
            flip ^= 1;
            black_box(manager.start(&contexts[flip], &watches))
        })
    });

    c.bench_function("manager_start_stop", |b| {
        b.iter(|| {
            manager.start(&contexts[0], &watches);
            manager.stop();
        })
    });
}

criterion_group!(
    benches,
    bench_bus_publish,
    bench_change_routing,
    bench_manager_switch
);
criterion_main!(benches);
