use cacheit_core::{
    CacheConfig, CacheMetadata, CacheableSource, CompositeCache, InvalidationBus, MaxAge, View,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

fn node(id: usize) -> CacheMetadata {
    CacheMetadata::new()
        .with_tags([format!("node:{}", id)])
        .with_contexts(["languages"])
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [2, 10, 100].iter() {
        let items: Vec<CacheMetadata> = (0..*size)
            .map(|i| node(i).with_max_age(MaxAge::Seconds(60 + i as u64)))
            .collect();

        group.bench_with_input(BenchmarkId::new("merge_all", size), &items, |b, items| {
            b.iter(|| black_box(CacheMetadata::merge_all(items.iter())));
        });
    }

    group.finish();
}

fn new_cache(bus: &Arc<InvalidationBus>, bin: &str) -> CompositeCache<String> {
    CompositeCache::builder()
        .config(CacheConfig::new().with_bin(bin))
        .bus(Arc::clone(bus))
        .contexts(cacheit_core::ContextValues::new().with("languages", "en"))
        .build()
        .expect("valid bench configuration")
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for size in [1, 10, 50].iter() {
        let nodes: Vec<CacheMetadata> = (0..*size).map(node).collect();
        let sources: Vec<&dyn CacheableSource> =
            nodes.iter().map(|n| n as &dyn CacheableSource).collect();

        let bus = Arc::new(InvalidationBus::new());
        let cache = new_cache(&bus, "bench_hit");
        let view = || {
            View::new("recent_content").lazy("list", &sources, || {
                Ok::<_, std::io::Error>("rendered".to_string())
            })
        };
        cache.resolve_view(view()).expect("warm up");

        group.bench_with_input(BenchmarkId::new("hit", size), size, |b, _| {
            b.iter(|| black_box(cache.resolve_view(view()).expect("hit")));
        });

        group.bench_with_input(BenchmarkId::new("miss_after_invalidation", size), size, |b, _| {
            b.iter(|| {
                bus.invalidate_tag("node:0");
                black_box(cache.resolve_view(view()).expect("miss"))
            });
        });
    }

    group.finish();
}

fn bench_concurrent_invalidation(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_invalidation");

    group.bench_function("register_and_invalidate", |b| {
        b.iter(|| {
            let bus = Arc::new(InvalidationBus::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let bus = Arc::clone(&bus);
                    thread::spawn(move || {
                        for i in 0..100 {
                            let key = format!("render:{}:{}", t, i);
                            let tag = format!("node:{}", i);
                            let _ = bus.register(&key, [tag.as_str(), "cacheit_recent_content"]);
                            if i % 10 == 0 {
                                bus.invalidate_tag(&tag);
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                let _ = handle.join();
            }
            black_box(bus.invalidate_tag("cacheit_recent_content"))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_merge,
    bench_resolve,
    bench_concurrent_invalidation
);
criterion_main!(benches);
