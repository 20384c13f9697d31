//! An advertisement block: a cached teaser for the current product's ad, a
//! link to the conditions page that changes hourly and a validity countdown
//! recomputed on every request.
//!
//! Run with `RUST_LOG=cacheit_core=debug cargo run --example ad_block` to see
//! hits, misses and evictions.

use cacheit::{
    cacheable, BoxError, CacheConfig, CacheMetadata, CacheableSource, CompositeCache,
    ContextValues, InvalidationBus, LazyFragment, MaxAge, ManualClock, SourceUnavailable, View,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct Advertisement {
    id: u64,
    teaser: String,
    valid_for: Duration,
    clock: Arc<ManualClock>,
}

impl Advertisement {
    fn remaining(&self) -> Duration {
        self.valid_for.saturating_sub(self.clock.elapsed())
    }
}

// An ad may only be cached until it expires; once expired it is not cached at all.
impl CacheableSource for Advertisement {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
        Ok(CacheMetadata::new()
            .with_tags([format!("node:{}", self.id)])
            .with_contexts(["url.query_args:product_id"])
            .with_max_age(MaxAge::from(self.remaining())))
    }
}

#[cacheable(tags = ["node:{id}"])]
struct Page {
    id: u64,
    path: String,
}

fn render<'a>(
    ad: &'a Advertisement,
    conditions: &'a Page,
    clock: &Arc<ManualClock>,
) -> View<'a, String> {
    let countdown_clock = Arc::clone(clock);
    let valid_for = ad.valid_for;

    View::new("ad_block")
        .lazy("teaser", &[ad], move || {
            tracing::info!(ad = ad.id, "rendering teaser");
            Ok::<_, BoxError>(ad.teaser.clone())
        })
        .lazy_fragment(
            LazyFragment::new("conditions_link", &[conditions], move || {
                Ok::<_, BoxError>(format!("Conditions: {}", conditions.path))
            })
            .with_metadata(CacheMetadata::new().with_max_age(MaxAge::Seconds(3600))),
        )
        .placeholder("validity", move || {
            let left = valid_for.saturating_sub(countdown_clock.elapsed());
            Ok::<_, BoxError>(format!("Offer valid for {}s", left.as_secs()))
        })
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bus = Arc::new(InvalidationBus::new());
    let clock = Arc::new(ManualClock::new());
    let cache: CompositeCache<String> = CompositeCache::builder()
        .config(CacheConfig::load(None)?)
        .bus(Arc::clone(&bus))
        .clock(Arc::clone(&clock))
        .contexts(ContextValues::new().with("url.query_args:product_id", "12"))
        .build()?;

    let ad = Advertisement {
        id: 12,
        teaser: "Two for one on every umbrella".to_string(),
        valid_for: Duration::from_secs(600),
        clock: Arc::clone(&clock),
    };
    let conditions = Page {
        id: 2,
        path: "/node/2".to_string(),
    };

    for step in 0..3 {
        let resolved = cache.resolve_view(render(&ad, &conditions, &clock))?;
        println!(
            "request {} ({:?}, max-age {}):",
            step,
            resolved.status,
            resolved.metadata.max_age()
        );
        for line in &resolved.value {
            println!("  {}", line);
        }
        clock.advance(Duration::from_secs(90));
    }

    println!("advertisement edited");
    bus.invalidate_tag("node:12");

    let resolved = cache.resolve_view(render(&ad, &conditions, &clock))?;
    println!("request 3 ({:?}): {}", resolved.status, resolved.value.join(" | "));

    clock.advance(ad.remaining());
    println!("advertisement expired");
    let expired = cache.resolve_view(render(&ad, &conditions, &clock))?;
    let expired_status = expired.status;
    println!("request 4 ({:?}): {}", expired_status, expired.into_value().join(" | "));

    #[cfg(feature = "stats")]
    println!(
        "hits: {}, misses: {}, hit rate: {:.2}",
        cache.stats().hits(),
        cache.stats().misses(),
        cache.stats().hit_rate()
    );

    Ok(())
}
