use cacheit::{
    cacheable, BoxError, CacheConfig, CacheMetadata, CacheStatus, CacheableSource,
    CompositeCache, ContextValues, FnContexts, InvalidationBus, MaxAge, ManualClock, View,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RECENT_CONTENT_TAG: &str = "cacheit_recent_content";

#[cacheable(tags = ["node:{id}"])]
#[derive(Debug, Clone)]
struct Node {
    id: u64,
    title: String,
}

/// Node storage that fires cache tags the way a persistence layer would.
struct NodeStore {
    nodes: RwLock<Vec<Node>>,
    bus: Arc<InvalidationBus>,
}

impl NodeStore {
    fn new(bus: Arc<InvalidationBus>) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            bus,
        }
    }

    fn insert(&self, id: u64, title: &str) {
        self.nodes.write().push(Node {
            id,
            title: title.to_string(),
        });
        self.bus.invalidate_tag(RECENT_CONTENT_TAG);
    }

    fn rename(&self, id: u64, title: &str) {
        if let Some(node) = self.nodes.write().iter_mut().find(|n| n.id == id) {
            node.title = title.to_string();
        }
        self.bus.invalidate_tag(&format!("node:{}", id));
    }

    fn load(&self, id: u64) -> Option<Node> {
        self.nodes.read().iter().find(|n| n.id == id).cloned()
    }

    fn latest(&self, count: usize) -> Vec<Node> {
        self.nodes.read().iter().rev().take(count).cloned().collect()
    }
}

fn recent_content(
    cache: &CompositeCache<String>,
    store: &NodeStore,
    renders: &AtomicUsize,
) -> cacheit::Resolved<String> {
    let nodes = store.latest(3);
    let sources: Vec<&dyn CacheableSource> = nodes.iter().map(|n| n as &dyn CacheableSource).collect();
    let list_tag = CacheMetadata::new()
        .with_tags([RECENT_CONTENT_TAG])
        .with_contexts(["languages"]);

    let list = cacheit::LazyFragment::new("recent_content", &sources, || {
        renders.fetch_add(1, Ordering::SeqCst);
        Ok::<_, BoxError>(
            nodes
                .iter()
                .map(|n| n.title.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    })
    .with_metadata(list_tag);

    cache
        .resolve_view(View::new("recent_content").lazy_fragment(list))
        .unwrap()
}

fn setup(bin: &str) -> (Arc<InvalidationBus>, Arc<ManualClock>, CompositeCache<String>) {
    let bus = Arc::new(InvalidationBus::new());
    let clock = Arc::new(ManualClock::new());
    let cache = CompositeCache::builder()
        .config(CacheConfig::new().with_bin(bin))
        .bus(Arc::clone(&bus))
        .clock(Arc::clone(&clock))
        .contexts(ContextValues::new().with("languages", "en"))
        .build()
        .unwrap();
    (bus, clock, cache)
}

#[test]
fn test_insert_fires_list_tag() {
    let (bus, _clock, cache) = setup("recent_insert");
    let store = NodeStore::new(Arc::clone(&bus));
    let renders = AtomicUsize::new(0);
    store.insert(5, "Five");
    store.insert(7, "Seven");

    let first = recent_content(&cache, &store, &renders);
    assert_eq!(first.value, vec!["Seven, Five".to_string()]);
    assert!(first.metadata.has_tag("node:5"));
    assert!(first.metadata.has_tag(RECENT_CONTENT_TAG));
    assert_eq!(
        first.key.as_deref(),
        Some("recent_insert:recent_content:[languages]=en")
    );

    assert!(recent_content(&cache, &store, &renders).is_hit());
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    store.insert(9, "Nine");
    let refreshed = recent_content(&cache, &store, &renders);
    assert_eq!(refreshed.status, CacheStatus::Miss);
    assert_eq!(refreshed.value, vec!["Nine, Seven, Five".to_string()]);
    assert_eq!(renders.load(Ordering::SeqCst), 2);
}

#[test]
fn test_update_fires_node_tag() {
    let (bus, _clock, cache) = setup("recent_update");
    let store = NodeStore::new(Arc::clone(&bus));
    let renders = AtomicUsize::new(0);
    store.insert(5, "Five");

    recent_content(&cache, &store, &renders);
    store.rename(5, "Cinq");

    let refreshed = recent_content(&cache, &store, &renders);
    assert_eq!(refreshed.status, CacheStatus::Miss);
    assert_eq!(refreshed.value, vec!["Cinq".to_string()]);
}

#[test]
fn test_languages_do_not_share_entries() {
    let (bus, _clock, cache) = setup("recent_languages");
    let store = NodeStore::new(Arc::clone(&bus));
    store.insert(5, "Five");
    let node = store.load(5);

    let language = RwLock::new("en".to_string());
    let resolver = FnContexts(|context: &str| match context {
        "languages" => Some(language.read().clone()),
        _ => None,
    });
    let view = |label: &'static str| {
        View::new("greeting").lazy("title", &[&node], move || {
            Ok::<_, BoxError>(label.to_string())
        })
        .lazy_fragment(
            cacheit::LazyFragment::new("lang", &[], || Ok::<_, BoxError>(String::new()))
                .with_metadata(CacheMetadata::new().with_contexts(["languages"])),
        )
    };

    let english = cache.resolve_view_with(view("Hello"), &resolver).unwrap();
    *language.write() = "fr".to_string();
    let french = cache.resolve_view_with(view("Bonjour"), &resolver).unwrap();

    assert_eq!(english.status, CacheStatus::Miss);
    assert_eq!(french.status, CacheStatus::Miss);
    assert_ne!(english.key, french.key);
    assert_eq!(french.value[0], "Bonjour");

    *language.write() = "en".to_string();
    let again = cache.resolve_view_with(view("ignored"), &resolver).unwrap();
    assert!(again.is_hit());
    assert_eq!(again.value[0], "Hello");
}

#[test]
fn test_deleted_node_is_not_cached() {
    let (bus, _clock, cache) = setup("recent_deleted");
    let store = NodeStore::new(Arc::clone(&bus));
    let missing = store.load(404);

    let resolved = cache
        .resolve_view(View::new("teaser").lazy("node", &[&missing], || {
            Ok::<_, BoxError>("Not found".to_string())
        }))
        .unwrap();
    assert_eq!(resolved.status, CacheStatus::Uncacheable);
    assert!(cache.is_empty());
}

#[test]
fn test_conditions_link_expires_after_an_hour() {
    let (bus, clock, cache) = setup("recent_conditions");
    let store = NodeStore::new(Arc::clone(&bus));
    store.insert(2, "Conditions");
    let conditions = store.load(2);
    let hourly = CacheMetadata::new().with_max_age(MaxAge::Seconds(3600));

    let view = || {
        View::new("ad_block").lazy_fragment(
            cacheit::LazyFragment::new("conditions_link", &[&conditions], || {
                Ok::<_, BoxError>("/node/2".to_string())
            })
            .with_metadata(hourly.clone()),
        )
    };

    let first = cache.resolve_view(view()).unwrap();
    assert_eq!(first.metadata.max_age(), MaxAge::Seconds(3600));
    assert!(first.metadata.has_tag("node:2"));

    clock.advance(Duration::from_secs(1800));
    assert!(cache.resolve_view(view()).unwrap().is_hit());

    clock.advance(Duration::from_secs(1800));
    assert_eq!(cache.resolve_view(view()).unwrap().status, CacheStatus::Miss);
}
