use super::*;
use crate::store::MemoryStore;

// =============================================================================
// TimedCache
// =============================================================================

#[tokio::test(start_paused = true)]
async fn timed_cache_serves_value_inside_ttl() {
    let cache = TimedCache::with_ttl("recipes", Duration::from_secs(30));
    cache.put(vec!["borscht"]);

    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(cache.get(), Some(vec!["borscht"]));
}

#[tokio::test(start_paused = true)]
async fn timed_cache_expires_after_ttl() {
    let cache = TimedCache::with_ttl("recipes", Duration::from_secs(30));
    cache.put(1_u32);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(cache.get(), None);
}

#[tokio::test(start_paused = true)]
async fn untimed_cache_holds_until_invalidated() {
    let cache = TimedCache::until_invalidated("favorites");
    cache.put("pelmeni".to_owned());

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert_eq!(cache.get().as_deref(), Some("pelmeni"));

    cache.invalidate();
    assert_eq!(cache.get(), None);
}

// =============================================================================
// LikesCache
// =============================================================================

#[test]
fn likes_cache_records_per_recipe() {
    let store = Arc::new(MemoryStore::new());
    let likes = LikesCache::new(store.clone());

    likes.record(3, LikeState { liked: true, likes_count: 12 });
    likes.record(9, LikeState { liked: false, likes_count: 0 });

    assert_eq!(likes.get(3), Some(LikeState { liked: true, likes_count: 12 }));
    assert_eq!(likes.get(9), Some(LikeState { liked: false, likes_count: 0 }));
    assert_eq!(likes.get(4), None);
}

#[test]
fn likes_cache_survives_new_handle_on_same_store() {
    let store = Arc::new(MemoryStore::new());
    LikesCache::new(store.clone()).record(1, LikeState { liked: true, likes_count: 1 });

    assert!(LikesCache::new(store).get(1).is_some());
}

#[test]
fn likes_cache_invalidate_removes_key() {
    let store = Arc::new(MemoryStore::new());
    let likes = LikesCache::new(store.clone());
    likes.record(1, LikeState { liked: true, likes_count: 1 });

    likes.invalidate();
    assert!(!store.contains(LIKES_KEY));
    assert_eq!(likes.get(1), None);
}

#[test]
fn likes_cache_tolerates_garbage() {
    let store = Arc::new(MemoryStore::new());
    store.set(LIKES_KEY, "nonsense").unwrap();
    let likes = LikesCache::new(store);

    assert_eq!(likes.get(1), None);
    likes.record(1, LikeState { liked: true, likes_count: 2 });
    assert_eq!(likes.get(1).map(|s| s.likes_count), Some(2));
}
