use std::time::Duration;

use mcp_cache::Cache;

#[test]
fn expired_entry_is_a_miss() {
    let cache: Cache<String> = Cache::new(10, Duration::from_millis(20));
    cache.set("k", "v".to_string(), None);
    assert_eq!(cache.get("k"), Some("v".to_string()));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(cache.get("k"), None);
}

#[test]
fn capacity_evicts_lru_entry() {
    let cache: Cache<u32> = Cache::new(2, Duration::from_secs(60));
    cache.set("a", 1, None);
    cache.set("b", 2, None);
    // touch "a" so "b" becomes the least-recently-used entry
    assert_eq!(cache.get("a"), Some(1));
    cache.set("c", 3, None);
    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("c"), Some(3));
}

#[test]
fn invalidate_prefix_removes_matching_keys() {
    let cache: Cache<u32> = Cache::new(10, Duration::from_secs(60));
    cache.set("user:1", 1, None);
    cache.set("user:2", 2, None);
    cache.set("order:1", 3, None);
    cache.invalidate_prefix("user:");
    assert_eq!(cache.get("user:1"), None);
    assert_eq!(cache.get("user:2"), None);
    assert_eq!(cache.get("order:1"), Some(3));
}

#[test]
fn derive_key_is_deterministic() {
    let args = serde_json::json!({"a": 1, "b": "x"});
    let k1 = mcp_cache::derive_key("fn", &args);
    let k2 = mcp_cache::derive_key("fn", &args);
    assert_eq!(k1, k2);
    assert_ne!(k1, mcp_cache::derive_key("other_fn", &args));
}

#[tokio::test(start_paused = true)]
async fn sweeper_evicts_expired_entries_in_background() {
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    let cache = Arc::new(Cache::<u32>::new(10, Duration::from_millis(50)));
    cache.set("a", 1, None);
    let token = CancellationToken::new();
    let handle = mcp_cache::spawn_sweeper(cache.clone(), Duration::from_millis(10), token.clone());

    tokio::time::advance(Duration::from_millis(200)).await;
    tokio::task::yield_now().await;

    assert_eq!(cache.len(), 0);
    token.cancel();
    let _ = handle.await;
}
