/*!
 * Tests for translation cache functionality
 */

use subflow::segment::CacheKey;
use subflow::translation::TranslationCache;

#[test]
fn test_cache_withDifferentTargetLanguages_shouldKeepSeparateEntries() {
    let cache = TranslationCache::new(true);
    cache.insert(CacheKey::new("hello", "fr"), "bonjour");
    cache.insert(CacheKey::new("hello", "es"), "hola");

    assert_eq!(cache.lookup(&CacheKey::new("hello", "fr")).unwrap().translated_text, "bonjour");
    assert_eq!(cache.lookup(&CacheKey::new("hello", "es")).unwrap().translated_text, "hola");
    assert!(cache.lookup(&CacheKey::new("hello", "de")).is_none());
}

#[test]
fn test_cache_withDifferentCase_shouldMiss() {
    let cache = TranslationCache::new(true);
    cache.insert(CacheKey::new("Hello", "fr"), "Bonjour");

    assert!(cache.lookup(&CacheKey::new("hello", "fr")).is_none());
}

#[test]
fn test_cache_withSurroundingWhitespace_shouldHit() {
    let cache = TranslationCache::new(true);
    cache.insert(CacheKey::new("  see you\ttomorrow ", "fr"), "à demain");

    assert!(cache.lookup(&CacheKey::new("see you tomorrow", "fr")).is_some());
}

#[test]
fn test_cache_insertSameKey_shouldOverwriteAndResetHits() {
    let cache = TranslationCache::new(true);
    let key = CacheKey::new("hello", "fr");
    cache.insert(key.clone(), "bonjour");
    cache.lookup(&key);
    cache.insert(key.clone(), "salut");

    let entry = cache.lookup(&key).unwrap();
    assert_eq!(entry.translated_text, "salut");
    assert_eq!(entry.hit_count, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cacheStats_hitRate_shouldReflectLookups() {
    let cache = TranslationCache::default();
    assert_eq!(cache.stats().hit_rate(), 0.0);

    let key = CacheKey::new("hello", "fr");
    cache.lookup(&key);
    cache.insert(key.clone(), "bonjour");
    cache.lookup(&key);
    cache.lookup(&key);
    cache.lookup(&key);

    let stats = cache.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_cache_withConcurrentTasks_shouldCountEveryLookup() {
    let cache = TranslationCache::new(true);
    cache.insert(CacheKey::new("shared", "fr"), "partagé");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    assert!(cache.lookup(&CacheKey::new("shared", "fr")).is_some());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.stats().hits, 160);
    assert_eq!(cache.lookup(&CacheKey::new("shared", "fr")).unwrap().hit_count, 161);
}
