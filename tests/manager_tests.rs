// Manager and facade tests
// Author: kelexine (https://github.com/kelexine)

use proptest::prelude::*;
use serial_test::serial;
use stashkit::cache::facade;
use stashkit::config::CacheConfig;
use stashkit::drivers::session::STORAGE_KEY;
use stashkit::session::{self, Session};
use stashkit::{CacheError, CacheManager, CacheValue};
use std::cell::Cell;
use tempfile::TempDir;

#[test]
fn test_manager_factory() {
    let cache = facade::make(CacheConfig::for_driver("array").with_prefix("app:"));

    assert!(cache.set("test", "value", None).unwrap());
    assert_eq!(cache.get("test").unwrap(), Some(CacheValue::from("value")));
    assert_eq!(cache.config().prefix, "app:");
}

#[test]
fn test_manager_file_driver_remember() {
    let dir = TempDir::new().unwrap();
    let manager = CacheManager::new(
        CacheConfig::for_driver("file")
            .with_path(dir.path())
            .with_prefix("db:")
            .with_ttl(Some(600)),
    );
    let queries = Cell::new(0);

    for _ in 0..3 {
        let users = manager
            .remember("users:all", Some(600), || {
                queries.set(queries.get() + 1);
                CacheValue::from(serde_json::json!([
                    {"id": 1, "name": "John Doe"},
                    {"id": 2, "name": "Jane Smith"}
                ]))
            })
            .unwrap();
        assert!(matches!(users, CacheValue::List(ref rows) if rows.len() == 2));
    }

    assert_eq!(queries.get(), 1);
}

#[test]
fn test_manager_rejects_unknown_driver() {
    let manager = CacheManager::new(CacheConfig::for_driver("apc"));
    let result = manager.set("k", 1i64, None);
    assert!(matches!(result, Err(CacheError::UnsupportedDriver(ref name)) if name == "apc"));
}

#[test]
fn test_manager_surfaces_unreachable_redis() {
    let mut config = CacheConfig::for_driver("redis");
    config.port = 1;
    config.timeout = 0.2;

    let manager = CacheManager::new(config);
    assert!(matches!(manager.driver(None), Err(CacheError::Connection(_))));
}

#[test]
#[serial]
fn test_facade_uses_injected_instance() {
    facade::set_instance(facade::make(CacheConfig::for_driver("array")));

    assert!(facade::set("facade_test", "works", None).unwrap());
    assert_eq!(facade::get("facade_test").unwrap(), Some(CacheValue::from("works")));
    assert_eq!(facade::increment("hits", 2).unwrap(), 2);
    assert_eq!(facade::decrement("hits", 1).unwrap(), 1);

    facade::reset_instance();
}

#[test]
#[serial]
fn test_facade_instance_is_shared() {
    facade::reset_instance();

    let first = facade::instance_with(CacheConfig::for_driver("memory"));
    let second = facade::instance_with(CacheConfig::for_driver("redis"));
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(second.config().driver, "memory");

    facade::set("k", 5i64, None).unwrap();
    assert!(facade::has("k").unwrap());
    assert!(facade::delete("k").unwrap());
    assert!(!facade::has("k").unwrap());

    facade::reset_instance();
}

#[test]
#[serial]
fn test_facade_replacement_is_wholesale() {
    facade::set_instance(facade::make(CacheConfig::for_driver("array")));
    facade::set("k", "old", None).unwrap();

    facade::set_instance(facade::make(CacheConfig::for_driver("array")));
    assert_eq!(facade::get_or("k", "gone").unwrap(), CacheValue::from("gone"));

    facade::reset_instance();
}

#[test]
#[serial]
fn test_facade_session_driver_isolates_users() {
    facade::set_instance(facade::make(CacheConfig::for_driver("session")));
    let alice = Session::with_id("alice");
    let bob = Session::with_id("bob");

    let writer = {
        let alice = alice.clone();
        std::thread::spawn(move || {
            session::resume(alice);
            assert!(facade::set("cart", "alice-cart", None).unwrap());
            session::end();
        })
    };
    writer.join().unwrap();

    let reader = {
        let bob = bob.clone();
        std::thread::spawn(move || {
            session::resume(bob);
            let seen = facade::get("cart").unwrap();
            session::end();
            seen
        })
    };
    assert_eq!(reader.join().unwrap(), None);

    assert!(alice.contains(STORAGE_KEY));
    assert!(matches!(bob.get(STORAGE_KEY), Some(CacheValue::Map(ref bucket)) if bucket.is_empty()));
    session::resume(alice);
    assert_eq!(facade::get("cart").unwrap(), Some(CacheValue::from("alice-cart")));
    session::end();

    facade::reset_instance();
}

fn compact_value() -> impl Strategy<Value = CacheValue> {
    let leaf = prop_oneof![
        Just(CacheValue::Null),
        any::<bool>().prop_map(CacheValue::Bool),
        any::<i64>().prop_map(CacheValue::Int),
        (-1.0e9..1.0e9f64).prop_map(CacheValue::Float),
        "[a-z0-9 ]{0,12}".prop_map(CacheValue::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(CacheValue::List),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(CacheValue::Map),
        ]
    })
}

proptest! {
    #[test]
    fn prop_memory_set_then_get(key in "[a-z:]{1,16}", value in compact_value()) {
        let manager = CacheManager::new(CacheConfig::for_driver("memory"));
        prop_assert!(manager.set(&key, value.clone(), Some(600)).unwrap());
        prop_assert_eq!(manager.get(&key).unwrap(), Some(value));
    }
}
