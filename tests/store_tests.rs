use chrono::{Duration, Utc};
use keygate::{License, LicenseStore, SqliteStore, StoreError};

fn license(key: &str) -> License {
    License {
        license_key: key.to_string(),
        device_id: None,
        is_active: true,
        expires_at: None,
        created_at: Utc::now(),
    }
}

#[test]
fn insert_and_find_round_trip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let lic = License {
        expires_at: Some(Utc::now() + Duration::days(30)),
        ..license("K1")
    };
    store.insert(&lic).unwrap();

    let found = store.find_by_key("K1").unwrap().unwrap();
    assert_eq!(found.license_key, "K1");
    assert!(found.is_active);
    assert_eq!(found.device_id, None);
    // RFC 3339 storage keeps sub-second precision.
    assert_eq!(found.expires_at, lic.expires_at);
    assert_eq!(found.created_at, lic.created_at);

    assert!(store.find_by_key("other").unwrap().is_none());
}

#[test]
fn duplicate_insert_is_rejected_and_leaves_store_unchanged() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert(&license("K1")).unwrap();

    let mut dup = license("K1");
    dup.is_active = false;
    let err = store.insert(&dup).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(k) if k == "K1"));

    let found = store.find_by_key("K1").unwrap().unwrap();
    assert!(found.is_active, "original row must be untouched");
}

#[test]
fn try_bind_succeeds_only_while_unbound() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert(&license("K1")).unwrap();

    assert!(store.try_bind_device("K1", "dev-a").unwrap());
    assert!(!store.try_bind_device("K1", "dev-b").unwrap());

    let found = store.find_by_key("K1").unwrap().unwrap();
    assert_eq!(found.device_id.as_deref(), Some("dev-a"));
}

#[test]
fn try_bind_on_missing_key_reports_no_bind() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(!store.try_bind_device("missing", "dev-a").unwrap());
}

#[test]
fn empty_device_column_counts_as_unbound() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .insert(&License {
            device_id: Some(String::new()),
            ..license("K1")
        })
        .unwrap();

    let found = store.find_by_key("K1").unwrap().unwrap();
    assert_eq!(found.device_id, None);
    assert!(store.try_bind_device("K1", "dev-a").unwrap());
}

#[test]
fn set_active_is_idempotent_and_checks_existence() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert(&license("K1")).unwrap();

    store.set_active("K1", false).unwrap();
    store.set_active("K1", false).unwrap();
    assert!(!store.find_by_key("K1").unwrap().unwrap().is_active);

    let err = store.set_active("missing", false).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn list_recent_orders_newest_first_and_pages() {
    let store = SqliteStore::open_in_memory().unwrap();
    let base = Utc::now();
    for (i, key) in ["old", "mid", "new"].iter().enumerate() {
        store
            .insert(&License {
                created_at: base + Duration::seconds(i as i64),
                ..license(key)
            })
            .unwrap();
    }

    let all = store.list_recent(10, 0).unwrap();
    let keys: Vec<_> = all.iter().map(|l| l.license_key.as_str()).collect();
    assert_eq!(keys, vec!["new", "mid", "old"]);

    let page = store.list_recent(1, 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].license_key, "mid");
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("licenses.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert(&license("K1")).unwrap();
        store.try_bind_device("K1", "dev-a").unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let found = store.find_by_key("K1").unwrap().unwrap();
    assert_eq!(found.device_id.as_deref(), Some("dev-a"));
}
