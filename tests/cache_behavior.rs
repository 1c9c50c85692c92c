//! Persistent cache behavior across warehouse reopens.

use lookthru_core::resolve::{AliasKind, CacheStatus, ResolutionCache};
use lookthru_core::{Identifier, Warehouse, WarehouseConfig};
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> WarehouseConfig {
    WarehouseConfig {
        lookthru_home: dir.to_path_buf(),
        db_path: dir.join("cache.duckdb"),
        max_pool_size: 2,
    }
}

fn apple() -> Identifier {
    Identifier::parse("US0378331005").expect("valid identifier")
}

#[test]
fn resolutions_survive_a_reopen() {
    let temp = tempdir().expect("tempdir");

    {
        let warehouse = Warehouse::open(config(temp.path())).expect("open");
        let cache = ResolutionCache::new(warehouse, 24, 1);
        cache
            .set_positive("AAPL", AliasKind::Ticker, &apple(), 0.75, "finnhub")
            .expect("set");
    }

    let warehouse = Warehouse::open(config(temp.path())).expect("reopen");
    let cache = ResolutionCache::new(warehouse, 24, 1);
    let entry = cache
        .get("AAPL", AliasKind::Ticker)
        .expect("get")
        .expect("hit after reopen");
    assert_eq!(entry.identifier, Some(apple()));
    assert_eq!(entry.status, CacheStatus::Resolved);
    assert_eq!(entry.source.as_deref(), Some("finnhub"));
}

#[test]
fn ticker_and_name_entries_do_not_collide() {
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::open(config(temp.path())).expect("open");
    let cache = ResolutionCache::new(warehouse, 24, 1);

    cache
        .set_positive("APPLE", AliasKind::Ticker, &apple(), 0.95, "local_cache")
        .expect("set ticker");
    cache
        .set_negative("APPLE", AliasKind::Name, CacheStatus::Unresolved, None)
        .expect("set name");

    let ticker = cache
        .get("APPLE", AliasKind::Ticker)
        .expect("get")
        .expect("ticker hit");
    assert_eq!(ticker.status, CacheStatus::Resolved);

    let name = cache
        .get("APPLE", AliasKind::Name)
        .expect("get")
        .expect("name hit");
    assert_eq!(name.status, CacheStatus::Unresolved);
}

#[test]
fn expired_negative_entries_read_as_misses_and_purge() {
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::open(config(temp.path())).expect("open");
    let cache = ResolutionCache::new(warehouse, 24, 1);

    cache
        .set(
            "GHOST",
            AliasKind::Ticker,
            None,
            CacheStatus::Unresolved,
            0.0,
            Some("wikidata"),
            Some(-1),
        )
        .expect("set expired entry");
    cache
        .set_negative("FRESH", AliasKind::Ticker, CacheStatus::RateLimited, Some("wikidata"))
        .expect("set fresh entry");

    assert!(cache.get("GHOST", AliasKind::Ticker).expect("get").is_none());
    assert!(cache
        .is_negative_cached("FRESH", AliasKind::Ticker)
        .expect("check"));

    // GHOST was already lazily deleted by the read above.
    assert_eq!(cache.cleanup_expired().expect("cleanup"), 0);
}

#[test]
fn positive_entries_never_expire() {
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::open(config(temp.path())).expect("open");
    let cache = ResolutionCache::new(warehouse, 0, 0);

    cache
        .set_positive("AAPL", AliasKind::Ticker, &apple(), 1.0, "provider")
        .expect("set");
    assert_eq!(cache.cleanup_expired().expect("cleanup"), 0);
    assert!(cache.get("AAPL", AliasKind::Ticker).expect("get").is_some());
}

#[test]
fn holdings_payloads_round_trip_with_freshness() {
    let temp = tempdir().expect("tempdir");
    let warehouse = Warehouse::open(config(temp.path())).expect("open");

    let payload = r#"[{"name":"Apple Inc","ticker":"AAPL","weight":60.0}]"#;
    warehouse
        .store_holdings("IE00B4L5Y983", Some("iShares Core MSCI World"), payload, "scraper")
        .expect("store");

    let fresh = warehouse
        .load_holdings("IE00B4L5Y983", Some(time::Duration::hours(24)))
        .expect("load")
        .expect("fresh row");
    assert_eq!(fresh.payload, payload);
    assert_eq!(fresh.fund_name.as_deref(), Some("iShares Core MSCI World"));

    // A zero-width freshness window makes the same row stale, but the
    // row itself is retained for explicit recovery.
    let stale = warehouse
        .load_holdings("IE00B4L5Y983", Some(time::Duration::seconds(0)))
        .expect("load");
    assert!(stale.is_none());
    assert!(warehouse
        .load_holdings("IE00B4L5Y983", None)
        .expect("load")
        .is_some());
}
