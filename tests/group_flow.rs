// ==============================================
// GROUP LOAD PIPELINE TESTS (integration)
// ==============================================
//
// End-to-end behavior of the load pipeline: local cache population, request
// coalescing under miss storms, peer routing, and the peer-failure fallback.
// These flows span group + cache + flight + peer and belong here rather than
// in any single source file.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use ringcache::error::PeerError;
use ringcache::group::{Getter, GetterError, Group};
use ringcache::peer::{PeerGetter, PeerPicker, RingPicker};

// ==============================================
// Test doubles
// ==============================================

/// Origin loader over a fixed table, counting every invocation.
struct TableOrigin {
    rows: Vec<(&'static str, &'static str)>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl Getter for TableOrigin {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, GetterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        match self.rows.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => Ok(value.as_bytes().to_vec()),
            None => Err(format!("{key} not exist").into()),
        }
    }
}

fn scores_origin(calls: &Arc<AtomicUsize>) -> TableOrigin {
    TableOrigin {
        rows: vec![("Tom", "630"), ("Jack", "589"), ("Sam", "567")],
        calls: Arc::clone(calls),
        delay: Duration::ZERO,
    }
}

/// Peer that always answers with a fixed payload, counting calls.
struct StaticPeer {
    value: &'static [u8],
    calls: Arc<AtomicUsize>,
}

impl PeerGetter for StaticPeer {
    fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>, PeerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.to_vec())
    }
}

/// Peer whose transport always fails.
struct FailingPeer {
    calls: Arc<AtomicUsize>,
}

impl PeerGetter for FailingPeer {
    fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>, PeerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PeerError::new("connection refused"))
    }
}

/// Picker that routes every key to one peer, as if the whole keyspace were
/// owned remotely.
struct AlwaysRemote(Arc<dyn PeerGetter>);

impl PeerPicker for AlwaysRemote {
    fn pick(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        Some(Arc::clone(&self.0))
    }
}

// ==============================================
// Local loads and cache population
// ==============================================

#[test]
fn cold_get_loads_from_origin_and_caches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Group::new("flow-scores", 2 << 10, scores_origin(&calls));

    let view = group.get("Tom").unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Second lookup is a cache hit; the origin is not consulted again.
    let view = group.get("Tom").unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(group.cache_metrics().hits, 1);
}

#[test]
fn origin_failure_surfaces_and_is_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Group::new("flow-unknown-key", 2 << 10, scores_origin(&calls));

    let err = group.get("kkk").unwrap_err();
    assert_eq!(err.to_string(), "kkk not exist");

    // Failures are not negative-cached: the next lookup retries the origin.
    assert!(group.get("kkk").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_value_is_cached_like_any_other() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let group = Group::new(
        "flow-empty-value",
        2 << 10,
        move |_: &str| -> Result<Vec<u8>, GetterError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        },
    );

    let view = group.get("void").unwrap();
    assert!(view.is_empty());

    let view = group.get("void").unwrap();
    assert!(view.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ==============================================
// Miss storms and coalescing
// ==============================================

#[test]
fn concurrent_misses_trigger_one_origin_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Group::new(
        "flow-miss-storm",
        2 << 10,
        TableOrigin {
            rows: vec![("Tom", "630")],
            calls: Arc::clone(&calls),
            // Slow origin keeps the episode open while the storm arrives.
            delay: Duration::from_millis(100),
        },
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let group = Arc::clone(&group);
            thread::spawn(move || group.get("Tom").unwrap().to_vec())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), b"630");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_failures_share_one_origin_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let group = Group::new(
        "flow-error-storm",
        2 << 10,
        move |key: &str| -> Result<Vec<u8>, GetterError> {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            Err(format!("{key} unavailable").into())
        },
    );

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let group = Arc::clone(&group);
            thread::spawn(move || group.get("shared").unwrap_err().to_string())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "shared unavailable");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ==============================================
// Peer routing
// ==============================================

#[test]
fn remote_hit_skips_origin_and_local_cache() {
    let origin_calls = Arc::new(AtomicUsize::new(0));
    let peer_calls = Arc::new(AtomicUsize::new(0));

    let group = Group::new("flow-peer-hit", 2 << 10, scores_origin(&origin_calls));
    group.register_peers(AlwaysRemote(Arc::new(StaticPeer {
        value: b"630",
        calls: Arc::clone(&peer_calls),
    })));

    let view = group.get("Tom").unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(origin_calls.load(Ordering::SeqCst), 0);
    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);

    // Peer results are not cached locally — the owner is the authority, so
    // the next miss goes back over the wire.
    let view = group.get("Tom").unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(peer_calls.load(Ordering::SeqCst), 2);
    assert_eq!(origin_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn peer_failure_falls_back_to_origin_and_caches() {
    let origin_calls = Arc::new(AtomicUsize::new(0));
    let peer_calls = Arc::new(AtomicUsize::new(0));

    let group = Group::new("flow-peer-fallback", 2 << 10, scores_origin(&origin_calls));
    group.register_peers(AlwaysRemote(Arc::new(FailingPeer {
        calls: Arc::clone(&peer_calls),
    })));

    let view = group.get("Tom").unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(origin_calls.load(Ordering::SeqCst), 1);

    // The fallback result was cached locally, so neither the peer nor the
    // origin is consulted again.
    let view = group.get("Tom").unwrap();
    assert_eq!(view.to_vec(), b"630");
    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(origin_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn ring_picker_splits_keys_between_local_and_remote() {
    let origin_calls = Arc::new(AtomicUsize::new(0));
    let peer_calls = Arc::new(AtomicUsize::new(0));

    // Probe picker with the same layout as the group's, used to predict
    // which side of the ring each key lands on.
    let probe = RingPicker::new("node-a", 50);
    let picker = RingPicker::new("node-a", 50);
    for p in [&probe, &picker] {
        p.set_peers([
            (
                "node-a".to_string(),
                Arc::new(StaticPeer {
                    value: b"from-a",
                    calls: Arc::new(AtomicUsize::new(0)),
                }) as Arc<dyn PeerGetter>,
            ),
            (
                "node-b".to_string(),
                Arc::new(StaticPeer {
                    value: b"from-b",
                    calls: Arc::clone(&peer_calls),
                }) as Arc<dyn PeerGetter>,
            ),
        ]);
    }

    let origin_counter = Arc::clone(&origin_calls);
    let group = Group::new(
        "flow-ring-routing",
        2 << 10,
        move |_: &str| -> Result<Vec<u8>, GetterError> {
            origin_counter.fetch_add(1, Ordering::SeqCst);
            Ok(b"local-value".to_vec())
        },
    );
    group.register_peers(picker);

    let keys: Vec<String> = (0..50).map(|i| format!("key-{i}")).collect();
    let remote_key = keys
        .iter()
        .find(|k| probe.pick(k).is_some())
        .expect("50 keys must land on node-b at least once");
    let local_key = keys
        .iter()
        .find(|k| probe.pick(k).is_none())
        .expect("50 keys must land on node-a at least once");

    // Remote-owned key: served by node-b's getter, origin untouched.
    let view = group.get(remote_key).unwrap();
    assert_eq!(view.to_vec(), b"from-b");
    assert_eq!(origin_calls.load(Ordering::SeqCst), 0);
    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);

    // Locally-owned key: the picker declines, the origin serves it.
    let view = group.get(local_key).unwrap();
    assert_eq!(view.to_vec(), b"local-value");
    assert_eq!(origin_calls.load(Ordering::SeqCst), 1);
    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);
}

// ==============================================
// Peer registration misuse
// ==============================================

#[test]
#[should_panic(expected = "register_peers called more than once")]
fn registering_peers_twice_panics() {
    let group = Group::new(
        "flow-double-register",
        1024,
        |_: &str| -> Result<Vec<u8>, GetterError> { Ok(b"x".to_vec()) },
    );

    let peer = Arc::new(StaticPeer {
        value: b"",
        calls: Arc::new(AtomicUsize::new(0)),
    });
    group.register_peers(AlwaysRemote(Arc::clone(&peer) as Arc<dyn PeerGetter>));
    group.register_peers(AlwaysRemote(peer as Arc<dyn PeerGetter>));
}
