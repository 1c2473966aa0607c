use super::*;
use std::sync::Arc;

fn lookup(m: &Memtable, key: &[u8], seq: SequenceNumber) -> (MemLookup, Vec<Vec<u8>>) {
    let mut operands = Vec::new();
    let r = m.get(key, seq, &mut operands);
    (r, operands)
}

// -------------------- Versions & snapshots --------------------

#[test]
fn add_and_get_latest() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"k1", b"v1");
    m.add(2, ValueType::Value, b"k1", b"v2");
    assert_eq!(m.len(), 2);
    assert_eq!(lookup(&m, b"k1", 10).0, MemLookup::Found(b"v2".to_vec()));
}

#[test]
fn snapshot_hides_newer_versions() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"k", b"old");
    m.add(5, ValueType::Value, b"k", b"new");
    assert_eq!(lookup(&m, b"k", 4).0, MemLookup::Found(b"old".to_vec()));
    assert_eq!(lookup(&m, b"k", 5).0, MemLookup::Found(b"new".to_vec()));
    assert_eq!(lookup(&m, b"k", 0).0, MemLookup::NotFound);
}

#[test]
fn tombstone_ends_lookup() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"k", b"v");
    m.add(2, ValueType::Deletion, b"k", b"");
    assert_eq!(lookup(&m, b"k", 2).0, MemLookup::Deleted);
    assert_eq!(lookup(&m, b"k", 1).0, MemLookup::Found(b"v".to_vec()));
    // tombstone is retained as a version
    assert_eq!(m.len(), 2);
}

#[test]
fn merge_operands_collected_newest_first() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"k", b"base");
    m.add(2, ValueType::Merge, b"k", b"m1");
    m.add(3, ValueType::Merge, b"k", b"m2");

    let (r, ops) = lookup(&m, b"k", 3);
    assert_eq!(r, MemLookup::Found(b"base".to_vec()));
    assert_eq!(ops, vec![b"m2".to_vec(), b"m1".to_vec()]);

    let (r, ops) = lookup(&m, b"other", 3);
    assert_eq!(r, MemLookup::NotFound);
    assert!(ops.is_empty());
}

#[test]
fn neighbouring_keys_do_not_leak() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"a", b"1");
    m.add(2, ValueType::Value, b"ab", b"2");
    assert_eq!(lookup(&m, b"a", 9).0, MemLookup::Found(b"1".to_vec()));
    assert!(!m.contains_key(b"b", 9));
}

// -------------------- Successive merges --------------------

#[test]
fn count_successive_merges_stops_at_base() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Merge, b"k", b"x");
    m.add(2, ValueType::Value, b"k", b"v");
    m.add(3, ValueType::Merge, b"k", b"y");
    m.add(4, ValueType::Merge, b"k", b"z");
    assert_eq!(m.count_successive_merge_entries(b"k", 10), 2);
    assert_eq!(m.count_successive_merge_entries(b"k", 3), 1);
    assert_eq!(m.count_successive_merge_entries(b"k", 2), 0);
    assert_eq!(m.count_successive_merge_entries(b"missing", 10), 0);
}

// -------------------- In-place updates --------------------

#[test]
fn update_overwrites_newest_value_in_place() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"k", b"v1");
    m.update(2, b"k", b"v2");
    assert_eq!(m.len(), 1);
    assert_eq!(lookup(&m, b"k", 2).0, MemLookup::Found(b"v2".to_vec()));
}

#[test]
fn update_adds_version_after_tombstone() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Deletion, b"k", b"");
    m.update(2, b"k", b"v");
    assert_eq!(m.len(), 2);
    assert_eq!(lookup(&m, b"k", 2).0, MemLookup::Found(b"v".to_vec()));
}

#[test]
fn update_callback_reports_missing_key() {
    let mut m = Memtable::new();
    let cb: InplaceCallback = Arc::new(|_, delta| UpdateStatus::Updated(delta.to_vec()));
    assert!(!m.update_callback(1, b"k", b"d", &cb));
    assert!(m.is_empty());
}

#[test]
fn update_callback_applies_decision() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"k", b"ab");

    let append: InplaceCallback = Arc::new(|prev, delta| {
        let mut v = prev.unwrap_or_default().to_vec();
        v.extend_from_slice(delta);
        UpdateStatus::UpdatedInplace(v)
    });
    assert!(m.update_callback(2, b"k", b"c", &append));
    assert_eq!(m.len(), 1);
    assert_eq!(lookup(&m, b"k", 2).0, MemLookup::Found(b"abc".to_vec()));

    let fresh: InplaceCallback = Arc::new(|_, delta| UpdateStatus::Updated(delta.to_vec()));
    assert!(m.update_callback(3, b"k", b"z", &fresh));
    assert_eq!(m.len(), 2);
    assert_eq!(lookup(&m, b"k", 3).0, MemLookup::Found(b"z".to_vec()));

    let reject: InplaceCallback = Arc::new(|_, _| UpdateStatus::Failed);
    assert!(m.update_callback(4, b"k", b"ignored", &reject));
    assert_eq!(lookup(&m, b"k", 4).0, MemLookup::Found(b"z".to_vec()));
}

// -------------------- Accounting --------------------

#[test]
fn approx_size_tracks_content() {
    let mut m = Memtable::new();
    assert_eq!(m.approx_size(), 0);
    m.add(1, ValueType::Value, b"a", b"aaa");
    assert_eq!(m.approx_size(), 1 + 3 + ENTRY_OVERHEAD);
    m.update(2, b"a", b"b");
    assert_eq!(m.approx_size(), 1 + 1 + ENTRY_OVERHEAD);
    m.clear();
    assert_eq!(m.approx_size(), 0);
    assert!(m.is_empty());
}

#[test]
fn iter_orders_newest_first_within_key() {
    let mut m = Memtable::new();
    m.add(1, ValueType::Value, b"b", b"1");
    m.add(3, ValueType::Value, b"a", b"3");
    m.add(2, ValueType::Merge, b"a", b"2");
    let order: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, _)| (k.user_key.clone(), k.sequence)).collect();
    assert_eq!(
        order,
        vec![(b"a".to_vec(), 3), (b"a".to_vec(), 2), (b"b".to_vec(), 1)]
    );
    assert_eq!(m.max_sequence(), 3);
}
