use super::*;
use common::Error;
use proptest::prelude::*;

// -------------------- Helpers --------------------

/// Renders a batch the way a human would read it, one record per entry.
#[derive(Default)]
struct Printer {
    out: Vec<String>,
    stop_after: Option<usize>,
}

impl Handler for Printer {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.out.push(format!(
            "Put({}, {})",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        ));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.out.push(format!("Delete({})", String::from_utf8_lossy(key)));
        Ok(())
    }

    fn merge(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.out.push(format!(
            "Merge({}, {})",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        ));
        Ok(())
    }

    fn log_data(&mut self, blob: &[u8]) {
        self.out.push(format!("LogData({})", String::from_utf8_lossy(blob)));
    }

    fn should_continue(&self) -> bool {
        self.stop_after.map_or(true, |n| self.out.len() < n)
    }
}

/// Implements only the required callbacks.
#[derive(Default)]
struct PutDeleteOnly {
    seen: usize,
}

impl Handler for PutDeleteOnly {
    fn put(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        self.seen += 1;
        Ok(())
    }

    fn delete(&mut self, _key: &[u8]) -> Result<()> {
        self.seen += 1;
        Ok(())
    }
}

fn print(b: &WriteBatch) -> Result<Vec<String>> {
    let mut p = Printer::default();
    b.iterate(&mut p)?;
    Ok(p.out)
}

// -------------------- Header --------------------

#[test]
fn empty_batch_is_header_only() {
    let b = WriteBatch::new();
    assert_eq!(b.size(), HEADER_SIZE);
    assert_eq!(b.count(), 0);
    assert_eq!(b.sequence(), 0);
    assert!(b.is_empty());
    assert!(b.records().unwrap().is_empty());
}

#[test]
fn header_layout_is_little_endian() {
    let mut b = WriteBatch::new();
    b.set_sequence(0x0102_0304_0506_0708);
    b.put(b"k", b"v");
    let data = b.data();
    assert_eq!(&data[..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
    assert_eq!(&data[8..12], &[1, 0, 0, 0]);
    assert_eq!(&data[12..], &[1, 1, b'k', 1, b'v']);
}

#[test]
fn clear_resets_sequence_and_records() {
    let mut b = WriteBatch::with_capacity(1024);
    b.set_sequence(42);
    b.put(b"a", b"1");
    b.clear();
    assert_eq!(b.size(), HEADER_SIZE);
    assert_eq!(b.count(), 0);
    assert_eq!(b.sequence(), 0);
}

#[test]
fn from_contents_rejects_short_buffer() {
    let err = WriteBatch::from_contents(vec![0; 11]).unwrap_err();
    assert!(err.is_corruption());
    assert!(WriteBatch::from_contents(vec![0; 12]).is_ok());
}

#[test]
fn set_contents_copies_bytes() {
    let mut src = WriteBatch::new();
    src.set_sequence(7);
    src.delete(b"x");

    let mut dst = WriteBatch::new();
    dst.put(b"junk", b"junk");
    dst.set_contents(src.data()).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn set_contents_rejects_short_buffer() {
    let mut b = WriteBatch::new();
    b.put(b"k", b"v");
    let before = b.clone();
    assert!(b.set_contents(&[0; 11]).unwrap_err().is_corruption());
    assert_eq!(b, before);
}

// -------------------- Iteration --------------------

#[test]
fn iterate_preserves_encoding_order() {
    let mut b = WriteBatch::new();
    b.put(b"foo", b"bar");
    b.delete(b"box");
    b.put(b"baz", b"boo");
    b.merge(b"foo", b"+1");
    assert_eq!(b.count(), 4);
    assert_eq!(
        print(&b).unwrap(),
        vec!["Put(foo, bar)", "Delete(box)", "Put(baz, boo)", "Merge(foo, +1)"]
    );
}

#[test]
fn log_data_is_replayed_but_not_counted() {
    let mut b = WriteBatch::new();
    b.put(b"k1", b"v1");
    b.put_log_data(b"blob1");
    b.delete(b"k2");
    b.put_log_data(b"blob2");
    assert_eq!(b.count(), 2);
    assert_eq!(
        print(&b).unwrap(),
        vec!["Put(k1, v1)", "LogData(blob1)", "Delete(k2)", "LogData(blob2)"]
    );
}

#[test]
fn put_parts_concatenates() {
    let mut b = WriteBatch::new();
    b.put_parts(&[b"ke", b"y"], &[b"va", b"l", b"ue"]);
    assert_eq!(
        b.records().unwrap(),
        vec![BatchRecord::Put {
            key: b"key".to_vec(),
            value: b"value".to_vec()
        }]
    );
}

#[test]
fn empty_keys_and_values_are_legal() {
    let mut b = WriteBatch::new();
    b.put(b"", b"");
    b.delete(b"");
    assert_eq!(print(&b).unwrap(), vec!["Put(, )", "Delete()"]);
}

#[test]
fn default_merge_callback_is_not_supported() {
    let mut b = WriteBatch::new();
    b.put(b"a", b"1");
    b.merge(b"a", b"2");
    b.delete(b"a");

    let mut h = PutDeleteOnly::default();
    let err = b.iterate(&mut h).unwrap_err();
    assert!(err.is_not_supported());
    // the put before the merge was applied, the delete after was not
    assert_eq!(h.seen, 1);
}

#[test]
fn default_log_data_callback_is_ignored() {
    let mut b = WriteBatch::new();
    b.put_log_data(b"meta");
    b.put(b"a", b"1");
    let mut h = PutDeleteOnly::default();
    b.iterate(&mut h).unwrap();
    assert_eq!(h.seen, 1);
}

#[test]
fn early_stop_skips_count_check() {
    let mut b = WriteBatch::new();
    b.put(b"a", b"1");
    b.put(b"b", b"2");
    b.put(b"c", b"3");

    let mut p = Printer {
        stop_after: Some(2),
        ..Printer::default()
    };
    b.iterate(&mut p).unwrap();
    assert_eq!(p.out, vec!["Put(a, 1)", "Put(b, 2)"]);
}

#[test]
fn handler_error_aborts_replay() {
    struct FailOnB(Vec<Vec<u8>>);
    impl Handler for FailOnB {
        fn put(&mut self, key: &[u8], _value: &[u8]) -> Result<()> {
            if key == b"b" {
                return Err(Error::InvalidArgument("no b".into()));
            }
            self.0.push(key.to_vec());
            Ok(())
        }
        fn delete(&mut self, _key: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    let mut b = WriteBatch::new();
    b.put(b"a", b"1");
    b.put(b"b", b"2");
    b.put(b"c", b"3");
    let mut h = FailOnB(Vec::new());
    let err = b.iterate(&mut h).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(h.0, vec![b"a".to_vec()]);
}

// -------------------- Corruption --------------------

#[test]
fn wrong_count_is_corruption() {
    let mut b = WriteBatch::new();
    b.put(b"a", b"1");
    let mut raw = b.into_data();
    raw[8] = 2;
    let b = WriteBatch::from_contents(raw).unwrap();
    let err = print(&b).unwrap_err();
    assert!(err.is_corruption());
    assert!(err.to_string().contains("wrong count"));
}

#[test]
fn truncated_record_is_corruption_after_applying_prefix() {
    let mut b = WriteBatch::new();
    b.put(b"foo", b"bar");
    b.delete(b"box");
    let mut raw = b.into_data();
    raw.truncate(raw.len() - 1);
    let b = WriteBatch::from_contents(raw).unwrap();

    let mut p = Printer::default();
    let err = b.iterate(&mut p).unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(p.out, vec!["Put(foo, bar)"]);
}

#[test]
fn truncated_value_is_corruption() {
    let mut b = WriteBatch::new();
    b.put(b"foo", b"bar");
    let mut raw = b.into_data();
    raw.truncate(raw.len() - 2);
    let b = WriteBatch::from_contents(raw).unwrap();
    assert!(b.records().unwrap_err().is_corruption());
}

#[test]
fn unknown_tag_is_corruption() {
    let mut b = WriteBatch::new();
    b.put(b"a", b"1");
    let mut raw = b.into_data();
    raw.push(0x7f);
    let b = WriteBatch::from_contents(raw).unwrap();
    let err = b.records().unwrap_err();
    assert!(err.to_string().contains("unknown WriteBatch tag"));
}

// -------------------- Append --------------------

#[test]
fn append_concatenates_records_and_counts() {
    let mut dst = WriteBatch::new();
    dst.set_sequence(200);
    let mut src = WriteBatch::new();
    src.set_sequence(100);

    WriteBatch::append(&mut dst, &src);
    assert_eq!(dst.count(), 0);
    assert!(print(&dst).unwrap().is_empty());

    src.put(b"a", b"va");
    WriteBatch::append(&mut dst, &src);
    assert_eq!(print(&dst).unwrap(), vec!["Put(a, va)"]);

    src.clear();
    src.put(b"b", b"vb");
    WriteBatch::append(&mut dst, &src);
    assert_eq!(print(&dst).unwrap(), vec!["Put(a, va)", "Put(b, vb)"]);

    src.delete(b"foo");
    src.put_log_data(b"note");
    WriteBatch::append(&mut dst, &src);
    assert_eq!(dst.count(), 4);
    assert_eq!(dst.sequence(), 200);
    assert_eq!(
        print(&dst).unwrap(),
        vec![
            "Put(a, va)",
            "Put(b, vb)",
            "Put(b, vb)",
            "Delete(foo)",
            "LogData(note)"
        ]
    );
}

// -------------------- Properties --------------------

fn arb_record() -> impl Strategy<Value = BatchRecord> {
    let bytes = || proptest::collection::vec(any::<u8>(), 0..64);
    prop_oneof![
        (bytes(), bytes()).prop_map(|(key, value)| BatchRecord::Put { key, value }),
        bytes().prop_map(|key| BatchRecord::Delete { key }),
        (bytes(), bytes()).prop_map(|(key, value)| BatchRecord::Merge { key, value }),
        bytes().prop_map(|blob| BatchRecord::LogData { blob }),
    ]
}

proptest! {
    #[test]
    fn records_survive_the_codec(recs in proptest::collection::vec(arb_record(), 0..32), seq in 0u64..(1 << 56)) {
        let mut b: WriteBatch = recs.iter().cloned().collect();
        b.set_sequence(seq);

        let counted = recs.iter().filter(|r| !matches!(r, BatchRecord::LogData { .. })).count();
        prop_assert_eq!(b.count() as usize, counted);

        let reread = WriteBatch::from_contents(b.data().to_vec()).unwrap();
        prop_assert_eq!(reread.sequence(), seq);
        prop_assert_eq!(reread.records().unwrap(), recs);
    }
}
