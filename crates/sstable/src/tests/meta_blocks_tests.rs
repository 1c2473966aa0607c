use crate::format::{put_block_trailer, RandomAccessFile};
use crate::meta_blocks::*;
use crate::table_properties::{names, TableProperties};
use crate::{Block, BlockHandle};
use common::comparator::bytewise;
use common::properties::{TablePropertiesCollector, UserCollectedProperties};
use common::{DbIterator, Error, Result};

/// Lays `contents` out as a one-block file and returns it with its handle.
fn single_block_file(contents: &[u8]) -> (Vec<u8>, BlockHandle) {
    let mut file = contents.to_vec();
    put_block_trailer(&mut file, contents);
    (file, BlockHandle::new(0, contents.len() as u64))
}

fn sample_properties() -> TableProperties {
    let mut p = TableProperties {
        raw_key_size: 100,
        raw_value_size: 2000,
        data_size: 4096,
        index_size: 64,
        num_entries: 10,
        num_data_blocks: 2,
        filter_size: 0,
        format_version: 1,
        fixed_key_len: 0,
        filter_policy_name: "layerkv.BuiltinBloomFilter".to_string(),
        ..TableProperties::default()
    };
    p.user_collected_properties.insert("app.owner".to_string(), b"team-a".to_vec());
    p
}

// -------------------- Properties block --------------------

#[test]
fn properties_survive_a_block_round_trip() -> Result<()> {
    let props = sample_properties();
    let mut builder = PropertyBlockBuilder::new();
    builder.add_table_properties(&props);
    builder.add_user_collected(&props.user_collected_properties);
    let (file, handle) = single_block_file(&builder.finish());

    let read = read_properties(&handle.encode(), &file)?;
    assert_eq!(read, props);
    Ok(())
}

#[test]
fn properties_block_keys_are_sorted() -> Result<()> {
    let mut builder = PropertyBlockBuilder::new();
    builder.add_raw("zeta", b"3");
    builder.add_raw("alpha", b"1");
    builder.add_raw("alphabet", b"2");
    let block = Block::new(builder.finish())?;

    let mut it = block.iter(bytewise());
    let mut keys = Vec::new();
    it.seek_to_first();
    while it.valid() {
        keys.push(String::from_utf8_lossy(it.key()).into_owned());
        it.next();
    }
    assert_eq!(keys, vec!["alpha", "alphabet", "zeta"]);
    Ok(())
}

#[test]
fn first_value_for_a_name_wins() -> Result<()> {
    let mut builder = PropertyBlockBuilder::new();
    builder.add_raw("app.k", b"first");
    builder.add_raw("app.k", b"second");
    let (file, handle) = single_block_file(&builder.finish());
    let read = read_properties(&handle.encode(), &file)?;
    assert_eq!(read.user_collected_properties["app.k"], b"first".to_vec());
    Ok(())
}

#[test]
fn malformed_well_known_value_is_skipped() -> Result<()> {
    let mut builder = PropertyBlockBuilder::new();
    // A lone continuation byte is not a complete varint.
    builder.add_raw(names::NUM_ENTRIES, &[0x80]);
    builder.add_u64(names::DATA_SIZE, 7);
    let (file, handle) = single_block_file(&builder.finish());

    let read = read_properties(&handle.encode(), &file)?;
    assert_eq!(read.num_entries, 0);
    assert_eq!(read.data_size, 7);
    assert!(!read.user_collected_properties.contains_key(names::NUM_ENTRIES));
    Ok(())
}

#[test]
fn undecodable_properties_handle_is_invalid_argument() {
    let file: Vec<u8> = Vec::new();
    let err = read_properties(&[0x80], &file).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn properties_block_past_end_of_file_fails() {
    let file = vec![0u8; 8];
    let handle = BlockHandle::new(4, 100);
    assert!(read_properties(&handle.encode(), &file).is_err());
    assert_eq!(file.size(), 8);
}

// -------------------- Meta-index --------------------

fn meta_index_block() -> Block {
    let mut builder = MetaIndexBuilder::new();
    builder.add("layerkv.properties", &BlockHandle::new(100, 20));
    builder.add("layerkv.filter", &BlockHandle::new(50, 10));
    Block::new(builder.finish()).unwrap()
}

#[test]
fn find_meta_block_returns_exact_match() -> Result<()> {
    let block = meta_index_block();
    let mut it = block.iter(bytewise());
    assert_eq!(find_meta_block(it.as_mut(), "layerkv.properties")?, BlockHandle::new(100, 20));
    assert_eq!(find_meta_block(it.as_mut(), "layerkv.filter")?, BlockHandle::new(50, 10));
    Ok(())
}

#[test]
fn find_meta_block_rejects_missing_and_prefix_names() {
    let block = meta_index_block();
    let mut it = block.iter(bytewise());

    let err = find_meta_block(it.as_mut(), "layerkv.index").unwrap_err();
    assert!(err.is_corruption());
    assert!(err.to_string().contains("layerkv.index"));

    // Seek lands on "layerkv.filter", which is not an exact match.
    assert!(find_meta_block(it.as_mut(), "layerkv.f").unwrap_err().is_corruption());
}

#[test]
fn block_handle_decode_failure_is_invalid_argument() {
    let mut input: &[u8] = &[0x81];
    let err = BlockHandle::decode_from(&mut input).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(ref m) if m == "bad block handle"));
}

// -------------------- Collectors --------------------

struct Counting {
    n: u64,
}

impl TablePropertiesCollector for Counting {
    fn add(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        self.n += 1;
        Ok(())
    }

    fn finish(&mut self, properties: &mut UserCollectedProperties) -> Result<()> {
        properties.insert("counting.n".to_string(), self.n.to_string().into_bytes());
        Ok(())
    }

    fn name(&self) -> &str {
        "Counting"
    }
}

struct Broken;

impl TablePropertiesCollector for Broken {
    fn add(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(Error::corruption("broken add"))
    }

    fn finish(&mut self, properties: &mut UserCollectedProperties) -> Result<()> {
        properties.insert("broken.value".to_string(), Vec::new());
        Err(Error::corruption("broken finish"))
    }

    fn name(&self) -> &str {
        "Broken"
    }
}

#[test]
fn collector_failures_are_reported_but_not_fatal() -> Result<()> {
    let mut collectors: Vec<Box<dyn TablePropertiesCollector>> = vec![Box::new(Broken), Box::new(Counting { n: 0 })];

    assert!(!notify_collectors_on_add(b"k1", b"v", &mut collectors));
    assert!(!notify_collectors_on_add(b"k2", b"v", &mut collectors));

    let mut builder = PropertyBlockBuilder::new();
    assert!(!notify_collectors_on_finish(&mut collectors, &mut builder));
    let (file, handle) = single_block_file(&builder.finish());

    let read = read_properties(&handle.encode(), &file)?;
    assert_eq!(read.user_collected_properties.get("counting.n"), Some(&b"2".to_vec()));
    assert!(!read.user_collected_properties.contains_key("broken.value"));
    Ok(())
}

#[test]
fn healthy_collectors_report_success() {
    let mut collectors: Vec<Box<dyn TablePropertiesCollector>> = vec![Box::new(Counting { n: 0 })];
    assert!(notify_collectors_on_add(b"k", b"v", &mut collectors));
    let mut builder = PropertyBlockBuilder::new();
    assert!(notify_collectors_on_finish(&mut collectors, &mut builder));
}
