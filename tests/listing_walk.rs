mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arclist::archive::{BlockDecompressor, ListingParser, ZlibDecompressor};
use arclist::{
    Accessor, ArchiveExtractor, CancelFlag, DecodeError, DecoderConfig, DirectoryEntry,
    ListingDecoder, NamePrefix, ViewCache,
};
use common::{Fixture, listing_body, record, sectored_payload, zlib};

#[derive(Debug, Default)]
struct Spy {
    expected: Mutex<Vec<usize>>,
}

impl BlockDecompressor for Spy {
    fn decompress(&self, input: &[u8], expected: usize) -> arclist::Result<Vec<u8>> {
        self.expected.lock().unwrap().push(expected);
        ZlibDecompressor.decompress(input, expected)
    }
}

/// Holds every inflate long enough for decode tasks to overlap
#[derive(Debug, Default)]
struct Slow {
    calls: AtomicUsize,
}

impl BlockDecompressor for Slow {
    fn decompress(&self, input: &[u8], expected: usize) -> arclist::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        ZlibDecompressor.decompress(input, expected)
    }
}

/// Root listing naming `children.len()` nested listings stored in the payload.
fn nested_fixture(children: &[Vec<u8>]) -> Fixture {
    let (payload, sectors) = sectored_payload(children);
    let records: Vec<String> = children
        .iter()
        .zip(&sectors)
        .enumerate()
        .map(|(i, (body, sector))| {
            let len = body.len() as u64;
            record(*sector, len, len, &format!("sub/child{i}"))
        })
        .collect();
    Fixture::new(&payload, &listing_body(&[records]))
}

fn leaf_listing(i: usize) -> Vec<u8> {
    listing_body(&[vec![
        record(0x40 + i as u64, 0x10, 0x10, &format!("leaf{i}.a")),
        record(0x50 + i as u64, 0x20, 0x18, &format!("leaf{i}.b")),
    ]])
}

#[test]
fn worked_example_decodes_in_record_order() {
    // With 10-byte entry and 8-byte block records the header comes out as
    // {2, 1, 36, 44}, not the {2, 1, 24, 28} narrower records would give.
    let listing = listing_body(&[vec![
        record(0xA0, 0x10, 0x08, "file1"),
        record(0xB0, 0x20, 0x10, "file2"),
    ]]);
    let fixture = Fixture::new(&[0u8; 16], &listing);
    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();

    let parsed = ListingParser::new(&ZlibDecompressor, &CancelFlag::default())
        .parse(&root)
        .unwrap();

    assert_eq!(parsed.name(), "data.idx");
    assert_eq!(parsed.entries.len(), 2);
    assert_eq!(parsed.entries[0], DirectoryEntry::new("file1", 0xA0, 8, 0x10));
    assert_eq!(parsed.entries[1], DirectoryEntry::new("file2", 0xB0, 0x10, 0x20));
}

#[test]
fn uncompressed_listing_only_inflates_blocks() {
    let listing = listing_body(&[
        vec![record(1, 1, 1, "a"), record(2, 2, 2, "b")],
        vec![record(3, 3, 3, "c")],
    ]);
    let fixture = Fixture::new(&[0u8; 16], &listing);
    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();

    let spy = Spy::default();
    let parsed = ListingParser::new(&spy, &CancelFlag::default())
        .parse(&root)
        .unwrap();

    assert_eq!(parsed.entries.len(), 3);
    let expected = spy.expected.lock().unwrap();
    assert_eq!(expected.len(), 2);
    assert!(!expected.contains(&listing.len()));
}

#[test]
fn compressed_listing_is_inflated_first() {
    let body = listing_body(&[vec![record(5, 9, 9, "inner")]]);
    let packed = zlib(&body);
    let (payload, sectors) = sectored_payload(&[packed.clone()]);
    let fixture = Fixture::new(&payload, b"unused");

    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    let child = root.derive_child(DirectoryEntry::new(
        "packed",
        sectors[0],
        packed.len() as u64,
        body.len() as u64,
    ));

    let spy = Spy::default();
    let parsed = ListingParser::new(&spy, &CancelFlag::default())
        .parse(&child)
        .unwrap();

    assert_eq!(parsed.entries[0].name, "inner");
    assert_eq!(*spy.expected.lock().unwrap(), [body.len(), 16]);
}

#[test]
fn oversized_child_fields_are_errors() {
    let fixture = Fixture::new(&[0u8; 0x1000], b"unused");
    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    let cancel = CancelFlag::default();
    let parser = ListingParser::new(&ZlibDecompressor, &cancel);

    let far = root.derive_child(DirectoryEntry::new("sub/far", u64::MAX >> 4, 16, 16));
    assert!(matches!(
        parser.parse(&far),
        Err(DecodeError::InvalidField { what: "sector", .. })
    ));

    let packed = zlib(b"not a listing");
    let (payload, sectors) = sectored_payload(&[packed.clone()]);
    let fixture = Fixture::new(&payload, b"unused");
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    let huge = root.derive_child(DirectoryEntry::new(
        "sub/huge",
        sectors[0],
        packed.len() as u64,
        u64::MAX,
    ));
    assert!(matches!(
        parser.parse(&huge),
        Err(DecodeError::DecompressionFailure { actual: 13, .. })
            | Err(DecodeError::InvalidField { .. })
    ));
}

#[test]
fn derived_accessors_share_views() {
    let fixture = Fixture::new(&[0u8; 0x1000], b"listing");
    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();

    let child = root.derive_child(DirectoryEntry::new("child", 1, 16, 16));
    assert!(Arc::ptr_eq(child.payload(), root.payload()));
    assert!(Arc::ptr_eq(child.listing(), root.payload()));
    assert_eq!(child.level(), 1);

    let grandchild = child.derive_child(DirectoryEntry::new("grandchild", 0, 16, 16));
    assert!(Arc::ptr_eq(grandchild.payload(), root.payload()));
    assert_eq!(grandchild.level(), 2);

    // reopening the same pair reuses the live mappings
    let again = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    assert!(Arc::ptr_eq(again.payload(), root.payload()));
    assert_eq!(cache.live(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn walk_respects_concurrency_bound() {
    let children: Vec<_> = (0..6).map(leaf_listing).collect();
    let fixture = nested_fixture(&children);

    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();

    let slow = Arc::new(Slow::default());
    let config = DecoderConfig {
        concurrency: 2,
        nested: Some(Arc::new(NamePrefix("sub/".to_string()))),
        ..DecoderConfig::default()
    };
    let report = ListingDecoder::new(config)
        .with_decompressor(slow.clone())
        .decode(root)
        .await;

    assert!(report.is_complete(), "{:?}", report.failures);
    assert_eq!(report.listings.len(), 7);
    // every inflate takes 20ms, so sibling decodes always overlap
    assert_eq!(report.peak_in_flight, 2);
    // one block per listing
    assert_eq!(slow.calls.load(Ordering::SeqCst), 7);

    let mut children: Vec<_> = report
        .listings
        .iter()
        .filter(|l| l.accessor.level() == 1)
        .map(|l| l.name().to_string())
        .collect();
    children.sort();
    assert_eq!(children.len(), 6);
    assert_eq!(children[0], "sub/child0");

    let child = report
        .listings
        .iter()
        .find(|l| l.name() == "sub/child3")
        .unwrap();
    assert_eq!(child.entries[1].name, "leaf3.b");
    assert_eq!(child.entries[1].sector, 0x53);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_child_does_not_stop_siblings() {
    let mut children: Vec<_> = (0..3).map(leaf_listing).collect();
    children[1] = vec![0xFF; 64];
    let fixture = nested_fixture(&children);

    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    let config = DecoderConfig {
        concurrency: 3,
        nested: Some(Arc::new(NamePrefix("sub/".to_string()))),
        ..DecoderConfig::default()
    };
    let report = ListingDecoder::new(config).decode(root).await;

    assert_eq!(report.listings.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "sub/child1");
    assert_eq!(report.failures[0].level, 1);
    assert!(matches!(
        report.failures[0].error,
        DecodeError::InvalidField { .. }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn unbounded_concurrency_is_clamped() {
    let fixture = nested_fixture(&[leaf_listing(0), leaf_listing(1)]);
    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();

    let config = DecoderConfig {
        concurrency: usize::MAX,
        nested: Some(Arc::new(NamePrefix("sub/".to_string()))),
        ..DecoderConfig::default()
    };
    let report = ListingDecoder::new(config).decode(root).await;

    assert!(report.is_complete(), "{:?}", report.failures);
    assert_eq!(report.listings.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn nested_discovery_is_off_by_default() {
    let children: Vec<_> = (0..2).map(leaf_listing).collect();
    let fixture = nested_fixture(&children);

    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    let report = ListingDecoder::new(DecoderConfig::default())
        .decode(root)
        .await;

    assert_eq!(report.listings.len(), 1);
    assert_eq!(report.listings[0].entries.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_walk_reports_root() {
    let fixture = nested_fixture(&[leaf_listing(0)]);
    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();

    let config = DecoderConfig {
        nested: Some(Arc::new(NamePrefix("sub/".to_string()))),
        ..DecoderConfig::default()
    };
    config.cancel.cancel();
    let report = ListingDecoder::new(config).decode(root).await;

    assert!(report.listings.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "data.idx");
    assert!(matches!(report.failures[0].error, DecodeError::Cancelled));
}

#[tokio::test]
async fn extracts_leaves_of_decoded_listing() {
    let plain = b"plain text leaf".to_vec();
    let inflated = vec![b'q'; 500];
    let packed = zlib(&inflated);
    let (payload, sectors) = sectored_payload(&[plain.clone(), packed.clone()]);

    let listing = listing_body(&[vec![
        record(sectors[0], plain.len() as u64, plain.len() as u64, "a.txt"),
        record(sectors[1], 500, packed.len() as u64, "dir/b.bin"),
    ]]);
    let fixture = Fixture::new(&payload, &listing);

    let cache = ViewCache::new();
    let root = Accessor::open(&cache, &fixture.payload, &fixture.listing).unwrap();
    let parsed = ListingParser::new(&ZlibDecompressor, &CancelFlag::default())
        .parse(&root)
        .unwrap();

    let extractor = ArchiveExtractor::new(root);
    assert_eq!(extractor.extract_to_memory(&parsed.entries[0]).unwrap(), plain);

    let out = fixture.dir.path().join("out").join(&parsed.entries[1].name);
    extractor
        .extract_to_file(&parsed.entries[1], &out)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), inflated);
}
