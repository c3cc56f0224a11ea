//! End-to-end tests over real files: write a payload through the block
//! writer, read it back through each reader strategy, and check that the
//! layer is indistinguishable from reading the uncompressed payload.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rabf_core::{
    BlockAddressIndex, CompressionInfo, FileSink, FileSource, LruBlockCache, MemSource, Reader,
    ReaderOptions, Writer,
};

/// Deterministic pseudo-random bytes from a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rabf_test_{name}"))
}

/// Write `payload` as a two-stream file pair, returning the paths.
fn write_pair(name: &str, payload: &[u8], codec: &str, block_size: u64) -> (PathBuf, PathBuf) {
    let data_path = temp_path(&format!("{name}.rabf"));
    let info_path = temp_path(&format!("{name}.rabf.info"));
    let mut w = Writer::new(
        Box::new(FileSink::create(&data_path).unwrap()),
        Box::new(FileSink::create(&info_path).unwrap()),
        codec,
        block_size,
    )
    .unwrap();
    w.write(payload).unwrap();
    w.finish().unwrap();
    (data_path, info_path)
}

fn load_info(info_path: &PathBuf) -> (CompressionInfo, BlockAddressIndex) {
    CompressionInfo::decode(&fs::read(info_path).unwrap()).unwrap()
}

/// Buffered strategy: plain file source, no cache.
fn open_buffered(data_path: &PathBuf, info_path: &PathBuf) -> Reader {
    let (info, index) = load_info(info_path);
    let source = Arc::new(FileSource::open(data_path).unwrap());
    Reader::open(source, info, index, ReaderOptions::default()).unwrap()
}

/// Integrated strategy: fully resident source exposing a base address.
fn open_integrated(data_path: &PathBuf, info_path: &PathBuf) -> Reader {
    let (info, index) = load_info(info_path);
    let source = Arc::new(MemSource::new(fs::read(data_path).unwrap()));
    Reader::open(source, info, index, ReaderOptions::default()).unwrap()
}

/// Cache-backed strategy: file source plus a matching shared block cache.
fn open_cached(data_path: &PathBuf, info_path: &PathBuf, cache: Arc<LruBlockCache>) -> Reader {
    let (info, index) = load_info(info_path);
    let source = Arc::new(FileSource::open(data_path).unwrap());
    let opts = ReaderOptions {
        cache: Some(cache),
        file_id: 1,
    };
    Reader::open(source, info, index, opts).unwrap()
}

fn read_all(reader: &mut Reader) -> Vec<u8> {
    let len = reader.uncompressed_len() as usize;
    let mut buf = vec![0u8; len + 16];
    let n = reader.read_at(&mut buf, 0).unwrap();
    assert_eq!(n, len, "full read must return the whole payload");
    buf.truncate(n);
    buf
}

// ── Round trips across block sizes, payload shapes, and strategies ─────────

#[test]
fn round_trip_all_strategies() {
    for &block_size in &[1u64, 128, 1024] {
        let b = block_size as usize;
        for &len in &[0usize, 1, b - 1, b, b + 1, 10 * b, 10 * b + 7] {
            let payload = pseudo_random_bytes(len, block_size ^ len as u64);
            let name = format!("rt_{block_size}_{len}");
            let (data, info) = write_pair(&name, &payload, "zstd", block_size);

            let cache = Arc::new(LruBlockCache::new(block_size, 8));
            let mut readers = [
                open_buffered(&data, &info),
                open_integrated(&data, &info),
                open_cached(&data, &info, cache),
            ];
            for reader in &mut readers {
                assert_eq!(
                    read_all(reader),
                    payload,
                    "B={block_size} L={len} strategy={}",
                    reader.strategy().name()
                );
            }
        }
    }
}

#[test]
fn round_trip_large_blocks() -> anyhow::Result<()> {
    let block_size = 10 * 1024 * 1024u64;
    let payload = pseudo_random_bytes(block_size as usize + 1, 0xFEED);
    let (data, info) = write_pair("rt_large", &payload, "lz4", block_size);
    let mut reader = open_buffered(&data, &info);
    assert_eq!(reader.info().block_count, 2);

    let mut buf = vec![0u8; payload.len()];
    let n = reader.read_at(&mut buf, 0)?;
    assert_eq!(n, payload.len());
    assert_eq!(buf, payload);
    Ok(())
}

#[test]
fn every_bundled_codec_round_trips() {
    let payload = pseudo_random_bytes(5000, 0xC0DEC);
    for codec in ["lz4", "lz4hc", "snappy", "zlib", "zlib_default", "zstd"] {
        let (data, info) = write_pair(&format!("codec_{codec}"), &payload, codec, 512);
        let mut reader = open_buffered(&data, &info);
        assert_eq!(reader.info().compressor, codec);
        assert_eq!(read_all(&mut reader), payload, "{codec}");
    }
}

// ── Arbitrary-offset reads ─────────────────────────────────────────────────

#[test]
fn arbitrary_offset_reads_match_the_payload() {
    let payload = pseudo_random_bytes(10_000, 0xA11);
    let (data, info) = write_pair("offsets", &payload, "lz4", 256);
    let mut reader = open_buffered(&data, &info);

    for &offset in &[0u64, 1, 255, 256, 257, 4095, 9000, 9999] {
        for &len in &[1usize, 3, 256, 300, 10_000] {
            let mut buf = vec![0u8; len];
            let n = reader.read_at(&mut buf, offset).unwrap();
            let expected = len.min(10_000 - offset as usize);
            assert_eq!(n, expected, "offset={offset} len={len}");
            assert_eq!(
                &buf[..n],
                &payload[offset as usize..offset as usize + n],
                "offset={offset} len={len}"
            );
        }
    }
}

#[test]
fn reads_at_and_past_eof_return_zero() {
    let payload = pseudo_random_bytes(3000, 0xE0F);
    let (data, info) = write_pair("eof", &payload, "zstd", 1024);
    let mut reader = open_buffered(&data, &info);

    let mut buf = [0u8; 64];
    assert_eq!(reader.read_at(&mut buf, 3000).unwrap(), 0);
    assert_eq!(reader.read_at(&mut buf, 3001).unwrap(), 0);
    assert_eq!(reader.read_at(&mut buf, u64::MAX).unwrap(), 0);
    // A read straddling EOF is short, not an error.
    assert_eq!(reader.read_at(&mut buf, 2990).unwrap(), 10);
}

// ── Current-block reuse ────────────────────────────────────────────────────

#[test]
fn rereading_the_current_block_loads_nothing() {
    let payload = pseudo_random_bytes(8 * 1024, 0x5EED);
    let (data, info) = write_pair("reuse", &payload, "lz4", 1024);
    let mut reader = open_buffered(&data, &info);

    let mut buf = [0u8; 100];
    reader.read_at(&mut buf, 100).unwrap();
    assert_eq!(reader.blocks_loaded(), 1);
    // Backward seek inside block 0 must not reload it.
    reader.read_at(&mut buf, 50).unwrap();
    assert_eq!(reader.blocks_loaded(), 1);
    reader.read_at(&mut buf, 900).unwrap();
    assert_eq!(reader.blocks_loaded(), 1);

    // A monolithic scan loads each block exactly once.
    let mut scan = open_buffered(&data, &info);
    let mut chunk = [0u8; 333];
    let mut at = 0u64;
    loop {
        let n = scan.read_at(&mut chunk, at).unwrap();
        if n == 0 {
            break;
        }
        at += n as u64;
    }
    assert_eq!(scan.blocks_loaded(), 8);
}

// ── Cross-strategy equivalence ─────────────────────────────────────────────

#[test]
fn strategies_are_observably_identical() {
    let payload = pseudo_random_bytes(20_000, 0x3E0);
    let (data, info) = write_pair("equiv", &payload, "zstd", 512);

    let cache = Arc::new(LruBlockCache::new(512, 16));
    let mut buffered = open_buffered(&data, &info);
    let mut integrated = open_integrated(&data, &info);
    let mut cached = open_cached(&data, &info, cache);

    assert_eq!(buffered.strategy().name(), "buffered");
    assert_eq!(integrated.strategy().name(), "integrated");
    assert_eq!(cached.strategy().name(), "cache-backed");

    for &offset in &[0u64, 511, 512, 7777, 19_999] {
        for &len in &[1usize, 512, 2000] {
            let a = buffered.read_range(offset, len).unwrap();
            let b = integrated.read_range(offset, len).unwrap();
            let c = cached.read_range(offset, len).unwrap();
            assert_eq!(a, b, "offset={offset} len={len}");
            assert_eq!(a, c, "offset={offset} len={len}");
        }
    }
}

// ── Cache behavior ─────────────────────────────────────────────────────────

#[test]
fn cache_is_shared_across_readers() {
    let payload = pseudo_random_bytes(4096, 0xCA4E);
    let (data, info) = write_pair("shared_cache", &payload, "lz4", 1024);

    let cache = Arc::new(LruBlockCache::new(1024, 8));
    let mut first = open_cached(&data, &info, Arc::clone(&cache));
    assert_eq!(read_all(&mut first), payload);
    assert_eq!(cache.len(), 4, "all four blocks should be cached");

    // A second reader over the same cache still returns identical bytes.
    let mut second = open_cached(&data, &info, cache);
    assert_eq!(read_all(&mut second), payload);
}

#[test]
fn mismatched_cache_block_size_falls_back_to_buffered() {
    let payload = pseudo_random_bytes(4096, 0xFA11);
    let (data, info_path) = write_pair("cache_fallback", &payload, "lz4", 1024);

    let (info, index) = load_info(&info_path);
    let source = Arc::new(FileSource::open(&data).unwrap());
    let opts = ReaderOptions {
        cache: Some(Arc::new(LruBlockCache::new(4096, 8))),
        file_id: 9,
    };
    let mut reader = Reader::open(source, info, index, opts).unwrap();
    assert_eq!(reader.strategy().name(), "buffered");
    assert_eq!(read_all(&mut reader), payload);
}

// ── Session readers ────────────────────────────────────────────────────────

#[test]
fn session_readers_are_independent_and_concurrent() {
    let payload = pseudo_random_bytes(64 * 1024, 0x5E55);
    let (data, info) = write_pair("sessions", &payload, "zstd", 4096);
    let reader = open_buffered(&data, &info);

    let payload = Arc::new(payload);
    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            let mut session = reader.session();
            let payload = Arc::clone(&payload);
            std::thread::spawn(move || {
                let offset = i * 13_000;
                let got = session.read_range(offset, 9000).unwrap();
                let end = (offset as usize + 9000).min(payload.len());
                assert_eq!(got, payload[offset as usize..end]);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

// ── Concrete pattern scenario ──────────────────────────────────────────────

#[test]
fn lz4_pattern_scenario() {
    const LEN: usize = 73_728;
    let payload: Vec<u8> = (0..LEN).map(|i| ((i * 3) % 127) as u8).collect();
    let (data, info) = write_pair("pattern", &payload, "lz4", 1024);

    let mut reader = open_buffered(&data, &info);
    assert!(
        reader.info().compressed_file_length < LEN as u64,
        "pattern data must compress: {} bytes",
        reader.info().compressed_file_length
    );
    assert_eq!(read_all(&mut reader), payload);

    for &step in &[1usize, 10, 128, 513, 1024, 2048] {
        let mut buf = vec![0u8; step];
        let mut offset = 0usize;
        while offset < LEN {
            let n = reader.read_at(&mut buf, offset as u64).unwrap();
            assert_eq!(n, step.min(LEN - offset), "step={step} offset={offset}");
            assert_eq!(
                &buf[..n],
                &payload[offset..offset + n],
                "step={step} offset={offset}"
            );
            offset += step;
        }
    }
}

// ── Corruption ─────────────────────────────────────────────────────────────

#[test]
fn truncated_data_stream_fails_loudly() {
    let payload = pseudo_random_bytes(8192, 0xBAD);
    let (data, info_path) = write_pair("truncated", &payload, "zstd", 1024);

    let mut bytes = fs::read(&data).unwrap();
    bytes.pop();
    let truncated = temp_path("truncated_cut.rabf");
    fs::write(&truncated, &bytes).unwrap();

    let (info, index) = load_info(&info_path);
    // Opening already notices the data stream is shorter than the index needs.
    let source = Arc::new(FileSource::open(&truncated).unwrap());
    assert!(Reader::open(source, info, index, ReaderOptions::default()).is_err());

    // A resident source is rejected the same way.
    let (info, index) = load_info(&info_path);
    let source = Arc::new(MemSource::new(bytes));
    assert!(Reader::open(source, info, index, ReaderOptions::default()).is_err());
}

#[test]
fn corrupted_block_bytes_fail_decompression() {
    let payload = pseudo_random_bytes(8192, 0xDEAD);
    let (data, info_path) = write_pair("bitflip", &payload, "zlib", 1024);

    let mut bytes = fs::read(&data).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;

    let (info, index) = load_info(&info_path);
    let mut reader = Reader::open(
        Arc::new(MemSource::new(bytes)),
        info,
        index,
        ReaderOptions::default(),
    )
    .unwrap();
    let mut buf = vec![0u8; 8192];
    assert!(
        reader.read_at(&mut buf, 0).is_err(),
        "bit-flipped zlib block must not decode silently"
    );
}

// ── Prefetch ───────────────────────────────────────────────────────────────

#[test]
fn prefetch_is_accepted_on_every_strategy() {
    let payload = pseudo_random_bytes(8192, 0x9F);
    let (data, info) = write_pair("prefetch", &payload, "lz4", 1024);

    open_buffered(&data, &info).prefetch(100, 5000).unwrap();
    open_integrated(&data, &info).prefetch(100, 5000).unwrap();
    // Past-EOF spans are a no-op, not an error.
    open_buffered(&data, &info).prefetch(9000, 10).unwrap();
    open_buffered(&data, &info).prefetch(0, 0).unwrap();
}

// ── Legacy single-stream layout ────────────────────────────────────────────

#[test]
fn legacy_file_round_trips() {
    let payload = pseudo_random_bytes(10_000, 0x1E6);
    let path = temp_path("legacy.rabf");
    let mut w = Writer::new_legacy(Box::new(FileSink::create(&path).unwrap()), 1024).unwrap();
    w.write(&payload).unwrap();
    let info = w.finish().unwrap();
    assert_eq!(info.compressor, "snappy");
    assert_eq!(info.block_count, 10);

    let source = Arc::new(FileSource::open(&path).unwrap());
    let mut reader = Reader::open_legacy(source, ReaderOptions::default()).unwrap();
    assert_eq!(reader.info().compressor, "snappy");
    assert_eq!(read_all(&mut reader), payload);

    // Random access works the same as in the primary layout.
    assert_eq!(
        reader.read_range(5000, 2000).unwrap(),
        &payload[5000..7000]
    );
}

#[test]
fn legacy_file_reads_through_a_resident_source() {
    let payload = pseudo_random_bytes(5000, 0x1E7);
    let path = temp_path("legacy_mem.rabf");
    let mut w = Writer::new_legacy(Box::new(FileSink::create(&path).unwrap()), 512).unwrap();
    w.write(&payload).unwrap();
    w.finish().unwrap();

    let source = Arc::new(MemSource::new(fs::read(&path).unwrap()));
    let mut reader = Reader::open_legacy(source, ReaderOptions::default()).unwrap();
    assert_eq!(reader.strategy().name(), "integrated");
    assert_eq!(read_all(&mut reader), payload);
}

#[test]
fn truncated_legacy_trailer_is_corrupt() {
    let payload = pseudo_random_bytes(5000, 0x1E8);
    let path = temp_path("legacy_cut.rabf");
    let mut w = Writer::new_legacy(Box::new(FileSink::create(&path).unwrap()), 512).unwrap();
    w.write(&payload).unwrap();
    w.finish().unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes.pop();
    let source = Arc::new(MemSource::new(bytes));
    assert!(Reader::open_legacy(source, ReaderOptions::default()).is_err());
}
