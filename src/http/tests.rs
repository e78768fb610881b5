use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use crate::http::{
    BuilderErrors, Chunk, Error, MemoryWriter, PositionalWriter, SourceRecord,
    bytes_aggregator::BytesAggregator,
    chunk_plan::plan_chunks,
    config::HttpDownloadConfig,
    filename_utils,
    probe::reconcile,
    request_utils::{self, ContentRange},
    selector::SourceSelector,
    session::{ChunkProgress, HttpDownloadSession},
    verify::{self, DigestAlgorithm, normalize_validator},
};
use proptest::prelude::*;
use reqwest::{StatusCode, header::HeaderValue};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

fn chunks(pairs: &[(u64, u64)]) -> Vec<Chunk> {
    pairs.iter().copied().map(Chunk::from).collect()
}

fn record(url: &str, length: u64, validator: Option<&str>) -> SourceRecord {
    SourceRecord {
        url: url.to_string(),
        content_length: Some(length),
        validator: validator.map(str::to_string),
        accepts_ranges: true,
        status: Some(StatusCode::OK),
        failure: None,
    }
}

#[test]
fn test_plan_chunks() {
    assert_eq!(plan_chunks(125, 1), chunks(&[(0, 125)]));
    assert_eq!(plan_chunks(125, 2), chunks(&[(0, 63), (63, 125)]));
    assert_eq!(plan_chunks(125, 3), chunks(&[(0, 42), (42, 84), (84, 125)]));
    assert_eq!(
        plan_chunks(125, 4),
        chunks(&[(0, 32), (32, 63), (63, 94), (94, 125)])
    );
}

#[test]
fn test_plan_chunks_empty_object() {
    assert_eq!(plan_chunks(0, 3), chunks(&[(0, 0), (0, 0), (0, 0)]));
    assert!(plan_chunks(0, 3).iter().all(Chunk::is_empty));
}

#[test]
fn test_plan_chunks_more_parts_than_bytes() {
    assert_eq!(
        plan_chunks(2, 4),
        chunks(&[(0, 1), (1, 2), (2, 2), (2, 2)])
    );
}

proptest! {
    #[test]
    fn prop_plan_chunks_covers_length(length in 0u64..1_000_000, parts in 1u32..64) {
        let plan = plan_chunks(length, parts);

        prop_assert_eq!(plan.len(), parts as usize);
        prop_assert_eq!(plan[0].begin, 0);
        prop_assert_eq!(plan[plan.len() - 1].end, length);
        prop_assert_eq!(plan.iter().map(Chunk::len).sum::<u64>(), length);
        for pair in plan.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].begin);
        }
        let largest = plan.iter().map(Chunk::len).max().unwrap();
        let smallest = plan.iter().map(Chunk::len).min().unwrap();
        prop_assert!(largest - smallest <= 1);
    }
}

#[test]
fn test_http_range_is_inclusive() {
    assert_eq!(Chunk::new(0, 32).http_range(), Some(String::from("bytes=0-31")));
    assert_eq!(Chunk::new(94, 125).http_range(), Some(String::from("bytes=94-124")));
    assert_eq!(Chunk::new(7, 7).http_range(), None);
}

#[test]
fn test_parse_content_range() {
    let value = HeaderValue::from_static("bytes 32-62/125");
    assert_eq!(
        request_utils::parse_content_range(&value),
        Some(ContentRange {
            start: 32,
            total: Some(125)
        })
    );

    let unknown_total = HeaderValue::from_static("bytes 0-9/*");
    assert_eq!(
        request_utils::parse_content_range(&unknown_total),
        Some(ContentRange {
            start: 0,
            total: None
        })
    );

    let unsatisfied = HeaderValue::from_static("bytes */125");
    assert_eq!(request_utils::parse_content_range(&unsatisfied), None);
}

#[test]
fn test_extract_filename_from_url() {
    let cases = [
        (
            "https://raw.githubusercontent.com/alvatar/multipart-downloader/master/LICENSE",
            "LICENSE",
        ),
        (
            "https://kernel.org/pub/linux/kernel/v4.x/linux-4.0.tar.xz",
            "linux-4.0.tar.xz",
        ),
        (
            "https://kernel.org/pub/linux/kernel/v4.x/linux-4.0.tar.xz#frag-test",
            "linux-4.0.tar.xz",
        ),
        (
            "https://kernel.org/pub/linux/kernel/v4.x/linux-4.0.tar.xz?type=animal&name=narwhal#nose",
            "linux-4.0.tar.xz",
        ),
    ];
    for (url, filename) in cases {
        assert_eq!(filename_utils::extract_filename(url), filename, "url: {url}");
    }
}

#[test]
fn test_extract_filename_fallback() {
    assert_eq!(filename_utils::extract_filename("https://example.com/"), "download");
    assert_eq!(filename_utils::extract_filename("https://example.com"), "download");
    assert_eq!(filename_utils::extract_filename("not a url"), "download");
}

#[test]
fn test_percent_decode() {
    let url = "100%25_complete.mp3";
    let result = filename_utils::percent_decode(url);
    assert_eq!(result, String::from("100%_complete.mp3"));

    assert_eq!(
        filename_utils::extract_filename("https://example.com/my%20file%2Fname.txt"),
        "my file_name.txt"
    );
}

#[test]
fn test_normalize_validator() {
    assert_eq!(normalize_validator("\"abc123\""), "abc123");
    assert_eq!(normalize_validator("W/\"abc123\""), "abc123");
    assert_eq!(normalize_validator("abc123"), "abc123");
    assert_eq!(normalize_validator("\"\""), "");
}

#[test]
fn test_reconcile_single_source() {
    let info = reconcile(&[record("https://a.test/dir/file.bin", 125, Some("\"abc\""))]).unwrap();
    assert_eq!(info.filename(), "file.bin");
    assert_eq!(info.content_length(), 125);
    assert_eq!(info.validator(), Some("\"abc\""));
}

#[test]
fn test_reconcile_length_mismatch() {
    let records = [
        record("https://a.test/file", 125, None),
        record("https://b.test/file", 126, None),
    ];
    match reconcile(&records) {
        Err(Error::Consistency {
            url,
            field,
            expected,
            actual,
        }) => {
            assert_eq!(url, "https://b.test/file");
            assert_eq!(field, "content length");
            assert_eq!(expected, "125");
            assert_eq!(actual, "126");
        }
        other => panic!("expected a consistency error, got {other:?}"),
    }
}

#[test]
fn test_reconcile_reports_unreachable_before_mismatch() {
    let mut failing = record("https://c.test/file", 125, None);
    failing.status = Some(StatusCode::NOT_FOUND);
    let records = [
        record("https://a.test/file", 125, None),
        record("https://b.test/file", 999, None),
        failing,
    ];
    match reconcile(&records) {
        Err(Error::Connectivity { url, reason }) => {
            assert_eq!(url, "https://c.test/file");
            assert!(reason.contains("404"), "reason: {reason}");
        }
        other => panic!("expected a connectivity error, got {other:?}"),
    }
}

#[test]
fn test_reconcile_unreachable_source() {
    let records = [SourceRecord::unreachable(
        "https://down.test/file",
        String::from("connection refused"),
    )];
    assert!(matches!(
        reconcile(&records),
        Err(Error::Connectivity { url, .. }) if url == "https://down.test/file"
    ));
}

#[test]
fn test_reconcile_validators() {
    let missing_is_fine = [
        record("https://a.test/file", 10, None),
        record("https://b.test/file", 10, Some("\"abc\"")),
        record("https://c.test/file", 10, Some("")),
    ];
    let info = reconcile(&missing_is_fine).unwrap();
    assert_eq!(info.validator(), Some("\"abc\""));

    let weak_and_strong = [
        record("https://a.test/file", 10, Some("\"abc\"")),
        record("https://b.test/file", 10, Some("W/\"abc\"")),
    ];
    assert!(reconcile(&weak_and_strong).is_ok());

    let conflicting = [
        record("https://a.test/file", 10, None),
        record("https://b.test/file", 10, Some("\"abc\"")),
        record("https://c.test/file", 10, Some("\"def\"")),
    ];
    assert!(matches!(
        reconcile(&conflicting),
        Err(Error::Consistency { url, field: "validator", .. }) if url == "https://c.test/file"
    ));
}

#[test]
fn test_reconcile_missing_length() {
    let mut no_length = record("https://a.test/file", 0, None);
    no_length.content_length = None;
    assert!(matches!(
        reconcile(&[no_length]),
        Err(Error::MissingLength { .. })
    ));
    assert!(matches!(reconcile(&[]), Err(Error::NoSources)));
}

#[test]
fn test_selector_round_robin() {
    let first_sources: Vec<usize> = (0..5)
        .map(|index| SourceSelector::new(index, 2, 2).next().unwrap())
        .collect();
    assert_eq!(first_sources, vec![0, 1, 0, 1, 0]);
    assert_eq!(first_sources.iter().filter(|s| **s == 0).count(), 3);
}

#[test]
fn test_selector_skips_tried_sources() {
    let order: Vec<usize> = SourceSelector::new(4, 3, 5).collect();
    assert_eq!(order, vec![1, 2, 0]);

    let limited: Vec<usize> = SourceSelector::new(0, 4, 1).collect();
    assert_eq!(limited, vec![0, 1]);

    let single: Vec<usize> = SourceSelector::new(3, 1, 2).collect();
    assert_eq!(single, vec![0]);
}

#[test]
fn test_bytes_aggregator_blocks() {
    let mut aggregator = BytesAggregator::new(100, 4);
    aggregator.push(b"abc");
    assert!(aggregator.next_block().is_none());

    aggregator.push(b"defghij");
    let (offset, block) = aggregator.next_block().unwrap();
    assert_eq!((offset, &block[..]), (100, &b"abcd"[..]));
    let (offset, block) = aggregator.next_block().unwrap();
    assert_eq!((offset, &block[..]), (104, &b"efgh"[..]));
    assert!(aggregator.next_block().is_none());

    let (offset, block) = aggregator.finish().unwrap();
    assert_eq!((offset, &block[..]), (108, &b"ij"[..]));
    assert!(aggregator.finish().is_none());
}

#[test]
fn test_memory_writer_bounds() {
    let writer = MemoryWriter::new(6).unwrap();
    writer.write_at(3, b"def").unwrap();
    writer.write_at(0, b"abc").unwrap();
    assert!(writer.write_at(4, b"xyz").is_err());
    assert_eq!(writer.into_inner(), b"abcdef");
}

#[cfg(target_pointer_width = "32")]
#[test]
fn test_memory_writer_rejects_length_beyond_address_space() {
    let length = u64::from(u32::MAX) + 1;
    assert!(MemoryWriter::new(length).is_err());
}

#[test]
fn test_session_snapshot_is_ordered() {
    let seen: Arc<Mutex<Vec<Vec<ChunkProgress>>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let session = HttpDownloadSession::new(
        chunks(&[(0, 5), (5, 10)]),
        Some(Arc::new(move |snapshot: &[ChunkProgress]| {
            sink.lock().unwrap().push(snapshot.to_vec())
        })),
        CancellationToken::new(),
    );

    session.advance(1, 8);
    session.reset(1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(seen[0][1].current, 8);
    assert_eq!(seen[0][0].current, 0);
    assert_eq!(seen[1][1].current, 5);
}

#[test]
fn test_config_validation() {
    assert!(matches!(
        HttpDownloadConfig::default().try_set_tasks_count(Some(0)),
        Err(BuilderErrors::InvalidTasksCount)
    ));
    assert!(matches!(
        HttpDownloadConfig::default().try_set_buffer_size(Some(0)),
        Err(BuilderErrors::InvalidBufferSize)
    ));
    let missing = std::env::temp_dir().join("multifetch-missing-directory");
    assert!(matches!(
        HttpDownloadConfig::default().try_set_directory(Some(missing)),
        Err(BuilderErrors::InvalidDirectory(_))
    ));
}

#[test]
fn test_verify_integrity() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "Hello Rust").unwrap();
    let path = temp_file.path();

    let expected_hash = "DC5D63134FB696626C4BF28E1232434AB040ACC10A66CFEE55DACDD70DAE82A3";
    assert!(verify::verify_file(path, DigestAlgorithm::Sha256, expected_hash).is_ok());

    match verify::verify_file(path, DigestAlgorithm::Sha256, "badhash123") {
        Err(Error::DigestMismatch {
            algorithm, actual, ..
        }) => {
            assert_eq!(algorithm, DigestAlgorithm::Sha256);
            assert_eq!(actual, expected_hash.to_lowercase());
        }
        other => panic!("expected a digest mismatch, got {other:?}"),
    }
    assert!(path.exists());
}

#[test]
fn test_verify_md5_against_quoted_validator() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "hello world").unwrap();

    let validator = "\"5eb63bbbe01eeed093cb22bb8f5acdc3\"";
    assert!(verify::verify_file(temp_file.path(), DigestAlgorithm::Md5, validator).is_ok());
}

#[test]
fn test_digest_is_buffer_size_independent() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let content: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 251) as u8).collect();
    temp_file.write_all(&content).unwrap();

    for algorithm in [DigestAlgorithm::Sha256, DigestAlgorithm::Md5] {
        let reference = verify::digest_file(temp_file.path(), algorithm).unwrap();
        for buffer_size in [1, 7, 512, 4096, 65_536] {
            let digest =
                verify::digest_file_with_buffer(temp_file.path(), algorithm, buffer_size).unwrap();
            assert_eq!(digest, reference, "{algorithm} with buffer {buffer_size}");
        }
    }
}

#[test]
fn test_digest_algorithm_from_str() {
    assert_eq!("SHA256".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha256));
    assert_eq!("sha-256".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha256));
    assert_eq!("md5".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Md5));
    assert!("crc32".parse::<DigestAlgorithm>().is_err());
}

#[test]
fn test_read_checksum_file() {
    let mut sha256sum = NamedTempFile::new().unwrap();
    writeln!(
        sha256sum,
        "DC5D63134FB696626C4BF28E1232434AB040ACC10A66CFEE55DACDD70DAE82A3  hello.txt"
    )
    .unwrap();
    assert_eq!(
        verify::read_checksum_file(sha256sum.path()).unwrap(),
        "DC5D63134FB696626C4BF28E1232434AB040ACC10A66CFEE55DACDD70DAE82A3"
    );

    let mut bare = NamedTempFile::new().unwrap();
    write!(bare, "\n  5eb63bbbe01eeed093cb22bb8f5acdc3\n").unwrap();
    assert_eq!(
        verify::read_checksum_file(bare.path()).unwrap(),
        "5eb63bbbe01eeed093cb22bb8f5acdc3"
    );

    let empty = NamedTempFile::new().unwrap();
    assert!(matches!(
        verify::read_checksum_file(empty.path()),
        Err(Error::EmptyChecksumFile(_))
    ));
}
