//! Property tests for chunked access.

use proptest::prelude::*;
use test_case::test_case;

use crate::{ChunkedArray, ChunkedSequentialReader, MemoryArray};

/// Splits `[0, len)` into consecutive ranges at the given (unsorted) cut points.
fn ranges_from_cuts(len: u64, mut cuts: Vec<u64>) -> Vec<(u64, u64)> {
    cuts.retain(|c| *c <= len);
    cuts.push(0);
    cuts.push(len);
    cuts.sort_unstable();
    cuts.windows(2).map(|w| (w[0], w[1])).collect()
}

proptest! {
    #[test]
    fn concatenated_ranges_reproduce_array(
        data in prop::collection::vec(any::<u64>(), 0..400),
        chunk_len in 1usize..64,
        cuts in prop::collection::vec(0u64..400, 0..40),
    ) {
        let len = data.len() as u64;
        let mut reader = ChunkedSequentialReader::new(MemoryArray::new(data.clone(), chunk_len));

        let mut rebuilt = Vec::with_capacity(data.len());
        for (start, end) in ranges_from_cuts(len, cuts) {
            let part = reader.fetch_range(start, end).unwrap();
            prop_assert_eq!(part.len() as u64, end - start);
            rebuilt.extend(part);
        }
        prop_assert_eq!(rebuilt, data);
    }

    #[test]
    fn overrunning_request_returns_tail(
        data in prop::collection::vec(any::<u32>(), 1..100),
        chunk_len in 1usize..16,
        overrun in 1u64..50,
    ) {
        let len = data.len() as u64;
        let split = len / 2;
        let mut reader = ChunkedSequentialReader::new(MemoryArray::new(data.clone(), chunk_len));
        let _ = reader.fetch_range(0, split).unwrap();
        let tail = reader.fetch_range(split, len + overrun).unwrap();
        prop_assert_eq!(&tail[..], &data[split as usize..]);
        prop_assert!(reader.is_exhausted());
    }
}

#[test_case(1; "single element chunks")]
#[test_case(7; "odd chunks")]
#[test_case(1000; "one chunk")]
fn per_element_walk(chunk_len: usize) {
    let data: Vec<i64> = (0..100).map(|i| i * 3 - 50).collect();
    let mut reader = ChunkedSequentialReader::new(MemoryArray::new(data.clone(), chunk_len));
    let mut walked = Vec::new();
    let mut index = 0;
    while let Some(value) = reader.fetch_one(index).unwrap() {
        walked.push(value);
        index += 1;
    }
    assert_eq!(walked, data);
    assert_eq!(reader.len(), 100);
}

#[test]
fn units_pass_through_reader() {
    let array = MemoryArray::new(vec![1.0f64], 1).with_units("ms");
    assert_eq!(array.units(), Some("ms"));
    let reader = ChunkedSequentialReader::new(array);
    assert_eq!(reader.units(), Some("ms"));
}
