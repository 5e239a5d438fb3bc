use proptest::prelude::*;

use crate::merge::{coalesce, RangeSource};

const MAX_RANGES: usize = 48;
const MAX_GAP: u64 = 4096;
const MAX_LEN: u64 = 4096;

/// Non-overlapping ascending ranges built from (gap, len) pairs. A zero gap
/// makes a range address-contiguous with its predecessor, exercising the
/// coalescing path.
fn range_set_strategy() -> impl Strategy<Value = Vec<RangeSource>> {
    prop::collection::vec((0u64..=MAX_GAP, 1u64..=MAX_LEN), 0..=MAX_RANGES).prop_map(|pairs| {
        let mut ranges = Vec::with_capacity(pairs.len());
        let mut cursor = 0x1_0000u64;
        for (gap, len) in pairs {
            cursor += gap;
            ranges.push(RangeSource {
                start: cursor,
                len,
                rva: 0,
            });
            cursor += len;
        }
        ranges
    })
}

fn covered_addresses(start: u64, len: u64) -> impl Iterator<Item = u64> {
    start..start + len
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_coalesce_covers_exact_union(ranges in range_set_strategy()) {
        let merged = coalesce(&ranges);

        let input_bytes: u64 = ranges.iter().map(|r| r.len).sum();
        let output_bytes: u64 = merged.iter().map(|d| d.data_size).sum();
        prop_assert_eq!(input_bytes, output_bytes);

        let mut input_addrs: Vec<u64> = ranges
            .iter()
            .flat_map(|r| covered_addresses(r.start, r.len))
            .collect();
        input_addrs.sort_unstable();
        let output_addrs: Vec<u64> = merged
            .iter()
            .flat_map(|d| covered_addresses(d.start_of_memory_range, d.data_size))
            .collect();
        prop_assert_eq!(input_addrs, output_addrs);
    }

    #[test]
    fn prop_coalesce_output_is_sorted_and_non_contiguous(ranges in range_set_strategy()) {
        let merged = coalesce(&ranges);
        for pair in merged.windows(2) {
            let end = pair[0].start_of_memory_range + pair[0].data_size;
            prop_assert!(end < pair[1].start_of_memory_range);
        }
    }

    #[test]
    fn prop_coalesce_is_idempotent(ranges in range_set_strategy()) {
        let once = coalesce(&ranges);
        let as_sources: Vec<RangeSource> = once
            .iter()
            .map(|d| RangeSource {
                start: d.start_of_memory_range,
                len: d.data_size,
                rva: 0,
            })
            .collect();
        prop_assert_eq!(coalesce(&as_sources), once);
    }
}
