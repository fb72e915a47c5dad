//! Property-based tests for sequence selection helpers.

use proptest::prelude::*;
use pulldown_core::sequence::select_every_indices;

proptest! {
    /// An index is kept exactly when its position in the cycle is an offset.
    #[test]
    fn select_every_keeps_offset_positions(length in 0usize..200, cycle in 2usize..8, seed in any::<u8>()) {
        let offsets: Vec<usize> = (0..cycle).filter(|o| (seed >> (o % 8)) & 1 == 1).collect();
        prop_assume!(!offsets.is_empty());

        let mut kept = select_every_indices(length, cycle, &offsets);
        kept.sort_unstable();
        let expected: Vec<usize> = (0..length).filter(|i| offsets.contains(&(i % cycle))).collect();

        prop_assert_eq!(kept, expected);
    }

    /// Whole cycles keep exactly `offsets.len()` frames each.
    #[test]
    fn select_every_whole_cycles(cycles in 0usize..40, cycle in 2usize..8) {
        let offsets: Vec<usize> = (0..cycle - 1).collect();
        let kept = select_every_indices(cycles * cycle, cycle, &offsets);
        prop_assert_eq!(kept.len(), cycles * (cycle - 1));
    }
}
