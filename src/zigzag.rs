//! Zig-zag scan order for square blocks.
//!
//! The scan linearises an S x S block along its anti-diagonals so that
//! low-frequency coefficients come first and the quantised tail of zeroes
//! clusters at the end, where run-length elision can drop it.
//!
//! The orders are built once per block size and cached in read-only
//! statics, safe to share across threads without synchronisation.

use std::sync::OnceLock;

use crate::block::BLOCK_SIZE;

static SCAN_BLOCK: OnceLock<Vec<usize>> = OnceLock::new();

/// Scan order for the 4x4 coding blocks, as row-major indices.
pub fn scan_block() -> &'static [usize] {
    SCAN_BLOCK.get_or_init(|| build_scan(BLOCK_SIZE))
}

/// Build the zig-zag permutation for an arbitrary side length.
///
/// Positions are ordered by anti-diagonal (x + y); within a diagonal the
/// tie-break key is y on odd diagonals walked downward and x on even ones
/// walked upward, which alternates the traversal direction.
pub fn build_scan(size: usize) -> Vec<usize> {
    let mut positions: Vec<(usize, usize)> = (0..size * size)
        .map(|i| (i % size, i / size))
        .collect();

    positions.sort_by_key(|&(x, y)| {
        let group = x + y;
        let column = if (x as isize - y as isize).rem_euclid(2) == 1 {
            y
        } else {
            x
        };
        (group, column)
    });

    positions.into_iter().map(|(x, y)| y * size + x).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_order_4x4() {
        assert_eq!(
            scan_block(),
            &[0, 1, 4, 8, 5, 2, 3, 6, 9, 12, 13, 10, 7, 11, 14, 15]
        );
    }

    #[test]
    fn test_scan_is_permutation() {
        for size in [2usize, 4, 8, 16] {
            let scan = build_scan(size);
            let mut seen = vec![false; size * size];
            for &i in &scan {
                assert!(!seen[i], "index {} visited twice", i);
                seen[i] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_scan_inverse_is_identity() {
        let scan = scan_block();
        let mut inverse = [0usize; 16];
        for (pos, &idx) in scan.iter().enumerate() {
            inverse[idx] = pos;
        }

        for i in 0..16 {
            assert_eq!(scan[inverse[i]], i);
        }
    }

    #[test]
    fn test_scan_starts_at_dc_and_ends_at_corner() {
        let scan = scan_block();
        assert_eq!(scan[0], 0);
        assert_eq!(scan[15], 15);
    }
}
