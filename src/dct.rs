//! Forward and inverse 2-D DCT on flat coefficient vectors.
//!
//! Works on a flat slice of length S*S holding an S x S block in row-major
//! order; S is recovered as the integer square root. The transform is the
//! definitional type-II DCT with per-dimension scaling C(0) = 1/2 and
//! C(k > 0) = 1/sqrt(2), which is an exact orthonormal pair at S = 4: the
//! forward/inverse composition is the identity within float round-off.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

/// Per-dimension scale factor.
#[inline]
fn scale(k: usize) -> f64 {
    if k == 0 {
        0.5
    } else {
        FRAC_1_SQRT_2
    }
}

/// Forward 2-D DCT-II in place over a flat S*S vector.
pub fn forward(vec: &mut [f64]) {
    let size = (vec.len() as f64).sqrt() as usize;
    debug_assert_eq!(size * size, vec.len());

    let factor = FRAC_PI_2 / size as f64;
    let mut temp = vec![0.0f64; vec.len()];

    for u in 0..size {
        for v in 0..size {
            let mut sum = 0.0;
            for i in 0..size {
                for j in 0..size {
                    sum += ((2.0 * i as f64 + 1.0) * u as f64 * factor).cos()
                        * ((2.0 * j as f64 + 1.0) * v as f64 * factor).cos()
                        * vec[i * size + j];
                }
            }
            temp[u * size + v] = sum * scale(u) * scale(v);
        }
    }

    vec.copy_from_slice(&temp);
}

/// Inverse 2-D DCT (type III) in place over a flat S*S vector.
pub fn inverse(vec: &mut [f64]) {
    let size = (vec.len() as f64).sqrt() as usize;
    debug_assert_eq!(size * size, vec.len());

    let factor = FRAC_PI_2 / size as f64;
    let mut temp = vec![0.0f64; vec.len()];

    for u in 0..size {
        for v in 0..size {
            let coeff = scale(u) * scale(v) * vec[u * size + v];
            if coeff == 0.0 {
                continue;
            }
            for i in 0..size {
                for j in 0..size {
                    temp[i * size + j] += coeff
                        * ((2.0 * i as f64 + 1.0) * u as f64 * factor).cos()
                        * ((2.0 * j as f64 + 1.0) * v as f64 * factor).cos();
                }
            }
        }
    }

    vec.copy_from_slice(&temp);
}

// ============================================================================
// Tests
// ============================================================================
