//! 4x4 coding block: the DCT / quantise / zig-zag / RLE pipeline.
//!
//! A block never owns pixels. It is a view: an (x, y) origin into a
//! caller-owned plane addressed with the plane's stride. The encode side
//! lifts the pixels into an f64 workspace, transforms and quantises them,
//! and emits the zig-zag coefficient payload; the decode side mirrors the
//! pipeline back into the plane.
//!
//! Compute and stream access are split: `quantise`/`reconstruct` touch only
//! the block's own pixels and workspace (safe to fan out across blocks),
//! while `write_coefficients`/`read_coefficients` run sequentially so bits
//! land in row-major block order.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::quant::QuantMatrix;
use crate::rle::RleSequence;
use crate::zigzag;

/// Side length of a coding block.
pub const BLOCK_SIZE: usize = 4;

/// Coefficients per block.
pub const BLOCK_AREA: usize = BLOCK_SIZE * BLOCK_SIZE;

/// Width of the per-block coefficient-width header field.
pub const SIZE_LEN_BITS: u32 = 4;

/// DC bias subtracted from pixels before the transform.
const PIXEL_BIAS: f64 = 128.0;

/// A 4x4 view into a pixel plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Pixel column of the top-left corner
    pub x: usize,
    /// Pixel row of the top-left corner
    pub y: usize,
}

impl Block {
    /// Build the row-major block grid over a width x height plane.
    ///
    /// Both dimensions must be multiples of `BLOCK_SIZE`; the grid then
    /// partitions the plane into disjoint views.
    pub fn grid(width: usize, height: usize) -> Vec<Block> {
        debug_assert_eq!(width % BLOCK_SIZE, 0);
        debug_assert_eq!(height % BLOCK_SIZE, 0);

        let mut blocks = Vec::with_capacity((width / BLOCK_SIZE) * (height / BLOCK_SIZE));
        for by in 0..height / BLOCK_SIZE {
            for bx in 0..width / BLOCK_SIZE {
                blocks.push(Block {
                    x: bx * BLOCK_SIZE,
                    y: by * BLOCK_SIZE,
                });
            }
        }
        blocks
    }

    /// Encode-side compute: pixels -> DCT -> quantise -> rounded
    /// coefficients in zig-zag order.
    pub fn quantise(&self, plane: &[u8], stride: usize, quant: &QuantMatrix) -> [i16; BLOCK_AREA] {
        let mut workspace = [0.0f64; BLOCK_AREA];
        for row in 0..BLOCK_SIZE {
            let offset = (self.y + row) * stride + self.x;
            for col in 0..BLOCK_SIZE {
                workspace[row * BLOCK_SIZE + col] = f64::from(plane[offset + col]) - PIXEL_BIAS;
            }
        }

        crate::dct::forward(&mut workspace);

        let scan = zigzag::scan_block();
        let mut coeffs = [0i16; BLOCK_AREA];
        for (k, &idx) in scan.iter().enumerate() {
            coeffs[k] = (workspace[idx] / quant.factor(idx)).round() as i16;
        }
        coeffs
    }

    /// Decode-side compute: coefficients -> dequantise -> inverse DCT ->
    /// clamped pixels written through the view.
    pub fn reconstruct(
        &self,
        coeffs: &[i16; BLOCK_AREA],
        quant: &QuantMatrix,
        plane: &mut [u8],
        stride: usize,
    ) {
        let scan = zigzag::scan_block();
        let mut workspace = [0.0f64; BLOCK_AREA];
        for (k, &idx) in scan.iter().enumerate() {
            workspace[idx] = f64::from(coeffs[k]) * quant.factor(idx);
        }

        crate::dct::inverse(&mut workspace);

        for row in 0..BLOCK_SIZE {
            let offset = (self.y + row) * stride + self.x;
            for col in 0..BLOCK_SIZE {
                let v = (workspace[row * BLOCK_SIZE + col] + PIXEL_BIAS).round();
                plane[offset + col] = v.clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Emit one block's zig-zag coefficients.
///
/// Layout: `SIZE_LEN_BITS` bits of per-coefficient width; with RLE, the
/// payload length at that width followed by the run-expanded values with
/// the trailing zero tail dropped; without RLE, all 16 values.
pub fn write_coefficients(coeffs: &[i16; BLOCK_AREA], use_rle: bool, writer: &mut BitWriter) {
    let seq = RleSequence::from_coefficients(coeffs);
    let bits = seq.header_bits(use_rle);
    debug_assert!(bits < (1 << SIZE_LEN_BITS), "width {} overflows header", bits);

    writer.write_bits(bits, SIZE_LEN_BITS);

    if use_rle {
        writer.write_bits(seq.total(), bits);
        for run in seq.runs() {
            for _ in 0..run.zeroes {
                writer.write_signed(0, bits);
            }
            writer.write_signed(run.value, bits);
        }
    } else {
        for &c in coeffs.iter() {
            writer.write_signed(c, bits);
        }
    }
}

/// Read back one block's zig-zag coefficients.
///
/// # Errors
/// `Error::EndOfStream` on truncation, or when the payload length field
/// promises more coefficients than the block holds (decoding such a
/// length would overrun the block payload).
pub fn read_coefficients(use_rle: bool, reader: &mut BitReader) -> Result<[i16; BLOCK_AREA]> {
    let bits = reader.read_bits(SIZE_LEN_BITS)?;
    let total = if use_rle {
        reader.read_bits(bits)? as usize
    } else {
        BLOCK_AREA
    };
    if total > BLOCK_AREA {
        return Err(Error::EndOfStream);
    }

    let mut coeffs = [0i16; BLOCK_AREA];
    for c in coeffs.iter_mut().take(total) {
        *c = reader.read_signed(bits.max(1))?;
    }
    Ok(coeffs)
}

// ============================================================================
// Tests
// ============================================================================
