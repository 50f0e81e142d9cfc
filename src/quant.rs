//! Quantisation matrix: text-file loading and bit-packed serialisation.
//!
//! The matrix is the per-coefficient divisor applied after the forward DCT
//! and re-applied (as a multiplier) before the inverse. Entries are kept
//! both as integers (the wire form) and as a parallel f64 mirror used in
//! the quant/dequant arithmetic.
//!
//! Wire form: a 5-bit count B of bits per entry, followed by the 16
//! entries at B bits each, where B is the minimum width that fits every
//! entry (an all-zero matrix degenerates to B = 0 and no entry bits).

use std::path::Path;

use crate::bitstream::{BitReader, BitWriter};
use crate::block::BLOCK_SIZE;
use crate::error::{Error, Result};

/// Bits used for the entry-width field of the wire form.
pub const WIDTH_FIELD_BITS: u32 = 5;

/// Number of entries in the matrix.
const ENTRIES: usize = BLOCK_SIZE * BLOCK_SIZE;

/// 4x4 quantisation matrix with an f64 mirror for the transform stages.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantMatrix {
    values: [u16; ENTRIES],
    mirror: [f64; ENTRIES],
}

impl QuantMatrix {
    /// Create a matrix from row-major entries.
    pub fn from_entries(values: [u16; ENTRIES]) -> Self {
        let mut mirror = [0.0f64; ENTRIES];
        for (m, &v) in mirror.iter_mut().zip(values.iter()) {
            *m = f64::from(v);
        }
        QuantMatrix { values, mirror }
    }

    /// A matrix of all ones (lossless up to DCT round-off).
    pub fn ones() -> Self {
        Self::from_entries([1; ENTRIES])
    }

    /// Load a matrix from an ASCII file of 4 rows with 4 whitespace-
    /// separated integers each.
    ///
    /// # Errors
    /// `Error::Io` if the file cannot be read; `Error::Matrix` on wrong
    /// row/column counts, a non-integer entry, or a zero entry (the
    /// encoder divides by every entry).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str_rows(&text)
    }

    fn from_str_rows(text: &str) -> Result<Self> {
        let mut values = [0u16; ENTRIES];
        let mut rows = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if rows >= BLOCK_SIZE {
                return Err(Error::matrix(format!(
                    "too many rows, expected {}",
                    BLOCK_SIZE
                )));
            }

            let mut cols = 0usize;
            for item in line.split_whitespace() {
                if cols >= BLOCK_SIZE {
                    return Err(Error::matrix(format!(
                        "too many columns in row {}, expected {}",
                        rows, BLOCK_SIZE
                    )));
                }
                let value: u16 = item.parse().map_err(|_| {
                    Error::matrix(format!("entry '{}' is not a 16-bit integer", item))
                })?;
                if value == 0 {
                    return Err(Error::matrix(format!(
                        "entry at row {} col {} is zero; quantisers must be positive",
                        rows, cols
                    )));
                }
                values[rows * BLOCK_SIZE + cols] = value;
                cols += 1;
            }

            if cols != BLOCK_SIZE {
                return Err(Error::matrix(format!(
                    "row {} has {} columns, expected {}",
                    rows, cols, BLOCK_SIZE
                )));
            }
            rows += 1;
        }

        if rows != BLOCK_SIZE {
            return Err(Error::matrix(format!(
                "{} rows, expected {}",
                rows, BLOCK_SIZE
            )));
        }

        Ok(Self::from_entries(values))
    }

    /// Integer entry at flat index `i` (row-major).
    #[inline]
    pub fn value(&self, i: usize) -> u16 {
        self.values[i]
    }

    /// f64 mirror entry at flat index `i` (row-major).
    #[inline]
    pub fn factor(&self, i: usize) -> f64 {
        self.mirror[i]
    }

    /// Largest entry; bounds the per-pixel reconstruction error.
    pub fn max_value(&self) -> u16 {
        *self.values.iter().max().expect("matrix is non-empty")
    }

    /// Serialise to the wire form: 5-bit minimal entry width, then all
    /// entries at that width.
    pub fn write_to(&self, writer: &mut BitWriter) {
        let width = self
            .values
            .iter()
            .map(|&v| 16 - v.leading_zeros())
            .max()
            .expect("matrix is non-empty");

        writer.write_bits(width, WIDTH_FIELD_BITS);
        for &v in &self.values {
            writer.write_bits(u32::from(v), width);
        }
    }

    /// Parse the wire form written by `write_to`.
    ///
    /// # Errors
    /// `Error::Matrix` if the entry width exceeds 16 bits;
    /// `Error::EndOfStream` on a truncated stream.
    pub fn read_from(reader: &mut BitReader) -> Result<Self> {
        let width = reader.read_bits(WIDTH_FIELD_BITS)?;
        if width > 16 {
            return Err(Error::matrix(format!(
                "entry width {} exceeds 16 bits",
                width
            )));
        }

        let mut values = [0u16; ENTRIES];
        for v in values.iter_mut() {
            *v = reader.read_bits(width)? as u16;
        }
        Ok(Self::from_entries(values))
    }
}

// ============================================================================
// Tests
// ============================================================================
