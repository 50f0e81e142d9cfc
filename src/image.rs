//! Still-image encoder and decoder.
//!
//! The image processor owns the block grid over a single grayscale plane
//! and drives the 4x4 block pipeline across it, bracketed by the
//! self-describing header and the Huffman envelope. Video frames reuse the
//! same plane pipeline through this module.
//!
//! Wire layout of the inner stream: quantisation matrix, 1-bit RLE flag,
//! 15-bit width, 15-bit height, (for video: three more 15-bit fields,
//! written by the video processor), zero padding to the next byte
//! boundary, then per-block payloads in row-major order.

use tracing::{debug, info};

use crate::bitstream::{BitReader, BitWriter};
use crate::block::{self, Block, BLOCK_AREA, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::huffman;
use crate::quant::QuantMatrix;
use crate::scheduler::Scheduler;

/// Width of the dimension header fields.
pub const DIMENSION_BITS: u32 = 15;

/// Largest encodable width or height.
pub const MAX_DIMENSION: usize = (1 << DIMENSION_BITS) - 1;

/// Validate a plane dimension against the header field and block grid.
pub(crate) fn check_dimension(value: usize, unit: usize, what: &str) -> Result<()> {
    if value == 0 || value > MAX_DIMENSION {
        return Err(Error::dimension(format!(
            "{} {} outside [{}, {}]",
            what, value, unit, MAX_DIMENSION
        )));
    }
    if value % unit != 0 {
        return Err(Error::dimension(format!(
            "{} {} is not a multiple of {}",
            what, value, unit
        )));
    }
    Ok(())
}

/// Write the common header fields (no byte alignment).
pub(crate) fn write_base_header(
    writer: &mut BitWriter,
    quant: &QuantMatrix,
    use_rle: bool,
    width: usize,
    height: usize,
) {
    quant.write_to(writer);
    writer.write_bit(use_rle);
    writer.write_bits(width as u32, DIMENSION_BITS);
    writer.write_bits(height as u32, DIMENSION_BITS);
}

/// Parse the common header fields written by `write_base_header`.
pub(crate) fn read_base_header(reader: &mut BitReader) -> Result<(QuantMatrix, bool, usize, usize)> {
    let quant = QuantMatrix::read_from(reader)?;
    let use_rle = reader.read_bit()?;
    let width = reader.read_bits(DIMENSION_BITS)? as usize;
    let height = reader.read_bits(DIMENSION_BITS)? as usize;
    Ok((quant, use_rle, width, height))
}

/// Encode one plane through the block pipeline.
///
/// The per-block transform stage runs on the scheduler; emission drains
/// the coefficient buffers into the writer in row-major block order.
pub(crate) fn encode_plane(
    plane: &[u8],
    width: usize,
    height: usize,
    use_rle: bool,
    quant: &QuantMatrix,
    scheduler: Scheduler,
    writer: &mut BitWriter,
) {
    let blocks = Block::grid(width, height);
    let coeffs = scheduler.map_blocks(blocks.len(), |i| blocks[i].quantise(plane, width, quant));

    for c in &coeffs {
        block::write_coefficients(c, use_rle, writer);
    }
}

/// Decode one plane through the block pipeline.
///
/// The stream read is sequential (bit positions are positional); the
/// reconstruction stage fans out on the scheduler into per-block tiles
/// that are then copied into the plane.
pub(crate) fn decode_plane(
    plane: &mut [u8],
    width: usize,
    height: usize,
    use_rle: bool,
    quant: &QuantMatrix,
    scheduler: Scheduler,
    reader: &mut BitReader,
) -> Result<()> {
    let blocks = Block::grid(width, height);
    let mut coeffs = Vec::with_capacity(blocks.len());
    for _ in &blocks {
        coeffs.push(block::read_coefficients(use_rle, reader)?);
    }

    let origin = Block { x: 0, y: 0 };
    let tiles = scheduler.map_blocks(blocks.len(), |i| {
        let mut tile = [0u8; BLOCK_AREA];
        origin.reconstruct(&coeffs[i], quant, &mut tile, BLOCK_SIZE);
        tile
    });

    for (b, tile) in blocks.iter().zip(tiles.iter()) {
        for row in 0..BLOCK_SIZE {
            let offset = (b.y + row) * width + b.x;
            plane[offset..offset + BLOCK_SIZE]
                .copy_from_slice(&tile[row * BLOCK_SIZE..(row + 1) * BLOCK_SIZE]);
        }
    }
    Ok(())
}

/// Grayscale still-image encoder.
pub struct ImageEncoder {
    width: usize,
    height: usize,
    use_rle: bool,
    quant: QuantMatrix,
    scheduler: Scheduler,
}

impl ImageEncoder {
    /// Create an encoder for a width x height grayscale plane.
    ///
    /// # Errors
    /// `Error::Dimension` when a dimension is zero, exceeds the 15-bit
    /// header field, or is not a multiple of the block size.
    pub fn new(width: usize, height: usize, use_rle: bool, quant: QuantMatrix) -> Result<Self> {
        check_dimension(width, BLOCK_SIZE, "width")?;
        check_dimension(height, BLOCK_SIZE, "height")?;

        Ok(ImageEncoder {
            width,
            height,
            use_rle,
            quant,
            scheduler: Scheduler::default(),
        })
    }

    /// Override the compute scheduler.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Encode a raw row-major grayscale plane to the container format.
    ///
    /// # Errors
    /// `Error::Dimension` when the input length is not width * height.
    pub fn encode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        if raw.len() != self.width * self.height {
            return Err(Error::dimension(format!(
                "raw image is {} bytes, expected {}x{} = {}",
                raw.len(),
                self.width,
                self.height,
                self.width * self.height
            )));
        }

        info!(width = self.width, height = self.height, rle = self.use_rle, "encoding image");

        let mut writer = BitWriter::with_capacity(raw.len());
        write_base_header(&mut writer, &self.quant, self.use_rle, self.width, self.height);
        writer.align_to_byte();
        encode_plane(
            raw,
            self.width,
            self.height,
            self.use_rle,
            &self.quant,
            self.scheduler,
            &mut writer,
        );

        let inner = writer.into_bytes();
        let out = huffman::compress(&inner);
        debug!(raw = raw.len(), packed = inner.len(), encoded = out.len(), "image encoded");
        Ok(out)
    }
}

/// A decoded grayscale image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

/// Grayscale still-image decoder.
///
/// Self-configuring: every parameter comes from the stream header.
#[derive(Default)]
pub struct ImageDecoder {
    scheduler: Scheduler,
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the compute scheduler.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Decode a container produced by `ImageEncoder::encode`.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        let inner = huffman::expand(data)?;
        let mut reader = BitReader::new(&inner);

        let (quant, use_rle, width, height) = read_base_header(&mut reader)?;
        check_dimension(width, BLOCK_SIZE, "width")?;
        check_dimension(height, BLOCK_SIZE, "height")?;
        reader.align_to_byte();

        info!(width, height, rle = use_rle, "decoding image");

        let mut pixels = vec![0u8; width * height];
        decode_plane(
            &mut pixels,
            width,
            height,
            use_rle,
            &quant,
            self.scheduler,
            &mut reader,
        )?;

        Ok(DecodedImage {
            width,
            height,
            pixels,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Rows vary only horizontally, so each block keeps its quantisation
    /// error well below the largest quantiser.
    fn row_gradient_image(width: usize, height: usize) -> Vec<u8> {
        let mut img = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                img[y * width + x] = (40 + (x % 32) * 4) as u8;
            }
        }
        img
    }

    fn roundtrip(img: &[u8], width: usize, height: usize, use_rle: bool, quant: QuantMatrix) -> DecodedImage {
        let encoder = ImageEncoder::new(width, height, use_rle, quant)
            .unwrap()
            .with_scheduler(Scheduler::Serial);
        let encoded = encoder.encode(img).unwrap();
        ImageDecoder::new()
            .with_scheduler(Scheduler::Serial)
            .decode(&encoded)
            .unwrap()
    }

    #[test]
    fn test_uniform_mid_gray_roundtrips_bit_exact() {
        let img = vec![128u8; 16 * 8];
        let out = roundtrip(&img, 16, 8, false, QuantMatrix::ones());
        assert_eq!(out.width, 16);
        assert_eq!(out.height, 8);
        assert_eq!(out.pixels, img);
    }

    #[test]
    fn test_ones_quant_is_near_lossless() {
        let img = row_gradient_image(32, 16);
        let out = roundtrip(&img, 32, 16, true, QuantMatrix::ones());

        for (o, i) in out.pixels.iter().zip(img.iter()) {
            assert!(
                (i32::from(*o) - i32::from(*i)).abs() <= 4,
                "{} decoded to {}",
                i,
                o
            );
        }
    }

    #[test]
    fn test_error_bounded_by_quant_step() {
        let img = row_gradient_image(32, 32);
        let quant = QuantMatrix::from_entries([16; 16]);
        let out = roundtrip(&img, 32, 32, true, quant);

        for (o, i) in out.pixels.iter().zip(img.iter()) {
            assert!(
                (i32::from(*o) - i32::from(*i)).abs() <= 16,
                "{} decoded to {}",
                i,
                o
            );
        }
    }

    #[test]
    fn test_rle_flag_roundtrips_both_ways() {
        let img = row_gradient_image(16, 16);
        let with_rle = roundtrip(&img, 16, 16, true, QuantMatrix::from_entries([8; 16]));
        let without = roundtrip(&img, 16, 16, false, QuantMatrix::from_entries([8; 16]));
        assert_eq!(with_rle.pixels, without.pixels);
    }

    #[test]
    fn test_coarse_quant_with_rle_compresses() {
        let img = row_gradient_image(64, 64);
        let quant = QuantMatrix::from_entries([32; 16]);
        let encoder = ImageEncoder::new(64, 64, true, quant)
            .unwrap()
            .with_scheduler(Scheduler::Serial);
        let encoded = encoder.encode(&img).unwrap();

        assert!(
            encoded.len() < img.len(),
            "encoded {} bytes from {}",
            encoded.len(),
            img.len()
        );
    }

    #[test]
    fn test_parallel_and_serial_bitstreams_match() {
        let img = row_gradient_image(32, 32);
        let quant = QuantMatrix::from_entries([4; 16]);

        let serial = ImageEncoder::new(32, 32, true, quant.clone())
            .unwrap()
            .with_scheduler(Scheduler::Serial)
            .encode(&img)
            .unwrap();
        let parallel = ImageEncoder::new(32, 32, true, quant)
            .unwrap()
            .with_scheduler(Scheduler::WorkStealing)
            .encode(&img)
            .unwrap();

        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(ImageEncoder::new(0, 16, true, QuantMatrix::ones()).is_err());
        assert!(ImageEncoder::new(18, 16, true, QuantMatrix::ones()).is_err());
        assert!(ImageEncoder::new(16, 7, true, QuantMatrix::ones()).is_err());
        assert!(ImageEncoder::new(40000, 16, true, QuantMatrix::ones()).is_err());
    }

    #[test]
    fn test_rejects_inconsistent_buffer_length() {
        let encoder = ImageEncoder::new(16, 16, true, QuantMatrix::ones()).unwrap();
        assert!(matches!(encoder.encode(&[0u8; 100]), Err(Error::Dimension(_))));
    }

    #[test]
    fn test_truncated_stream_fails() {
        let img = row_gradient_image(32, 32);
        let encoder = ImageEncoder::new(32, 32, false, QuantMatrix::ones())
            .unwrap()
            .with_scheduler(Scheduler::Serial);
        let encoded = encoder.encode(&img).unwrap();

        let chopped = &encoded[..encoded.len() / 2];
        assert!(ImageDecoder::new().decode(chopped).is_err());
    }

    #[test]
    fn test_header_survives_huffman_envelope() {
        let img = row_gradient_image(16, 16);
        let quant = QuantMatrix::from_entries([5; 16]);
        let out = roundtrip(&img, 16, 16, true, quant);
        assert_eq!(out.width, 16);
        assert_eq!(out.height, 16);
    }
}
