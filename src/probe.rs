//! Container inspection without reconstruction.
//!
//! Walks an encoded stream structurally: the envelope, the header fields,
//! and the per-frame payloads, skipping the transform stages entirely.
//! The container does not record whether it holds an image or a video
//! (the settings file carries that distinction), so the caller chooses
//! which walk to run.

use std::fmt;

use crate::bitstream::BitReader;
use crate::block::{self, BLOCK_SIZE};
use crate::error::Result;
use crate::frame::FrameKind;
use crate::huffman;
use crate::image::{check_dimension, read_base_header};
use crate::motion::{mvec_bits, MACROBLOCK_SIZE};
use crate::quant::QuantMatrix;
use crate::video::check_stream_params;

/// Header facts shared by image and video streams.
pub struct StreamInfo {
    /// Whether the Huffman envelope was present
    pub huffman: bool,
    /// Encoded file size in bytes
    pub encoded_len: usize,
    /// Inner bit-packed stream size in bytes after unwrapping
    pub packed_len: usize,
    pub quant: QuantMatrix,
    pub use_rle: bool,
    pub width: usize,
    pub height: usize,
}

/// Probe result for a still image.
pub struct ImageInfo {
    pub stream: StreamInfo,
    /// Total 4x4 blocks in the payload
    pub blocks: usize,
    /// Bits consumed by the block payload
    pub payload_bits: usize,
}

/// Probe result for a video stream.
pub struct VideoInfo {
    pub stream: StreamInfo,
    pub frames: usize,
    pub gop: usize,
    pub merange: usize,
    /// Per motion-vector component field width
    pub mvec_bits: u32,
    /// Frame kind and payload size in bits, in display order
    pub frame_bits: Vec<(FrameKind, usize)>,
}

/// Walk the block payload of one plane, returning the bits consumed.
fn walk_plane(reader: &mut BitReader, width: usize, height: usize, use_rle: bool) -> Result<usize> {
    let start = reader.position();
    let blocks = (width / BLOCK_SIZE) * (height / BLOCK_SIZE);
    for _ in 0..blocks {
        block::read_coefficients(use_rle, reader)?;
    }
    Ok(reader.position() - start)
}

fn unwrap_envelope(data: &[u8]) -> Result<(bool, Vec<u8>)> {
    let huffman_present = !data.is_empty() && data[0] & 0x80 != 0;
    let inner = huffman::expand(data)?;
    Ok((huffman_present, inner))
}

/// Inspect an encoded still image.
pub fn probe_image(data: &[u8]) -> Result<ImageInfo> {
    let (huffman_present, inner) = unwrap_envelope(data)?;
    let mut reader = BitReader::new(&inner);

    let (quant, use_rle, width, height) = read_base_header(&mut reader)?;
    check_dimension(width, BLOCK_SIZE, "width")?;
    check_dimension(height, BLOCK_SIZE, "height")?;
    reader.align_to_byte();

    let payload_bits = walk_plane(&mut reader, width, height, use_rle)?;

    Ok(ImageInfo {
        stream: StreamInfo {
            huffman: huffman_present,
            encoded_len: data.len(),
            packed_len: inner.len(),
            quant,
            use_rle,
            width,
            height,
        },
        blocks: (width / BLOCK_SIZE) * (height / BLOCK_SIZE),
        payload_bits,
    })
}

/// Inspect an encoded video stream.
pub fn probe_video(data: &[u8]) -> Result<VideoInfo> {
    let (huffman_present, inner) = unwrap_envelope(data)?;
    let mut reader = BitReader::new(&inner);

    let (quant, use_rle, width, height) = read_base_header(&mut reader)?;
    check_dimension(width, MACROBLOCK_SIZE, "width")?;
    check_dimension(height, MACROBLOCK_SIZE, "height")?;
    let frames = reader.read_bits(crate::image::DIMENSION_BITS)? as usize;
    let gop = reader.read_bits(crate::image::DIMENSION_BITS)? as usize;
    let merange = reader.read_bits(crate::image::DIMENSION_BITS)? as usize;
    check_stream_params(gop, merange)?;
    reader.align_to_byte();

    let vec_bits = mvec_bits(merange as u16);
    let macroblocks = (width / MACROBLOCK_SIZE) * (height / MACROBLOCK_SIZE);

    let mut frame_bits = Vec::with_capacity(frames);
    for i in 0..frames {
        let kind = FrameKind::for_index(i, gop);
        let start = reader.position();
        if !kind.is_intra() {
            for _ in 0..macroblocks * 2 {
                reader.read_signed(vec_bits)?;
            }
        }
        walk_plane(&mut reader, width, height, use_rle)?;
        frame_bits.push((kind, reader.position() - start));
    }

    Ok(VideoInfo {
        stream: StreamInfo {
            huffman: huffman_present,
            encoded_len: data.len(),
            packed_len: inner.len(),
            quant,
            use_rle,
            width,
            height,
        },
        frames,
        gop,
        merange,
        mvec_bits: vec_bits,
        frame_bits,
    })
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dimensions:  {}x{}", self.width, self.height)?;
        writeln!(f, "rle:         {}", if self.use_rle { "on" } else { "off" })?;
        writeln!(
            f,
            "huffman:     {}",
            if self.huffman { "present" } else { "absent" }
        )?;
        writeln!(
            f,
            "sizes:       {} encoded / {} packed bytes",
            self.encoded_len, self.packed_len
        )?;
        writeln!(f, "quantiser:")?;
        for row in 0..BLOCK_SIZE {
            write!(f, "  ")?;
            for col in 0..BLOCK_SIZE {
                write!(f, "{:>6}", self.quant.value(row * BLOCK_SIZE + col))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "container:   image")?;
        write!(f, "{}", self.stream)?;
        writeln!(f, "blocks:      {}", self.blocks)?;
        writeln!(f, "payload:     {} bits", self.payload_bits)
    }
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "container:   video")?;
        write!(f, "{}", self.stream)?;
        writeln!(
            f,
            "frames:      {} (gop {}, merange {}, {} bits per vector component)",
            self.frames, self.gop, self.merange, self.mvec_bits
        )?;
        for (i, (kind, bits)) in self.frame_bits.iter().enumerate() {
            writeln!(
                f,
                "  frame {:>3}: {} {:>8} bits",
                i,
                if kind.is_intra() { "I" } else { "P" },
                bits
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
