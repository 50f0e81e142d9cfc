//! Video encoder and decoder: frame partitioning, GOP policy, and
//! cross-frame reference management.
//!
//! Raw input is YUV 4:2:0: per frame, width * height luma bytes followed
//! by width * height / 2 bytes of chroma the codec treats as opaque. The
//! chroma is skipped on encode and synthesised as a constant fill on
//! decode. The frame count is inferred from the input length.
//!
//! Every GOP starts with an intra frame; the remaining frames are
//! predicted against the immediately preceding reconstructed frame, which
//! both sides retain under the same rule.

use tracing::{debug, info};

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameContext, FrameKind};
use crate::huffman;
use crate::image::{self, DIMENSION_BITS, MAX_DIMENSION};
use crate::motion::{SearchPattern, MACROBLOCK_SIZE};
use crate::quant::QuantMatrix;
use crate::scheduler::Scheduler;

/// Filler byte for decoded chroma planes.
pub const UV_FILL: u8 = 0x80;

/// YUV 4:2:0 frame size in bytes for a luma plane of `width * height`.
#[inline]
fn frame_size(width: usize, height: usize) -> usize {
    width * height + width * height / 2
}

/// Validate the GOP period and search range against their header fields.
///
/// Reachable both from encoder construction and from decoding untrusted
/// headers, so failures use the dimension kind like the width/height
/// checks.
pub(crate) fn check_stream_params(gop: usize, merange: usize) -> Result<()> {
    if gop == 0 || gop > MAX_DIMENSION {
        return Err(Error::dimension(format!(
            "gop {} outside [1, {}]",
            gop, MAX_DIMENSION
        )));
    }
    if merange > MAX_DIMENSION {
        return Err(Error::dimension(format!(
            "merange {} exceeds {}",
            merange, MAX_DIMENSION
        )));
    }
    Ok(())
}

/// YUV 4:2:0 video encoder.
pub struct VideoEncoder {
    width: usize,
    height: usize,
    use_rle: bool,
    gop: u16,
    merange: u16,
    motion_comp: bool,
    quant: QuantMatrix,
    scheduler: Scheduler,
}

impl VideoEncoder {
    /// Create an encoder.
    ///
    /// # Errors
    /// `Error::Dimension` when a dimension is zero, exceeds the 15-bit
    /// header field, or is not a multiple of the macroblock size, and for
    /// an unusable GOP period or search range.
    pub fn new(
        width: usize,
        height: usize,
        use_rle: bool,
        gop: usize,
        merange: usize,
        motion_comp: bool,
        quant: QuantMatrix,
    ) -> Result<Self> {
        image::check_dimension(width, MACROBLOCK_SIZE, "width")?;
        image::check_dimension(height, MACROBLOCK_SIZE, "height")?;
        check_stream_params(gop, merange)?;

        Ok(VideoEncoder {
            width,
            height,
            use_rle,
            gop: gop as u16,
            merange: merange as u16,
            motion_comp,
            quant,
            scheduler: Scheduler::default(),
        })
    }

    /// Override the compute scheduler.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Encode a raw YUV 4:2:0 stream to the container format.
    ///
    /// # Errors
    /// `Error::Dimension` when the input is not a whole number of frames
    /// or the frame count overflows the 15-bit header field.
    pub fn encode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let fsize = frame_size(self.width, self.height);
        if raw.is_empty() || raw.len() % fsize != 0 {
            return Err(Error::dimension(format!(
                "raw stream of {} bytes is not a whole number of {}-byte frames",
                raw.len(),
                fsize
            )));
        }
        let frames = raw.len() / fsize;
        if frames > MAX_DIMENSION {
            return Err(Error::dimension(format!(
                "{} frames exceed the {} header limit",
                frames, MAX_DIMENSION
            )));
        }

        info!(
            width = self.width,
            height = self.height,
            frames,
            gop = self.gop,
            merange = self.merange,
            "encoding video"
        );

        let mut writer = BitWriter::with_capacity(raw.len());
        image::write_base_header(&mut writer, &self.quant, self.use_rle, self.width, self.height);
        writer.write_bits(frames as u32, DIMENSION_BITS);
        writer.write_bits(u32::from(self.gop), DIMENSION_BITS);
        writer.write_bits(u32::from(self.merange), DIMENSION_BITS);
        writer.align_to_byte();

        let pattern = SearchPattern::new(self.merange);
        let ctx = FrameContext {
            use_rle: self.use_rle,
            quant: &self.quant,
            pattern: &pattern,
            merange: self.merange,
            motion_comp: self.motion_comp,
            scheduler: self.scheduler,
        };

        let luma = self.width * self.height;
        let mut reference: Option<Vec<u8>> = None;
        for i in 0..frames {
            // The trailing chroma bytes of each frame are skipped.
            let mut plane = raw[i * fsize..i * fsize + luma].to_vec();
            let kind = FrameKind::for_index(i, usize::from(self.gop));
            debug!(frame = i, intra = kind.is_intra(), "encoding frame");

            Frame::new(kind, &mut plane, self.width, self.height).encode(
                &ctx,
                reference.as_deref(),
                &mut writer,
            )?;
            reference = Some(plane);
        }

        let inner = writer.into_bytes();
        let out = huffman::compress(&inner);
        debug!(raw = raw.len(), packed = inner.len(), encoded = out.len(), "video encoded");
        Ok(out)
    }
}

/// A decoded YUV 4:2:0 stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideo {
    pub width: usize,
    pub height: usize,
    pub frames: usize,
    /// Per frame: the luma plane followed by constant-fill chroma.
    pub data: Vec<u8>,
}

/// YUV 4:2:0 video decoder.
///
/// Self-configuring: every parameter comes from the stream header.
#[derive(Default)]
pub struct VideoDecoder {
    scheduler: Scheduler,
}

impl VideoDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the compute scheduler.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Decode a container produced by `VideoEncoder::encode`.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedVideo> {
        let inner = huffman::expand(data)?;
        let mut reader = BitReader::new(&inner);

        let (quant, use_rle, width, height) = image::read_base_header(&mut reader)?;
        image::check_dimension(width, MACROBLOCK_SIZE, "width")?;
        image::check_dimension(height, MACROBLOCK_SIZE, "height")?;
        let frames = reader.read_bits(DIMENSION_BITS)? as usize;
        let gop = reader.read_bits(DIMENSION_BITS)? as usize;
        let merange = reader.read_bits(DIMENSION_BITS)? as usize;
        check_stream_params(gop, merange)?;
        reader.align_to_byte();

        info!(width, height, frames, gop, merange, "decoding video");

        let pattern = SearchPattern::new(merange as u16);
        let ctx = FrameContext {
            use_rle,
            quant: &quant,
            pattern: &pattern,
            merange: merange as u16,
            motion_comp: true,
            scheduler: self.scheduler,
        };

        let luma = width * height;
        let mut out = Vec::with_capacity(frames * frame_size(width, height));
        let mut reference: Option<Vec<u8>> = None;

        for i in 0..frames {
            let mut plane = vec![0u8; luma];
            let kind = FrameKind::for_index(i, gop);
            debug!(frame = i, intra = kind.is_intra(), "decoding frame");

            Frame::new(kind, &mut plane, width, height).decode(
                &ctx,
                reference.as_deref(),
                &mut reader,
            )?;

            out.extend_from_slice(&plane);
            out.resize(out.len() + luma / 2, UV_FILL);
            reference = Some(plane);
        }

        Ok(DecodedVideo {
            width,
            height,
            frames,
            data: out,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
