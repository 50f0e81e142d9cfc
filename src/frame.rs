//! Frame-level coding: intra frames and motion-predicted frames.
//!
//! An intra frame is the still-image pipeline over the frame's luma plane.
//! A predicted frame first runs motion estimation per 16x16 macroblock
//! against the previous reconstructed frame, replaces its pixels with the
//! biased prediction residual, emits the motion-vector array, and then
//! codes the residual plane exactly like an intra frame. Motion vectors
//! always precede the residual payload.
//!
//! After emitting, the encoder overwrites each macroblock area with its
//! matched reference window, so the plane it hands forward as the next
//! reference is the prediction the decoder will reproduce.

use tracing::debug;

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::image;
use crate::motion::{mvec_bits, Macroblock, SearchPattern, RESIDUAL_BIAS};
use crate::quant::QuantMatrix;
use crate::scheduler::Scheduler;

/// How a frame is coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Self-contained (I-frame)
    Intra,
    /// Motion vectors plus residual against the previous frame (P-frame)
    Predicted,
}

impl FrameKind {
    /// GOP policy: frame `index` is intra iff it starts a group.
    pub fn for_index(index: usize, gop: usize) -> FrameKind {
        debug_assert!(gop > 0);
        if index % gop == 0 {
            FrameKind::Intra
        } else {
            FrameKind::Predicted
        }
    }

    pub fn is_intra(&self) -> bool {
        matches!(self, FrameKind::Intra)
    }
}

/// Shared per-stream coding parameters for frames.
pub struct FrameContext<'a> {
    pub use_rle: bool,
    pub quant: &'a QuantMatrix,
    pub pattern: &'a SearchPattern,
    pub merange: u16,
    pub motion_comp: bool,
    pub scheduler: Scheduler,
}

/// One video frame over a borrowed luma plane.
pub struct Frame<'a> {
    kind: FrameKind,
    plane: &'a mut [u8],
    width: usize,
    height: usize,
}

impl<'a> Frame<'a> {
    pub fn new(kind: FrameKind, plane: &'a mut [u8], width: usize, height: usize) -> Self {
        debug_assert_eq!(plane.len(), width * height);
        Frame {
            kind,
            plane,
            width,
            height,
        }
    }

    /// Encode this frame.
    ///
    /// Predicted frames require the previous reconstructed plane; on
    /// return the borrowed plane holds the reconstruction to use as the
    /// next frame's reference.
    pub fn encode(
        &mut self,
        ctx: &FrameContext,
        reference: Option<&[u8]>,
        writer: &mut BitWriter,
    ) -> Result<()> {
        match self.kind {
            FrameKind::Intra => {
                image::encode_plane(
                    self.plane,
                    self.width,
                    self.height,
                    ctx.use_rle,
                    ctx.quant,
                    ctx.scheduler,
                    writer,
                );
                Ok(())
            }
            FrameKind::Predicted => {
                let reference = reference
                    .ok_or_else(|| Error::invalid_input("predicted frame without a reference"))?;
                self.encode_predicted(ctx, reference, writer);
                Ok(())
            }
        }
    }

    fn encode_predicted(&mut self, ctx: &FrameContext, reference: &[u8], writer: &mut BitWriter) {
        let mut grid = Macroblock::grid(self.width, self.height);
        let (width, height) = (self.width, self.height);

        // Motion search per macroblock; each candidate only reads its own
        // pixels and the shared reference, so the stage fans out.
        let current: &[u8] = self.plane;
        let vectors = ctx.scheduler.map_blocks(grid.len(), |i| {
            let mut mb = grid[i];
            if ctx.motion_comp {
                mb.find_motion_vector(current, reference, width, height, ctx.pattern);
            }
            mb.mvec
        });

        let bits = mvec_bits(ctx.merange);
        for (mb, mvec) in grid.iter_mut().zip(vectors) {
            mb.mvec = mvec;
            writer.write_signed(mvec.0, bits);
            writer.write_signed(mvec.1, bits);
            mb.write_residual(self.plane, reference, self.width, self.height);
        }

        debug!(macroblocks = grid.len(), mvec_bits = bits, "motion vectors emitted");

        // The residual shows through the 4x4 grid over the same plane.
        image::encode_plane(
            self.plane,
            self.width,
            self.height,
            ctx.use_rle,
            ctx.quant,
            ctx.scheduler,
            writer,
        );

        // Leave the prediction in the plane: that is what the decoder sees
        // before the residual, and the correct reference for the next
        // frame's search.
        for mb in &grid {
            mb.compensate(self.plane, reference, self.width, self.height);
        }
    }

    /// Decode this frame into the borrowed plane.
    pub fn decode(
        &mut self,
        ctx: &FrameContext,
        reference: Option<&[u8]>,
        reader: &mut BitReader,
    ) -> Result<()> {
        match self.kind {
            FrameKind::Intra => image::decode_plane(
                self.plane,
                self.width,
                self.height,
                ctx.use_rle,
                ctx.quant,
                ctx.scheduler,
                reader,
            ),
            FrameKind::Predicted => {
                let reference = reference
                    .ok_or_else(|| Error::invalid_input("predicted frame without a reference"))?;
                self.decode_predicted(ctx, reference, reader)
            }
        }
    }

    fn decode_predicted(
        &mut self,
        ctx: &FrameContext,
        reference: &[u8],
        reader: &mut BitReader,
    ) -> Result<()> {
        let mut grid = Macroblock::grid(self.width, self.height);
        let bits = mvec_bits(ctx.merange);

        for mb in grid.iter_mut() {
            let dx = reader.read_signed(bits)?;
            let dy = reader.read_signed(bits)?;
            mb.mvec = (dx, dy);
        }

        // Motion-compensated prediction first, then the residual on top.
        for mb in &grid {
            mb.compensate(self.plane, reference, self.width, self.height);
        }

        let mut residual = vec![0u8; self.width * self.height];
        image::decode_plane(
            &mut residual,
            self.width,
            self.height,
            ctx.use_rle,
            ctx.quant,
            ctx.scheduler,
            reader,
        )?;

        for (p, r) in self.plane.iter_mut().zip(residual.iter()) {
            let v = i16::from(*p) + i16::from(*r) - RESIDUAL_BIAS;
            *p = v.clamp(0, 255) as u8;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
