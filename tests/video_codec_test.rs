//! End-to-end tests for the video pipeline.
//!
//! Round-trips raw YUV 4:2:0 streams through the encoder and decoder and
//! checks GOP structure effects, chroma synthesis, and stream-level size
//! behaviour.

use dcv_lib::scheduler::Scheduler;
use dcv_lib::video::UV_FILL;
use dcv_lib::{DecodedVideo, QuantMatrix, VideoDecoder, VideoEncoder};

// ============================================================================
// Helper Functions
// ============================================================================

/// Frame size in bytes for 4:2:0.
fn frame_size(width: usize, height: usize) -> usize {
    width * height * 3 / 2
}

/// A raw stream whose luma pans horizontally by `step` pixels per frame.
fn panning_stream(width: usize, height: usize, frames: usize, step: usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(frames * frame_size(width, height));
    for f in 0..frames {
        for y in 0..height {
            for x in 0..width {
                raw.push(((x + f * step) * 3 + y * 2) as u8);
            }
        }
        // Chroma bytes are opaque to the codec.
        raw.extend((0..width * height / 2).map(|i| (i % 5) as u8 * 40));
    }
    raw
}

fn encode(raw: &[u8], width: usize, height: usize, gop: usize, merange: usize) -> Vec<u8> {
    VideoEncoder::new(width, height, true, gop, merange, true, QuantMatrix::ones())
        .expect("valid parameters")
        .with_scheduler(Scheduler::Serial)
        .encode(raw)
        .expect("encode succeeds")
}

fn decode(data: &[u8]) -> DecodedVideo {
    VideoDecoder::new()
        .with_scheduler(Scheduler::Serial)
        .decode(data)
        .expect("decode succeeds")
}

fn max_luma_error(raw: &[u8], decoded: &DecodedVideo) -> i32 {
    let fsize = frame_size(decoded.width, decoded.height);
    let luma = decoded.width * decoded.height;
    let mut worst = 0;
    for f in 0..decoded.frames {
        let y_in = &raw[f * fsize..f * fsize + luma];
        let y_out = &decoded.data[f * fsize..f * fsize + luma];
        for (o, i) in y_out.iter().zip(y_in.iter()) {
            worst = worst.max((i32::from(*o) - i32::from(*i)).abs());
        }
    }
    worst
}

// ============================================================================
// Round-trip Tests
// ============================================================================

#[test]
fn test_static_stream_roundtrip() {
    let width = 32;
    let height = 32;
    let raw = panning_stream(width, height, 4, 0);

    let decoded = decode(&encode(&raw, width, height, 2, 8));
    assert_eq!(decoded.width, width);
    assert_eq!(decoded.height, height);
    assert_eq!(decoded.frames, 4);
    assert_eq!(decoded.data.len(), raw.len());
    assert!(max_luma_error(&raw, &decoded) <= 4);
}

#[test]
fn test_panning_stream_roundtrip() {
    let width = 48;
    let height = 32;
    let raw = panning_stream(width, height, 4, 1);

    let decoded = decode(&encode(&raw, width, height, 4, 8));
    // Predicted frames of a moving scene accumulate a little drift between
    // the encoder's prediction-only reference and the decoder's
    // prediction-plus-residual one.
    assert!(max_luma_error(&raw, &decoded) <= 24);
}

#[test]
fn test_single_frame_stream() {
    let width = 16;
    let height = 16;
    let raw = panning_stream(width, height, 1, 0);

    let decoded = decode(&encode(&raw, width, height, 8, 4));
    assert_eq!(decoded.frames, 1);
    assert!(max_luma_error(&raw, &decoded) <= 4);
}

#[test]
fn test_gop_boundary_resets_prediction() {
    // Crossing a GOP boundary re-encodes intra, so a long stream stays
    // bounded even while panning.
    let width = 32;
    let height = 32;
    let raw = panning_stream(width, height, 6, 1);

    let decoded = decode(&encode(&raw, width, height, 2, 8));
    assert_eq!(decoded.frames, 6);
    assert!(max_luma_error(&raw, &decoded) <= 24);
}

// ============================================================================
// Chroma Tests
// ============================================================================

#[test]
fn test_chroma_is_not_preserved_but_synthesised() {
    let width = 16;
    let height = 16;
    let raw = panning_stream(width, height, 3, 0);

    let decoded = decode(&encode(&raw, width, height, 2, 4));

    let fsize = frame_size(width, height);
    let luma = width * height;
    for f in 0..3 {
        let uv = &decoded.data[f * fsize + luma..(f + 1) * fsize];
        assert_eq!(uv.len(), luma / 2);
        assert!(uv.iter().all(|&b| b == UV_FILL), "frame {}", f);
    }
}

// ============================================================================
// Size Tests
// ============================================================================

#[test]
fn test_predicted_frames_shrink_static_streams() {
    let width = 32;
    let height = 32;
    let raw = panning_stream(width, height, 4, 0);

    let long_gop = encode(&raw, width, height, 4, 8);
    let all_intra = encode(&raw, width, height, 1, 8);
    assert!(
        long_gop.len() < all_intra.len(),
        "gop=4: {} bytes, all-intra: {} bytes",
        long_gop.len(),
        all_intra.len()
    );
}

#[test]
fn test_stream_smaller_than_raw_with_coarse_quant() {
    let width = 32;
    let height = 32;
    let raw = panning_stream(width, height, 4, 0);

    let encoded = VideoEncoder::new(width, height, true, 4, 8, true, QuantMatrix::from_entries([32; 16]))
        .unwrap()
        .with_scheduler(Scheduler::Serial)
        .encode(&raw)
        .unwrap();
    assert!(encoded.len() < raw.len());
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_decoder_rejects_truncation() {
    let raw = panning_stream(16, 16, 2, 0);
    let encoded = encode(&raw, 16, 16, 2, 4);

    for cut in [1, encoded.len() / 4, encoded.len() / 2] {
        assert!(
            VideoDecoder::new().decode(&encoded[..cut]).is_err(),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn test_encoder_rejects_ragged_input() {
    let enc = VideoEncoder::new(16, 16, true, 2, 4, true, QuantMatrix::ones()).unwrap();
    let mut raw = panning_stream(16, 16, 1, 0);
    raw.pop();
    assert!(enc.encode(&raw).is_err());
}
