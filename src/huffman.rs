//! Optional Huffman envelope over the packed payload.
//!
//! The envelope treats the already bit-packed container as a stream of
//! 8-bit symbols and wraps it whole. On the wire the first bit says
//! whether the envelope is present; if it is, a dictionary follows, then
//! the concatenated codewords. If it is not, the payload bytes follow the
//! flag verbatim.
//!
//! Dictionary layout: entries grouped by code length, longest first. Each
//! group is {1-bit "more" = 1, 7-bit group size, 4-bit code length},
//! followed by {8-bit symbol, code} pairs; a lone 0 bit terminates the
//! groups. Groups with more than 127 entries are split.
//!
//! Codes are canonical: lengths come from the frequency tree, codewords
//! are assigned in (length, symbol) order, so encode and decode agree by
//! construction. The envelope is only used when it is representable
//! (max depth 15, the 4-bit length field), strictly smaller than the
//! verbatim form, and the final partial byte can be padded with a strict
//! prefix of the longest codeword -- padding that can never decode as a
//! spurious extra symbol.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Bits per symbol; the alphabet is raw bytes.
const SYMBOL_BITS: u32 = 8;

/// Width of the per-group entry-count field.
const GROUP_SIZE_BITS: u32 = 7;

/// Width of the per-group code-length field.
const GROUP_LEN_BITS: u32 = 4;

/// Longest representable codeword.
const MAX_CODE_LEN: u32 = (1 << GROUP_LEN_BITS) - 1;

/// Largest group the 7-bit size field can carry.
const MAX_GROUP_SIZE: usize = (1 << GROUP_SIZE_BITS) - 1;

/// One symbol's canonical codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Codeword {
    symbol: u8,
    code: u32,
    len: u32,
}

/// Wrap `payload` in the Huffman envelope, or in the verbatim envelope
/// when coding would not help.
pub fn compress(payload: &[u8]) -> Vec<u8> {
    let mut freqs = [0u64; 256];
    for &b in payload {
        freqs[b as usize] += 1;
    }

    if let Some(table) = build_code_table(&freqs) {
        let payload_bits: u64 = table
            .iter()
            .map(|cw| freqs[cw.symbol as usize] * u64::from(cw.len))
            .sum();
        let total_bits = 1 + dictionary_bits(&table) + payload_bits;
        let wrapped_bytes = total_bits.div_ceil(8);

        let tail = (total_bits % 8) as u32;
        let padding = if tail == 0 { 0 } else { 8 - tail };
        let longest = table.last().expect("table is non-empty");

        // Padding must be a strict prefix of a codeword or it would decode
        // as an extra symbol.
        if wrapped_bytes < 1 + payload.len() as u64 && (padding == 0 || longest.len > padding) {
            debug!(
                symbols = table.len(),
                wrapped = wrapped_bytes,
                raw = payload.len(),
                "huffman envelope applied"
            );
            return emit_wrapped(payload, &table, padding);
        }
    }

    debug!(raw = payload.len(), "huffman envelope skipped");
    emit_verbatim(payload)
}

/// Undo `compress`: read the presence flag and either decode the envelope
/// or forward the verbatim payload.
pub fn expand(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(data);
    if reader.read_bit()? {
        expand_wrapped(&mut reader)
    } else {
        // Forward whole bytes; the trailing partial byte is padding.
        let mut out = Vec::with_capacity(data.len().saturating_sub(1));
        while reader.remaining() >= SYMBOL_BITS as usize {
            out.push(reader.read_bits(SYMBOL_BITS)? as u8);
        }
        Ok(out)
    }
}

/// Canonical code table for a frequency histogram, sorted by
/// (length, symbol).
///
/// Returns `None` when the histogram is empty or the tree is deeper than
/// the 4-bit length field allows.
fn build_code_table(freqs: &[u64; 256]) -> Option<Vec<Codeword>> {
    let lengths = code_lengths(freqs)?;
    if lengths.iter().any(|&(_, len)| len > MAX_CODE_LEN) {
        return None;
    }

    // Canonical assignment: codes count upward in (length, symbol) order,
    // shifting left whenever the length grows.
    let mut sorted = lengths;
    sorted.sort_by_key(|&(symbol, len)| (len, symbol));

    let mut table = Vec::with_capacity(sorted.len());
    let mut code = 0u32;
    let mut prev_len = sorted[0].1;
    for (symbol, len) in sorted {
        code <<= len - prev_len;
        table.push(Codeword { symbol, code, len });
        code += 1;
        prev_len = len;
    }
    Some(table)
}

/// Code lengths from a frequency histogram, via the classic min-heap tree
/// build. Ties break by insertion order, which keeps the build
/// deterministic. A single-symbol alphabet gets a one-bit code.
fn code_lengths(freqs: &[u64; 256]) -> Option<Vec<(u8, u32)>> {
    struct Node {
        symbol: Option<u8>,
        children: Option<(usize, usize)>,
    }

    let mut arena = Vec::new();
    let mut heap: BinaryHeap<Reverse<(u64, usize, usize)>> = BinaryHeap::new();
    let mut seq = 0usize;

    for (symbol, &freq) in freqs.iter().enumerate() {
        if freq > 0 {
            arena.push(Node {
                symbol: Some(symbol as u8),
                children: None,
            });
            heap.push(Reverse((freq, seq, arena.len() - 1)));
            seq += 1;
        }
    }

    if heap.is_empty() {
        return None;
    }
    if heap.len() == 1 {
        let Reverse((_, _, idx)) = heap.pop().expect("heap has one node");
        return Some(vec![(arena[idx].symbol.expect("leaf node"), 1)]);
    }

    while heap.len() > 1 {
        let Reverse((f1, _, left)) = heap.pop().expect("heap has two nodes");
        let Reverse((f2, _, right)) = heap.pop().expect("heap has two nodes");
        arena.push(Node {
            symbol: None,
            children: Some((left, right)),
        });
        heap.push(Reverse((f1 + f2, seq, arena.len() - 1)));
        seq += 1;
    }

    let Reverse((_, _, root)) = heap.pop().expect("heap has a root");

    // Walk the tree to collect leaf depths.
    let mut lengths = Vec::new();
    let mut stack = vec![(root, 0u32)];
    while let Some((idx, depth)) = stack.pop() {
        match (arena[idx].symbol, arena[idx].children) {
            (Some(symbol), _) => lengths.push((symbol, depth)),
            (None, Some((left, right))) => {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
            (None, None) => unreachable!("internal node without children"),
        }
    }
    Some(lengths)
}

/// Exact bit cost of the dictionary for `table`.
fn dictionary_bits(table: &[Codeword]) -> u64 {
    let mut bits = 1u64; // terminator
    let mut i = 0;
    while i < table.len() {
        let len = table[i].len;
        let group_end = table[i..]
            .iter()
            .take_while(|cw| cw.len == len)
            .count()
            + i;
        let mut remaining = group_end - i;
        while remaining > 0 {
            let chunk = remaining.min(MAX_GROUP_SIZE);
            bits += u64::from(1 + GROUP_SIZE_BITS + GROUP_LEN_BITS);
            bits += chunk as u64 * (u64::from(SYMBOL_BITS) + u64::from(len));
            remaining -= chunk;
        }
        i = group_end;
    }
    bits
}

fn emit_wrapped(payload: &[u8], table: &[Codeword], padding: u32) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(payload.len());
    writer.write_bit(true);

    // Dictionary: groups by code length, longest first.
    let mut by_len: Vec<&Codeword> = table.iter().collect();
    by_len.sort_by_key(|cw| Reverse(cw.len));

    let mut i = 0;
    while i < by_len.len() {
        let len = by_len[i].len;
        let group: Vec<&Codeword> = by_len[i..]
            .iter()
            .take_while(|cw| cw.len == len)
            .copied()
            .collect();
        for chunk in group.chunks(MAX_GROUP_SIZE) {
            writer.write_bit(true);
            writer.write_bits(chunk.len() as u32, GROUP_SIZE_BITS);
            writer.write_bits(len, GROUP_LEN_BITS);
            for cw in chunk {
                writer.write_bits(u32::from(cw.symbol), SYMBOL_BITS);
                writer.write_bits(cw.code, cw.len);
            }
        }
        i += group.len();
    }
    writer.write_bit(false);

    // Payload codewords.
    let mut codes = [Codeword {
        symbol: 0,
        code: 0,
        len: 0,
    }; 256];
    for &cw in table {
        codes[cw.symbol as usize] = cw;
    }
    for &b in payload {
        let cw = codes[b as usize];
        writer.write_bits(cw.code, cw.len);
    }

    // Protective padding: a strict prefix of the longest codeword, so the
    // decoder's final walk runs out of bits instead of finding a symbol.
    if padding > 0 {
        let longest = table.last().expect("table is non-empty");
        writer.write_bits(longest.code >> (longest.len - padding), padding);
    }

    writer.into_bytes()
}

fn emit_verbatim(payload: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(payload.len() + 1);
    writer.write_bit(false);
    for &b in payload {
        writer.write_bits(u32::from(b), SYMBOL_BITS);
    }
    writer.into_bytes()
}

/// Decode tree rebuilt from the transmitted dictionary.
struct DecodeTree {
    /// (zero child, one child, symbol) triples; 0 is the root.
    nodes: Vec<(Option<usize>, Option<usize>, Option<u8>)>,
}

impl DecodeTree {
    fn new() -> Self {
        DecodeTree {
            nodes: vec![(None, None, None)],
        }
    }

    fn insert(&mut self, cw: Codeword) -> Result<()> {
        let mut node = 0usize;
        for i in (0..cw.len).rev() {
            if self.nodes[node].2.is_some() {
                return Err(Error::huffman("code is not prefix-free"));
            }
            let bit = (cw.code >> i) & 1;
            let next = if bit == 0 {
                self.nodes[node].0
            } else {
                self.nodes[node].1
            };
            node = match next {
                Some(n) => n,
                None => {
                    self.nodes.push((None, None, None));
                    let n = self.nodes.len() - 1;
                    if bit == 0 {
                        self.nodes[node].0 = Some(n);
                    } else {
                        self.nodes[node].1 = Some(n);
                    }
                    n
                }
            };
        }
        let leaf = &mut self.nodes[node];
        if leaf.0.is_some() || leaf.1.is_some() || leaf.2.is_some() {
            return Err(Error::huffman("code is not prefix-free"));
        }
        leaf.2 = Some(cw.symbol);
        Ok(())
    }
}

fn expand_wrapped(reader: &mut BitReader) -> Result<Vec<u8>> {
    let mut tree = DecodeTree::new();
    let mut entries = 0usize;

    while reader.read_bit()? {
        let group_size = reader.read_bits(GROUP_SIZE_BITS)? as usize;
        let len = reader.read_bits(GROUP_LEN_BITS)?;
        if group_size == 0 {
            return Err(Error::huffman("empty dictionary group"));
        }
        if len == 0 {
            return Err(Error::huffman("zero-length code"));
        }
        for _ in 0..group_size {
            let symbol = reader.read_bits(SYMBOL_BITS)? as u8;
            let code = reader.read_bits(len)?;
            tree.insert(Codeword { symbol, code, len })?;
            entries += 1;
        }
    }

    if entries == 0 {
        return Err(Error::huffman("empty dictionary"));
    }

    let mut out = Vec::with_capacity(reader.remaining() / 4);
    'decode: while !reader.is_empty() {
        let mut node = 0usize;
        loop {
            if let Some(symbol) = tree.nodes[node].2 {
                out.push(symbol);
                break;
            }
            if reader.is_empty() {
                // Partial codeword: protective padding, not data.
                break 'decode;
            }
            let bit = reader.read_bit()?;
            node = match if bit { tree.nodes[node].1 } else { tree.nodes[node].0 } {
                Some(n) => n,
                // A dangling branch can only be reached by padding over an
                // incomplete dictionary; treat it as end of data.
                None => break 'decode,
            };
        }
    }

    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
