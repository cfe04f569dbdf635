//! Delta-encoded VLQ line table: maps bytecode offsets to source lines.
//!
//! Each run is 2 VLQ values:
//! - `delta_pc` (unsigned VLQ)
//! - `delta_line` (signed, zigzag + VLQ)
//!
//! A run covers every offset from its `pc` up to the next run, so a straight
//! line of code costs one entry regardless of how many instructions it holds.

/// Accumulates line runs while bytecode is emitted.
#[derive(Debug, Default)]
pub struct LineTableBuilder {
    runs: Vec<(u32, u32)>, // (pc, line)
}

impl LineTableBuilder {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Record that the instruction at `pc` belongs to `line`. Consecutive
    /// instructions on the same line collapse into one run.
    pub fn add(&mut self, pc: u32, line: u32) {
        match self.runs.last_mut() {
            Some(&mut (_, last_line)) if last_line == line => {}
            Some(last) if last.0 == pc => last.1 = line,
            _ => self.runs.push((pc, line)),
        }
    }

    pub fn finish(self) -> LineTable {
        let mut encoded = Vec::with_capacity(self.runs.len() * 2);
        let mut prev_pc: u32 = 0;
        let mut prev_line: i64 = 0;

        for (pc, line) in &self.runs {
            encode_unsigned_vlq(pc - prev_pc, &mut encoded);
            encode_unsigned_vlq(zigzag_encode(*line as i64 - prev_line), &mut encoded);
            prev_pc = *pc;
            prev_line = *line as i64;
        }

        LineTable { encoded }
    }
}

/// An immutable, encoded pc→line mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    encoded: Vec<u8>,
}

impl LineTable {
    /// Source line of the instruction covering `target_pc`: the line of the
    /// last run starting at or before it.
    pub fn line_for(&self, target_pc: usize) -> Option<u32> {
        let mut pos = 0;
        let mut pc: u64 = 0;
        let mut line: i64 = 0;
        let mut best = None;

        while pos < self.encoded.len() {
            let delta_pc = decode_unsigned_vlq(&self.encoded, &mut pos)?;
            let delta_line = zigzag_decode(decode_unsigned_vlq(&self.encoded, &mut pos)?);
            pc += delta_pc as u64;
            line += delta_line;

            if pc > target_pc as u64 {
                break;
            }
            best = Some(line as u32);
        }

        best
    }

    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

// ── VLQ helpers ─────────────────────────────────────────────────────

/// 7 data bits per byte, MSB set while more bytes follow.
fn encode_unsigned_vlq(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn decode_unsigned_vlq(encoded: &[u8], pos: &mut usize) -> Option<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = *encoded.get(*pos)?;
        *pos += 1;
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 35 {
            return None;
        }
    }
}

fn zigzag_encode(value: i64) -> u32 {
    ((value << 1) ^ (value >> 63)) as u32
}

fn zigzag_decode(value: u32) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table() {
        let table = LineTableBuilder::new().finish();
        assert_eq!(table.encoded_len(), 0);
        assert_eq!(table.line_for(0), None);
    }

    #[test]
    fn runs_cover_following_offsets() {
        let mut builder = LineTableBuilder::new();
        builder.add(0, 1);
        builder.add(3, 1);
        builder.add(5, 4);
        builder.add(9, 2);
        let table = builder.finish();

        assert_eq!(table.line_for(0), Some(1));
        assert_eq!(table.line_for(4), Some(1));
        assert_eq!(table.line_for(5), Some(4));
        assert_eq!(table.line_for(8), Some(4));
        assert_eq!(table.line_for(9), Some(2));
        assert_eq!(table.line_for(1000), Some(2));
    }

    #[test]
    fn same_line_collapses() {
        let mut builder = LineTableBuilder::new();
        for pc in 0..50 {
            builder.add(pc, 7);
        }
        let table = builder.finish();
        assert_eq!(table.encoded_len(), 2);
        assert_eq!(table.line_for(49), Some(7));
    }

    #[test]
    fn relabel_at_same_pc() {
        let mut builder = LineTableBuilder::new();
        builder.add(0, 1);
        builder.add(2, 3);
        builder.add(2, 5);
        let table = builder.finish();
        assert_eq!(table.line_for(2), Some(5));
        assert_eq!(table.line_for(1), Some(1));
    }

    #[test]
    fn zigzag_round_trip() {
        for v in [-1000, -1, 0, 1, 1000, i32::MAX as i64, i32::MIN as i64] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn vlq_round_trip() {
        for v in [0, 1, 127, 128, 16383, 16384, u32::MAX >> 4] {
            let mut buf = Vec::new();
            encode_unsigned_vlq(v, &mut buf);
            let mut pos = 0;
            assert_eq!(decode_unsigned_vlq(&buf, &mut pos), Some(v));
            assert_eq!(pos, buf.len());
        }
    }
}
