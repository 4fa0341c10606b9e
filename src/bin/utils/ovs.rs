// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// bit-packed overlap records: aIID u32, bIID u32, then two little-endian u64 words

use super::config::bits_for;
use super::error::{OvlError, OvlResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

pub const ERATE_BITS: u32 = 12;
pub const MAX_ENCODED_ERATE: u16 = (1 << ERATE_BITS) - 1;
pub const MAX_ERATE: f64 = 0.4095;
pub const RECORD_BYTES: usize = 24;

pub const TYPE_OVL: u8 = 0;
pub const TYPE_OBT: u8 = 1;
pub const TYPE_MER: u8 = 2;

#[inline]
pub fn encode_quality(q: f64) -> u16 {
    if q < MAX_ERATE {
        (q * 10000.0 + 0.5) as u16
    } else {
        MAX_ENCODED_ERATE
    }
}

#[inline]
pub fn decode_quality(e: u16) -> f64 {
    e as f64 / 10000.0
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum OverlapRecord {
    Ovl {
        a_iid: u32,
        b_iid: u32,
        flipped: bool,
        a_hang: i32,
        b_hang: i32,
        orig_erate: u16,
        corr_erate: u16,
    },
    Obt {
        a_iid: u32,
        b_iid: u32,
        fwd: bool,
        a_beg: u32,
        a_end: u32,
        b_beg: u32,
        b_end: u32,
        erate: u16,
    },
    Mer {
        a_iid: u32,
        b_iid: u32,
        fwd: bool,
        palindrome: bool,
        a_pos: u32,
        b_pos: u32,
        compression_length: u8,
        k_count: u8,
        k_len: u8,
    },
}

impl OverlapRecord {
    pub fn ids(&self) -> (u32, u32) {
        match *self {
            OverlapRecord::Ovl { a_iid, b_iid, .. }
            | OverlapRecord::Obt { a_iid, b_iid, .. }
            | OverlapRecord::Mer { a_iid, b_iid, .. } => (a_iid, b_iid),
        }
    }

    pub fn type_code(&self) -> u8 {
        match self {
            OverlapRecord::Ovl { .. } => TYPE_OVL,
            OverlapRecord::Obt { .. } => TYPE_OBT,
            OverlapRecord::Mer { .. } => TYPE_MER,
        }
    }

    /// Mixed hang signs mean one read lies inside the other.
    pub fn is_containment(&self) -> bool {
        match *self {
            OverlapRecord::Ovl { a_hang, b_hang, .. } => {
                (a_hang >= 0 && b_hang <= 0) || (a_hang <= 0 && b_hang >= 0)
            }
            _ => false,
        }
    }
}

impl fmt::Display for OverlapRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            OverlapRecord::Ovl {
                a_iid,
                b_iid,
                flipped,
                a_hang,
                b_hang,
                orig_erate,
                ..
            } => write!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{:.4}",
                a_iid,
                b_iid,
                if flipped { 'I' } else { 'N' },
                a_hang,
                b_hang,
                decode_quality(orig_erate)
            ),
            OverlapRecord::Obt {
                a_iid,
                b_iid,
                fwd,
                a_beg,
                a_end,
                b_beg,
                b_end,
                erate,
            } => write!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
                a_iid,
                b_iid,
                if fwd { 'f' } else { 'r' },
                a_beg,
                a_end,
                b_beg,
                b_end,
                decode_quality(erate)
            ),
            OverlapRecord::Mer {
                a_iid,
                b_iid,
                fwd,
                palindrome,
                a_pos,
                b_pos,
                compression_length,
                k_count,
                k_len,
            } => write!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                a_iid,
                b_iid,
                if fwd { 'f' } else { 'r' },
                palindrome as u8,
                a_pos,
                b_pos,
                compression_length,
                k_count,
                k_len
            ),
        }
    }
}

struct BitWriter {
    word: u128,
    used: u32,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { word: 0, used: 0 }
    }

    fn put(&mut self, value: u64, bits: u32) {
        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.word |= ((value & mask) as u128) << self.used;
        self.used += bits;
    }
}

struct BitReader {
    word: u128,
    used: u32,
}

impl BitReader {
    fn get(&mut self, bits: u32) -> u64 {
        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        let v = (self.word >> self.used) as u64 & mask;
        self.used += bits;
        v
    }

    fn get_signed(&mut self, bits: u32) -> i32 {
        let v = self.get(bits);
        let shift = 64 - bits;
        (((v << shift) as i64) >> shift) as i32
    }
}

/// Field widths for one configured maximum read length.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OvsLayout {
    pub pos_bits: u32,
    pub hang_bits: u32,
}

impl OvsLayout {
    pub fn new(max_read_len: u32) -> OvlResult<Self> {
        let pos_bits = bits_for(max_read_len + 1);
        let layout = OvsLayout {
            pos_bits,
            hang_bits: pos_bits + 1,
        };
        if 2 + 4 * layout.pos_bits + 1 + ERATE_BITS > 128
            || 2 + 2 * layout.hang_bits + 1 + 2 * ERATE_BITS > 128
        {
            return Err(OvlError::Configuration(format!(
                "max read length {} does not fit the overlap record",
                max_read_len
            )));
        }
        Ok(layout)
    }

    fn check_pos(&self, v: u32, what: &str) -> OvlResult<u64> {
        if (v as u64) >> self.pos_bits != 0 {
            return Err(OvlError::AlignmentInvariant(format!(
                "{} {} exceeds {} bits",
                what, v, self.pos_bits
            )));
        }
        Ok(v as u64)
    }

    fn check_hang(&self, v: i32, what: &str) -> OvlResult<u64> {
        let lim = 1i64 << (self.hang_bits - 1);
        if (v as i64) < -lim || (v as i64) >= lim {
            return Err(OvlError::AlignmentInvariant(format!(
                "{} {} exceeds {} bits",
                what, v, self.hang_bits
            )));
        }
        Ok(v as i64 as u64)
    }

    /// Pack the variant payload; the type code sits in the two lowest bits.
    pub fn pack(&self, rec: &OverlapRecord) -> OvlResult<u128> {
        let mut w = BitWriter::new();
        w.put(rec.type_code() as u64, 2);
        match *rec {
            OverlapRecord::Ovl {
                flipped,
                a_hang,
                b_hang,
                orig_erate,
                corr_erate,
                ..
            } => {
                w.put(flipped as u64, 1);
                w.put(self.check_hang(a_hang, "a_hang")?, self.hang_bits);
                w.put(self.check_hang(b_hang, "b_hang")?, self.hang_bits);
                w.put(orig_erate as u64, ERATE_BITS);
                w.put(corr_erate as u64, ERATE_BITS);
            }
            OverlapRecord::Obt {
                fwd,
                a_beg,
                a_end,
                b_beg,
                b_end,
                erate,
                ..
            } => {
                w.put(fwd as u64, 1);
                w.put(self.check_pos(a_beg, "a_beg")?, self.pos_bits);
                w.put(self.check_pos(a_end, "a_end")?, self.pos_bits);
                w.put(self.check_pos(b_beg, "b_beg")?, self.pos_bits);
                w.put(self.check_pos(b_end, "b_end")?, self.pos_bits);
                w.put(erate as u64, ERATE_BITS);
            }
            OverlapRecord::Mer {
                fwd,
                palindrome,
                a_pos,
                b_pos,
                compression_length,
                k_count,
                k_len,
                ..
            } => {
                w.put(fwd as u64, 1);
                w.put(palindrome as u64, 1);
                w.put(self.check_pos(a_pos, "a_pos")?, self.pos_bits);
                w.put(self.check_pos(b_pos, "b_pos")?, self.pos_bits);
                w.put(compression_length as u64, 3);
                w.put(k_count as u64, 8);
                w.put(k_len as u64, 8);
            }
        }
        Ok(w.word)
    }

    pub fn unpack(&self, a_iid: u32, b_iid: u32, word: u128) -> OvlResult<OverlapRecord> {
        let mut r = BitReader { word, used: 0 };
        let rec = match r.get(2) as u8 {
            TYPE_OVL => OverlapRecord::Ovl {
                a_iid,
                b_iid,
                flipped: r.get(1) != 0,
                a_hang: r.get_signed(self.hang_bits),
                b_hang: r.get_signed(self.hang_bits),
                orig_erate: r.get(ERATE_BITS) as u16,
                corr_erate: r.get(ERATE_BITS) as u16,
            },
            TYPE_OBT => OverlapRecord::Obt {
                a_iid,
                b_iid,
                fwd: r.get(1) != 0,
                a_beg: r.get(self.pos_bits) as u32,
                a_end: r.get(self.pos_bits) as u32,
                b_beg: r.get(self.pos_bits) as u32,
                b_end: r.get(self.pos_bits) as u32,
                erate: r.get(ERATE_BITS) as u16,
            },
            TYPE_MER => OverlapRecord::Mer {
                a_iid,
                b_iid,
                fwd: r.get(1) != 0,
                palindrome: r.get(1) != 0,
                a_pos: r.get(self.pos_bits) as u32,
                b_pos: r.get(self.pos_bits) as u32,
                compression_length: r.get(3) as u8,
                k_count: r.get(8) as u8,
                k_len: r.get(8) as u8,
            },
            t => {
                return Err(OvlError::AlignmentInvariant(format!(
                    "unknown overlap record type {}",
                    t
                )))
            }
        };
        Ok(rec)
    }
}

/// Binary record stream with an optional tab separated copy for inspection.
pub struct OverlapWriter<W: Write> {
    out: W,
    text: Option<Box<dyn Write + Send>>,
    layout: OvsLayout,
    pub count: u64,
}

impl<W: Write> OverlapWriter<W> {
    pub fn new(out: W, layout: OvsLayout) -> Self {
        OverlapWriter {
            out,
            text: None,
            layout,
            count: 0,
        }
    }

    pub fn with_text(mut self, text: Option<Box<dyn Write + Send>>) -> Self {
        self.text = text;
        self
    }

    pub fn write(&mut self, rec: &OverlapRecord) -> OvlResult<()> {
        let (a_iid, b_iid) = rec.ids();
        let word = self.layout.pack(rec)?;
        self.out.write_u32::<LittleEndian>(a_iid)?;
        self.out.write_u32::<LittleEndian>(b_iid)?;
        self.out.write_u64::<LittleEndian>(word as u64)?;
        self.out.write_u64::<LittleEndian>((word >> 64) as u64)?;
        if let Some(text) = self.text.as_mut() {
            writeln!(text, "{}", rec)?;
        }
        self.count += 1;
        Ok(())
    }

    pub fn write_all(&mut self, recs: &[OverlapRecord]) -> OvlResult<()> {
        for rec in recs {
            self.write(rec)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> OvlResult<()> {
        self.out.flush()?;
        if let Some(text) = self.text.as_mut() {
            text.flush()?;
        }
        Ok(())
    }
    pub fn into_inner(mut self) -> OvlResult<W> {
        self.flush()?;
        Ok(self.out)
    }
}

pub struct OverlapReader<R: Read> {
    inner: R,
    layout: OvsLayout,
}

impl<R: Read> OverlapReader<R> {
    pub fn new(inner: R, layout: OvsLayout) -> Self {
        OverlapReader { inner, layout }
    }

    pub fn next_record(&mut self) -> Option<OvlResult<OverlapRecord>> {
        let a_iid = match self.inner.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return None,
            Err(e) => return Some(Err(e.into())),
        };
        Some(self.read_rest(a_iid))
    }

    fn read_rest(&mut self, a_iid: u32) -> OvlResult<OverlapRecord> {
        let b_iid = self.inner.read_u32::<LittleEndian>()?;
        let lo = self.inner.read_u64::<LittleEndian>()?;
        let hi = self.inner.read_u64::<LittleEndian>()?;
        self.layout
            .unpack(a_iid, b_iid, (lo as u128) | ((hi as u128) << 64))
    }
}

impl<R: Read> Iterator for OverlapReader<R> {
    type Item = OvlResult<OverlapRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quality_encoding() {
        for i in 0..=4095 {
            let q = i as f64 / 10000.0;
            let e = encode_quality(q);
            assert_abs_diff_eq!(decode_quality(e), q, epsilon = 1e-4);
            assert_eq!(encode_quality(decode_quality(e)), e);
        }
        assert_abs_diff_eq!(decode_quality(encode_quality(0.02)), 0.02, epsilon = 1e-12);
        assert_eq!(encode_quality(0.4095), 4095);
        assert_eq!(encode_quality(0.9), 4095);
        assert_abs_diff_eq!(decode_quality(4095), 0.4095, epsilon = 1e-12);
    }

    #[test]
    fn layout_follows_max_read_len() {
        assert_eq!(
            OvsLayout::new(2048).unwrap(),
            OvsLayout {
                pos_bits: 12,
                hang_bits: 13
            }
        );
        assert_eq!(OvsLayout::new(1 << 15).unwrap().pos_bits, 16);
        assert!(OvsLayout::new(1 << 29).is_err());
    }

    #[test]
    fn records_survive_the_wire() {
        let layout = OvsLayout::new(2048).unwrap();
        let recs = vec![
            OverlapRecord::Ovl {
                a_iid: 1,
                b_iid: 2,
                flipped: false,
                a_hang: 50,
                b_hang: -2048,
                orig_erate: 200,
                corr_erate: 200,
            },
            OverlapRecord::Ovl {
                a_iid: 7,
                b_iid: 4_000_000_000,
                flipped: true,
                a_hang: -3,
                b_hang: 2047,
                orig_erate: 4095,
                corr_erate: 0,
            },
            OverlapRecord::Obt {
                a_iid: 3,
                b_iid: 9,
                fwd: false,
                a_beg: 0,
                a_end: 2048,
                b_beg: 1500,
                b_end: 12,
                erate: 123,
            },
            OverlapRecord::Mer {
                a_iid: 5,
                b_iid: 6,
                fwd: true,
                palindrome: true,
                a_pos: 17,
                b_pos: 1999,
                compression_length: 7,
                k_count: 255,
                k_len: 22,
            },
        ];
        let mut buf = Vec::<u8>::new();
        {
            let mut writer = OverlapWriter::new(&mut buf, layout);
            writer.write_all(&recs).unwrap();
            writer.flush().unwrap();
            assert_eq!(writer.count, 4);
        }
        assert_eq!(buf.len(), 4 * RECORD_BYTES);
        let back: Vec<OverlapRecord> = OverlapReader::new(&buf[..], layout)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(back, recs);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let layout = OvsLayout::new(2048).unwrap();
        let rec = OverlapRecord::Ovl {
            a_iid: 1,
            b_iid: 2,
            flipped: false,
            a_hang: 5000,
            b_hang: 0,
            orig_erate: 0,
            corr_erate: 0,
        };
        assert!(matches!(
            layout.pack(&rec),
            Err(OvlError::AlignmentInvariant(_))
        ));
    }

    #[test]
    fn text_lines() {
        let rec = OverlapRecord::Ovl {
            a_iid: 1,
            b_iid: 2,
            flipped: true,
            a_hang: 50,
            b_hang: -10,
            orig_erate: 200,
            corr_erate: 200,
        };
        assert_eq!(format!("{}", rec), "1\t2\tI\t50\t-10\t0.0200");
        assert!(rec.is_containment());
    }
}
