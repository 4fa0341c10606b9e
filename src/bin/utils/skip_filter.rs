// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// approximate membership of high frequency k-mers to keep out of the index

use super::error::{OvlError, OvlResult};
use byteorder::{ByteOrder, LittleEndian};
use memmap::{Mmap, MmapOptions};
use std::fs::File;
use std::mem::size_of;
use structview::{u32_le, u64_le, View};

pub const FILTER_MAGIC: u32 = 0x4653_4F57; // "WOSF"
pub const FILTER_VERSION: u32 = 1;

/// Lookups are by canonical key; no false negatives.
pub trait KmerFilter: Send + Sync {
    fn may_contain(&self, canonical: u64) -> bool;
    fn k(&self) -> u32;
}

#[derive(Clone, Copy, View)]
#[repr(C)]
pub struct FilterHeader {
    pub magic: u32_le,
    pub version: u32_le,
    pub k: u32_le,
    pub nhash: u32_le,
    pub nbits: u64_le,
}

#[inline(always)]
fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// bit positions probed for `key` in a filter of `nbits` bits
pub fn bit_positions(key: u64, nhash: u32, nbits: u64) -> impl Iterator<Item = u64> {
    let h1 = mix64(key);
    let h2 = mix64(key ^ 0x9E37_79B9_7F4A_7C15) | 1;
    (0..nhash as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % nbits)
}

pub struct BloomSkipFilter {
    path: String,
    k: u32,
    nhash: u32,
    nbits: u64,
    mmap: Mmap,
}

impl BloomSkipFilter {
    pub fn load(path: &str) -> OvlResult<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let hs = size_of::<FilterHeader>();
        if mmap.len() < hs {
            return Err(OvlError::MalformedFilter(format!(
                "{}: file too short for header",
                path
            )));
        }
        let header = FilterHeader::view(&mmap[0..hs])
            .map_err(|e| OvlError::MalformedFilter(format!("{}: {:?}", path, e)))?;
        if header.magic.to_int() != FILTER_MAGIC || header.version.to_int() != FILTER_VERSION {
            return Err(OvlError::MalformedFilter(format!(
                "{}: bad magic or version",
                path
            )));
        }
        let k = header.k.to_int();
        let nhash = header.nhash.to_int();
        let nbits = header.nbits.to_int();
        if nbits == 0 || nhash == 0 {
            return Err(OvlError::MalformedFilter(format!("{}: empty filter", path)));
        }
        let nwords = ((nbits + 63) / 64) as usize;
        if mmap.len() < hs + nwords * 8 {
            return Err(OvlError::MalformedFilter(format!(
                "{}: truncated bit array ({} < {} bytes)",
                path,
                mmap.len(),
                hs + nwords * 8
            )));
        }
        log::info!(
            "skip filter {}: k = {}, {} hash functions, {} bits",
            path,
            k,
            nhash,
            nbits
        );
        Ok(BloomSkipFilter {
            path: path.to_string(),
            k,
            nhash,
            nbits,
            mmap,
        })
    }

    #[inline(always)]
    fn bit(&self, pos: u64) -> bool {
        let s = size_of::<FilterHeader>() + (pos / 64) as usize * 8;
        let word = LittleEndian::read_u64(&self.mmap[s..s + 8]);
        word & (1u64 << (pos % 64)) != 0
    }
}

impl KmerFilter for BloomSkipFilter {
    fn may_contain(&self, canonical: u64) -> bool {
        bit_positions(canonical, self.nhash, self.nbits).all(|p| self.bit(p))
    }

    fn k(&self) -> u32 {
        self.k
    }
}
