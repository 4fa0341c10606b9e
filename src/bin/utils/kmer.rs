// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// k-mer keys: the first base sits in the two lowest bits

use super::seqcodec::{base_code, is_bad_base, pack_base, unpack_base};

#[inline(always)]
pub fn kmer_mask(k: u32) -> u64 {
    if k >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    }
}

pub fn encode_kmer(seq: &[u8], pos: usize, k: u32) -> Option<u64> {
    let k = k as usize;
    if pos + k > seq.len() {
        return None;
    }
    let mut key = 0u64;
    for (j, &c) in seq[pos..pos + k].iter().enumerate() {
        key |= (pack_base(c)? as u64) << (2 * j);
    }
    Some(key)
}

pub fn decode_kmer(key: u64, k: u32) -> Vec<u8> {
    (0..k).map(|j| unpack_base(((key >> (2 * j)) & 0x03) as u8)).collect()
}

pub fn reverse_complement_key(key: u64, k: u32) -> u64 {
    // reverse the 2-bit groups of the whole word, then drop the unused high groups
    let mut x = key;
    x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
    x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
    x = x.swap_bytes();
    let x = if k >= 32 { x } else { x >> (2 * (32 - k)) };
    !x & kmer_mask(k)
}

#[inline(always)]
pub fn canonical_key(key: u64, k: u32) -> u64 {
    std::cmp::min(key, reverse_complement_key(key, k))
}

pub fn canonical_kmer(seq: &[u8], pos: usize, k: u32) -> Option<u64> {
    encode_kmer(seq, pos, k).map(|key| canonical_key(key, k))
}

/// Rolling window over a sequence yielding `(offset, key)` for every window
/// free of ambiguous bases.
pub struct KmerIter<'a> {
    seq: &'a [u8],
    k: u32,
    pos: usize,
    key: u64,
    bad: u64,
}

impl<'a> KmerIter<'a> {
    pub fn new(seq: &'a [u8], k: u32) -> Self {
        KmerIter {
            seq,
            k,
            pos: 0,
            key: 0,
            bad: 0,
        }
    }
}

impl<'a> Iterator for KmerIter<'a> {
    type Item = (usize, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.k as usize;
        while self.pos < self.seq.len() {
            let c = self.seq[self.pos];
            self.key >>= 2;
            self.key |= (base_code(c) as u64) << (2 * (k - 1));
            self.bad >>= 1;
            self.bad |= (is_bad_base(c) as u64) << (k - 1);
            self.pos += 1;
            if self.pos >= k && self.bad == 0 {
                return Some((self.pos - k, self.key));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::seqcodec::reverse_complement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"acgt"[rng.gen_range(0, 4)]).collect()
    }

    #[test]
    fn encode_decode() {
        let mut rng = StdRng::seed_from_u64(7);
        for k in 8..=31u32 {
            for _ in 0..20 {
                let s = random_seq(&mut rng, k as usize);
                let key = encode_kmer(&s, 0, k).unwrap();
                assert_eq!(decode_kmer(key, k), s);
            }
        }
        assert_eq!(encode_kmer(b"AC", 0, 2), Some(0b0100));
        assert_eq!(encode_kmer(b"acnt", 0, 4), None);
        assert_eq!(encode_kmer(b"acg", 1, 4), None);
    }

    #[test]
    fn reverse_complement_keys() {
        let mut rng = StdRng::seed_from_u64(11);
        for &k in &[1u32, 8, 16, 21, 31, 32] {
            let s = random_seq(&mut rng, k as usize);
            let rc = reverse_complement(&s);
            let key = encode_kmer(&s, 0, k).unwrap();
            assert_eq!(reverse_complement_key(key, k), encode_kmer(&rc, 0, k).unwrap());
            assert_eq!(canonical_kmer(&s, 0, k), canonical_kmer(&rc, 0, k));
        }
    }

    #[test]
    fn rolling_matches_direct() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = random_seq(&mut rng, 120);
        s[40] = b'n';
        let k = 12;
        let windows: Vec<(usize, u64)> = KmerIter::new(&s, k).collect();
        let expected: Vec<(usize, u64)> = (0..=s.len() - k as usize)
            .filter_map(|p| encode_kmer(&s, p, k).map(|key| (p, key)))
            .collect();
        assert_eq!(windows, expected);
        assert!(windows.iter().all(|&(p, _)| p + 12 <= 40 || p > 40));
    }
}
