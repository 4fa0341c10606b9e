// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// 2-bit base codes, ambiguity handling and reverse complements

/// Wildcard base; matches anything during alignment, never indexed.
pub const DONT_KNOW_CHAR: u8 = b'n';

const BAD_CODE: u8 = 0xFF;

const fn build_code_table() -> [u8; 256] {
    let mut t = [BAD_CODE; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t
}

static CODE_TABLE: [u8; 256] = build_code_table();
static CODE_TO_BASE: [u8; 4] = [b'a', b'c', b'g', b't'];

#[inline(always)]
pub fn pack_base(c: u8) -> Option<u8> {
    match CODE_TABLE[c as usize] {
        BAD_CODE => None,
        code => Some(code),
    }
}

/// 2-bit code with non-ACGT mapped to 0; use together with `is_bad_base`
#[inline(always)]
pub fn base_code(c: u8) -> u8 {
    CODE_TABLE[c as usize] & 0x03
}

#[inline(always)]
pub fn is_bad_base(c: u8) -> bool {
    CODE_TABLE[c as usize] == BAD_CODE
}

#[inline(always)]
pub fn unpack_base(code: u8) -> u8 {
    CODE_TO_BASE[(code & 0x03) as usize]
}

#[inline(always)]
pub fn complement(c: u8) -> u8 {
    match c {
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => DONT_KNOW_CHAR,
    }
}

/// lower-case working copy; anything outside acgt becomes the wildcard
pub fn normalize(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&c| match c {
            b'A' | b'a' => b'a',
            b'C' | b'c' => b'c',
            b'G' | b'g' => b'g',
            b'T' | b't' => b't',
            _ => DONT_KNOW_CHAR,
        })
        .collect()
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&c| complement(c)).collect()
}

pub fn reverse_complement_in_place(seq: &mut [u8]) {
    seq.reverse();
    seq.iter_mut().for_each(|c| *c = complement(*c));
}

#[inline(always)]
pub fn bases_match(a: u8, b: u8) -> bool {
    a == b || a == DONT_KNOW_CHAR || b == DONT_KNOW_CHAR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing() {
        assert_eq!(pack_base(b'A'), Some(0));
        assert_eq!(pack_base(b'c'), Some(1));
        assert_eq!(pack_base(b'G'), Some(2));
        assert_eq!(pack_base(b't'), Some(3));
        assert_eq!(pack_base(b'N'), None);
        assert_eq!(pack_base(b'-'), None);
        assert!(is_bad_base(b'n'));
        assert!(!is_bad_base(b'T'));
        for code in 0..4u8 {
            assert_eq!(pack_base(unpack_base(code)), Some(code));
        }
    }

    #[test]
    fn revcomp() {
        assert_eq!(reverse_complement(b"aacgtn"), b"nacgtt".to_vec());
        let mut s = b"ACCGTA".to_vec();
        reverse_complement_in_place(&mut s);
        assert_eq!(s, b"TACGGT".to_vec());
        reverse_complement_in_place(&mut s);
        assert_eq!(s, b"ACCGTA".to_vec());
    }

    #[test]
    fn normalizing() {
        assert_eq!(normalize(b"ACgtRNx"), b"acgtnnn".to_vec());
        assert!(bases_match(b'n', b'a'));
        assert!(bases_match(b'g', b'g'));
        assert!(!bases_match(b'g', b'c'));
    }
}
