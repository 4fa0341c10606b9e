// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// brute force dynamic programming alignment for short linker overlaps

use super::config::MAX_ERROR_RATE;
use super::seqcodec::{complement, normalize, reverse_complement, DONT_KNOW_CHAR};

pub const MATCH_SCORE: i32 = 3;
pub const MISMATCH_SCORE: i32 = -4;
pub const GAP_SCORE: i32 = -6;
pub const SLOP: i32 = 10;

const DP_ZERO: i32 = 0;
const DP_NEGT: i32 = -(1 << 28);
const DP_FLOOR: i32 = -(1 << 29);

pub const GAP_CHAR: u8 = b'-';

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Action {
    Stop,
    Match,
    GapA,
    GapB,
}

#[derive(Debug, Copy, Clone)]
struct Cell {
    score: i32,
    action: Action,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            score: DP_NEGT,
            action: Action::Stop,
        }
    }
}

struct Matrix {
    cells: Vec<Cell>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    fn new(len_a: usize, len_b: usize) -> Self {
        let rows = len_a + 2;
        let cols = len_b + 2;
        Matrix {
            cells: vec![Cell::default(); rows * cols],
            rows,
            cols,
        }
    }

    #[inline(always)]
    fn get(&self, i: i32, j: i32) -> Cell {
        self.cells[i as usize * self.cols + j as usize]
    }

    #[inline(always)]
    fn put(&mut self, i: i32, j: i32, score: i32, action: Action) {
        self.cells[i as usize * self.cols + j as usize] = Cell { score, action };
    }

    // border cells may fall outside the matrix near the corners
    fn set(&mut self, i: i32, j: i32, score: i32) {
        if i >= 0 && j >= 0 && (i as usize) < self.rows && (j as usize) < self.cols {
            self.put(i, j, score, Action::Stop);
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkerAlignment {
    pub score: i32,
    pub matches: u32,
    pub beg_i: i32,
    pub beg_j: i32,
    pub end_i: i32,
    pub end_j: i32,
    pub len_a: i32,
    pub len_b: i32,
    pub align_a: Vec<u8>,
    pub align_b: Vec<u8>,
}

impl LinkerAlignment {
    pub fn align_len(&self) -> usize {
        self.align_a.len()
    }
}

/// Align `a` against `b` by full dynamic programming.
///
/// With `end_to_end` off this is a local alignment. With `end_to_end` on and
/// hangs equal to the read lengths the alignment must start at the first
/// base of `b`; otherwise `a_hang`/`b_hang` give the expected overhangs and
/// the alignment may start within `SLOP` of the expected corner.
/// `allow_ns` scores a wildcard against anything as a match.
pub fn align_linker(
    a: &[u8],
    b: &[u8],
    end_to_end: bool,
    allow_ns: bool,
    a_hang: i32,
    b_hang: i32,
) -> Option<LinkerAlignment> {
    let a = normalize(a);
    let b = normalize(b);
    let len_a = a.len() as i32;
    let len_b = b.len() as i32;
    let mut m = Matrix::new(a.len(), b.len());

    let (mut ibgn, mut iend, mut jbgn, mut jend) = (1, len_a, 1, len_b);

    if !end_to_end {
        for i in 0..=len_a {
            m.set(i, 0, DP_ZERO);
        }
        for j in 0..=len_b {
            m.set(0, j, DP_ZERO);
        }
    } else if a_hang == len_a && b_hang == len_b {
        // free start anywhere along `a`, but only at the first base of `b`
        for i in 0..=len_a {
            m.set(i, 0, DP_ZERO);
        }
        for j in 1..=len_b {
            m.set(0, j, DP_NEGT);
        }
    } else {
        ibgn = if a_hang < 0 { 1 } else { a_hang + 1 };
        iend = if b_hang < 0 { len_a + b_hang } else { len_a };
        jbgn = if a_hang < 0 { -a_hang + 1 } else { 1 };
        jend = if b_hang < 0 { len_b } else { len_b - b_hang };

        if ibgn < 0 || iend < 0 || jbgn < 0 || jend < 0 || iend < ibgn || jend < jbgn {
            log::warn!(
                "linker box empty: bgn {},{} end {},{} lens {},{} hangs {},{}",
                ibgn,
                jbgn,
                iend,
                jend,
                len_a,
                len_b,
                a_hang,
                b_hang
            );
            return None;
        }

        ibgn = std::cmp::max(1, ibgn - SLOP);
        jbgn = std::cmp::max(1, jbgn - SLOP);
        iend = len_a;
        jend = len_b;

        for i in ibgn - 1..=iend + 1 {
            m.set(i, jbgn - 1, DP_NEGT);
        }
        for j in jbgn - 1..=jend + 1 {
            m.set(ibgn - 1, j, DP_NEGT);
        }

        assert!(ibgn == 1 || jbgn == 1);

        // allowed starting cells wrap around the origin
        if jbgn == 1 {
            let mut slop = 2 * SLOP + 1;
            let mut i = ibgn + SLOP;
            let mut j = jbgn - 1;
            while i >= ibgn - 1 && slop > 0 {
                m.set(i, j, DP_ZERO);
                i -= 1;
                slop -= 1;
            }
            if i == ibgn - 1 && slop >= 0 {
                slop += 2;
            }
            while slop > 0 {
                m.set(i, j, DP_ZERO);
                j += 1;
                slop -= 1;
            }
        }
        if ibgn == 1 {
            let mut slop = 2 * SLOP + 1;
            let mut i = ibgn - 1;
            let mut j = jbgn + SLOP;
            while j >= jbgn - 1 && slop > 0 {
                m.set(i, j, DP_ZERO);
                j -= 1;
                slop -= 1;
            }
            if j == jbgn - 1 && slop >= 0 {
                slop += 2;
            }
            while slop > 0 {
                m.set(i, j, DP_ZERO);
                i += 1;
                slop -= 1;
            }
        }
    }

    let mut score_max = DP_FLOOR;
    let (mut end_i, mut end_j) = (0, 0);

    for i in ibgn..=iend {
        for j in jbgn..=jend {
            let ca = a[i as usize - 1];
            let cb = b[j as usize - 1];
            let mut ul = m.get(i - 1, j - 1).score + if ca == cb { MATCH_SCORE } else { MISMATCH_SCORE };
            let lf = m.get(i - 1, j).score + GAP_SCORE;
            let up = m.get(i, j - 1).score + GAP_SCORE;
            if allow_ns && (ca == DONT_KNOW_CHAR || cb == DONT_KNOW_CHAR) {
                ul = m.get(i - 1, j - 1).score + MATCH_SCORE;
            }

            let (mut score, mut action) = if end_to_end {
                (DP_FLOOR, Action::Match)
            } else {
                (DP_ZERO, Action::Stop)
            };
            if score < ul {
                score = ul;
                action = Action::Match;
            }
            if score < lf {
                score = lf;
                action = Action::GapB;
            }
            if score < up {
                score = up;
                action = Action::GapA;
            }
            m.put(i, j, score, action);

            if score_max < score {
                score_max = score;
                end_i = i;
                end_j = j;
            }
        }
    }

    if end_to_end {
        score_max = DP_FLOOR;
        end_i = 0;
        end_j = 0;
        for i in ibgn..=iend {
            if score_max < m.get(i, jend).score {
                score_max = m.get(i, jend).score;
                end_i = i;
                end_j = jend;
            }
        }
        for j in jbgn..=jend {
            if score_max < m.get(iend, j).score {
                score_max = m.get(iend, j).score;
                end_i = iend;
                end_j = j;
            }
        }
    }

    let mut align_a = Vec::<u8>::with_capacity(a.len() + b.len());
    let mut align_b = Vec::<u8>::with_capacity(a.len() + b.len());
    let mut matches = 0;
    let (mut cur_i, mut cur_j) = (end_i, end_j);
    loop {
        match m.get(cur_i, cur_j).action {
            Action::Stop => break,
            Action::Match => {
                let ca = a[cur_i as usize - 1];
                let cb = b[cur_j as usize - 1];
                if ca == cb {
                    matches += 1;
                }
                align_a.push(ca);
                align_b.push(cb);
                cur_i -= 1;
                cur_j -= 1;
            }
            Action::GapA => {
                align_a.push(GAP_CHAR);
                align_b.push(b[cur_j as usize - 1]);
                cur_j -= 1;
            }
            Action::GapB => {
                align_a.push(a[cur_i as usize - 1]);
                align_b.push(GAP_CHAR);
                cur_i -= 1;
            }
        }
    }
    align_a.reverse();
    align_b.reverse();

    Some(LinkerAlignment {
        score: score_max,
        matches,
        beg_i: cur_i,
        beg_j: cur_j,
        end_i,
        end_j,
        len_a,
        len_b,
        align_a,
        align_b,
    })
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkerPolicy {
    Strict,
    AllowAmbiguous,
}

impl LinkerPolicy {
    fn allow_ns(&self) -> bool {
        *self == LinkerPolicy::AllowAmbiguous
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkerOverlap {
    pub begpos: i32,
    pub endpos: i32,
    pub length: usize,
    pub diffs: usize,
    pub comp: bool,
    pub policy: LinkerPolicy,
    /// `-(a_pos + 1)` for a gap in `a`, `b_pos + 1` for a gap in `b`
    pub trace: Vec<i32>,
}

fn reverse_complement_aligned(s: &mut Vec<u8>) {
    s.reverse();
    s.iter_mut().for_each(|c| {
        if *c != GAP_CHAR {
            *c = complement(*c)
        }
    });
}

/// End-to-end overlap of `a` and `b` (reverse complemented when `opposite`)
/// at least `min_len` columns long. Retried once with wildcards scoring as
/// matches when the first alignment does not reach the start of either
/// read, is too short or exceeds `erate`.
pub fn optimal_overlap(
    a: &[u8],
    b: &[u8],
    a_hang: i32,
    b_hang: i32,
    opposite: bool,
    erate: f64,
    min_len: usize,
) -> Option<LinkerOverlap> {
    let erate = erate.min(MAX_ERROR_RATE);
    let b = if opposite {
        reverse_complement(&normalize(b))
    } else {
        normalize(b)
    };

    for &policy in [LinkerPolicy::Strict, LinkerPolicy::AllowAmbiguous].iter() {
        let mut al = align_linker(a, &b, true, policy.allow_ns(), a_hang, b_hang)?;
        if al.align_len() == 0 {
            return None;
        }
        if opposite {
            reverse_complement_aligned(&mut al.align_a);
            reverse_complement_aligned(&mut al.align_b);
            let x = al.beg_j;
            al.beg_j = al.len_b - al.end_j;
            al.end_j = al.len_b - x;
        }

        if al.beg_j != 0 && al.beg_i != 0 {
            log::debug!("linker alignment does not reach a read start ({:?})", policy);
            continue;
        }

        let begpos = if al.beg_i > 0 { al.beg_i } else { -al.beg_j };
        let endpos = if al.len_b - al.end_j > 0 {
            al.len_b - al.end_j
        } else {
            -(al.len_a - al.end_i)
        };

        let mut trace = Vec::<i32>::new();
        let mut diffs = 0;
        let (mut ap, mut bp) = (al.beg_i, al.beg_j);
        for (&ca, &cb) in al.align_a.iter().zip(al.align_b.iter()) {
            if ca == GAP_CHAR {
                trace.push(-(ap + 1));
                ap -= 1;
            }
            if cb == GAP_CHAR {
                trace.push(bp + 1);
                bp -= 1;
            }
            if ca != cb && ca != DONT_KNOW_CHAR && cb != DONT_KNOW_CHAR {
                diffs += 1;
            }
            ap += 1;
            bp += 1;
        }

        let length = al.align_len();
        if length < min_len {
            log::debug!("linker alignment too short: {} < {} ({:?})", length, min_len, policy);
            continue;
        }
        if diffs as f64 / length as f64 <= erate {
            return Some(LinkerOverlap {
                begpos,
                endpos,
                length,
                diffs,
                comp: opposite,
                policy,
                trace,
            });
        }
        log::debug!(
            "linker alignment error rate {}/{} over {} ({:?})",
            diffs,
            length,
            erate,
            policy
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"acgt"[rng.gen_range(0, 4)]).collect()
    }

    #[test]
    fn identical_reads_align_end_to_end() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_seq(&mut rng, 80);
        let al = align_linker(&a, &a, true, false, 80, 80).unwrap();
        assert_eq!((al.beg_i, al.beg_j, al.end_i, al.end_j), (0, 0, 80, 80));
        assert_eq!(al.matches, 80);
        assert_eq!(al.score, 80 * MATCH_SCORE);

        let o = optimal_overlap(&a, &a, 80, 80, false, 0.06, 40).unwrap();
        assert_eq!((o.begpos, o.endpos, o.diffs, o.length), (0, 0, 0, 80));
        assert!(o.trace.is_empty());
        assert_eq!(o.policy, LinkerPolicy::Strict);
    }

    #[test]
    fn dovetail_positions() {
        let mut rng = StdRng::seed_from_u64(11);
        let x = random_seq(&mut rng, 130);
        let a = x[..100].to_vec();
        let b = x[30..].to_vec();
        let o = optimal_overlap(&a, &b, 100, 100, false, 0.06, 40).unwrap();
        assert_eq!((o.begpos, o.endpos), (30, 30));
        assert_eq!(o.length, 70);
        assert_eq!(o.diffs, 0);

    }

    #[test]
    fn contained_opposite_read() {
        let mut rng = StdRng::seed_from_u64(29);
        let a = random_seq(&mut rng, 100);
        let b = a[20..80].to_vec();
        let o = optimal_overlap(&a, &b, 100, 60, false, 0.06, 40).unwrap();
        assert_eq!((o.begpos, o.endpos), (20, -20));

        let o = optimal_overlap(&a, &reverse_complement(&b), 100, 60, true, 0.06, 40).unwrap();
        assert!(o.comp);
        assert_eq!((o.begpos, o.endpos), (20, -20));
        assert_eq!((o.diffs, o.length), (0, 60));
    }

    #[test]
    fn gap_in_a_is_traced() {
        let mut rng = StdRng::seed_from_u64(13);
        let a = random_seq(&mut rng, 100);
        let extra = *b"acgt"
            .iter()
            .find(|&&c| c != a[49] && c != a[50])
            .unwrap();
        let mut b = a[..50].to_vec();
        b.push(extra);
        b.extend_from_slice(&a[50..]);
        let o = optimal_overlap(&a, &b, 100, 101, false, 0.06, 40).unwrap();
        assert_eq!(o.trace, vec![-51]);
        assert_eq!(o.diffs, 1);
        assert_eq!(o.length, 101);
        assert_eq!((o.begpos, o.endpos), (0, 0));
    }

    #[test]
    fn wildcards_score_as_matches_when_allowed() {
        let mut rng = StdRng::seed_from_u64(17);
        let a = random_seq(&mut rng, 60);
        let mut b = a.clone();
        b[30] = b'n';
        let strict = align_linker(&a, &b, false, false, 0, 0).unwrap();
        let relaxed = align_linker(&a, &b, false, true, 0, 0).unwrap();
        assert_eq!(strict.score, 59 * MATCH_SCORE + MISMATCH_SCORE);
        assert_eq!(relaxed.score, 60 * MATCH_SCORE);
        assert_eq!(relaxed.matches, 59);

        // the wildcard never counts as a difference
        let o = optimal_overlap(&a, &b, 60, 60, false, 0.0, 40).unwrap();
        assert_eq!(o.diffs, 0);
    }

    #[test]
    fn unrelated_reads_have_no_overlap() {
        let mut rng = StdRng::seed_from_u64(19);
        let a = random_seq(&mut rng, 100);
        let b = random_seq(&mut rng, 100);
        assert!(optimal_overlap(&a, &b, 100, 100, false, 0.06, 40).is_none());
    }

    #[test]
    fn short_end_overlaps_are_rejected() {
        let mut rng = StdRng::seed_from_u64(41);
        let x = random_seq(&mut rng, 190);
        let a = x[..100].to_vec();
        let b = x[90..].to_vec();
        // ten shared bases: an exact end overlap, but shorter than asked for
        let o = optimal_overlap(&a, &b, 100, 100, false, 0.06, 10).unwrap();
        assert_eq!((o.begpos, o.endpos, o.length, o.diffs), (90, 90, 10, 0));
        assert!(optimal_overlap(&a, &b, 100, 100, false, 0.06, 40).is_none());
    }

    #[test]
    fn hang_constrained_box() {
        let mut rng = StdRng::seed_from_u64(23);
        let x = random_seq(&mut rng, 150);
        let a = x[..120].to_vec();
        let b = x[20..].to_vec();
        let o = optimal_overlap(&a, &b, 20, 30, false, 0.06, 40).unwrap();
        assert_eq!((o.begpos, o.endpos), (20, 30));
        assert_eq!(o.diffs, 0);
        assert!(align_linker(&a, &b, true, false, 200, 0).is_none());
    }
}
