// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// extend an exact seed match to both ends with a banded greedy edit distance

use super::config::Parameters;
use super::seqcodec::bases_match;

// z-score above which the normal approximation says "not yet"
const NORMAL_DISTRIB_THOLD: f64 = 3.62;

/// Smallest `n >= start` such that P[>= e errors in n trials] > `limit`
/// at per-base error probability `p`; `max_len` when no such n exists.
pub fn binomial_bound(e: i32, p: f64, start: i32, limit: f64, max_len: i32) -> i32 {
    let q = 1.0 - p;
    let start = std::cmp::max(start, e);

    for n in start..max_len {
        if n <= 35 {
            let mut sum = 0.0;
            let mut bin_coeff = 1.0;
            let mut ct = 0;
            let mut p_power = 1.0;
            let mut q_power = q.powi(n);
            let mut k = 0;
            while k < e && 1.0 - sum > limit {
                sum += bin_coeff * p_power * q_power;
                bin_coeff *= (n - ct) as f64;
                ct += 1;
                bin_coeff /= ct as f64;
                p_power *= p;
                q_power /= q;
                k += 1;
            }
            if 1.0 - sum > limit {
                return n;
            }
        } else {
            let np = n as f64 * p;
            let z = (e as f64 - 0.5 - np) / (np * q).sqrt();
            if z <= NORMAL_DISTRIB_THOLD {
                return n;
            }
            let mut sum = 0.0;
            let mut mu_power = 1.0;
            let mut factorial = 1.0;
            let poisson_coeff = (-np).exp();
            for k in 0..e {
                sum += mu_power * poisson_coeff / factorial;
                mu_power *= np;
                factorial *= (k + 1) as f64;
            }
            if 1.0 - sum > limit {
                return n;
            }
        }
    }
    max_len
}

/// Per-run tables shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct AlignerTables {
    pub edit_match_limit: Vec<i32>,
    pub error_bound: Vec<i32>,
    pub branch_match_value: f64,
    pub min_branch_end_dist: i32,
    pub min_branch_tail_slope: f64,
    pub partial: bool,
}

impl AlignerTables {
    pub fn new(params: &Parameters) -> Self {
        let max_errors = params.max_errors();
        let max_len = params.max_read_len as i32;
        let eff = params.errors_for_free as usize;

        let mut edit_match_limit = vec![0i32; max_errors];
        let mut start = 1;
        for e in eff + 1..max_errors {
            start = binomial_bound(
                (e - eff) as i32,
                params.error_rate,
                start,
                params.edit_dist_prob_bound,
                max_len,
            );
            edit_match_limit[e] = start - 1;
            assert!(edit_match_limit[e] >= edit_match_limit[e - 1]);
        }

        let error_bound = (0..=params.max_read_len as usize)
            .map(|i| (i as f64 * params.error_rate + 1e-13) as i32)
            .collect();

        AlignerTables {
            edit_match_limit,
            error_bound,
            branch_match_value: params.branch_match_value,
            min_branch_end_dist: params.min_branch_end_dist as i32,
            min_branch_tail_slope: params.min_branch_tail_slope,
            partial: params.partial_overlaps,
        }
    }

    #[inline(always)]
    pub fn error_bound(&self, len: usize) -> i32 {
        self.error_bound[std::cmp::min(len, self.error_bound.len() - 1)]
    }

    pub fn max_errors(&self) -> usize {
        self.edit_match_limit.len()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlignmentKind {
    NoOverlap,
    LeftBranch,
    RightBranch,
    Dovetail,
}

/// Inclusive coordinates on both strings; `delta` is the indel script,
/// positive entries consume an extra base of the first string.
#[derive(Debug, Clone)]
pub struct Extension {
    pub kind: AlignmentKind,
    pub s_lo: i32,
    pub s_hi: i32,
    pub t_lo: i32,
    pub t_hi: i32,
    pub errors: i32,
    pub delta: Vec<i32>,
}

// where one greedy walk stopped
struct WalkEnd {
    e: i32,
    d: i32,
    a_end: i32,
    match_to_end: bool,
}

pub struct BandedAligner<'a> {
    tables: &'a AlignerTables,
    // row e covers diagonals -(e+2)..=(e+2)
    edit: Vec<Vec<i32>>,
    left_delta: Vec<i32>,
    right_delta: Vec<i32>,
}

impl<'a> BandedAligner<'a> {
    pub fn new(tables: &'a AlignerTables) -> Self {
        BandedAligner {
            tables,
            edit: Vec::<Vec<i32>>::with_capacity(tables.max_errors() + 1),
            left_delta: Vec::<i32>::with_capacity(tables.max_errors()),
            right_delta: Vec::<i32>::with_capacity(tables.max_errors()),
        }
    }

    pub fn tables(&self) -> &'a AlignerTables {
        self.tables
    }

    #[inline(always)]
    fn get(&self, e: i32, d: i32) -> i32 {
        self.edit[e as usize][(d + e + 2) as usize]
    }

    #[inline(always)]
    fn set(&mut self, e: i32, d: i32, v: i32) {
        self.edit[e as usize][(d + e + 2) as usize] = v;
    }

    fn reserve_rows(&mut self, error_limit: i32) {
        while self.edit.len() <= error_limit as usize {
            let e = self.edit.len();
            self.edit.push(vec![0; 2 * e + 5]);
        }
    }

    /// Greedy O(ND) walk matching all of `a` (length m) against a prefix of
    /// `t` (length n), characters fetched through `ac`/`tc`.
    fn walk<FA, FT>(
        &mut self,
        m: i32,
        n: i32,
        ac: FA,
        tc: FT,
        error_limit: i32,
        force_mismatch: bool,
    ) -> WalkEnd
    where
        FA: Fn(i32) -> u8,
        FT: Fn(i32) -> u8,
    {
        assert!(m <= n);
        let bmv = self.tables.branch_match_value;
        let min_end = self.tables.min_branch_end_dist;
        let min_slope = self.tables.min_branch_tail_slope;
        let partial = self.tables.partial;
        let error_limit = std::cmp::min(error_limit, self.tables.max_errors() as i32 - 1);
        self.reserve_rows(error_limit);

        let mut row = 0;
        while row < m && bases_match(ac(row), tc(row)) {
            row += 1;
        }
        self.set(0, 0, row);
        if row == m {
            return WalkEnd {
                e: 0,
                d: 0,
                a_end: m,
                match_to_end: true,
            };
        }

        let (mut best_d, mut best_e, mut longest) = (0, 0, 0);
        let (mut max_score, mut max_score_len, mut max_score_d, mut max_score_e) = (0.0, 0, 0, 0);
        let (mut left, mut right) = (0i32, 0i32);

        for e in 1..=error_limit {
            left = std::cmp::max(left - 1, -e);
            right = std::cmp::min(right + 1, e);
            self.set(e - 1, left, -2);
            self.set(e - 1, left - 1, -2);
            self.set(e - 1, right, -2);
            self.set(e - 1, right + 1, -2);

            for d in left..=right {
                let mut row = 1 + self.get(e - 1, d);
                row = std::cmp::max(row, self.get(e - 1, d - 1));
                row = std::cmp::max(row, 1 + self.get(e - 1, d + 1));
                while row < m && row + d < n && bases_match(ac(row), tc(row + d)) {
                    row += 1;
                }
                self.set(e, d, row);

                if row == m || row + d == n {
                    // errors bunched up at the end look like a branch point
                    let score = row as f64 * bmv - e as f64;
                    let tail_len = row - max_score_len;
                    if (partial && score < max_score)
                        || (e > min_end / 2
                            && tail_len >= min_end
                            && (max_score - score) / tail_len as f64 >= min_slope)
                    {
                        return WalkEnd {
                            e: max_score_e,
                            d: max_score_d,
                            a_end: max_score_len,
                            match_to_end: false,
                        };
                    }

                    let mut d = d;
                    // prefer a final mismatch over a final insertion
                    if force_mismatch
                        && row == m
                        && 1 + self.get(e - 1, d + 1) == self.get(e, d)
                        && d < right
                    {
                        d += 1;
                        let v = self.get(e, d - 1);
                        self.set(e, d, v);
                    }
                    return WalkEnd {
                        e,
                        d,
                        a_end: row,
                        match_to_end: true,
                    };
                }
            }

            let limit = self.tables.edit_match_limit[e as usize];
            while left <= right && left < 0 && self.get(e, left) < limit {
                left += 1;
            }
            if left >= 0 {
                while left <= right && self.get(e, left) + left < limit {
                    left += 1;
                }
            }
            if left > right {
                break;
            }
            while right > 0 && self.get(e, right) + right < limit {
                right -= 1;
            }
            if right <= 0 {
                while right > left && self.get(e, right) < limit {
                    right -= 1;
                }
            }
            assert!(left <= right);

            for d in left..=right {
                if self.get(e, d) > longest {
                    best_d = d;
                    best_e = e;
                    longest = self.get(e, d);
                }
            }
            let score = longest as f64 * bmv - e as f64;
            if score > max_score {
                max_score = score;
                max_score_len = longest;
                max_score_d = best_d;
                max_score_e = best_e;
            }
        }

        WalkEnd {
            e: max_score_e,
            d: max_score_d,
            a_end: max_score_len,
            match_to_end: false,
        }
    }

    // one step of the traceback from (k, d); returns (from, max)
    #[inline(always)]
    fn trace_from(&self, k: i32, d: i32) -> (i32, i32) {
        let mut from = d;
        let mut max = 1 + self.get(k - 1, d);
        let j = self.get(k - 1, d - 1);
        if j > max {
            from = d - 1;
            max = j;
        }
        let j = 1 + self.get(k - 1, d + 1);
        if j > max {
            from = d + 1;
            max = j;
        }
        (from, max)
    }

    fn set_right_delta(&mut self, e: i32, d: i32) {
        let mut stack = Vec::<i32>::with_capacity(e as usize + 1);
        let mut d = d;
        let mut last = self.get(e, d);
        for k in (1..=e).rev() {
            let (from, max) = self.trace_from(k, d);
            if from == d - 1 {
                stack.push(max - last - 1);
                d -= 1;
                last = self.get(k - 1, from);
            } else if from == d + 1 {
                stack.push(last - (max - 1));
                d += 1;
                last = self.get(k - 1, from);
            }
        }
        stack.push(last + 1);

        self.right_delta.clear();
        for i in (1..stack.len()).rev() {
            self.right_delta.push(stack[i].abs() * stack[i - 1].signum());
        }
    }

    // returns the number of matching characters after the last delta
    fn set_left_delta(&mut self, e: i32, d: i32, t_end: &mut i32, t_len: i32) -> i32 {
        self.left_delta.clear();
        let mut d = d;
        let mut last = self.get(e, d);
        for k in (1..=e).rev() {
            let (from, max) = self.trace_from(k, d);
            if from == d - 1 {
                self.left_delta.push(max - last - 1);
                d -= 1;
                last = self.get(k - 1, from);
            } else if from == d + 1 {
                self.left_delta.push(last - (max - 1));
                d += 1;
                last = self.get(k - 1, from);
            }
        }
        let mut leftover = last;

        // a leading single-base indel becomes a substitution one step later
        assert!(self.left_delta.first() != Some(&-1));
        if self.left_delta.first() == Some(&1) && *t_end + t_len > 0 {
            if self.left_delta.len() > 1 {
                let next = self.left_delta[1];
                self.left_delta[1] = if next > 0 { next + 1 } else { next - 1 };
            }
            self.left_delta.remove(0);
            *t_end -= 1;
            if self.left_delta.is_empty() {
                leftover += 1;
            }
        }
        leftover
    }

    /// Extend `a[0..]` against a prefix of `t[0..]`.
    /// Returns (errors, a_end, t_end, match_to_end); ends are one past the
    /// last aligned position.
    fn prefix_edit_dist(&mut self, a: &[u8], t: &[u8], error_limit: i32) -> (i32, i32, i32, bool) {
        let w = self.walk(
            a.len() as i32,
            t.len() as i32,
            |i| a[i as usize],
            |i| t[i as usize],
            error_limit,
            true,
        );
        self.set_right_delta(w.e, w.d);
        (w.e, w.a_end, w.a_end + w.d, w.match_to_end)
    }

    /// Extend leftwards from `a[a.len()-1]` against `t` ending at `t[t.len()-1]`.
    /// Returns (errors, a_end, t_end, leftover, match_to_end) with non-positive
    /// ends relative to the starting position.
    fn rev_prefix_edit_dist(
        &mut self,
        a: &[u8],
        t: &[u8],
        error_limit: i32,
    ) -> (i32, i32, i32, i32, bool) {
        let (m, n) = (a.len() as i32, t.len() as i32);
        let w = self.walk(
            m,
            n,
            |i| a[(m - 1 - i) as usize],
            |i| t[(n - 1 - i) as usize],
            error_limit,
            false,
        );
        let mut t_end = -w.a_end - w.d;
        let leftover = self.set_left_delta(w.e, w.d, &mut t_end, n);
        (w.e, -w.a_end, t_end, leftover, w.match_to_end)
    }

    /// Extend the exact match `s[start..start+len] == t[offset..offset+len]`
    /// in both directions.
    pub fn extend(&mut self, s: &[u8], t: &[u8], start: i32, offset: i32, len: i32) -> Extension {
        let (s_len, t_len) = (s.len() as i32, t.len() as i32);
        let s_left_begin = start - 1;
        let s_right_begin = start + len;
        let s_right_len = s_len - s_right_begin;
        let t_left_begin = offset - 1;
        let t_right_begin = offset + len;
        let t_right_len = t_len - t_right_begin;

        let total_olap = std::cmp::min(start, offset) + std::cmp::min(s_right_len, t_right_len) + len;
        let error_limit = self.tables.error_bound(total_olap as usize);

        let (right_errors, mut s_hi, mut t_hi, right_match_to_end);
        if s_right_len == 0 || t_right_len == 0 {
            right_errors = 0;
            self.right_delta.clear();
            s_hi = 0;
            t_hi = 0;
            right_match_to_end = true;
        } else if s_right_len <= t_right_len {
            let (e, a_end, b_end, mte) = self.prefix_edit_dist(
                &s[s_right_begin as usize..],
                &t[t_right_begin as usize..],
                error_limit,
            );
            right_errors = e;
            s_hi = a_end;
            t_hi = b_end;
            right_match_to_end = mte;
        } else {
            let (e, a_end, b_end, mte) = self.prefix_edit_dist(
                &t[t_right_begin as usize..],
                &s[s_right_begin as usize..],
                error_limit,
            );
            right_errors = e;
            t_hi = a_end;
            s_hi = b_end;
            right_match_to_end = mte;
            self.right_delta.iter_mut().for_each(|x| *x = -*x);
        }
        s_hi += s_right_begin - 1;
        t_hi += t_right_begin - 1;
        assert!(right_errors <= error_limit);

        let (left_errors, mut s_lo, mut t_lo, leftover, left_match_to_end);
        if s_left_begin < 0 || t_left_begin < 0 {
            left_errors = 0;
            self.left_delta.clear();
            s_lo = 0;
            t_lo = 0;
            leftover = 0;
            left_match_to_end = true;
        } else if s_right_begin <= t_right_begin {
            let (e, a_end, b_end, lo, mte) = self.rev_prefix_edit_dist(
                &s[..=s_left_begin as usize],
                &t[..=t_left_begin as usize],
                error_limit - right_errors,
            );
            left_errors = e;
            s_lo = a_end;
            t_lo = b_end;
            leftover = lo;
            left_match_to_end = mte;
        } else {
            let (e, a_end, b_end, lo, mte) = self.rev_prefix_edit_dist(
                &t[..=t_left_begin as usize],
                &s[..=s_left_begin as usize],
                error_limit - right_errors,
            );
            left_errors = e;
            t_lo = a_end;
            s_lo = b_end;
            leftover = lo;
            left_match_to_end = mte;
            self.left_delta.iter_mut().for_each(|x| *x = -*x);
        }
        s_lo += s_left_begin + 1;
        t_lo += t_left_begin + 1;

        let kind = match (right_match_to_end, left_match_to_end) {
            (false, false) => AlignmentKind::NoOverlap,
            (false, true) => AlignmentKind::RightBranch,
            (true, false) => AlignmentKind::LeftBranch,
            (true, true) => AlignmentKind::Dovetail,
        };
        if !right_match_to_end && !self.tables.partial {
            self.left_delta.clear();
        }

        let errors = left_errors + right_errors;
        let mut delta = Vec::<i32>::new();
        if kind == AlignmentKind::Dovetail || self.tables.partial {
            assert!(errors <= error_limit);
            delta.reserve(self.left_delta.len() + self.right_delta.len());
            delta.extend_from_slice(&self.left_delta);
            if let Some(&first) = self.right_delta.first() {
                if first > 0 {
                    delta.push(first + leftover + len);
                } else {
                    delta.push(first - leftover - len);
                }
                delta.extend_from_slice(&self.right_delta[1..]);
            }
        }

        Extension {
            kind,
            s_lo,
            s_hi,
            t_lo,
            t_hi,
            errors,
            delta,
        }
    }
}

/// Replay a delta script over the aligned region, returning the
/// (s position, t position) pairs of every aligned column; `None` marks
/// the gapped side.
///
/// Each entry `d` covers `|d| - 1` matched columns and then one indel.
/// A positive entry is an extra base in `s` (the query, gap in `t`); a
/// negative entry is an extra base in `t` (the target, gap in `s`).
pub fn replay_delta(
    delta: &[i32],
    s_lo: i32,
    s_hi: i32,
    t_lo: i32,
) -> Vec<(Option<i32>, Option<i32>)> {
    let mut cols = Vec::<(Option<i32>, Option<i32>)>::with_capacity((s_hi - s_lo + 1) as usize);
    let (mut i, mut j) = (s_lo, t_lo);
    for &dl in delta {
        for _ in 1..dl.abs() {
            cols.push((Some(i), Some(j)));
            i += 1;
            j += 1;
        }
        if dl > 0 {
            cols.push((Some(i), None));
            i += 1;
        } else {
            cols.push((None, Some(j)));
            j += 1;
        }
    }
    while i <= s_hi {
        cols.push((Some(i), Some(j)));
        i += 1;
        j += 1;
    }
    cols
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn params() -> Parameters {
        Parameters {
            nthreads: 1,
            k: 16,
            hash_bits: 12,
            error_rate: 0.05,
            ..Parameters::default()
        }
    }

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"acgt"[rng.gen_range(0, 4)]).collect()
    }

    fn mutate(c: u8) -> u8 {
        match c {
            b'a' => b'c',
            b'c' => b'g',
            b'g' => b't',
            _ => b'a',
        }
    }

    fn count_errors(s: &[u8], t: &[u8], ext: &Extension) -> i32 {
        replay_delta(&ext.delta, ext.s_lo, ext.s_hi, ext.t_lo)
            .into_iter()
            .filter(|col| match col {
                (Some(i), Some(j)) => !bases_match(s[*i as usize], t[*j as usize]),
                _ => true,
            })
            .count() as i32
    }

    #[test]
    fn binomial_bounds() {
        // one error is always "worth it" at the smallest length
        assert_eq!(binomial_bound(1, 0.05, 1, 1e-4, 2048), 1);
        assert_eq!(binomial_bound(2, 0.05, 1, 1e-4, 2048), 2);
        let a = binomial_bound(10, 0.05, 1, 1e-4, 2048);
        let b = binomial_bound(11, 0.05, a, 1e-4, 2048);
        assert!(a > 10 && b >= a);
        // an impossible bound falls through to the maximum length
        assert_eq!(binomial_bound(5, 0.05, 1, 1.0, 30), 30);
        // past 35 trials the normal approximation takes over
        assert_eq!(binomial_bound(5, 0.05, 1, 1.0, 100), 36);
    }

    #[test]
    fn tables() {
        let t = AlignerTables::new(&params());
        assert_eq!(t.error_bound(100), 5);
        assert_eq!(t.error_bound(150), 7);
        assert_eq!(t.error_bound(19), 0);
        assert_eq!(t.error_bound(20), 1);
        assert_eq!(t.edit_match_limit[0], 0);
        assert_eq!(t.edit_match_limit[1], 0);
        assert!(t.edit_match_limit.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(t.max_errors(), params().max_errors());
    }

    #[test]
    fn identical_sequences_align_without_errors() {
        let mut rng = StdRng::seed_from_u64(17);
        let tables = AlignerTables::new(&params());
        let mut aligner = BandedAligner::new(&tables);
        for &len in &[40usize, 200, 1000] {
            let s = random_seq(&mut rng, len);
            let ext = aligner.extend(&s, &s, (len / 2) as i32, (len / 2) as i32, 16);
            assert_eq!(ext.kind, AlignmentKind::Dovetail);
            assert_eq!(ext.errors, 0);
            assert_eq!((ext.s_lo, ext.s_hi), (0, len as i32 - 1));
            assert_eq!((ext.t_lo, ext.t_hi), (0, len as i32 - 1));
            assert!(ext.delta.is_empty());
        }
    }

    #[test]
    fn substitutions_are_counted() {
        let mut rng = StdRng::seed_from_u64(23);
        let tables = AlignerTables::new(&params());
        let mut aligner = BandedAligner::new(&tables);
        let s = random_seq(&mut rng, 300);
        let mut t = s.clone();
        for &p in &[40usize, 110, 230] {
            t[p] = mutate(t[p]);
        }
        let ext = aligner.extend(&s, &t, 150, 150, 30);
        assert_eq!(ext.kind, AlignmentKind::Dovetail);
        assert_eq!(ext.errors, 3);
        assert_eq!((ext.s_lo, ext.s_hi, ext.t_lo, ext.t_hi), (0, 299, 0, 299));
        assert!(ext.delta.is_empty());
    }

    #[test]
    fn indels_produce_a_delta_script() {
        let mut rng = StdRng::seed_from_u64(29);
        let tables = AlignerTables::new(&params());
        let mut aligner = BandedAligner::new(&tables);
        let s = random_seq(&mut rng, 300);
        let mut t = s.clone();
        t.remove(220); // base missing from t, right of the seed
        t.insert(60, b'a'); // extra base in t, left of the seed
        t.insert(60, b'c');
        // seed s[140..170] == t[142..172]
        let ext = aligner.extend(&s, &t, 140, 142, 30);
        assert_eq!(ext.kind, AlignmentKind::Dovetail);
        assert_eq!(ext.errors, 3);
        assert_eq!(ext.s_lo, 0);
        assert_eq!(ext.t_lo, 0);
        assert_eq!(ext.s_hi, 299);
        assert_eq!(ext.t_hi, 300);
        assert_eq!(ext.delta.iter().filter(|&&x| x > 0).count(), 1);
        assert_eq!(ext.delta.iter().filter(|&&x| x < 0).count(), 2);
        assert_eq!(count_errors(&s, &t, &ext), 3);
    }

    #[test]
    fn delta_sign_marks_the_gapped_read() {
        // positive: s[2] has no partner in t
        let cols = replay_delta(&[3], 0, 4, 0);
        assert_eq!(
            cols,
            vec![
                (Some(0), Some(0)),
                (Some(1), Some(1)),
                (Some(2), None),
                (Some(3), Some(2)),
                (Some(4), Some(3)),
            ]
        );
        // negative: t[1] has no partner in s
        let cols = replay_delta(&[-2], 0, 2, 0);
        assert_eq!(
            cols,
            vec![
                (Some(0), Some(0)),
                (None, Some(1)),
                (Some(1), Some(2)),
                (Some(2), Some(3)),
            ]
        );
    }

    #[test]
    fn divergent_tail_is_a_branch_point() {
        let mut rng = StdRng::seed_from_u64(31);
        let tables = AlignerTables::new(&params());
        let mut aligner = BandedAligner::new(&tables);
        let shared = random_seq(&mut rng, 200);
        let mut s = shared.clone();
        let mut t = shared;
        // unrelated sequence after position 200 on both reads
        s.extend(random_seq(&mut rng, 200));
        t.extend(random_seq(&mut rng, 200));
        let ext = aligner.extend(&s, &t, 100, 100, 20);
        assert_eq!(ext.kind, AlignmentKind::RightBranch);
        assert_eq!(ext.s_lo, 0);
        assert!(ext.s_hi >= 195 && ext.s_hi < 215);
    }

    #[test]
    fn ambiguous_bases_match_anything() {
        let mut rng = StdRng::seed_from_u64(37);
        let tables = AlignerTables::new(&params());
        let mut aligner = BandedAligner::new(&tables);
        let s = random_seq(&mut rng, 120);
        let mut t = s.clone();
        t[10] = b'n';
        t[100] = b'n';
        let ext = aligner.extend(&s, &t, 50, 50, 20);
        assert_eq!(ext.kind, AlignmentKind::Dovetail);
        assert_eq!(ext.errors, 0);
    }
}
