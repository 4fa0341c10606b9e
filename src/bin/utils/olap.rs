// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// turn the seed runs of one read pair into overlap records

use super::banded::{replay_delta, AlignmentKind, BandedAligner, Extension};
use super::config::Parameters;
use super::error::{OvlError, OvlResult};
use super::linker::optimal_overlap;
use super::ovs::{encode_quality, OverlapRecord};
use super::seeds::{MatchList, QueryScreen};
use super::seqcodec::bases_match;

pub const QUALITY_CUTOFF: u8 = 20;
pub const BAD_WINDOW_LEN: usize = 50;
pub const BAD_WINDOW_VALUE: u32 = 8 * QUALITY_CUTOFF as u32;
pub const BAD_LONG_WINDOW_LEN: usize = 100;
pub const BAD_LONG_WINDOW_VALUE: u32 = 240;

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentCandidate {
    pub s_lo: i32,
    pub s_hi: i32,
    pub t_lo: i32,
    pub t_hi: i32,
    pub quality: f64,
    pub delta: Vec<i32>,
    pub min_diag: i32,
    pub max_diag: i32,
    pub s_left_boundary: i32,
    pub s_right_boundary: i32,
    pub t_left_boundary: i32,
    pub t_right_boundary: i32,
}

impl AlignmentCandidate {
    pub fn new(s_lo: i32, s_hi: i32, t_lo: i32, t_hi: i32, quality: f64, delta: Vec<i32>) -> Self {
        AlignmentCandidate {
            s_lo,
            s_hi,
            t_lo,
            t_hi,
            quality,
            delta,
            min_diag: t_lo - s_lo,
            max_diag: t_lo - s_lo,
            s_left_boundary: s_lo,
            s_right_boundary: s_hi,
            t_left_boundary: t_lo,
            t_right_boundary: t_hi,
        }
    }

    pub fn diagonal(&self) -> i32 {
        self.t_lo - self.s_lo
    }

    fn absorb_bounds(&mut self, other: &AlignmentCandidate) {
        self.min_diag = std::cmp::min(self.min_diag, other.min_diag);
        self.max_diag = std::cmp::max(self.max_diag, other.max_diag);
        self.s_left_boundary = std::cmp::min(self.s_left_boundary, other.s_left_boundary);
        self.s_right_boundary = std::cmp::max(self.s_right_boundary, other.s_right_boundary);
        self.t_left_boundary = std::cmp::min(self.t_left_boundary, other.t_left_boundary);
        self.t_right_boundary = std::cmp::max(self.t_right_boundary, other.t_right_boundary);
    }

    // does an alignment on diagonal `diag` share enough of this one's box
    fn intersects(&self, diag: i32, min_intersection: i32) -> bool {
        (diag >= 0 && self.t_right_boundary - diag - self.s_left_boundary >= min_intersection)
            || (diag <= 0
                && self.s_right_boundary + diag - self.t_left_boundary >= min_intersection)
    }
}

/// Does the exact match at `start`/`offset` follow the alignment that begins
/// at `s_lo`/`t_lo` with indel script `delta`, within `slack` diagonals.
pub fn lies_on_alignment(
    start: i32,
    offset: i32,
    s_lo: i32,
    t_lo: i32,
    delta: &[i32],
    slack: i32,
) -> bool {
    let mut diag = t_lo - s_lo;
    let new_diag = offset - start;
    let mut s_lo = s_lo;
    for &d in delta {
        s_lo += d.abs();
        if start < s_lo {
            return (new_diag - diag).abs() <= slack;
        }
        if d < 0 {
            diag += 1;
        } else {
            s_lo += 1;
            diag -= 1;
        }
    }
    (new_diag - diag).abs() <= slack
}

/// Any `window_len` run of `a` summing to `threshold` or more.
pub fn has_bad_window(a: &[u8], window_len: usize, threshold: u32) -> bool {
    if a.len() < window_len {
        return false;
    }
    let mut sum: u32 = a[..window_len].iter().map(|&x| x as u32).sum();
    if sum >= threshold {
        return true;
    }
    for i in window_len..a.len() {
        sum -= a[i - window_len] as u32;
        sum += a[i] as u32;
        if sum >= threshold {
            return true;
        }
    }
    false
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowReject {
    Short,
    Long,
}

/// Quality weighted differences along the alignment, checked over short and
/// long windows.
pub fn window_filter(
    cand: &AlignmentCandidate,
    s: &[u8],
    s_qual: &[u8],
    t: &[u8],
    t_qual: &[u8],
) -> Option<WindowReject> {
    let q_diff: Vec<u8> = replay_delta(&cand.delta, cand.s_lo, cand.s_hi, cand.t_lo)
        .into_iter()
        .map(|col| match col {
            (Some(i), Some(j)) => {
                let (i, j) = (i as usize, j as usize);
                if bases_match(s[i], t[j]) {
                    0
                } else {
                    s_qual[i].min(t_qual[j]).min(QUALITY_CUTOFF)
                }
            }
            (Some(i), None) => s_qual[i as usize].min(QUALITY_CUTOFF),
            (None, Some(j)) => t_qual[j as usize].min(QUALITY_CUTOFF),
            (None, None) => 0,
        })
        .collect();
    if has_bad_window(&q_diff, BAD_WINDOW_LEN, BAD_WINDOW_VALUE) {
        Some(WindowReject::Short)
    } else if has_bad_window(&q_diff, BAD_LONG_WINDOW_LEN, BAD_LONG_WINDOW_VALUE) {
        Some(WindowReject::Long)
    } else {
        None
    }
}

/// Keep the lowest quality value; fold every other candidate's bounds into it.
pub fn combine_into_one(cands: &mut [AlignmentCandidate]) -> Vec<bool> {
    let mut best = 0;
    for i in 1..cands.len() {
        if cands[i].quality < cands[best].quality {
            best = i;
        }
    }
    for i in 0..cands.len() {
        if i != best {
            let other = cands[i].clone();
            cands[best].absorb_bounds(&other);
        }
    }
    (0..cands.len()).map(|i| i != best).collect()
}

/// Keep the candidate with the most matching bases; ties go to lower quality.
pub fn choose_best_partial(cands: &[AlignmentCandidate]) -> Vec<bool> {
    let matching = |c: &AlignmentCandidate| {
        (1.0 - c.quality) * (2 + c.s_hi - c.s_lo + c.t_hi - c.t_lo) as f64
    };
    let mut best = 0;
    let mut best_mb = matching(&cands[0]);
    for i in 1..cands.len() {
        let mb = matching(&cands[i]);
        if best_mb < mb || (best_mb == mb && cands[i].quality < cands[best].quality) {
            best = i;
            best_mb = mb;
        }
    }
    (0..cands.len()).map(|i| i != best).collect()
}

/// Pairwise merge of candidates on same-signed diagonals whose boxes
/// intersect; the poorer one is deleted.
pub fn merge_intersecting(cands: &mut [AlignmentCandidate], min_intersection: i32) -> Vec<bool> {
    let n = cands.len();
    let mut deleted = vec![false; n];
    for i in 0..n {
        for j in i + 1..n {
            if deleted[i] || deleted[j] {
                continue;
            }
            let lo_diag = cands[i].min_diag;
            let hi_diag = cands[i].max_diag;
            if (lo_diag <= 0) != (cands[j].min_diag <= 0) {
                continue;
            }
            if cands[j].intersects(lo_diag, min_intersection)
                || cands[j].intersects(hi_diag, min_intersection)
            {
                let (keep, discard) = if cands[i].quality < cands[j].quality {
                    (i, j)
                } else {
                    (j, i)
                };
                deleted[discard] = true;
                let other = cands[discard].clone();
                cands[keep].absorb_bounds(&other);
            }
        }
    }
    deleted
}

/// Distinct candidates for one read pair in one orientation.
pub struct OverlapAssembler {
    partial: bool,
    unique: bool,
    min_intersection: i32,
    max_distinct: usize,
    pub candidates: Vec<AlignmentCandidate>,
}

impl OverlapAssembler {
    pub fn new(params: &Parameters) -> Self {
        OverlapAssembler {
            partial: params.partial_overlaps,
            unique: params.unique_olap_per_pair,
            min_intersection: params.min_intersection,
            max_distinct: params.max_distinct_olaps,
            candidates: Vec::<AlignmentCandidate>::with_capacity(params.max_distinct_olaps),
        }
    }

    pub fn add_overlap(&mut self, ext: &Extension, quality: f64) {
        if !self.partial {
            let new_diag = ext.t_lo - ext.s_lo;
            for olap in self.candidates.iter_mut() {
                let old_diag = olap.diagonal();
                let same_side = (new_diag > 0 && old_diag > 0) || (new_diag <= 0 && old_diag <= 0);
                if same_side && olap.intersects(new_diag, self.min_intersection) {
                    olap.min_diag = std::cmp::min(olap.min_diag, new_diag);
                    olap.max_diag = std::cmp::max(olap.max_diag, new_diag);
                    olap.s_left_boundary = std::cmp::min(olap.s_left_boundary, ext.s_lo);
                    olap.s_right_boundary = std::cmp::max(olap.s_right_boundary, ext.s_hi);
                    olap.t_left_boundary = std::cmp::min(olap.t_left_boundary, ext.t_lo);
                    olap.t_right_boundary = std::cmp::max(olap.t_right_boundary, ext.t_hi);
                    if quality < olap.quality {
                        olap.s_lo = ext.s_lo;
                        olap.s_hi = ext.s_hi;
                        olap.t_lo = ext.t_lo;
                        olap.t_hi = ext.t_hi;
                        olap.quality = quality;
                        olap.delta = ext.delta.clone();
                    }
                    return;
                }
            }
        }
        if self.candidates.len() >= self.max_distinct {
            log::debug!(
                "dropping candidate {}-{} x {}-{}: {} distinct overlaps already",
                ext.s_lo,
                ext.s_hi,
                ext.t_lo,
                ext.t_hi,
                self.candidates.len()
            );
            return;
        }
        self.candidates.push(AlignmentCandidate::new(
            ext.s_lo,
            ext.s_hi,
            ext.t_lo,
            ext.t_hi,
            quality,
            ext.delta.clone(),
        ));
    }

    /// Apply the reduction policy and hand out the survivors.
    pub fn finish(&mut self) -> Vec<AlignmentCandidate> {
        let mut cands = std::mem::replace(&mut self.candidates, Vec::<AlignmentCandidate>::new());
        if cands.is_empty() {
            return cands;
        }
        let deleted = match (self.partial, self.unique) {
            (true, true) => choose_best_partial(&cands),
            (true, false) => vec![false; cands.len()],
            (false, true) => combine_into_one(&mut cands),
            (false, false) => merge_intersecting(&mut cands, self.min_intersection),
        };
        cands
            .into_iter()
            .zip(deleted.into_iter())
            .filter(|(_, d)| !*d)
            .map(|(c, _)| c)
            .collect()
    }
}

/// The query read as it is being aligned (possibly reverse complemented).
pub struct QueryRead<'a> {
    pub iid: u32,
    pub seq: &'a [u8],
    pub qual: &'a [u8],
    pub reversed: bool,
    pub screen: QueryScreen,
}

pub struct TargetRead<'a> {
    pub iid: u32,
    pub seq: &'a [u8],
    pub qual: &'a [u8],
    pub left_end_screened: bool,
    pub right_end_screened: bool,
}

/// Overlaps reported so far off either end of the current query orientation.
#[derive(Debug, Copy, Clone, Default)]
pub struct EndCounts {
    pub a_olaps: u32,
    pub b_olaps: u32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct OverlapStats {
    pub reads_processed: u64,
    pub reads_too_short: u64,
    pub reads_too_long: u64,
    pub reads_deleted: u64,
    pub kmer_hits_with_olap: u64,
    pub kmer_hits_without_olap: u64,
    pub multi_overlaps: u64,
    pub total_overlaps: u64,
    pub contained: u64,
    pub dovetail: u64,
    pub bad_short_window: u64,
    pub bad_long_window: u64,
    pub refined: u64,
    pub refine_failed: u64,
}

impl OverlapStats {
    pub fn merge(&mut self, other: &OverlapStats) {
        self.reads_processed += other.reads_processed;
        self.reads_too_short += other.reads_too_short;
        self.reads_too_long += other.reads_too_long;
        self.reads_deleted += other.reads_deleted;
        self.kmer_hits_with_olap += other.kmer_hits_with_olap;
        self.kmer_hits_without_olap += other.kmer_hits_without_olap;
        self.multi_overlaps += other.multi_overlaps;
        self.total_overlaps += other.total_overlaps;
        self.contained += other.contained;
        self.dovetail += other.dovetail;
        self.bad_short_window += other.bad_short_window;
        self.bad_long_window += other.bad_long_window;
        self.refined += other.refined;
        self.refine_failed += other.refine_failed;
    }

    pub fn log(&self) {
        log::info!(
            "reads processed: {} (too short: {}, too long: {}, deleted: {})",
            self.reads_processed,
            self.reads_too_short,
            self.reads_too_long,
            self.reads_deleted
        );
        log::info!(
            "kmer hits with overlap: {}, without overlap: {}, multi-overlap pairs: {}",
            self.kmer_hits_with_olap,
            self.kmer_hits_without_olap,
            self.multi_overlaps
        );
        log::info!(
            "total overlaps: {} (contained: {}, dovetail: {}); window filter rejected {} short, {} long",
            self.total_overlaps,
            self.contained,
            self.dovetail,
            self.bad_short_window,
            self.bad_long_window
        );
        if self.refined + self.refine_failed > 0 {
            log::info!(
                "refined overlaps: {}, not confirmed by the full alignment: {}",
                self.refined,
                self.refine_failed
            );
        }
    }
}

/// Hangs of `cand` in canonical form (lower IID as A, A forward).
/// Returns (a_iid, b_iid, flipped, a_hang, b_hang).
pub fn canonical_hangs(
    query: &QueryRead,
    target: &TargetRead,
    cand: &AlignmentCandidate,
) -> (u32, u32, bool, i32, i32) {
    let s_len = query.seq.len() as i32;
    let t_len = target.seq.len() as i32;
    let s_right_hang = s_len - cand.s_hi - 1;
    let t_right_hang = t_len - cand.t_hi - 1;
    let mut a_hang = cand.s_lo - cand.t_lo;
    let mut b_hang = t_right_hang - s_right_hang;
    if query.reversed {
        let ah = a_hang;
        a_hang = -b_hang;
        b_hang = -ah;
    }
    if query.iid < target.iid {
        (query.iid, target.iid, query.reversed, a_hang, b_hang)
    } else if query.reversed {
        (target.iid, query.iid, true, b_hang, a_hang)
    } else {
        (target.iid, query.iid, false, -a_hang, -b_hang)
    }
}

pub fn overlap_record(query: &QueryRead, target: &TargetRead, cand: &AlignmentCandidate) -> OverlapRecord {
    let (a_iid, b_iid, flipped, a_hang, b_hang) = canonical_hangs(query, target, cand);
    let erate = encode_quality(cand.quality);
    OverlapRecord::Ovl {
        a_iid,
        b_iid,
        flipped,
        a_hang,
        b_hang,
        orig_erate: erate,
        corr_erate: erate,
    }
}

/// Realign an OVL record over the full read pair inside the box its hangs
/// describe and store the resulting error rate as `corr_erate`. `a` and `b`
/// are both forward. Returns false, leaving the record alone, when no
/// alignment within the error rate exists.
pub fn refine_overlap(rec: &mut OverlapRecord, a: &[u8], b: &[u8], params: &Parameters) -> bool {
    if let OverlapRecord::Ovl {
        flipped,
        a_hang,
        b_hang,
        corr_erate,
        ..
    } = rec
    {
        let min_len = params.min_olap_len as usize;
        match optimal_overlap(a, b, *a_hang, *b_hang, *flipped, params.error_rate, min_len) {
            Some(o) => {
                *corr_erate = encode_quality(o.diffs as f64 / o.length as f64);
                true
            }
            None => false,
        }
    } else {
        false
    }
}

/// Trimming record: positions on the query in its forward orientation,
/// target positions run backwards when the query was reversed.
pub fn partial_record(query: &QueryRead, target: &TargetRead, cand: &AlignmentCandidate) -> OverlapRecord {
    let s_len = query.seq.len() as i32;
    let (a, b, c, d) = if !query.reversed {
        (cand.s_lo, cand.s_hi + 1, cand.t_lo, cand.t_hi + 1)
    } else {
        (s_len - cand.s_hi - 1, s_len - cand.s_lo, cand.t_hi + 1, cand.t_lo)
    };
    let erate = encode_quality(cand.quality);
    if query.iid < target.iid {
        OverlapRecord::Obt {
            a_iid: query.iid,
            b_iid: target.iid,
            fwd: !query.reversed,
            a_beg: a as u32,
            a_end: b as u32,
            b_beg: c as u32,
            b_end: d as u32,
            erate,
        }
    } else if !query.reversed {
        OverlapRecord::Obt {
            a_iid: target.iid,
            b_iid: query.iid,
            fwd: true,
            a_beg: c as u32,
            a_end: d as u32,
            b_beg: a as u32,
            b_end: b as u32,
            erate,
        }
    } else {
        OverlapRecord::Obt {
            a_iid: target.iid,
            b_iid: query.iid,
            fwd: false,
            a_beg: d as u32,
            a_end: c as u32,
            b_beg: b as u32,
            b_end: a as u32,
            erate,
        }
    }
}

fn check_bounds(query: &QueryRead, target: &TargetRead, cand: &AlignmentCandidate) -> OvlResult<()> {
    let s_len = query.seq.len() as i32;
    let t_len = target.seq.len() as i32;
    if cand.s_lo < 0
        || cand.s_lo > cand.s_hi
        || cand.s_hi >= s_len
        || cand.t_lo < 0
        || cand.t_lo > cand.t_hi
        || cand.t_hi >= t_len
    {
        return Err(OvlError::AlignmentInvariant(format!(
            "{} x {}: candidate {}-{} / {}-{} outside read lengths {} / {}",
            query.iid, target.iid, cand.s_lo, cand.s_hi, cand.t_lo, cand.t_hi, s_len, t_len
        )));
    }
    Ok(())
}

fn is_hopeless(m_start: i32, m_offset: i32, m_len: i32, query: &QueryRead, target: &TargetRead, hopeless: i32) -> bool {
    let s_len = query.seq.len() as i32;
    let t_len = target.seq.len() as i32;
    let (s_head, t_head) = (m_start, m_offset);
    let mut hopeless_match = if s_head <= t_head {
        s_head > hopeless && !query.screen.left_end_screened
    } else {
        t_head > hopeless && !target.left_end_screened
    };
    let s_tail = s_len - s_head - m_len + 1;
    let t_tail = t_len - t_head - m_len + 1;
    if s_tail <= t_tail {
        hopeless_match |= s_tail > hopeless && !query.screen.right_end_screened;
    } else {
        hopeless_match |= t_tail > hopeless && !target.right_end_screened;
    }
    hopeless_match
}

/// Align the seed runs in `list` and append the accepted overlaps to `out`.
/// Returns the number of records produced.
#[allow(clippy::too_many_arguments)]
pub fn process_matches(
    list: &mut MatchList,
    query: &QueryRead,
    target: &TargetRead,
    aligner: &mut BandedAligner,
    params: &Parameters,
    ends: &mut EndCounts,
    stats: &mut OverlapStats,
    out: &mut Vec<OverlapRecord>,
) -> OvlResult<usize> {
    let s = query.seq;
    let t = target.seq;
    let s_len = s.len() as i32;
    let t_len = t.len() as i32;
    let partial = params.partial_overlaps;

    if params.use_hopeless_check && list.matches.len() == 1 && !partial {
        let m = list.matches[0];
        if is_hopeless(m.start, m.offset, m.len, query, target, params.hopeless_match as i32) {
            list.matches.clear();
            stats.kmer_hits_without_olap += 1;
            return Ok(0);
        }
    }

    let mut assembler = OverlapAssembler::new(params);
    let mut last: Option<Extension> = None;

    while let Some(li) = list.longest() {
        let m = list.matches[li];
        let a_hang = m.start - m.offset;
        let b_hang = a_hang + s_len - t_len;
        let hit_limit = (ends.a_olaps >= params.frag_olap_limit && a_hang <= 0)
            || (ends.b_olaps >= params.frag_olap_limit && b_hang <= 0);

        if !hit_limit {
            let ext = aligner.extend(s, t, m.start, m.offset, m.len);
            if (ext.kind == AlignmentKind::Dovetail || partial)
                && 1 + ext.s_hi - ext.s_lo >= params.min_olap_len as i32
                && 1 + ext.t_hi - ext.t_lo >= params.min_olap_len as i32
            {
                let olap_len = 1 + std::cmp::min(ext.s_hi - ext.s_lo, ext.t_hi - ext.t_lo);
                let quality = ext.errors as f64 / olap_len as f64;
                if ext.errors <= aligner.tables().error_bound(olap_len as usize) {
                    assembler.add_overlap(&ext, quality);
                }
            }
            last = Some(ext);
        }

        if list.consistent {
            list.matches.clear();
            break;
        }

        let slack = params.shift_slack;
        let mut kept = Vec::<_>::with_capacity(list.matches.len());
        for (i, p) in list.matches.iter().enumerate() {
            let on_alignment = match &last {
                Some(ext) if ext.kind == AlignmentKind::Dovetail || partial => {
                    ext.s_lo - slack <= p.start
                        && p.start + p.len <= ext.s_hi + slack
                        && lies_on_alignment(p.start, p.offset, ext.s_lo, ext.t_lo, &ext.delta, slack)
                }
                _ => false,
            };
            if i != li && !on_alignment {
                kept.push(*p);
            }
        }
        list.matches = kept;
    }

    let mut produced = 0;
    for cand in assembler.finish() {
        if params.use_window_filter {
            match window_filter(&cand, s, query.qual, t, target.qual) {
                Some(WindowReject::Short) => {
                    stats.bad_short_window += 1;
                    continue;
                }
                Some(WindowReject::Long) => {
                    stats.bad_long_window += 1;
                    continue;
                }
                None => {}
            }
        }
        check_bounds(query, target, &cand)?;

        let rec = if partial {
            partial_record(query, target, &cand)
        } else {
            let rec = overlap_record(query, target, &cand);
            if rec.is_containment() {
                stats.contained += 1;
            } else {
                stats.dovetail += 1;
            }
            rec
        };
        out.push(rec);
        stats.total_overlaps += 1;
        produced += 1;
        if cand.s_lo == 0 {
            ends.a_olaps += 1;
        }
        if cand.s_hi >= s_len - 1 {
            ends.b_olaps += 1;
        }
    }

    if produced == 0 {
        stats.kmer_hits_without_olap += 1;
    } else {
        stats.kmer_hits_with_olap += 1;
        if produced > 1 {
            stats.multi_overlaps += 1;
        }
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::banded::AlignerTables;
    use crate::utils::hash_index::HashIndex;
    use crate::utils::seeds::SeedCollector;
    use crate::utils::seqcodec::reverse_complement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn params() -> Parameters {
        Parameters {
            nthreads: 1,
            k: 16,
            hash_bits: 12,
            error_rate: 0.05,
            min_olap_len: 40,
            ..Parameters::default()
        }
    }

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"acgt"[rng.gen_range(0, 4)]).collect()
    }

    fn mutate(c: u8) -> u8 {
        match c {
            b'a' => b'g',
            b'c' => b't',
            b'g' => b'a',
            _ => b'c',
        }
    }

    fn query<'a>(iid: u32, seq: &'a [u8], qual: &'a [u8], reversed: bool) -> QueryRead<'a> {
        QueryRead {
            iid,
            seq,
            qual,
            reversed,
            screen: QueryScreen::default(),
        }
    }

    fn target<'a>(iid: u32, seq: &'a [u8], qual: &'a [u8]) -> TargetRead<'a> {
        TargetRead {
            iid,
            seq,
            qual,
            left_end_screened: false,
            right_end_screened: false,
        }
    }

    // index `t` as IID 2, run `s` as IID 1 in both orientations
    fn run_pair(p: &Parameters, s: &[u8], t: &[u8]) -> (Vec<OverlapRecord>, OverlapStats) {
        let tables = AlignerTables::new(p);
        let mut aligner = BandedAligner::new(&tables);
        let mut index = HashIndex::new(p, 2);
        index.add_read(t, &vec![20; t.len()]).unwrap();
        index.coalesce();
        let tq = vec![20u8; t.len()];
        let mut collector = SeedCollector::new();
        let mut out = Vec::<OverlapRecord>::new();
        let mut stats = OverlapStats::default();
        let rc = reverse_complement(s);
        let sq = vec![20u8; s.len()];
        for (seq, reversed) in [(s, false), (&rc[..], true)].iter() {
            let screen = collector.collect(&index, seq, 1, None, p);
            let (lists, _) = collector.take_targets(p.frag_olap_limit);
            let mut ends = EndCounts::default();
            for mut list in lists {
                let q = QueryRead {
                    screen,
                    ..query(1, seq, &sq, *reversed)
                };
                let tr = target(2, t, &tq);
                process_matches(&mut list, &q, &tr, &mut aligner, p, &mut ends, &mut stats, &mut out)
                    .unwrap();
            }
        }
        (out, stats)
    }

    #[test]
    fn lies_on_alignment_follows_indels() {
        // straight alignment on diagonal 5
        assert!(lies_on_alignment(40, 45, 0, 5, &[], 1));
        assert!(!lies_on_alignment(40, 48, 0, 5, &[], 1));
        // an extra target base after 20 shifts the diagonal by one
        assert!(lies_on_alignment(40, 46, 0, 5, &[-20], 0));
        assert!(lies_on_alignment(10, 15, 0, 5, &[-20], 0));
        // an extra query base shifts it back
        assert!(lies_on_alignment(60, 64, 0, 5, &[30], 0));
    }

    #[test]
    fn bad_windows() {
        let mut a = vec![0u8; 200];
        assert!(!has_bad_window(&a, 50, 160));
        for i in (100..150).step_by(6) {
            a[i] = 20;
        }
        // 9 hits of 20 inside one 50 window
        assert!(has_bad_window(&a, 50, 160));
        assert!(!has_bad_window(&a[..40], 50, 1));
        let b = vec![3u8; 100];
        assert!(!has_bad_window(&b, 50, 160));
        assert!(has_bad_window(&b, 100, 240));
    }

    fn cand(s_lo: i32, s_hi: i32, t_lo: i32, t_hi: i32, q: f64) -> AlignmentCandidate {
        AlignmentCandidate::new(s_lo, s_hi, t_lo, t_hi, q, vec![])
    }

    #[test]
    fn reduction_policies() {
        let mut cands = vec![cand(50, 199, 0, 149, 0.03), cand(52, 199, 0, 147, 0.01), cand(0, 99, 100, 199, 0.02)];
        let deleted = combine_into_one(&mut cands);
        assert_eq!(deleted, vec![true, false, true]);
        assert_eq!(cands[1].s_left_boundary, 0);
        assert_eq!(cands[1].t_right_boundary, 199);
        assert_eq!((cands[1].min_diag, cands[1].max_diag), (-52, 100));

        let cands = vec![cand(0, 99, 0, 99, 0.0), cand(0, 149, 10, 159, 0.02), cand(0, 149, 10, 159, 0.01)];
        assert_eq!(choose_best_partial(&cands), vec![true, true, false]);

        let mut cands = vec![cand(50, 199, 0, 149, 0.03), cand(53, 199, 0, 146, 0.01), cand(0, 99, 100, 199, 0.02)];
        let deleted = merge_intersecting(&mut cands, 10);
        assert_eq!(deleted, vec![true, false, false]);
        assert_eq!(cands[1].min_diag, -53);
        assert_eq!(cands[1].max_diag, -50);
    }

    #[test]
    fn shifted_candidates_merge_on_insert() {
        let p = params();
        let mut asm = OverlapAssembler::new(&p);
        let ext = |s_lo, s_hi, t_lo, t_hi| Extension {
            kind: AlignmentKind::Dovetail,
            s_lo,
            s_hi,
            t_lo,
            t_hi,
            errors: 0,
            delta: vec![],
        };
        asm.add_overlap(&ext(50, 199, 0, 149), 0.03);
        asm.add_overlap(&ext(51, 199, 0, 148), 0.02);
        asm.add_overlap(&ext(0, 99, 100, 199), 0.01);
        assert_eq!(asm.candidates.len(), 2);
        assert_eq!(asm.candidates[0].s_lo, 51);
        assert_eq!(asm.candidates[0].s_left_boundary, 50);
        assert_eq!(asm.candidates[0].quality, 0.02);
        let survivors = asm.finish();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].quality, 0.01);

        let mut partial = OverlapAssembler::new(&p.with_partial_overlaps(true));
        partial.add_overlap(&ext(50, 199, 0, 149), 0.03);
        partial.add_overlap(&ext(51, 199, 0, 148), 0.02);
        assert_eq!(partial.candidates.len(), 2);
    }

    #[test]
    fn hang_signs_classify_containment() {
        let s = vec![b'a'; 200];
        let t = vec![b'a'; 100];
        let q = vec![20u8; 200];
        let tq = vec![20u8; 100];
        // t inside s at 30..130
        let c = cand(30, 129, 0, 99, 0.0);
        let (a, b, flipped, ah, bh) = canonical_hangs(&query(1, &s, &q, false), &target(2, &t, &tq), &c);
        assert_eq!((a, b, flipped, ah, bh), (1, 2, false, 30, -70));
        assert!(overlap_record(&query(1, &s, &q, false), &target(2, &t, &tq), &c).is_containment());
        // same layout seen from the contained read
        let (a, b, _, ah, bh) = canonical_hangs(&query(3, &s, &q, false), &target(2, &t, &tq), &c);
        assert_eq!((a, b, ah, bh), (2, 3, -30, 70));
        // reversed query: mirror the hangs
        let (_, _, flipped, ah, bh) = canonical_hangs(&query(1, &s, &q, true), &target(2, &t, &tq), &c);
        assert_eq!((flipped, ah, bh), (true, 70, -30));

        let t2 = vec![b'a'; 200];
        let tq2 = vec![20u8; 200];
        let d = cand(50, 199, 0, 149, 0.0);
        let rec = overlap_record(&query(1, &s, &q, false), &target(2, &t2, &tq2), &d);
        assert!(!rec.is_containment());
        let rec = overlap_record(&query(1, &s, &q, true), &target(2, &t2, &tq2), &d);
        assert!(!rec.is_containment());
    }

    #[test]
    fn dovetail_with_three_substitutions() {
        let mut rng = StdRng::seed_from_u64(101);
        let a = random_seq(&mut rng, 200);
        let mut b = a[50..].to_vec();
        b.extend(random_seq(&mut rng, 50));
        let mut a = a;
        for &i in &[80usize, 120, 160] {
            a[i] = mutate(a[i]);
        }
        let (out, stats) = run_pair(&params(), &a, &b);
        assert_eq!(out.len(), 1);
        match out[0] {
            OverlapRecord::Ovl {
                a_iid,
                b_iid,
                flipped,
                a_hang,
                b_hang,
                orig_erate,
                ..
            } => {
                assert_eq!((a_iid, b_iid, flipped), (1, 2, false));
                assert_eq!((a_hang, b_hang), (50, 50));
                assert_eq!(orig_erate, encode_quality(3.0 / 150.0));
            }
            _ => panic!("expected an OVL record"),
        }
        assert_eq!(stats.dovetail, 1);
        assert_eq!(stats.contained, 0);
    }

    #[test]
    fn reverse_complement_overlap_is_innie() {
        let mut rng = StdRng::seed_from_u64(103);
        let x = random_seq(&mut rng, 250);
        let a = x[..200].to_vec();
        let b = reverse_complement(&x[50..]);
        let (out, _) = run_pair(&params(), &a, &b);
        assert_eq!(out.len(), 1);
        match out[0] {
            OverlapRecord::Ovl {
                flipped,
                a_hang,
                b_hang,
                orig_erate,
                ..
            } => {
                assert!(flipped);
                assert_eq!((a_hang, b_hang), (50, 50));
                assert_eq!(orig_erate, 0);
            }
            _ => panic!("expected an OVL record"),
        }
    }

    #[test]
    fn error_rate_gate_is_inclusive() {
        let mut rng = StdRng::seed_from_u64(107);
        let s = random_seq(&mut rng, 100);
        let mut t = s.clone();
        for &i in &[10usize, 30, 50, 70, 90] {
            t[i] = mutate(t[i]);
        }
        // 5 / 100 == 0.05
        let (out, _) = run_pair(&params(), &s, &t);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_containment());

        t[95] = mutate(t[95]);
        let (out, stats) = run_pair(&params(), &s, &t);
        assert!(out.is_empty());
        assert_eq!(stats.total_overlaps, 0);
    }

    #[test]
    fn too_short_overlaps_are_dropped() {
        let mut rng = StdRng::seed_from_u64(109);
        let a = random_seq(&mut rng, 200);
        let mut b = a[170..].to_vec();
        b.extend(random_seq(&mut rng, 170));
        let (out, _) = run_pair(&params(), &a, &b);
        assert!(out.is_empty());
        let p = Parameters {
            min_olap_len: 20,
            ..params()
        };
        let (out, _) = run_pair(&p, &a, &b);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn partial_mode_reports_branch_points() {
        let mut rng = StdRng::seed_from_u64(113);
        let shared = random_seq(&mut rng, 150);
        let a = [random_seq(&mut rng, 50), shared.clone(), random_seq(&mut rng, 50)].concat();
        let b = [random_seq(&mut rng, 80), shared, random_seq(&mut rng, 20)].concat();
        let (out, _) = run_pair(&params(), &a, &b);
        assert!(out.is_empty());

        let p = params().with_partial_overlaps(true);
        let (out, _) = run_pair(&p, &a, &b);
        assert_eq!(out.len(), 1);
        match out[0] {
            OverlapRecord::Obt {
                fwd,
                a_beg,
                a_end,
                b_beg,
                b_end,
                ..
            } => {
                assert!(fwd);
                // chance matches can only push the ends outwards
                assert!((45..=50).contains(&a_beg) && (200..=205).contains(&a_end));
                assert!((75..=80).contains(&b_beg) && (230..=235).contains(&b_end));
            }
            _ => panic!("expected an OBT record"),
        }
    }

    #[test]
    fn window_filter_rejects_low_quality_clusters() {
        let mut rng = StdRng::seed_from_u64(127);
        let s = random_seq(&mut rng, 300);
        let mut t = s.clone();
        for i in (100..150).step_by(5) {
            t[i] = mutate(t[i]);
        }
        let c = cand(0, 299, 0, 299, 10.0 / 300.0);
        let q = vec![30u8; 300];
        assert_eq!(window_filter(&c, &s, &q, &t, &q), Some(WindowReject::Short));
        let low = vec![5u8; 300];
        assert_eq!(window_filter(&c, &s, &low, &t, &q), None);
        assert_eq!(window_filter(&c, &s, &q, &s, &q), None);
    }
}
