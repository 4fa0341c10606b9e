// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// collect exact k-mer runs between one query read and the indexed targets

use super::config::Parameters;
use super::hash_index::HashIndex;
use super::kmer::{canonical_key, KmerIter};
use super::skip_filter::KmerFilter;
use rustc_hash::FxHashMap;

/// A run of consecutive k-mer hits on one diagonal:
/// `query[start..start+len] == target[offset..offset+len]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SeedMatch {
    pub start: i32,
    pub offset: i32,
    pub len: i32,
}

impl SeedMatch {
    #[inline(always)]
    pub fn diagonal(&self) -> i32 {
        self.offset - self.start
    }
}

/// All seed runs against one target read. Newest runs are kept at the end.
#[derive(Debug, Clone)]
pub struct MatchList {
    pub string_num: u32,
    pub matches: Vec<SeedMatch>,
    pub consistent: bool,
    diag_sum: f64,
    diag_ct: u32,
}

impl MatchList {
    fn new(string_num: u32) -> Self {
        MatchList {
            string_num,
            matches: Vec::<SeedMatch>::with_capacity(4),
            consistent: true,
            diag_sum: 0.0,
            diag_ct: 0,
        }
    }

    pub fn avg_diagonal(&self) -> f64 {
        if self.diag_ct == 0 {
            0.0
        } else {
            self.diag_sum / self.diag_ct as f64
        }
    }

    pub fn hits(&self) -> u32 {
        self.diag_ct
    }

    fn add_hit(&mut self, query_offset: i32, target_offset: i32, k: i32, skip: i32) {
        self.diag_sum += (target_offset - query_offset) as f64;
        self.diag_ct += 1;
        self.add_match(query_offset, target_offset, k, skip);
    }

    /// Extend the run ending just before `query_offset` on the same
    /// diagonal, or start a new one.
    pub fn add_match(&mut self, query_offset: i32, target_offset: i32, k: i32, skip: i32) {
        let new_diag = target_offset - query_offset;
        let mut num_checked = 0;
        let mut move_to_front = false;
        let mut diag = 0;
        let mut expected_start = 0;

        for i in (0..self.matches.len()).rev() {
            let m = self.matches[i];
            expected_start = m.start + m.len - k + 1 + skip;
            diag = m.diagonal();
            if expected_start < query_offset {
                break;
            }
            if expected_start == query_offset {
                if new_diag == diag {
                    self.matches[i].len += 1 + skip;
                    if move_to_front {
                        let m = self.matches.remove(i);
                        self.matches.push(m);
                    }
                    return;
                } else {
                    move_to_front = true;
                }
            }
            num_checked += 1;
        }

        if !self.matches.is_empty()
            && (num_checked > 0
                || (diag - new_diag).abs() > 3
                || query_offset < expected_start + k - 2)
        {
            self.consistent = false;
        }

        self.matches.push(SeedMatch {
            start: query_offset,
            offset: target_offset,
            len: k,
        });
    }

    /// The longest run; ties go to the newest.
    pub fn longest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for i in (0..self.matches.len()).rev() {
            match best {
                Some(b) if self.matches[i].len <= self.matches[b].len => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

/// Screening state of the query read in its current orientation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct QueryScreen {
    pub left_end_screened: bool,
    pub right_end_screened: bool,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct SeedStats {
    pub windows: u64,
    pub screened: u64,
    pub kmer_hits: u64,
}

/// Decides which read of a pair does the alignment, so that each pair is
/// aligned from one side only.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PairRule {
    pub all_pairs: bool,
    pub hash_range: (u32, u32),
    pub old_range: (u32, u32),
}

impl PairRule {
    pub fn new(params: &Parameters, hash_range: (u32, u32), old_range: (u32, u32)) -> Self {
        PairRule {
            all_pairs: params.all_pairs,
            hash_range,
            old_range,
        }
    }

    /// In all-pairs mode a lower target is still skipped when the pair also
    /// comes up with the target as the query: the target is streamed and
    /// the query is hashed.
    pub fn responsible(&self, query_iid: u32, target_iid: u32) -> bool {
        if target_iid > query_iid {
            return true;
        }
        if !self.all_pairs || target_iid == query_iid {
            return false;
        }
        let within = |r: (u32, u32), iid: u32| r.0 <= iid && iid <= r.1;
        !(within(self.old_range, target_iid) && within(self.hash_range, query_iid))
    }
}

/// Per-worker seed bookkeeping, reused from query to query.
pub struct SeedCollector {
    lists: Vec<MatchList>,
    slot: FxHashMap<u32, usize>,
    rule: Option<PairRule>,
    pub stats: SeedStats,
}

impl Default for SeedCollector {
    fn default() -> Self {
        SeedCollector::new()
    }
}

impl SeedCollector {
    pub fn new() -> Self {
        SeedCollector {
            lists: Vec::<MatchList>::with_capacity(256),
            slot: FxHashMap::<u32, usize>::default(),
            rule: None,
            stats: SeedStats::default(),
        }
    }

    /// Without a rule the whole IID space is both hashed and streamed.
    pub fn with_pair_rule(mut self, rule: PairRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn clear(&mut self) {
        self.lists.clear();
        self.slot.clear();
    }

    pub fn num_targets(&self) -> usize {
        self.lists.len()
    }

    pub fn list(&self, string_num: u32) -> Option<&MatchList> {
        self.slot.get(&string_num).map(|&i| &self.lists[i])
    }

    pub fn add_ref(&mut self, string_num: u32, query_offset: i32, target_offset: i32, k: i32, skip: i32) {
        let lists = &mut self.lists;
        let i = *self.slot.entry(string_num).or_insert_with(|| {
            lists.push(MatchList::new(string_num));
            lists.len() - 1
        });
        lists[i].add_hit(query_offset, target_offset, k, skip);
        self.stats.kmer_hits += 1;
    }

    /// Walk the k-mers of `seq` (the query `query_iid` in its current
    /// orientation) and record every hit to a target that this query is
    /// responsible for.
    pub fn collect(
        &mut self,
        index: &HashIndex,
        seq: &[u8],
        query_iid: u32,
        filter: Option<&dyn KmerFilter>,
        params: &Parameters,
    ) -> QueryScreen {
        self.clear();
        let mut screen = QueryScreen::default();
        let k = index.k();
        let stride = params.kmer_skip as usize + 1;
        let hopeless = params.hopeless_match as usize;
        let len = seq.len();
        let rule = self
            .rule
            .unwrap_or_else(|| PairRule::new(params, (0, u32::MAX), (0, u32::MAX)));

        for (offset, key) in KmerIter::new(seq, k) {
            if offset % stride != 0 {
                continue;
            }
            self.stats.windows += 1;
            if let Some(filter) = filter {
                if filter.may_contain(canonical_key(key, k)) {
                    self.stats.screened += 1;
                    if offset < hopeless {
                        screen.left_end_screened = true;
                    }
                    if len - offset - (k as usize) + 1 < hopeless {
                        screen.right_end_screened = true;
                    }
                    continue;
                }
            }
            for occ in index.find(key, &seq[offset..]) {
                let target_iid = index.read(occ.string_num).iid;
                if rule.responsible(query_iid, target_iid) {
                    self.add_ref(
                        occ.string_num,
                        offset as i32,
                        occ.offset as i32,
                        k as i32,
                        params.kmer_skip as i32,
                    );
                }
            }
        }
        screen
    }

    /// Hand out the collected lists in processing order. Returns the lists
    /// and the index of the first list with a non-negative average diagonal
    /// when the targets were sorted by diagonal, `None` otherwise.
    pub fn take_targets(&mut self, frag_olap_limit: u32) -> (Vec<MatchList>, Option<usize>) {
        self.slot.clear();
        let mut lists = std::mem::replace(&mut self.lists, Vec::<MatchList>::with_capacity(256));
        if lists.len() <= frag_olap_limit as usize {
            return (lists, None);
        }
        lists.sort_by(|a, b| {
            a.avg_diagonal()
                .partial_cmp(&b.avg_diagonal())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let split = lists
            .iter()
            .position(|l| l.avg_diagonal() >= 0.0)
            .unwrap_or(lists.len());
        (lists, Some(split))
    }
}
