// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// open addressing k-mer index over one batch of reads ("hash reads")

use super::config::Parameters;
use super::error::{OvlError, OvlResult};
use super::kmer::{canonical_key, encode_kmer, KmerIter};
use super::read_store::{ReadCursor, ReadStore};
use super::skip_filter::KmerFilter;
use std::sync::Arc;

pub const ENTRIES_PER_BUCKET: usize = 8;
pub const HIGHEST_KMER_LIMIT: u8 = 255;

const CHECK_MASK: u64 = 0xff;
const HASH_CHECK_MASK: u64 = 0x1f;
const PROBE_MASK: u64 = 0x3e;

const LAST_BIT: u64 = 1 << 63;
const EMPTY_BIT: u64 = 1 << 62;
const PAYLOAD_MASK: u64 = EMPTY_BIT - 1;

/// One packed occurrence word: `[last:1][empty:1][offset][string number]`.
/// After coalescing, a non-last head stores an arena index in the payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KmerRef(u64);

impl Default for KmerRef {
    fn default() -> Self {
        KmerRef(EMPTY_BIT)
    }
}

impl KmerRef {
    #[inline(always)]
    pub fn is_last(&self) -> bool {
        self.0 & LAST_BIT != 0
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0 & EMPTY_BIT != 0
    }

    #[inline(always)]
    fn payload(&self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    fn arena(index: usize) -> Self {
        KmerRef(index as u64 & PAYLOAD_MASK)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct RefLayout {
    pub offset_bits: u32,
    pub string_bits: u32,
}

impl RefLayout {
    pub fn new(offset_bits: u32) -> Self {
        let string_bits = std::cmp::min(62 - offset_bits, 32);
        RefLayout {
            offset_bits,
            string_bits,
        }
    }

    pub fn max_strings(&self) -> u64 {
        1u64 << self.string_bits
    }

    #[inline(always)]
    pub fn pack(&self, string_num: u32, offset: u32, last: bool) -> KmerRef {
        let mut x = (string_num as u64) | ((offset as u64) << self.string_bits);
        if last {
            x |= LAST_BIT;
        }
        KmerRef(x)
    }

    #[inline(always)]
    pub fn string_num(&self, r: KmerRef) -> u32 {
        (r.0 & ((1u64 << self.string_bits) - 1)) as u32
    }

    #[inline(always)]
    pub fn offset(&self, r: KmerRef) -> u32 {
        ((r.0 >> self.string_bits) & ((1u64 << self.offset_bits) - 1)) as u32
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KmerOccurrence {
    pub string_num: u32,
    pub offset: u32,
}

#[derive(Copy, Clone)]
struct HashBucket {
    entry: [KmerRef; ENTRIES_PER_BUCKET],
    check: [u8; ENTRIES_PER_BUCKET],
    hits: [u8; ENTRIES_PER_BUCKET],
    count: u8,
}

impl Default for HashBucket {
    fn default() -> Self {
        HashBucket {
            entry: [KmerRef::default(); ENTRIES_PER_BUCKET],
            check: [0; ENTRIES_PER_BUCKET],
            hits: [0; ENTRIES_PER_BUCKET],
            count: 0,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct HashFunctions {
    hsf1: u32,
    hsf2: u32,
    sv1: u32,
    sv2: u32,
    sv3: u32,
    mask: u64,
}

fn clamp_shift(s: i64) -> u32 {
    s.max(1).min(63) as u32
}

impl HashFunctions {
    fn new(k: u32, bits: u32) -> Self {
        let (k, b) = (k as i64, bits as i64);
        let hsf1 = k - b / 2;
        let hsf2 = 2 * k - b;
        HashFunctions {
            hsf1: clamp_shift(hsf1),
            hsf2: clamp_shift(hsf2),
            sv1: clamp_shift(hsf1 + 2),
            sv2: clamp_shift((hsf1 + hsf2) / 2),
            sv3: clamp_shift(hsf2 - 2),
            mask: (1u64 << bits) - 1,
        }
    }

    #[inline(always)]
    fn bucket(&self, key: u64) -> usize {
        ((key ^ (key >> self.hsf1) ^ (key >> self.hsf2)) & self.mask) as usize
    }

    #[inline(always)]
    fn check(&self, key: u64) -> u8 {
        ((key ^ (key >> self.sv1) ^ (key >> self.sv2)) & CHECK_MASK) as u8
    }

    #[inline(always)]
    fn check_bit(&self, key: u64) -> u32 {
        1u32 << ((key ^ (key >> self.sv1) ^ (key >> self.sv3)) & HASH_CHECK_MASK)
    }

    // always odd, so a power of two table is fully covered
    #[inline(always)]
    fn probe(&self, key: u64) -> usize {
        (((key ^ (key >> self.sv2) ^ (key >> self.sv3)) & PROBE_MASK) + 1) as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexedRead {
    pub iid: u32,
    pub start: usize,
    pub len: usize,
    pub left_end_screened: bool,
    pub right_end_screened: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    pub loaded: u32,
    pub deleted: u32,
    pub too_long: u32,
    pub screened_kmers: u64,
}

pub struct HashIndex {
    k: u32,
    layout: RefLayout,
    fns: HashFunctions,
    buckets: Vec<HashBucket>,
    check_vector: Vec<u32>,
    data: Vec<u8>,
    quality: Vec<u8>,
    reads: Vec<IndexedRead>,
    next_ref: Vec<KmerRef>,
    arena: Vec<KmerRef>,
    coalesced: bool,
    entries: u64,
    max_entries: u64,
    max_strings: u32,
    max_data_len: u64,
    max_read_len: u32,
    hopeless_match: u32,
    ignore_clear_range: bool,
    first_iid: u32,
    filter: Option<Arc<dyn KmerFilter>>,
    pub stats: BuildStats,
}

impl HashIndex {
    pub fn new(params: &Parameters, first_iid: u32) -> Self {
        let table_size = 1usize << params.hash_bits;
        let max_entries =
            (params.max_hash_load * table_size as f64 * ENTRIES_PER_BUCKET as f64) as u64;
        let layout = RefLayout::new(params.offset_bits());
        HashIndex {
            k: params.k,
            layout,
            fns: HashFunctions::new(params.k, params.hash_bits),
            buckets: vec![HashBucket::default(); table_size],
            check_vector: vec![0; table_size],
            data: Vec::<u8>::with_capacity(1 << 16),
            quality: Vec::<u8>::with_capacity(1 << 16),
            reads: Vec::<IndexedRead>::with_capacity(1024),
            next_ref: Vec::<KmerRef>::with_capacity(1 << 16),
            arena: Vec::<KmerRef>::new(),
            coalesced: false,
            entries: 0,
            max_entries,
            max_strings: std::cmp::min(params.max_hash_strings as u64, layout.max_strings()) as u32,
            max_data_len: params.max_hash_data_len,
            max_read_len: params.max_read_len,
            hopeless_match: params.hopeless_match,
            ignore_clear_range: params.ignore_clear_range,
            first_iid,
            filter: None,
            stats: BuildStats::default(),
        }
    }

    pub fn with_filter(mut self, filter: Option<Arc<dyn KmerFilter>>) -> Self {
        self.filter = filter;
        self
    }

    /// Load reads from `lo` until the batch limits are reached or `hi` is
    /// passed, then freeze the index. `None` when no read was loaded.
    pub fn build<S: ReadStore + ?Sized>(
        store: &S,
        lo: u32,
        hi: u32,
        params: &Parameters,
        filter: Option<Arc<dyn KmerFilter>>,
    ) -> OvlResult<Option<HashIndex>> {
        let mut cursor = ReadCursor::new(store, lo, hi);
        let first_iid = cursor.peek_iid();
        let mut index = HashIndex::new(params, first_iid).with_filter(filter);

        while !index.is_full() {
            let rec = match cursor.next_read() {
                Some(rec) => rec,
                None => break,
            };
            while index.next_iid() < rec.iid {
                index.add_read(&[], &[])?;
            }
            if rec.deleted {
                index.stats.deleted += 1;
                index.add_read(&[], &[])?;
                continue;
            }
            let len = rec.working_len(index.ignore_clear_range);
            if len > index.max_read_len as usize {
                let e = OvlError::ReadTooLong {
                    iid: rec.iid,
                    len,
                    max: index.max_read_len as usize,
                };
                log::warn!("skip hash read: {}", e);
                index.stats.too_long += 1;
                index.add_read(&[], &[])?;
                continue;
            }
            let (seq, qual) = rec.working_copy(index.ignore_clear_range);
            index.add_read(&seq, &qual)?;
            index.stats.loaded += 1;
        }

        if index.reads.is_empty() {
            return Ok(None);
        }
        log::info!(
            "hash batch {}-{}: String_Ct: {} totalLen: {} Hash_Entries: {} Load: {:.1}%",
            index.first_iid,
            index.last_iid(),
            index.reads.len(),
            index.data.len(),
            index.entries,
            100.0 * index.load()
        );
        index.coalesce();
        Ok(Some(index))
    }

    pub fn is_full(&self) -> bool {
        self.reads.len() >= self.max_strings as usize
            || self.data.len() as u64 >= self.max_data_len
            || self.entries >= self.max_entries
    }

    fn next_iid(&self) -> u32 {
        self.first_iid + self.reads.len() as u32
    }

    /// Append the next read of the batch (an empty `seq` keeps the numbering
    /// for deleted or skipped reads) and index its k-mers.
    pub fn add_read(&mut self, seq: &[u8], qual: &[u8]) -> OvlResult<u32> {
        if self.coalesced {
            return Err(OvlError::AlignmentInvariant(
                "add_read on a frozen hash index".to_string(),
            ));
        }
        let string_num = self.reads.len() as u32;
        let start = self.data.len();
        self.data.extend_from_slice(seq);
        self.data.push(0);
        self.quality.extend_from_slice(qual);
        self.quality.resize(self.data.len(), 0);
        self.next_ref.resize(self.data.len(), KmerRef::default());
        self.reads.push(IndexedRead {
            iid: self.first_iid + string_num,
            start,
            len: seq.len(),
            left_end_screened: false,
            right_end_screened: false,
        });

        let k = self.k;
        let len = seq.len();
        for (offset, key) in KmerIter::new(seq, k) {
            if let Some(filter) = &self.filter {
                if filter.may_contain(canonical_key(key, k)) {
                    self.stats.screened_kmers += 1;
                    let read = &mut self.reads[string_num as usize];
                    if offset < self.hopeless_match as usize {
                        read.left_end_screened = true;
                    }
                    if len - offset - k as usize + 1 < self.hopeless_match as usize {
                        read.right_end_screened = true;
                    }
                    continue;
                }
            }
            self.insert(key, string_num, offset as u32)?;
        }
        Ok(string_num)
    }

    #[inline(always)]
    fn ref_pos(&self, r: KmerRef) -> usize {
        self.reads[self.layout.string_num(r) as usize].start + self.layout.offset(r) as usize
    }

    #[inline(always)]
    fn first_ref(&self, entry: KmerRef) -> KmerRef {
        if self.coalesced && !entry.is_last() {
            self.arena[entry.payload() as usize]
        } else {
            entry
        }
    }

    #[inline(always)]
    fn entry_matches(&self, entry: KmerRef, kmer: &[u8]) -> bool {
        let p = self.ref_pos(self.first_ref(entry));
        &self.data[p..p + self.k as usize] == kmer
    }

    pub fn insert(&mut self, key: u64, string_num: u32, offset: u32) -> OvlResult<()> {
        let k = self.k as usize;
        let pos = self.reads[string_num as usize].start + offset as usize;
        let check = self.fns.check(key);
        let probe = self.fns.probe(key);
        let mut sub = self.fns.bucket(key);
        self.check_vector[sub] |= self.fns.check_bit(key);

        for _ in 0..self.buckets.len() {
            let found = {
                let bucket = &self.buckets[sub];
                let kmer = &self.data[pos..pos + k];
                (0..bucket.count as usize)
                    .find(|&i| bucket.check[i] == check && self.entry_matches(bucket.entry[i], kmer))
            };
            if let Some(i) = found {
                // prepend; the chain keeps its original tail marked last
                self.next_ref[pos] = self.buckets[sub].entry[i];
                let bucket = &mut self.buckets[sub];
                bucket.entry[i] = self.layout.pack(string_num, offset, false);
                if bucket.hits[i] < HIGHEST_KMER_LIMIT {
                    bucket.hits[i] += 1;
                }
                return Ok(());
            }
            let bucket = &mut self.buckets[sub];
            let i = bucket.count as usize;
            if i < ENTRIES_PER_BUCKET {
                bucket.entry[i] = self.layout.pack(string_num, offset, true);
                bucket.check[i] = check;
                bucket.hits[i] = 1;
                bucket.count += 1;
                self.entries += 1;
                return Ok(());
            }
            sub = (sub + probe) & self.fns.mask as usize;
        }
        Err(OvlError::CapacityExceeded {
            key,
            entries: self.entries,
            buckets: self.buckets.len() as u64,
        })
    }

    /// Rewrite every chain into one contiguous run of the arena and freeze
    /// the index.
    pub fn coalesce(&mut self) {
        if self.coalesced {
            return;
        }
        let mut arena = Vec::<KmerRef>::with_capacity(self.data.len() / 4);
        for b in 0..self.buckets.len() {
            for i in 0..self.buckets[b].count as usize {
                let head = self.buckets[b].entry[i];
                if head.is_last() {
                    continue;
                }
                let start = arena.len();
                let mut r = head;
                loop {
                    arena.push(r);
                    if r.is_last() {
                        break;
                    }
                    r = self.next_ref[self.ref_pos(r)];
                }
                self.buckets[b].entry[i] = KmerRef::arena(start);
            }
        }
        self.arena = arena;
        self.next_ref = Vec::new();
        self.coalesced = true;
    }

    /// All occurrences of the k-mer `window[..k]` with packed key `key`.
    pub fn find<'a>(&'a self, key: u64, window: &[u8]) -> Occurrences<'a> {
        let none = Occurrences {
            index: self,
            state: Cursor::Done,
        };
        let mut sub = self.fns.bucket(key);
        if self.check_vector[sub] & self.fns.check_bit(key) == 0 {
            return none;
        }
        let kmer = &window[..self.k as usize];
        let check = self.fns.check(key);
        let probe = self.fns.probe(key);
        for _ in 0..self.buckets.len() {
            let bucket = &self.buckets[sub];
            for i in 0..bucket.count as usize {
                if bucket.check[i] == check && self.entry_matches(bucket.entry[i], kmer) {
                    let entry = bucket.entry[i];
                    let state = if entry.is_last() {
                        Cursor::Single(entry)
                    } else if self.coalesced {
                        Cursor::Arena(entry.payload() as usize)
                    } else {
                        Cursor::Chain(entry)
                    };
                    return Occurrences { index: self, state };
                }
            }
            if (bucket.count as usize) < ENTRIES_PER_BUCKET {
                return none;
            }
            sub = (sub + probe) & self.fns.mask as usize;
        }
        none
    }

    pub fn lookup<'a>(&'a self, kmer: &[u8]) -> Occurrences<'a> {
        match encode_kmer(kmer, 0, self.k) {
            Some(key) => self.find(key, kmer),
            None => Occurrences {
                index: self,
                state: Cursor::Done,
            },
        }
    }

    pub fn hits(&self, kmer: &[u8]) -> u8 {
        let key = match encode_kmer(kmer, 0, self.k) {
            Some(key) => key,
            None => return 0,
        };
        let check = self.fns.check(key);
        let probe = self.fns.probe(key);
        let mut sub = self.fns.bucket(key);
        for _ in 0..self.buckets.len() {
            let bucket = &self.buckets[sub];
            for i in 0..bucket.count as usize {
                if bucket.check[i] == check && self.entry_matches(bucket.entry[i], kmer) {
                    return bucket.hits[i];
                }
            }
            if (bucket.count as usize) < ENTRIES_PER_BUCKET {
                return 0;
            }
            sub = (sub + probe) & self.fns.mask as usize;
        }
        0
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn first_iid(&self) -> u32 {
        self.first_iid
    }

    pub fn last_iid(&self) -> u32 {
        self.first_iid + self.reads.len() as u32 - 1
    }

    pub fn num_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn load(&self) -> f64 {
        self.entries as f64 / (self.buckets.len() * ENTRIES_PER_BUCKET) as f64
    }

    pub fn read(&self, string_num: u32) -> &IndexedRead {
        &self.reads[string_num as usize]
    }

    pub fn string_num(&self, iid: u32) -> Option<u32> {
        if iid < self.first_iid || iid > self.last_iid() {
            None
        } else {
            Some(iid - self.first_iid)
        }
    }

    pub fn seq(&self, string_num: u32) -> &[u8] {
        let r = &self.reads[string_num as usize];
        &self.data[r.start..r.start + r.len]
    }

    pub fn qual(&self, string_num: u32) -> &[u8] {
        let r = &self.reads[string_num as usize];
        &self.quality[r.start..r.start + r.len]
    }
}

enum Cursor {
    Done,
    Single(KmerRef),
    Chain(KmerRef),
    Arena(usize),
}

pub struct Occurrences<'a> {
    index: &'a HashIndex,
    state: Cursor,
}

impl<'a> Iterator for Occurrences<'a> {
    type Item = KmerOccurrence;

    fn next(&mut self) -> Option<KmerOccurrence> {
        let index = self.index;
        let r = match self.state {
            Cursor::Done => return None,
            Cursor::Single(r) => {
                self.state = Cursor::Done;
                r
            }
            Cursor::Chain(r) => {
                self.state = if r.is_last() {
                    Cursor::Done
                } else {
                    Cursor::Chain(index.next_ref[index.ref_pos(r)])
                };
                r
            }
            Cursor::Arena(i) => {
                let r = index.arena[i];
                self.state = if r.is_last() {
                    Cursor::Done
                } else {
                    Cursor::Arena(i + 1)
                };
                r
            }
        };
        Some(KmerOccurrence {
            string_num: index.layout.string_num(r),
            offset: index.layout.offset(r),
        })
    }
}
