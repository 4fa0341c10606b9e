// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// a FASTA/FASTQ backed read store; reads are numbered from 1 in input order

use super::error::{OvlError, OvlResult};
use super::seqcodec::normalize;
use flate2::bufread::MultiGzDecoder;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader, SeekFrom};

pub const DEFAULT_QUALITY: u8 = 20;

pub struct SeqRec {
    pub id: Vec<u8>,
    pub desc: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

enum Fastx {
    FastQ,
    FastA,
}

pub struct FastxReader<R> {
    inner: R,
    t: Fastx,
}

fn strip_eol(buf: &mut Vec<u8>) {
    while let Some(&c) = buf.last() {
        if c == b'\n' || c == b'\r' {
            buf.pop();
        } else {
            break;
        }
    }
}

fn split_header(line: &[u8]) -> (Vec<u8>, Vec<u8>) {
    match line.iter().position(|&c| c == b' ' || c == b'\t') {
        Some(p) => (line[..p].to_vec(), line[p + 1..].to_vec()),
        None => (line.to_vec(), Vec::new()),
    }
}

impl<R: BufRead> FastxReader<R> {
    pub fn new(mut inner: R, filename: &str) -> Result<Self, io::Error> {
        let t: Fastx;
        {
            // peek the first byte to decide if it is fasta or fastq, the
            // record marker is consumed here
            let r = inner.by_ref();
            let mut buf = Vec::<u8>::new();
            r.take(1).read_to_end(&mut buf)?;
            if buf.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("empty file: {}", filename),
                ));
            }
            t = match buf[0] {
                b'>' => Fastx::FastA,
                b'@' => Fastx::FastQ,
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("not a fasta/fastq file: {}", filename),
                    ))
                }
            };
        }
        Ok(Self { inner, t })
    }

    pub fn next_rec(&mut self) -> Option<io::Result<SeqRec>> {
        match self.t {
            Fastx::FastA => self.fasta_next_rec(),
            Fastx::FastQ => self.fastq_next_rec(),
        }
    }

    fn fasta_next_rec(&mut self) -> Option<io::Result<SeqRec>> {
        let mut header = Vec::<u8>::with_capacity(512);
        match self.inner.read_until(b'\n', &mut header) {
            Err(e) => return Some(Err(e)),
            Ok(0) => return None,
            Ok(_) => (),
        }
        strip_eol(&mut header);
        let (id, desc) = split_header(&header);

        let mut seq = Vec::<u8>::with_capacity(1 << 14);
        if let Err(e) = self.inner.read_until(b'>', &mut seq) {
            return Some(Err(e));
        }
        let seq = seq
            .into_iter()
            .filter(|c| *c != b'\n' && *c != b'>' && *c != b'\r')
            .collect();
        Some(Ok(SeqRec {
            id,
            desc,
            seq,
            qual: None,
        }))
    }

    fn fastq_next_rec(&mut self) -> Option<io::Result<SeqRec>> {
        let mut header = Vec::<u8>::with_capacity(512);
        match self.inner.read_until(b'\n', &mut header) {
            Err(e) => return Some(Err(e)),
            Ok(0) => return None,
            Ok(_) => (),
        }
        strip_eol(&mut header);
        let (id, desc) = split_header(&header);

        let mut seq = Vec::<u8>::with_capacity(1 << 14);
        let mut plus = Vec::<u8>::with_capacity(512);
        let mut qual = Vec::<u8>::with_capacity(1 << 14);
        for buf in [&mut seq, &mut plus, &mut qual].iter_mut() {
            if let Err(e) = self.inner.read_until(b'\n', buf) {
                return Some(Err(e));
            }
            strip_eol(buf);
        }
        // skip the marker of the next record
        let mut marker = Vec::<u8>::with_capacity(1);
        if let Err(e) = self.inner.by_ref().take(1).read_to_end(&mut marker) {
            return Some(Err(e));
        }
        if qual.len() != seq.len() {
            return Some(Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "quality length mismatch for {}",
                    String::from_utf8_lossy(&id)
                ),
            )));
        }
        let qual = qual.into_iter().map(|q| q.saturating_sub(33)).collect();
        Some(Ok(SeqRec {
            id,
            desc,
            seq,
            qual: Some(qual),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub iid: u32,
    pub name: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub clear: (u32, u32),
    pub deleted: bool,
}

impl ReadRecord {
    /// Working copy of the read: lower case, restricted to the clear range
    /// unless `ignore_clear_range`, with matching qualities.
    pub fn working_copy(&self, ignore_clear_range: bool) -> (Vec<u8>, Vec<u8>) {
        let (bgn, end) = if ignore_clear_range {
            (0, self.seq.len())
        } else {
            (self.clear.0 as usize, self.clear.1 as usize)
        };
        (normalize(&self.seq[bgn..end]), self.qual[bgn..end].to_vec())
    }

    pub fn working_len(&self, ignore_clear_range: bool) -> usize {
        if ignore_clear_range {
            self.seq.len()
        } else {
            (self.clear.1 - self.clear.0) as usize
        }
    }
}

pub trait ReadStore: Send + Sync {
    fn get_read(&self, iid: u32) -> Option<&ReadRecord>;
    fn last_iid(&self) -> u32;

    fn first_iid(&self) -> u32 {
        1
    }
}

/// Monotonic stream over `[lo, hi]`; IIDs missing from the store are skipped.
pub struct ReadCursor<'a, S: ReadStore + ?Sized> {
    store: &'a S,
    next: u32,
    hi: u32,
}

impl<'a, S: ReadStore + ?Sized> ReadCursor<'a, S> {
    pub fn new(store: &'a S, lo: u32, hi: u32) -> Self {
        let lo = std::cmp::max(lo, store.first_iid());
        let hi = std::cmp::min(hi, store.last_iid());
        ReadCursor { store, next: lo, hi }
    }

    pub fn next_read(&mut self) -> Option<&'a ReadRecord> {
        while self.next <= self.hi {
            let iid = self.next;
            self.next += 1;
            if let Some(rec) = self.store.get_read(iid) {
                return Some(rec);
            }
        }
        None
    }

    pub fn peek_iid(&self) -> u32 {
        self.next
    }
}

#[derive(Default)]
pub struct FastxReadStore {
    reads: Vec<ReadRecord>,
}

fn parse_clear_range(desc: &[u8], len: usize) -> (u32, u32) {
    lazy_static! {
        static ref CLR: Regex = Regex::new(r"clr=(\d+),(\d+)").unwrap();
    }
    let whole = (0, len as u32);
    let caps = match CLR.captures(desc) {
        Some(caps) => caps,
        None => return whole,
    };
    let num = |i: usize| -> Option<usize> {
        std::str::from_utf8(caps.get(i)?.as_bytes())
            .ok()?
            .parse::<usize>()
            .ok()
    };
    match (num(1), num(2)) {
        (Some(bgn), Some(end)) => {
            let end = std::cmp::min(end, len);
            let bgn = std::cmp::min(bgn, end);
            (bgn as u32, end as u32)
        }
        _ => whole,
    }
}

impl FastxReadStore {
    pub fn new() -> Self {
        FastxReadStore { reads: Vec::new() }
    }

    pub fn add_record(&mut self, rec: SeqRec) -> u32 {
        let iid = self.reads.len() as u32 + 1;
        let SeqRec { id, desc, seq, qual } = rec;
        let qual = qual.unwrap_or_else(|| vec![DEFAULT_QUALITY; seq.len()]);
        let clear = parse_clear_range(&desc, seq.len());
        let deleted = seq.is_empty();
        self.reads.push(ReadRecord {
            iid,
            name: String::from_utf8_lossy(&id).into_owned(),
            seq,
            qual,
            clear,
            deleted,
        });
        iid
    }

    pub fn add_read(&mut self, name: &str, seq: &[u8]) -> u32 {
        self.add_record(SeqRec {
            id: name.as_bytes().to_vec(),
            desc: Vec::new(),
            seq: seq.to_vec(),
            qual: None,
        })
    }

    pub fn mark_deleted(&mut self, iid: u32) {
        if let Some(rec) = self.reads.get_mut(iid as usize - 1) {
            rec.deleted = true;
        }
    }

    pub fn load_file(&mut self, filepath: &str) -> OvlResult<usize> {
        let file = File::open(filepath)?;
        let mut reader = BufReader::new(file);
        let mut is_gzfile = false;
        {
            let r = reader.by_ref();
            let mut buf = Vec::<u8>::new();
            r.take(2).read_to_end(&mut buf)?;
            if buf == [0x1F_u8, 0x8B_u8] {
                log::info!("input file: {} detected as gz-compressed file", filepath);
                is_gzfile = true;
            }
        }
        reader.seek(SeekFrom::Start(0))?;

        let before = self.reads.len();
        if is_gzfile {
            let fastx_buf = BufReader::new(MultiGzDecoder::new(&mut reader));
            let mut fastx_reader = FastxReader::new(fastx_buf, filepath)?;
            while let Some(rec) = fastx_reader.next_rec() {
                self.add_record(rec?);
            }
        } else {
            let mut fastx_reader = FastxReader::new(reader, filepath)?;
            while let Some(rec) = fastx_reader.next_rec() {
                self.add_record(rec?);
            }
        }
        Ok(self.reads.len() - before)
    }

    /// `seq_list_file` holds one FASTA/FASTQ path per line
    pub fn load(seq_list_file: &str) -> OvlResult<Self> {
        let mut store = FastxReadStore::new();
        let seq_list_buf = BufReader::new(File::open(seq_list_file)?);
        for fastx_file in seq_list_buf.lines() {
            let fastx_file = fastx_file?;
            let fastx_file = fastx_file.trim();
            if fastx_file.is_empty() {
                continue;
            }
            let n = store.load_file(fastx_file)?;
            log::info!("read {} records from {}", n, fastx_file);
        }
        if store.reads.is_empty() {
            return Err(OvlError::Configuration(format!(
                "no reads found in {}",
                seq_list_file
            )));
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn total_bases(&self) -> usize {
        self.reads.iter().map(|r| r.seq.len()).sum()
    }
}

impl ReadStore for FastxReadStore {
    fn get_read(&self, iid: u32) -> Option<&ReadRecord> {
        if iid == 0 {
            return None;
        }
        self.reads.get(iid as usize - 1)
    }

    fn last_iid(&self) -> u32 {
        self.reads.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn fasta_and_fastq() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("r.fa");
        std::fs::write(&fa, ">r1 clr=2,10\nACGTAC\nGTACGT\n>r2\nAAAA\n>r3\n\n").unwrap();
        let fq = dir.path().join("r.fq.gz");
        {
            let mut gz = GzEncoder::new(File::create(&fq).unwrap(), Compression::default());
            gz.write_all(b"@q1 sample\nACGT\n+\n!+5I\n@q2\nGG\n+\n@@\n")
                .unwrap();
            gz.finish().unwrap();
        }
        let list = dir.path().join("list");
        std::fs::write(
            &list,
            format!("{}\n{}\n", fa.to_str().unwrap(), fq.to_str().unwrap()),
        )
        .unwrap();

        let store = FastxReadStore::load(list.to_str().unwrap()).unwrap();
        assert_eq!(store.len(), 5);
        let r1 = store.get_read(1).unwrap();
        assert_eq!(r1.name, "r1");
        assert_eq!(r1.seq, b"ACGTACGTACGT".to_vec());
        assert_eq!(r1.clear, (2, 10));
        assert_eq!(r1.qual, vec![DEFAULT_QUALITY; 12]);
        assert_eq!(r1.working_copy(false).0, b"gtacgtac".to_vec());
        assert_eq!(r1.working_len(true), 12);
        assert!(store.get_read(3).unwrap().deleted);

        let q1 = store.get_read(4).unwrap();
        assert_eq!(q1.qual, vec![0, 10, 20, 40]);
        assert_eq!(q1.clear, (0, 4));
        assert_eq!(store.get_read(5).unwrap().qual, vec![31, 31]);
        assert!(store.get_read(6).is_none());
        assert!(store.get_read(0).is_none());
    }

    #[test]
    fn unreadable_input_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FastxReadStore::new();
        match store.load_file(dir.path().to_str().unwrap()) {
            Err(OvlError::Io(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
            Ok(n) => panic!("read {} records from a directory", n),
        }
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn cursor_stays_in_range() {
        let mut store = FastxReadStore::new();
        for i in 0..6 {
            store.add_read(&format!("r{}", i), b"ACGTACGT");
        }
        let mut cursor = ReadCursor::new(&store, 2, 4);
        let iids: Vec<u32> = std::iter::from_fn(|| cursor.next_read().map(|r| r.iid)).collect();
        assert_eq!(iids, vec![2, 3, 4]);

        let mut cursor = ReadCursor::new(&store, 0, u32::MAX);
        let n = std::iter::from_fn(|| cursor.next_read()).count();
        assert_eq!(n, 6);
    }
}
