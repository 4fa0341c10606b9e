// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
//
// batch driver: hash a range of reads, stream the older reads against it
//
use super::banded::{AlignerTables, BandedAligner};
use super::config::Parameters;
use super::error::{OvlError, OvlResult};
use super::hash_index::HashIndex;
use super::log_resource;
use super::olap::{process_matches, refine_overlap, EndCounts, OverlapStats, QueryRead, TargetRead};
use super::ovs::{OverlapRecord, OverlapWriter, RECORD_BYTES};
use super::read_store::{ReadCursor, ReadRecord, ReadStore};
use super::seeds::{MatchList, PairRule, SeedCollector};
use super::seqcodec::{reverse_complement, reverse_complement_in_place};
use super::skip_filter::KmerFilter;
use super::{getrusage, rusage, RUSAGE_THREAD};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use threadpool::ThreadPool;

pub const FRAGS_PER_THREAD: u32 = 500;
pub const OUTPUT_BUFFER_LEN: usize = (1 << 20) / RECORD_BYTES;

/// Per thread state for aligning old reads against one frozen hash batch.
pub struct OverlapWorker<'a> {
    index: &'a HashIndex,
    params: &'a Parameters,
    filter: Option<&'a dyn KmerFilter>,
    aligner: BandedAligner<'a>,
    collector: SeedCollector,
    pub stats: OverlapStats,
    pub out: Vec<OverlapRecord>,
}

impl<'a> OverlapWorker<'a> {
    pub fn new(
        index: &'a HashIndex,
        params: &'a Parameters,
        tables: &'a AlignerTables,
        filter: Option<&'a dyn KmerFilter>,
        rule: PairRule,
    ) -> Self {
        OverlapWorker {
            index,
            params,
            filter,
            aligner: BandedAligner::new(tables),
            collector: SeedCollector::new().with_pair_rule(rule),
            stats: OverlapStats::default(),
            out: Vec::<OverlapRecord>::with_capacity(OUTPUT_BUFFER_LEN),
        }
    }

    /// Find the overlaps of one old read in both orientations.
    pub fn process_read(&mut self, rec: &ReadRecord) -> OvlResult<()> {
        if rec.deleted {
            self.stats.reads_deleted += 1;
            return Ok(());
        }
        let len = rec.working_len(self.params.ignore_clear_range);
        if len > self.params.max_read_len as usize {
            let e = OvlError::ReadTooLong {
                iid: rec.iid,
                len,
                max: self.params.max_read_len as usize,
            };
            log::warn!("skip read: {}", e);
            self.stats.reads_too_long += 1;
            return Ok(());
        }
        if len < self.params.min_olap_len as usize {
            log::debug!("read {} is too short, len = {}", rec.iid, len);
            self.stats.reads_too_short += 1;
            return Ok(());
        }
        self.stats.reads_processed += 1;

        let (mut seq, mut qual) = rec.working_copy(self.params.ignore_clear_range);
        self.find_overlaps(&seq, &qual, rec.iid, false)?;
        reverse_complement_in_place(&mut seq);
        qual.reverse();
        self.find_overlaps(&seq, &qual, rec.iid, true)?;
        Ok(())
    }

    fn find_overlaps(&mut self, seq: &[u8], qual: &[u8], iid: u32, reversed: bool) -> OvlResult<()> {
        let screen = self
            .collector
            .collect(self.index, seq, iid, self.filter, self.params);
        let (mut lists, split) = self.collector.take_targets(self.params.frag_olap_limit);
        let query = QueryRead {
            iid,
            seq,
            qual,
            reversed,
            screen,
        };
        let mut ends = EndCounts::default();
        let limit = self.params.frag_olap_limit;

        match split {
            None => {
                for list in lists.iter_mut() {
                    self.align_target(list, &query, &mut ends)?;
                }
            }
            Some(start) => {
                // targets off the A end first, then off the B end
                for list in lists[start..].iter_mut() {
                    if ends.a_olaps >= limit {
                        break;
                    }
                    self.align_target(list, &query, &mut ends)?;
                }
                for list in lists[..start].iter_mut().rev() {
                    if ends.b_olaps >= limit {
                        break;
                    }
                    self.align_target(list, &query, &mut ends)?;
                }
            }
        }
        Ok(())
    }

    fn align_target(&mut self, list: &mut MatchList, query: &QueryRead, ends: &mut EndCounts) -> OvlResult<()> {
        let sn = list.string_num;
        let info = self.index.read(sn);
        let target = TargetRead {
            iid: info.iid,
            seq: self.index.seq(sn),
            qual: self.index.qual(sn),
            left_end_screened: info.left_end_screened,
            right_end_screened: info.right_end_screened,
        };
        let first = self.out.len();
        process_matches(
            list,
            query,
            &target,
            &mut self.aligner,
            self.params,
            ends,
            &mut self.stats,
            &mut self.out,
        )?;
        if self.params.refine_overlaps && !self.params.partial_overlaps && self.out.len() > first {
            self.refine(first, query, &target);
        }
        Ok(())
    }

    // rerun the records just emitted for this pair through the full DP aligner
    fn refine(&mut self, first: usize, query: &QueryRead, target: &TargetRead) {
        let fwd_query = if query.reversed {
            reverse_complement(query.seq)
        } else {
            query.seq.to_vec()
        };
        for rec in self.out[first..].iter_mut() {
            let (a, b) = if rec.ids().0 == query.iid {
                (&fwd_query[..], target.seq)
            } else {
                (target.seq, &fwd_query[..])
            };
            if refine_overlap(rec, a, b, self.params) {
                self.stats.refined += 1;
            } else {
                self.stats.refine_failed += 1;
            }
        }
    }
}

fn flush_records<W: Write>(writer: &Mutex<OverlapWriter<W>>, out: &mut Vec<OverlapRecord>) -> OvlResult<()> {
    let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
    writer.write_all(out)?;
    out.clear();
    Ok(())
}

// take slices of old reads off the shared cursor until it passes `old_hi`
fn drain_cursor<S: ReadStore + ?Sized, W: Write>(
    worker: &mut OverlapWorker,
    store: &S,
    cursor: &AtomicU32,
    old_hi: u32,
    writer: &Mutex<OverlapWriter<W>>,
    failed: &Mutex<Option<OvlError>>,
) -> OvlResult<()> {
    loop {
        let lo = cursor.fetch_add(FRAGS_PER_THREAD, Ordering::SeqCst);
        if lo > old_hi {
            break;
        }
        if failed.lock().unwrap_or_else(PoisonError::into_inner).is_some() {
            break;
        }
        let hi = std::cmp::min(lo.saturating_add(FRAGS_PER_THREAD - 1), old_hi);
        let mut reads = ReadCursor::new(store, lo, hi);
        while let Some(rec) = reads.next_read() {
            worker.process_read(rec)?;
            if worker.out.len() >= OUTPUT_BUFFER_LEN {
                flush_records(writer, &mut worker.out)?;
            }
        }
    }
    flush_records(writer, &mut worker.out)
}

#[allow(clippy::too_many_arguments)]
fn process_old_reads<S: ReadStore + ?Sized, W: Write>(
    worker_id: usize,
    index: &HashIndex,
    store: &S,
    tables: &AlignerTables,
    params: &Parameters,
    filter: Option<&dyn KmerFilter>,
    rule: PairRule,
    cursor: &AtomicU32,
    old_hi: u32,
    writer: &Mutex<OverlapWriter<W>>,
    failed: &Mutex<Option<OvlError>>,
) -> OverlapStats {
    let mut worker = OverlapWorker::new(index, params, tables, filter, rule);
    let mut rdata: rusage = unsafe { std::mem::zeroed() };
    let _res = unsafe { getrusage(RUSAGE_THREAD, &mut rdata) };
    let start_utime = rdata.ru_utime.tv_sec;
    let start_stime = rdata.ru_stime.tv_sec;

    if let Err(e) = drain_cursor(&mut worker, store, cursor, old_hi, writer, failed) {
        log::error!("worker {}: {}", worker_id, e);
        let mut failed = failed.lock().unwrap_or_else(PoisonError::into_inner);
        if failed.is_none() {
            *failed = Some(e);
        }
    }

    let _res = unsafe { getrusage(RUSAGE_THREAD, &mut rdata) };
    log::info!(
        "worker {}: reads {}, overlaps {}, utime: {} s, stime: {} s",
        worker_id,
        worker.stats.reads_processed,
        worker.stats.total_overlaps,
        rdata.ru_utime.tv_sec - start_utime,
        rdata.ru_stime.tv_sec - start_stime
    );
    worker.stats
}

/// Find all overlaps between reads in `hash_range` and reads in `old_range`,
/// one hash batch at a time, writing records to `writer`.
pub fn ovlp<S, W>(
    store: Arc<S>,
    params: &Parameters,
    hash_range: (u32, u32),
    old_range: (u32, u32),
    filter: Option<Arc<dyn KmerFilter>>,
    writer: OverlapWriter<W>,
) -> OvlResult<(OverlapStats, OverlapWriter<W>)>
where
    S: ReadStore + 'static,
    W: Write + Send + 'static,
{
    let mut rdata: rusage = unsafe { std::mem::zeroed() };
    let tables = Arc::new(AlignerTables::new(params));
    let writer = Arc::new(Mutex::new(writer));
    let stats = Arc::new(Mutex::new(OverlapStats::default()));
    let failed = Arc::new(Mutex::new(None::<OvlError>));
    let pool = ThreadPool::new(params.nthreads as usize);
    let rule = PairRule::new(params, hash_range, old_range);

    let mut hash_lo = std::cmp::max(hash_range.0, store.first_iid());
    let hash_hi = std::cmp::min(hash_range.1, store.last_iid());
    let mut batch = 0;

    while hash_lo <= hash_hi {
        let index = match HashIndex::build(&*store, hash_lo, hash_hi, params, filter.clone())? {
            Some(index) => index,
            None => break,
        };
        batch += 1;
        let last_hash_iid = index.last_iid();

        let old_lo = std::cmp::max(old_range.0, store.first_iid());
        let mut old_hi = std::cmp::min(old_range.1, store.last_iid());
        if !params.all_pairs {
            old_hi = std::cmp::min(old_hi, last_hash_iid);
        }
        log::info!(
            "batch {}: {} hash reads {}-{}, old reads {}-{}",
            batch,
            index.num_reads(),
            index.first_iid(),
            last_hash_iid,
            old_lo,
            old_hi
        );

        if old_lo <= old_hi {
            let index = Arc::new(index);
            let cursor = Arc::new(AtomicU32::new(old_lo));
            for worker_id in 0..params.nthreads as usize {
                let index = index.clone();
                let store = store.clone();
                let tables = tables.clone();
                let params = *params;
                let filter = filter.clone();
                let cursor = cursor.clone();
                let writer = writer.clone();
                let stats = stats.clone();
                let failed = failed.clone();
                pool.execute(move || {
                    let worker_stats = process_old_reads(
                        worker_id,
                        &index,
                        &*store,
                        &tables,
                        &params,
                        filter.as_deref(),
                        rule,
                        &cursor,
                        old_hi,
                        &writer,
                        &failed,
                    );
                    stats
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .merge(&worker_stats);
                });
            }
            pool.join();
        }

        if let Some(e) = failed.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(e);
        }
        log_resource(&format!("done batch {}", batch), &mut rdata);
        if last_hash_iid >= hash_hi {
            break;
        }
        hash_lo = last_hash_iid + 1;
    }

    let stats = *stats.lock().unwrap_or_else(PoisonError::into_inner);
    stats.log();

    let mut writer = Arc::try_unwrap(writer)
        .map_err(|_| OvlError::AlignmentInvariant("overlap writer still shared".to_string()))?
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    writer.flush()?;
    Ok((stats, writer))
}
