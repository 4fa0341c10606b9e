// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

const VERSION_STRING: &'static str = env!("VERSION_STRING");

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::clap_app;
mod utils;
use simple_logger::SimpleLogger;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::str::FromStr;
use std::sync::Arc;
use sysinfo::SystemExt;
use utils::config::{parse_range, MemoryClass, Parameters};
use utils::error::{OvlError, OvlResult};
use utils::log_resource;
use utils::ovlp::ovlp;
use utils::ovs::{OverlapWriter, OvsLayout};
use utils::read_store::FastxReadStore;
use utils::skip_filter::{BloomSkipFilter, KmerFilter};

// above this rate the window filter and the hopeless check reject good overlaps
const HIGH_ERROR_RATE: f64 = 0.06;

fn parse_opt<T: FromStr>(matches: &clap::ArgMatches, name: &str) -> OvlResult<Option<T>> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(|_| {
            OvlError::Configuration(format!("bad value for {}: '{}'", name, v))
        }),
    }
}

fn main() -> Result<(), OvlError> {
    let mut rdata: libc::rusage = unsafe { std::mem::zeroed() };

    let matches = clap_app!(wgs_ovl =>
        (version: VERSION_STRING)
        (author: "Jason Chin <jason@omnibio.ai>")
        (about: "
wgs_ovl: find overlaps between reads with a k-mer hash index and a banded aligner
LICENSE: http://creativecommons.org/licenses/by-nc-sa/4.0/")
        (@arg READLIST: +required "Path to a file that contains the list of reads in .fa .fa.gz .fastq or fastq.gz formats")
        (@arg OUTPUT: +required "Path to the binary overlap record file")
        (@arg k: -k +takes_value "Kmer size [default: 22]")
        (@arg erate: -e +takes_value "Maximum error rate of an overlap [default: 0.06]")
        (@arg min_olap: -v +takes_value "Minimum overlap length [default: 40]")
        (@arg nthreads: -t +takes_value "Number of threads [default: number of cpus]")
        (@arg mem: -M +takes_value "Memory class: 256MB 1GB 2GB 4GB 8GB 16GB [default: 2GB]")
        (@arg hashbits: --hashbits +takes_value "Number of hash table bits (overrides -M)")
        (@arg hashstrings: --hashstrings +takes_value "Maximum reads per hash batch (overrides -M)")
        (@arg hashdatalen: --hashdatalen +takes_value "Maximum bases per hash batch (overrides -M)")
        (@arg hashload: --hashload +takes_value "Maximum hash table load [default: 0.7]")
        (@arg maxreadlen: --maxreadlen +takes_value "Maximum read length [default: 2048]")
        (@arg hash_range: -h +takes_value "Range of read IIDs to hash, lo-hi")
        (@arg old_range: -r +takes_value "Range of read IIDs to stream against the hash, lo-hi")
        (@arg frag_olap_limit: -l +takes_value "Maximum overlaps off each end of a read [default: unlimited]")
        (@arg multi: -m "Allow multiple overlaps per oriented read pair")
        (@arg unique: -u "One overlap per oriented read pair (default)")
        (@arg partial: -G "Report partial overlaps for trimming (OBT records)")
        (@arg all_pairs: -c "Overlap every pair of reads regardless of IID order")
        (@arg window: -w "Filter overlaps with low quality differences clustered in a window")
        (@arg ignore_clear: -x "Ignore clear ranges")
        (@arg no_hopeless: -z "Disable the hopeless seed check")
        (@arg refine: --refine "Realign every overlap with a full dynamic programming aligner to set the corrected error rate")
        (@arg kmer_skip: -s +takes_value "Skip this many query k-mers between lookups [default: 0]")
        (@arg skip: --skip +takes_value "Path to a skip filter of k-mers to ignore")
        (@arg text: --text +takes_value "Also write the overlaps as text to this file")
        (@arg log: --log +takes_value "log level: DEBUG or INFO (default)")
    )
    .get_matches();

    let log_level = match matches.value_of("log").unwrap_or("INFO") {
        "DEBUG" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_utc_timestamps()
        .init()
        .map_err(|e| OvlError::Configuration(format!("logger: {}", e)))?;

    let read_list = matches.value_of("READLIST").unwrap_or_default().to_string();
    let output = matches.value_of("OUTPUT").unwrap_or_default().to_string();

    let mem_class = match matches.value_of("mem") {
        Some(v) => MemoryClass::from_str(v)?,
        None => MemoryClass::M2GB,
    };
    let mut params = Parameters::default().with_memory_class(mem_class);
    if let Some(k) = parse_opt::<u32>(&matches, "k")? {
        params.k = k;
    }
    if let Some(e) = parse_opt::<f64>(&matches, "erate")? {
        params.error_rate = e;
    }
    if let Some(v) = parse_opt::<u32>(&matches, "min_olap")? {
        params.min_olap_len = v;
    }
    if let Some(t) = parse_opt::<u32>(&matches, "nthreads")? {
        params.nthreads = std::cmp::max(t, 1);
    }
    if let Some(v) = parse_opt::<u32>(&matches, "hashbits")? {
        params.hash_bits = v;
    }
    if let Some(v) = parse_opt::<u32>(&matches, "hashstrings")? {
        params.max_hash_strings = v;
    }
    if let Some(v) = parse_opt::<u64>(&matches, "hashdatalen")? {
        params.max_hash_data_len = v;
    }
    if let Some(v) = parse_opt::<f64>(&matches, "hashload")? {
        params.max_hash_load = v;
    }
    if let Some(v) = parse_opt::<u32>(&matches, "maxreadlen")? {
        params.max_read_len = v;
    }
    if let Some(v) = parse_opt::<i64>(&matches, "frag_olap_limit")? {
        params.frag_olap_limit = if v < 1 { u32::MAX } else { v as u32 };
    }
    if let Some(v) = parse_opt::<u32>(&matches, "kmer_skip")? {
        params.kmer_skip = v;
    }
    if matches.is_present("multi") {
        params.unique_olap_per_pair = false;
    }
    if matches.is_present("unique") {
        params.unique_olap_per_pair = true;
    }
    params = params.with_partial_overlaps(matches.is_present("partial"));
    params.all_pairs = matches.is_present("all_pairs");
    params.use_window_filter = matches.is_present("window");
    params.ignore_clear_range = matches.is_present("ignore_clear");
    params.use_hopeless_check = !matches.is_present("no_hopeless");
    params.refine_overlaps = matches.is_present("refine");
    if params.refine_overlaps && params.partial_overlaps {
        log::warn!("partial overlaps are not refined");
    }

    if params.error_rate > HIGH_ERROR_RATE {
        if params.use_window_filter {
            log::warn!("high error rate requested: window filter turned off");
        }
        params.use_window_filter = false;
        params.use_hopeless_check = false;
    }
    params.validate()?;

    let hash_range = match matches.value_of("hash_range") {
        Some(v) => parse_range(v, "-h")?,
        None => (0, u32::MAX),
    };
    let old_range = match matches.value_of("old_range") {
        Some(v) => parse_range(v, "-r")?,
        None => (0, u32::MAX),
    };

    log::info!("wgs_ovl {}", VERSION_STRING);
    log::info!(
        "k: {}, error rate: {}, min overlap: {}, max read length: {}",
        params.k,
        params.error_rate,
        params.min_olap_len,
        params.max_read_len
    );
    log::info!(
        "hash bits: {}, max hash reads: {}, max hash bases: {}, max load: {}",
        params.hash_bits,
        params.max_hash_strings,
        params.max_hash_data_len,
        params.max_hash_load
    );
    log::info!(
        "partial: {}, all pairs: {}, unique per pair: {}, window filter: {}, hopeless check: {}, refine: {}",
        params.partial_overlaps,
        params.all_pairs,
        params.unique_olap_per_pair,
        params.use_window_filter,
        params.use_hopeless_check,
        params.refine_overlaps
    );
    log::info!("number of threads: {}", params.nthreads);

    let system = sysinfo::System::new_all();
    log::info!("sys: total memory: {} KB", system.total_memory());
    log::info!("sys: used memory: {} KB", system.used_memory());
    let free_mem = system.total_memory() - system.used_memory();
    if free_mem < mem_class.bytes() >> 10 {
        log::warn!(
            "free memory = {} KB is less than the memory class {:?}",
            free_mem,
            mem_class
        );
    }

    log_resource("BGN: loading reads", &mut rdata);
    let store = FastxReadStore::load(&read_list)?;
    log::info!(
        "loaded {} reads, {} bases from {}",
        store.len(),
        store.total_bases(),
        read_list
    );
    log_resource("END: loading reads", &mut rdata);

    let filter: Option<Arc<dyn KmerFilter>> = match matches.value_of("skip") {
        Some(path) => {
            let filter = BloomSkipFilter::load(path)?;
            if filter.k() != params.k {
                return Err(OvlError::Configuration(format!(
                    "skip filter {} built for k = {}, not {}",
                    path,
                    filter.k(),
                    params.k
                )));
            }
            Some(Arc::new(filter))
        }
        None => None,
    };

    let text: Option<Box<dyn Write + Send>> = match matches.value_of("text") {
        Some(path) => Some(Box::new(BufWriter::new(File::create(path)?))),
        None => None,
    };
    let layout = OvsLayout::new(params.max_read_len)?;
    let writer = OverlapWriter::new(BufWriter::new(File::create(&output)?), layout).with_text(text);

    log_resource("BGN: overlapping", &mut rdata);
    let (stats, writer) = ovlp(Arc::new(store), &params, hash_range, old_range, filter, writer)?;
    log::info!("{} overlap records written to {}", writer.count, output);
    writer.into_inner()?;
    log_resource(
        &format!("END: overlapping, {} overlaps", stats.total_overlaps),
        &mut rdata,
    );
    Ok(())
}
