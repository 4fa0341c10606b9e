// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]
// run time parameters for the overlapper and the memory class presets

use super::error::{OvlError, OvlResult};
use std::str::FromStr;

pub const DEFAULT_KMER_LEN: u32 = 22;
pub const DEFAULT_ERROR_RATE: f64 = 0.06;
pub const DEFAULT_MIN_OLAP_LEN: u32 = 40;
pub const DEFAULT_MAX_READ_LEN: u32 = 2048;
pub const DEFAULT_HASH_LOAD: f64 = 0.7;
pub const MIN_HASH_BITS: u32 = 10;
// largest value representable by a 12-bit encoded error rate
pub const MAX_ERROR_RATE: f64 = 0.4095;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryClass {
    M256MB,
    M1GB,
    M2GB,
    M4GB,
    M8GB,
    M16GB,
}

impl MemoryClass {
    /// (hash table bits, max reads per batch, max bases per batch)
    pub fn hash_limits(&self) -> (u32, u32, u64) {
        match self {
            MemoryClass::M256MB => (19, 10_000, 6_000_000),
            MemoryClass::M1GB => (21, 50_000, 75_000_000),
            MemoryClass::M2GB => (22, 150_000, 110_000_000),
            MemoryClass::M4GB => (23, 250_000, 220_000_000),
            MemoryClass::M8GB => (24, 512_000, 400_000_000),
            MemoryClass::M16GB => (24, 1_500_000, 1_200_000_000),
        }
    }

    pub fn bytes(&self) -> u64 {
        match self {
            MemoryClass::M256MB => 256 << 20,
            MemoryClass::M1GB => 1 << 30,
            MemoryClass::M2GB => 2 << 30,
            MemoryClass::M4GB => 4 << 30,
            MemoryClass::M8GB => 8 << 30,
            MemoryClass::M16GB => 16 << 30,
        }
    }
}

impl FromStr for MemoryClass {
    type Err = OvlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "256MB" => Ok(MemoryClass::M256MB),
            "1GB" => Ok(MemoryClass::M1GB),
            "2GB" => Ok(MemoryClass::M2GB),
            "4GB" => Ok(MemoryClass::M4GB),
            "8GB" => Ok(MemoryClass::M8GB),
            "16GB" => Ok(MemoryClass::M16GB),
            _ => Err(OvlError::Configuration(format!(
                "unrecognized memory class: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Parameters {
    pub nthreads: u32,
    pub k: u32,
    pub error_rate: f64,
    pub min_olap_len: u32,
    pub max_read_len: u32,

    pub hash_bits: u32,
    pub max_hash_strings: u32,
    pub max_hash_data_len: u64,
    pub max_hash_load: f64,
    pub kmer_skip: u32,

    pub frag_olap_limit: u32,
    pub unique_olap_per_pair: bool,
    pub partial_overlaps: bool,
    pub all_pairs: bool,
    pub use_hopeless_check: bool,
    pub use_window_filter: bool,
    pub ignore_clear_range: bool,
    pub refine_overlaps: bool,

    // aligner / seeding thresholds, empirically tuned
    pub branch_match_value: f64,
    pub min_branch_end_dist: u32,
    pub min_branch_tail_slope: f64,
    pub hopeless_match: u32,
    pub errors_for_free: u32,
    pub edit_dist_prob_bound: f64,
    pub min_intersection: i32,
    pub shift_slack: i32,
    pub max_distinct_olaps: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        let (hash_bits, max_hash_strings, max_hash_data_len) = MemoryClass::M2GB.hash_limits();
        Parameters {
            nthreads: num_cpus::get() as u32,
            k: DEFAULT_KMER_LEN,
            error_rate: DEFAULT_ERROR_RATE,
            min_olap_len: DEFAULT_MIN_OLAP_LEN,
            max_read_len: DEFAULT_MAX_READ_LEN,
            hash_bits,
            max_hash_strings,
            max_hash_data_len,
            max_hash_load: DEFAULT_HASH_LOAD,
            kmer_skip: 0,
            frag_olap_limit: u32::MAX,
            unique_olap_per_pair: true,
            partial_overlaps: false,
            all_pairs: false,
            use_hopeless_check: true,
            use_window_filter: false,
            ignore_clear_range: false,
            refine_overlaps: false,
            branch_match_value: 0.272,
            min_branch_end_dist: 20,
            min_branch_tail_slope: 0.20,
            hopeless_match: 90,
            errors_for_free: 1,
            edit_dist_prob_bound: 1e-4,
            min_intersection: 10,
            shift_slack: 1,
            max_distinct_olaps: 3,
        }
    }
}

impl Parameters {
    pub fn with_memory_class(mut self, class: MemoryClass) -> Self {
        let (hash_bits, max_hash_strings, max_hash_data_len) = class.hash_limits();
        self.hash_bits = hash_bits;
        self.max_hash_strings = max_hash_strings;
        self.max_hash_data_len = max_hash_data_len;
        self
    }

    /// Partial overlaps score matches higher and stop at the first score drop.
    pub fn with_partial_overlaps(mut self, partial: bool) -> Self {
        self.partial_overlaps = partial;
        if partial {
            self.branch_match_value = 0.318;
            self.min_branch_tail_slope = 1.0;
        } else {
            self.branch_match_value = 0.272;
            self.min_branch_tail_slope = 0.20;
        }
        self
    }

    pub fn max_errors(&self) -> usize {
        1 + (self.error_rate * self.max_read_len as f64) as usize
    }

    pub fn offset_bits(&self) -> u32 {
        bits_for(self.max_read_len)
    }

    pub fn validate(&self) -> OvlResult<()> {
        let bad = |msg: String| Err(OvlError::Configuration(msg));
        if self.k == 0 || self.k > 32 {
            return bad(format!("k-mer length must be in 1..=32, got {}", self.k));
        }
        if !(self.error_rate > 0.0 && self.error_rate <= MAX_ERROR_RATE) {
            return bad(format!(
                "error rate must be in (0, {}], got {}",
                MAX_ERROR_RATE, self.error_rate
            ));
        }
        if self.nthreads == 0 {
            return bad("thread count must be positive".to_string());
        }
        if self.hash_bits < MIN_HASH_BITS {
            return bad(format!(
                "hash table too small: {} bits < {}",
                self.hash_bits, MIN_HASH_BITS
            ));
        }
        if self.hash_bits > 2 * self.k || self.hash_bits > 32 {
            return bad(format!(
                "hash table bits {} too large for k = {}",
                self.hash_bits, self.k
            ));
        }
        if !(self.max_hash_load > 0.0 && self.max_hash_load <= 1.0) {
            return bad(format!("hash load must be in (0, 1], got {}", self.max_hash_load));
        }
        if self.max_read_len < self.k || self.offset_bits() > 30 {
            return bad(format!(
                "max read length {} out of range",
                self.max_read_len
            ));
        }
        if self.min_olap_len < self.k {
            return bad(format!(
                "min overlap length {} shorter than k-mer length {}",
                self.min_olap_len, self.k
            ));
        }
        if self.max_hash_strings == 0 || self.max_hash_data_len == 0 {
            return bad("hash batch limits must be positive".to_string());
        }
        if self.max_distinct_olaps == 0 {
            return bad("max distinct overlaps must be positive".to_string());
        }
        Ok(())
    }
}

/// number of bits needed to store positions in [0, n)
pub fn bits_for(n: u32) -> u32 {
    let mut bits = 1;
    while (1u64 << bits) < n as u64 {
        bits += 1;
    }
    bits
}

/// parse "lo-hi", "lo-" or "-hi" into an inclusive IID range
pub fn parse_range(value: &str, flag: &str) -> OvlResult<(u32, u32)> {
    let (lo, hi) = match value.find('-') {
        Some(p) => (&value[..p], &value[p + 1..]),
        None => {
            return Err(OvlError::Configuration(format!(
                "no hyphen in {} range '{}'",
                flag, value
            )))
        }
    };
    let parse = |s: &str, default: u32| -> OvlResult<u32> {
        if s.is_empty() {
            Ok(default)
        } else {
            s.parse::<u32>().map_err(|_| {
                OvlError::Configuration(format!("bad {} range '{}'", flag, value))
            })
        }
    };
    let lo = parse(lo, 0)?;
    let hi = parse(hi, u32::MAX)?;
    if lo > hi {
        return Err(OvlError::Configuration(format!(
            "empty {} range '{}'",
            flag, value
        )));
    }
    Ok((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Parameters {
        Parameters {
            nthreads: 1,
            k: 16,
            hash_bits: 12,
            ..Parameters::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(Parameters::default().validate().is_ok());
        assert!(small().validate().is_ok());
    }

    #[test]
    fn rejects_bad_configuration() {
        let mut p = small();
        p.k = 0;
        assert!(matches!(p.validate(), Err(OvlError::Configuration(_))));

        let mut p = small();
        p.hash_bits = 8;
        assert!(matches!(p.validate(), Err(OvlError::Configuration(_))));

        let mut p = small();
        p.error_rate = 0.5;
        assert!(p.validate().is_err());

        let mut p = small();
        p.min_olap_len = 10;
        assert!(p.validate().is_err());
    }

    #[test]
    fn memory_classes() {
        assert_eq!("2gb".parse::<MemoryClass>().unwrap(), MemoryClass::M2GB);
        assert!("3GB".parse::<MemoryClass>().is_err());
        let p = small().with_memory_class(MemoryClass::M256MB);
        assert_eq!(p.hash_bits, 19);
        assert_eq!(p.max_hash_strings, 10_000);
    }

    #[test]
    fn position_bits() {
        assert_eq!(bits_for(2048), 11);
        assert_eq!(bits_for(2049), 12);
        assert_eq!(bits_for(2), 1);
        let p = small();
        assert_eq!(p.offset_bits(), 11);
        assert_eq!(p.max_errors(), 123);
    }

    #[test]
    fn ranges() {
        assert_eq!(parse_range("5-10", "-h").unwrap(), (5, 10));
        assert_eq!(parse_range("-10", "-h").unwrap(), (0, 10));
        assert_eq!(parse_range("7-", "-r").unwrap(), (7, u32::MAX));
        assert!(parse_range("7", "-r").is_err());
        assert!(parse_range("9-3", "-r").is_err());
    }
}
