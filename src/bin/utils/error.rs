// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OvlError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("hash table full: {entries} entries in {buckets} buckets (key {key:#x})")]
    CapacityExceeded { key: u64, entries: u64, buckets: u64 },

    #[error("read {iid} is too long: {len} > {max}")]
    ReadTooLong { iid: u32, len: usize, max: usize },

    #[error("alignment invariant violated: {0}")]
    AlignmentInvariant(String),

    #[error("malformed skip filter: {0}")]
    MalformedFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OvlResult<T> = Result<T, OvlError>;
