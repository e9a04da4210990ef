//! A single-machine MapReduce (lite) engine.
//!
//! The input file is split into line-aligned blocks, one per mapper. Mappers
//! run on their own threads and write sorted intermediate files, an optional
//! combiner folds duplicate keys, and the shuffle merges every intermediate
//! file into key-ordered partitions that are handed to concurrent reducers.
//! Intermediate data lives in an output directory on the local filesystem, as
//! if each file sat on a different node.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub mod codec;
pub mod config;
pub mod error;
pub mod standalone;
pub mod telemetry;
pub mod utils;
pub mod workload;

pub use config::{EngineConfig, Partitioning};
pub use error::{Error, Phase, Result};
pub use standalone::engine::{MapReduce, RunSummary};

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<Record>>>>;

/// A map function is called once per input line with the mapper index and
/// the block that mapper owns. It returns an iterator that yields records.
pub type MapFn = Arc<dyn Fn(usize, &Block, &str) -> MapOutput + Send + Sync>;

/// A reduce function is handed a partition index and the path of that
/// partition's file. Opening and interpreting the file is up to the function.
pub type ReduceFn = Arc<dyn Fn(usize, &Path) -> anyhow::Result<()> + Send + Sync>;

/// Wraps a closure as a [`MapFn`].
pub fn map_fn<F>(f: F) -> MapFn
where
    F: Fn(usize, &Block, &str) -> MapOutput + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a [`ReduceFn`].
pub fn reduce_fn<F>(f: F) -> ReduceFn
where
    F: Fn(usize, &Path) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A map reduce application.
#[derive(Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

impl Workload {
    pub fn new<M, R>(map_fn: M, reduce_fn: R) -> Self
    where
        M: Fn(usize, &Block, &str) -> MapOutput + Send + Sync + 'static,
        R: Fn(usize, &Path) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            map_fn: Arc::new(map_fn),
            reduce_fn: Arc::new(reduce_fn),
        }
    }
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload").finish_non_exhaustive()
    }
}

/////////////////////////////////////////////////////////////////////////////
// Blocks and records
/////////////////////////////////////////////////////////////////////////////

/// A half-open byte range `[from, to)` of the input file.
///
/// Neither boundary falls in the middle of a line.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Default)]
pub struct Block {
    pub from: u64,
    pub to: u64,
}

impl Block {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Number of bytes covered by this block.
    #[inline]
    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// A single key-value record.
///
/// Records are stored on disk as `"<key> <value>\n"`, so keys must be
/// non-empty and must not contain whitespace.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Record {
    /// The key.
    pub key: String,
    /// The value.
    pub value: i64,
}

impl Record {
    /// Construct a new record from the given key and value.
    pub fn new(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Get the key of this record.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key survives the line-oriented encoding.
    pub fn has_valid_key(&self) -> bool {
        !self.key.is_empty() && !self.key.chars().any(char::is_whitespace)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}
