//! External multiway merge of the map files into reduce partitions.
//!
//! Every map file is sorted, so a min-heap holding the head record of each
//! file yields the union in key order. The merged stream is cut into
//! partition files only where the key changes, so a key never spans two
//! partitions and partition `j`'s keys all sort before partition `j + 1`'s.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use crate::codec::{encoded_len, RecordReader, RecordWriter};
use crate::config::Partitioning;
use crate::error::Result;
use crate::utils::{map_path, partition_path, total_size};
use crate::Record;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShuffleStats {
    pub partitions: usize,
    pub records: u64,
    pub bytes: u64,
}

/// Merges `map_0 .. map_{mappers-1}` in `output` into at most `reducers`
/// partition files named `reduce_<j>`.
///
/// No partition file is created when there are no records at all.
#[tracing::instrument(level = "debug", skip(output))]
pub fn shuffle(
    output: &Path,
    mappers: usize,
    reducers: usize,
    partitioning: Partitioning,
) -> Result<ShuffleStats> {
    let paths: Vec<PathBuf> = (0..mappers).map(|i| map_path(output, i)).collect();
    let reducers = reducers.max(1);
    match partitioning {
        Partitioning::SizeTarget => {
            let target = total_size(&paths)? / reducers as u64;
            shuffle_by_size(&paths, output, reducers, target)
        }
        Partitioning::Balanced => {
            let groups = measure_groups(&paths)?;
            let plan = plan_partitions(&groups, reducers);
            shuffle_by_plan(&paths, output, plan)
        }
    }
}

fn shuffle_by_size(
    paths: &[PathBuf],
    output: &Path,
    reducers: usize,
    target: u64,
) -> Result<ShuffleStats> {
    let mut merge = Merge::open(paths)?;
    let mut sink = PartitionSink::new(output);
    let mut prev: Option<String> = None;

    while let Some(record) = merge.next_record()? {
        let new_key = prev.as_deref() != Some(record.key.as_str());
        if new_key && sink.current_bytes() > target && sink.partitions() < reducers {
            sink.roll()?;
        }
        sink.write(&record)?;
        prev = Some(record.key);
    }
    sink.finish()
}

fn shuffle_by_plan(paths: &[PathBuf], output: &Path, plan: Vec<usize>) -> Result<ShuffleStats> {
    let mut merge = Merge::open(paths)?;
    let mut sink = PartitionSink::new(output);
    let mut plan = plan.into_iter();
    let mut groups_left = 0usize;
    let mut prev: Option<String> = None;

    while let Some(record) = merge.next_record()? {
        if prev.as_deref() != Some(record.key.as_str()) {
            if groups_left == 0 {
                match plan.next() {
                    Some(groups) => {
                        sink.roll()?;
                        groups_left = groups;
                    }
                    // map files grew between passes; keep filling the last partition
                    None => groups_left = usize::MAX,
                }
            }
            groups_left -= 1;
        }
        sink.write(&record)?;
        prev = Some(record.key);
    }
    sink.finish()
}

/// Encoded size of every key group of the merged stream, in key order.
fn measure_groups(paths: &[PathBuf]) -> Result<Vec<u64>> {
    let mut merge = Merge::open(paths)?;
    let mut groups: Vec<u64> = Vec::new();
    let mut prev: Option<String> = None;

    while let Some(record) = merge.next_record()? {
        let len = encoded_len(&record);
        match groups.last_mut() {
            Some(size) if prev.as_deref() == Some(record.key.as_str()) => *size += len,
            _ => groups.push(len),
        }
        prev = Some(record.key);
    }
    Ok(groups)
}

/// Cuts a sequence of key-group sizes into `min(reducers, groups.len())`
/// contiguous partitions of similar size. Returns the number of groups in
/// each partition.
///
/// Each partition aims at the bytes still unassigned divided by the
/// partitions still open, and stops at whichever group boundary lands
/// closest to that target. Enough groups are always left over for every
/// remaining partition to get at least one.
pub fn plan_partitions(groups: &[u64], reducers: usize) -> Vec<usize> {
    let n = groups.len();
    let parts = reducers.min(n);
    if parts == 0 {
        return Vec::new();
    }

    let mut counts = Vec::with_capacity(parts);
    let mut remaining: u64 = groups.iter().sum();
    let mut target = remaining / parts as u64;
    let mut acc = 0u64;
    let mut count = 0usize;

    for (i, &size) in groups.iter().enumerate() {
        let open = parts - counts.len();
        let forced = n - i == open - 1;
        if count > 0 && open > 1 && (forced || 2 * acc + size > 2 * target) {
            counts.push(count);
            remaining -= acc;
            target = remaining / (open - 1) as u64;
            acc = 0;
            count = 0;
        }
        acc += size;
        count += 1;
    }
    counts.push(count);
    counts
}

/// Head record of one map file, ordered by key and then by file index.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Head {
    key: String,
    source: usize,
    value: i64,
}

/// k-way merge over sorted record files.
///
/// Equal keys come out in file-index order.
pub struct Merge {
    cursors: Vec<RecordReader>,
    heap: BinaryHeap<Reverse<Head>>,
}

impl Merge {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let cursors = paths
            .iter()
            .map(RecordReader::open)
            .collect::<Result<Vec<_>>>()?;
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(cursors.len()),
            cursors,
        };
        for source in 0..merge.cursors.len() {
            merge.advance(source)?;
        }
        Ok(merge)
    }

    fn advance(&mut self, source: usize) -> Result<()> {
        if let Some(record) = self.cursors[source].next_record()? {
            self.heap.push(Reverse(Head {
                key: record.key,
                source,
                value: record.value,
            }));
        }
        Ok(())
    }

    /// `Ok(None)` once every file is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(Reverse(head)) = self.heap.pop() else {
            return Ok(None);
        };
        self.advance(head.source)?;
        Ok(Some(Record::new(head.key, head.value)))
    }
}

impl Iterator for Merge {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Writes the merged stream into consecutive partition files, opening each
/// one lazily on its first record.
struct PartitionSink<'a> {
    output: &'a Path,
    current: Option<RecordWriter>,
    partitions: usize,
    stats: ShuffleStats,
}

impl<'a> PartitionSink<'a> {
    fn new(output: &'a Path) -> Self {
        Self {
            output,
            current: None,
            partitions: 0,
            stats: ShuffleStats::default(),
        }
    }

    /// Partition files opened so far.
    fn partitions(&self) -> usize {
        self.partitions
    }

    fn current_bytes(&self) -> u64 {
        self.current.as_ref().map_or(0, RecordWriter::bytes_written)
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        let writer = match self.current.take() {
            Some(writer) => writer,
            None => {
                let writer = RecordWriter::create(partition_path(self.output, self.partitions))?;
                self.partitions += 1;
                writer
            }
        };
        self.current.insert(writer).write(record)?;
        self.stats.records += 1;
        Ok(())
    }

    /// Closes the current partition; the next record starts a new one.
    fn roll(&mut self) -> Result<()> {
        if let Some(writer) = self.current.take() {
            let bytes = writer.finish()?;
            tracing::debug!(
                partition = self.partitions - 1,
                bytes,
                "closed partition"
            );
            self.stats.bytes += bytes;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ShuffleStats> {
        self.roll()?;
        self.stats.partitions = self.partitions;
        Ok(self.stats)
    }
}
