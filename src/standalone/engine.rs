use std::path::Path;

use uuid::Uuid;

use super::combiner::combine_all;
use super::mapper::run_mappers;
use super::reducer::run_reducers;
use super::shuffler::shuffle;
use super::splitter::split;
use crate::config::{EngineConfig, Partitioning};
use crate::error::{Error, Result};
use crate::utils::{clear_dir, prepare_output_dir};
use crate::{Block, MapFn, MapOutput, ReduceFn, Workload};

/// Counts gathered over one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub blocks: usize,
    pub map_records: u64,
    pub combined_records: u64,
    pub partitions: usize,
    pub shuffled_bytes: u64,
}

/// The engine. Mapper and reducer counts are fixed at construction; the
/// callbacks may be swapped between runs.
pub struct MapReduce {
    mappers_count: usize,
    reducers_count: usize,
    partitioning: Partitioning,
    mapper: Option<MapFn>,
    reducer: Option<ReduceFn>,
}

impl MapReduce {
    pub fn new(mappers_count: usize, reducers_count: usize) -> Result<Self> {
        let config = EngineConfig {
            mappers: mappers_count,
            reducers: reducers_count,
            ..EngineConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            mappers_count: config.mappers,
            reducers_count: config.reducers,
            partitioning: config.partitioning,
            mapper: None,
            reducer: None,
        })
    }

    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn set_mapper<F>(&mut self, mapper: F)
    where
        F: Fn(usize, &Block, &str) -> MapOutput + Send + Sync + 'static,
    {
        self.mapper = Some(crate::map_fn(mapper));
    }

    pub fn set_reducer<F>(&mut self, reducer: F)
    where
        F: Fn(usize, &Path) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.reducer = Some(crate::reduce_fn(reducer));
    }

    pub fn set_workload(&mut self, workload: Workload) {
        self.mapper = Some(workload.map_fn);
        self.reducer = Some(workload.reduce_fn);
    }

    /// Runs split, map, combine (when `combine` is set), shuffle and reduce
    /// over `input`, one full barrier after another.
    ///
    /// `output` is created if missing and emptied otherwise. On success it
    /// holds the `map_<i>` and `reduce_<j>` files of this run; on failure it
    /// is emptied again.
    pub fn run(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        combine: bool,
    ) -> Result<RunSummary> {
        self.run_job(input.as_ref(), output.as_ref(), combine)
    }

    #[tracing::instrument(
        name = "mapreduce",
        skip(self, input, output),
        fields(
            job_id = %Uuid::new_v4(),
            input = %input.display(),
            output = %output.display(),
            mappers = self.mappers_count,
            reducers = self.reducers_count,
        )
    )]
    fn run_job(&self, input: &Path, output: &Path, combine: bool) -> Result<RunSummary> {
        let map_fn = self.mapper.as_ref().ok_or(Error::MissingCallback("map"))?;
        let reduce_fn = self.reducer.as_ref().ok_or(Error::MissingCallback("reduce"))?;

        let blocks = split(input, self.mappers_count)?;
        prepare_output_dir(output)?;
        let scratch = Scratch::new(output);
        let mut summary = RunSummary {
            blocks: blocks.len(),
            ..RunSummary::default()
        };
        tracing::info!(blocks = blocks.len(), "split input");

        let map_stats = run_mappers(input, output, &blocks, map_fn)?;
        summary.map_records = map_stats.iter().map(|s| s.records).sum();
        tracing::info!(records = summary.map_records, "map phase done");

        summary.combined_records = if combine {
            let combined = combine_all(output, blocks.len())?;
            let records = combined.iter().map(|s| s.records_out).sum();
            tracing::info!(records, "combine phase done");
            records
        } else {
            summary.map_records
        };

        let shuffled = shuffle(output, blocks.len(), self.reducers_count, self.partitioning)?;
        summary.partitions = shuffled.partitions;
        summary.shuffled_bytes = shuffled.bytes;
        tracing::info!(
            partitions = shuffled.partitions,
            records = shuffled.records,
            bytes = shuffled.bytes,
            "shuffle phase done"
        );

        run_reducers(output, shuffled.partitions, reduce_fn)?;
        tracing::info!("reduce phase done");

        scratch.keep();
        Ok(summary)
    }
}

/// Empties the output directory when dropped, unless the run succeeded.
struct Scratch<'a> {
    dir: &'a Path,
    armed: bool,
}

impl<'a> Scratch<'a> {
    fn new(dir: &'a Path) -> Self {
        Self { dir, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = clear_dir(self.dir) {
                tracing::warn!(error = %e, "failed to clean up output directory");
            }
        }
    }
}
