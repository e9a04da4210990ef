use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use super::barrier::{fork_join, CancelFlag};
use crate::codec::RecordWriter;
use crate::error::{Error, IoContext, Phase, Result};
use crate::utils::map_path;
use crate::{Block, MapFn, Record};

/// What one map worker produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapStats {
    pub lines: u64,
    pub records: u64,
    pub bytes: u64,
}

/// Runs one map worker per block and waits for all of them.
///
/// Worker `i` writes its sorted output to `map_i` in `output`.
pub fn run_mappers(
    input: &Path,
    output: &Path,
    blocks: &[Block],
    map_fn: &MapFn,
) -> Result<Vec<MapStats>> {
    fork_join(Phase::Map, blocks.len(), |index, cancel| {
        map_block(input, output, index, &blocks[index], map_fn, cancel)
    })
}

fn map_block(
    input: &Path,
    output: &Path,
    index: usize,
    block: &Block,
    map_fn: &MapFn,
    cancel: &CancelFlag,
) -> Result<MapStats> {
    let mut reader = BufReader::new(File::open(input).with_path(input)?);
    reader.seek(SeekFrom::Start(block.from)).with_path(input)?;

    let mut stats = MapStats::default();
    let mut records: Vec<Record> = Vec::new();
    let mut buf = Vec::new();
    let mut pos = block.from;

    while pos < block.to {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                phase: Phase::Map,
                index,
            });
        }
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).with_path(input)?;
        if n == 0 {
            break;
        }
        pos += n as u64;
        stats.lines += 1;

        let line = String::from_utf8_lossy(trim_line_end(&buf));
        let emitted =
            map_fn(index, block, &*line).map_err(|e| Error::callback(Phase::Map, index, e))?;
        for record in emitted {
            let record = record.map_err(|e| Error::callback(Phase::Map, index, e))?;
            if !record.has_valid_key() {
                return Err(Error::InvalidKey { key: record.key });
            }
            records.push(record);
        }
    }

    // stable, so equal keys keep their emission order
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let mut writer = RecordWriter::create(map_path(output, index))?;
    for record in &records {
        writer.write(record)?;
    }
    stats.records = writer.records_written();
    stats.bytes = writer.finish()?;

    tracing::debug!(
        index,
        from = block.from,
        to = block.to,
        lines = stats.lines,
        records = stats.records,
        "map worker done"
    );
    Ok(stats)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
