use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::error::{IoContext, Result};
use crate::Block;

/// Splits the file at `path` into `n` contiguous, line-aligned blocks.
///
/// Nominal boundaries sit at `size * k / n`; each one is pushed forward past
/// the next `\n`, or to end of file when there is none. The blocks tile
/// `[0, size)` exactly, though some may be empty when lines are long. An
/// empty file yields no blocks.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn split(path: &Path, n: usize) -> Result<Vec<Block>> {
    let size = fs::metadata(path).with_path(path)?.len();
    if size == 0 || n == 0 {
        return Ok(Vec::new());
    }

    let mut reader = BufReader::new(File::open(path).with_path(path)?);
    let mut scratch = Vec::new();
    let mut blocks = Vec::with_capacity(n);
    let mut from = 0u64;

    for k in 1..=n {
        let nominal = (u128::from(size) * k as u128 / n as u128) as u64;
        let to = if k == n {
            size
        } else {
            let start = nominal.max(from);
            if start >= size {
                size
            } else {
                reader.seek(SeekFrom::Start(start)).with_path(path)?;
                scratch.clear();
                let consumed = reader.read_until(b'\n', &mut scratch).with_path(path)?;
                start + consumed as u64
            }
        };
        blocks.push(Block::new(from, to));
        from = to;
    }

    tracing::debug!(size, blocks = blocks.len(), "split input");
    Ok(blocks)
}
