//! Counts how often each distinct line occurs.
//!

use super::escape_key;
use crate::*;

pub fn map(_index: usize, _block: &Block, line: &str) -> MapOutput {
    let record = Record::new(escape_key(line), 1);
    Ok(Box::new(std::iter::once(anyhow::Ok(record))))
}

pub fn workload() -> Workload {
    Workload::new(map, super::sum_by_key)
}
