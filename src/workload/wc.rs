//! A MapReduce-compatible implementation of word count.
//!

use crate::*;

pub fn map(_index: usize, _block: &Block, line: &str) -> MapOutput {
    let words = line
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>();

    let iter = words.into_iter().map(|word| anyhow::Ok(Record::new(word, 1)));
    Ok(Box::new(iter))
}

pub fn workload() -> Workload {
    Workload::new(map, super::sum_by_key)
}
