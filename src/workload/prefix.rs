//! Shortest line prefix that tells every line apart.
//!
//! One run maps every line to its first `len` characters (lowercased) and
//! each reducer looks for a key that occurs more than once in its partition.
//! Since a key never spans two partitions, no duplicate anywhere means `len`
//! is enough. [`min_unique_prefix`] repeats the run for growing `len`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;

use super::{escape_key, result_path};
use crate::codec::{RecordReader, RecordWriter};
use crate::{MapReduce, Record, Workload};

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct Args {
    /// Prefix length in characters
    #[clap(short, long, value_parser)]
    len: usize,
}

/// Builds the single-run workload from `--len <n>`.
pub fn from_args(args: &[String]) -> Result<Workload> {
    let args = Args::try_parse_from(args)?;
    Ok(workload(args.len, Arc::new(AtomicBool::new(true))))
}

/// Key for `line` at prefix length `len`.
pub fn prefix_key(line: &str, len: usize) -> String {
    let prefix: String = line.chars().take(len).collect();
    escape_key(&prefix.to_lowercase())
}

/// One pass at prefix length `len`. Reducers clear `unique` when they find
/// a repeated prefix and list the repeated ones in `result_<j>`.
pub fn workload(len: usize, unique: Arc<AtomicBool>) -> Workload {
    Workload::new(
        move |_, _, line| {
            let record = Record::new(prefix_key(line, len), 1);
            Ok(Box::new(std::iter::once(anyhow::Ok(record))))
        },
        move |index, partition| {
            let duplicates = find_duplicates(partition)?;
            if !duplicates.is_empty() {
                unique.store(false, Ordering::SeqCst);
            }
            let mut writer = RecordWriter::create(result_path(partition, index))?;
            for record in &duplicates {
                writer.write(record)?;
            }
            writer.finish()?;
            Ok(())
        },
    )
}

/// Keys of a sorted partition whose total count exceeds one.
///
/// A key shows up more than once either as several consecutive records
/// (different mappers, or no combiner) or as one combined record with a
/// value above one.
fn find_duplicates(partition: &Path) -> Result<Vec<Record>> {
    let mut duplicates: Vec<Record> = Vec::new();
    let mut current: Option<Record> = None;
    for record in RecordReader::open(partition)? {
        let record = record?;
        match current.as_mut() {
            Some(group) if group.key == record.key => {
                let Some(total) = group.value.checked_add(record.value) else {
                    bail!("count for prefix `{}` overflows i64", group.key);
                };
                group.value = total;
            }
            _ => {
                if let Some(done) = current.replace(record) {
                    if done.value > 1 {
                        duplicates.push(done);
                    }
                }
            }
        }
    }
    duplicates.extend(current.filter(|group| group.value > 1));
    Ok(duplicates)
}

/// Runs `engine` for `len = 1..=max_len` and returns the first length at
/// which no two lines of `input` share a prefix, or [`None`] if there is
/// none up to `max_len`.
pub fn min_unique_prefix(
    engine: &mut MapReduce,
    input: &Path,
    output: &Path,
    combine: bool,
    max_len: usize,
) -> crate::Result<Option<usize>> {
    for len in 1..=max_len {
        let unique = Arc::new(AtomicBool::new(true));
        engine.set_workload(workload(len, Arc::clone(&unique)));
        engine.run(input, output, combine)?;
        if unique.load(Ordering::SeqCst) {
            tracing::info!(len, "found unique prefix length");
            return Ok(Some(len));
        }
        tracing::debug!(len, "prefix length too short");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prefix_is_lowercased_and_escaped() {
        assert_eq!(prefix_key("Hello World", 3), "hel");
        assert_eq!(prefix_key("Hello World", 7), "hello\\sw");
        assert_eq!(prefix_key("ab", 10), "ab");
        assert_eq!(prefix_key("", 4), "\\e");
    }

    #[test]
    fn duplicates_are_found_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let partition = dir.path().join("reduce_0");
        fs::write(&partition, "ab 1\nab 1\ncd 1\nef 3\ngh 1\n").unwrap();
        assert_eq!(
            find_duplicates(&partition).unwrap(),
            vec![Record::new("ab", 2), Record::new("ef", 3)]
        );
    }

    #[test]
    fn overflowing_counts_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let partition = dir.path().join("reduce_0");
        fs::write(&partition, format!("ab {}\nab 1\n", i64::MAX)).unwrap();
        let err = find_duplicates(&partition).unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");
    }

    #[test]
    fn args_are_parsed_like_a_command_line() {
        assert!(from_args(&["--len".to_string(), "3".to_string()]).is_ok());
        assert!(from_args(&[]).is_err());
    }

    #[test]
    fn finds_the_shortest_unique_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "apple\napricot\nBanana\nband\ncherry\n").unwrap();
        let out = dir.path().join("out");

        for (mappers, reducers, combine) in [(1, 1, true), (3, 2, true), (2, 3, false)] {
            let mut engine = MapReduce::new(mappers, reducers).unwrap();
            let len = min_unique_prefix(&mut engine, &input, &out, combine, 10).unwrap();
            // "ap" is shared by apple/apricot, "ban" by banana/band
            assert_eq!(len, Some(4), "{mappers}x{reducers} combine={combine}");
        }
    }

    #[test]
    fn identical_lines_never_become_unique() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "same\nsame\n").unwrap();
        let mut engine = MapReduce::new(2, 2).unwrap();
        let len = min_unique_prefix(&mut engine, &input, &dir.path().join("out"), true, 8).unwrap();
        assert_eq!(len, None);
    }
}
