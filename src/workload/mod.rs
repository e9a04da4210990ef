//! Converts application names to actual application code.
//!
//! # Example
//!
//! To get the word count application:
//! ```
//! # use anyhow::Result;
//! use mrlocal::workload;
//! # fn main() -> Result<()> {
//! let wc = workload::named("wc", &[])?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use itertools::Itertools;

use crate::codec::{RecordReader, RecordWriter};
use crate::{Record, Workload};

pub mod lines;
pub mod prefix;
pub mod wc;

/// Gets the [`Workload`] named `name`, configured from `args`.
///
/// Returns an [`anyhow::Error`] if no application with the given name was
/// found or its arguments do not parse.
pub fn named(name: &str, args: &[String]) -> Result<Workload> {
    match name {
        "wc" => Ok(wc::workload()),
        "lines" => Ok(lines::workload()),
        "prefix" => prefix::from_args(args),
        _ => bail!("No app named `{}` found.", name),
    }
}

/// Where reducer `index` writes its results: `result_<index>` next to the
/// partition file.
pub fn result_path(partition: &Path, index: usize) -> PathBuf {
    partition.with_file_name(format!("result_{index}"))
}

/// Reduce function shared by the counting workloads: sums the values of
/// each key in the partition and writes `"<key> <total>"` lines.
pub fn sum_by_key(index: usize, partition: &Path) -> Result<()> {
    let records = RecordReader::open(partition)?.collect::<crate::Result<Vec<_>>>()?;
    let mut writer = RecordWriter::create(result_path(partition, index))?;
    for (key, group) in &records.into_iter().chunk_by(|r| r.key.clone()) {
        let Some(total) = group.map(|r| r.value).try_fold(0i64, i64::checked_add) else {
            bail!("sum for key `{}` overflows i64", key);
        };
        writer.write(&Record::new(key, total))?;
    }
    writer.finish()?;
    Ok(())
}

/// Makes arbitrary text usable as a record key.
///
/// Backslash and whitespace are escaped and the empty string becomes `\e`,
/// so distinct inputs always give distinct keys.
pub fn escape_key(text: &str) -> String {
    if text.is_empty() {
        return "\\e".to_string();
    }
    let mut key = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => key.push_str("\\\\"),
            ' ' => key.push_str("\\s"),
            '\t' => key.push_str("\\t"),
            c if c.is_whitespace() => key.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => key.push(c),
        }
    }
    key
}
