use std::fs;
use std::path::Path;

use crate::codec::{RecordReader, RecordWriter};
use crate::error::{Error, IoContext, Result};
use crate::utils::map_path;
use crate::Record;

/// Record counts before and after combining one map file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CombineStats {
    pub records_in: u64,
    pub records_out: u64,
}

/// Folds runs of identical keys in mapper `index`'s file into one record
/// carrying the sum of their values, dropping sums that are not positive.
///
/// The map file is already sorted, so this is a single linear pass. The
/// result replaces the file in place.
pub fn combine(output: &Path, index: usize) -> Result<CombineStats> {
    let path = map_path(output, index);
    let mut stats = CombineStats::default();
    let mut combined: Vec<Record> = Vec::new();

    for record in RecordReader::open(&path)? {
        let record = record?;
        stats.records_in += 1;
        match combined.last_mut() {
            Some(last) if last.key == record.key => {
                last.value = last
                    .value
                    .checked_add(record.value)
                    .ok_or_else(|| Error::ValueOverflow {
                        key: record.key.clone(),
                    })?;
            }
            _ => combined.push(record),
        }
    }
    combined.retain(|record| record.value > 0);

    let staging = path.with_extension("combine");
    let mut writer = RecordWriter::create(&staging)?;
    for record in &combined {
        writer.write(record)?;
    }
    stats.records_out = writer.records_written();
    writer.finish()?;
    fs::rename(&staging, &path).with_path(&path)?;

    tracing::debug!(
        index,
        records_in = stats.records_in,
        records_out = stats.records_out,
        "combined map output"
    );
    Ok(stats)
}

/// Combines every map file, one after the other.
pub fn combine_all(output: &Path, mappers: usize) -> Result<Vec<CombineStats>> {
    (0..mappers).map(|index| combine(output, index)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn write_map_file(dir: &Path, index: usize, records: &[Record]) {
        let mut writer = RecordWriter::create(map_path(dir, index)).unwrap();
        for record in records {
            writer.write(record).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_map_file(dir: &Path, index: usize) -> Vec<Record> {
        RecordReader::open(map_path(dir, index))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn sums_consecutive_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_map_file(
            dir.path(),
            0,
            &[
                Record::new("apple", 1),
                Record::new("apple", 1),
                Record::new("banana", 1),
                Record::new("cherry", 2),
                Record::new("cherry", 3),
            ],
        );
        let stats = combine(dir.path(), 0).unwrap();
        assert_eq!(
            stats,
            CombineStats {
                records_in: 5,
                records_out: 3
            }
        );
        assert_eq!(
            read_map_file(dir.path(), 0),
            vec![
                Record::new("apple", 2),
                Record::new("banana", 1),
                Record::new("cherry", 5)
            ]
        );
        assert!(!map_path(dir.path(), 0).with_extension("combine").exists());
    }

    #[test]
    fn non_positive_sums_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write_map_file(
            dir.path(),
            0,
            &[
                Record::new("a", 2),
                Record::new("a", -2),
                Record::new("b", 0),
                Record::new("c", -1),
                Record::new("c", 4),
            ],
        );
        combine(dir.path(), 0).unwrap();
        assert_eq!(read_map_file(dir.path(), 0), vec![Record::new("c", 3)]);
    }

    #[test]
    fn empty_map_file_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_map_file(dir.path(), 0, &[]);
        let stats = combine(dir.path(), 0).unwrap();
        assert_eq!(stats.records_out, 0);
        assert!(read_map_file(dir.path(), 0).is_empty());
    }

    #[test]
    fn overflow_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_map_file(
            dir.path(),
            0,
            &[Record::new("big", i64::MAX), Record::new("big", 1)],
        );
        assert!(matches!(
            combine(dir.path(), 0),
            Err(Error::ValueOverflow { key }) if key == "big"
        ));
    }

    #[test]
    fn malformed_map_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(map_path(dir.path(), 0), "a 1\nnot-a-record\n").unwrap();
        assert!(matches!(
            combine(dir.path(), 0),
            Err(Error::MalformedRecord { line: 2, .. })
        ));
    }

    #[test]
    fn missing_map_file_is_a_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(combine(dir.path(), 3).unwrap_err().is_io());
    }

    proptest! {
        #[test]
        fn matches_reference_aggregation(
            mut keys in prop::collection::vec("[a-e]{1,3}", 0..60),
        ) {
            keys.sort();
            let dir = tempfile::tempdir().unwrap();
            let records: Vec<_> = keys.iter().map(|k| Record::new(k.as_str(), 1)).collect();
            write_map_file(dir.path(), 0, &records);
            combine_all(dir.path(), 1).unwrap();

            let mut reference = BTreeMap::new();
            for key in &keys {
                *reference.entry(key.clone()).or_insert(0i64) += 1;
            }
            let expected: Vec<_> = reference
                .into_iter()
                .map(|(key, value)| Record::new(key, value))
                .collect();
            prop_assert_eq!(read_map_file(dir.path(), 0), expected);
        }
    }
}
