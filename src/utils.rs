//! Utility functions for naming and managing the files of a run.
//!
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result};

/// Path of mapper `index`'s intermediate file.
pub fn map_path(output: &Path, index: usize) -> PathBuf {
    output.join(format!("map_{index}"))
}

/// Path of reduce partition `index`.
pub fn partition_path(output: &Path, index: usize) -> PathBuf {
    output.join(format!("reduce_{index}"))
}

/// Creates `dir` if it does not exist, otherwise deletes everything in it.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        clear_dir(dir)
    } else {
        fs::create_dir_all(dir).with_path(dir)
    }
}

/// Removes every entry of `dir`, leaving the directory itself in place.
pub fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let path = entry.with_path(dir)?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path).with_path(&path)?;
        } else {
            fs::remove_file(&path).with_path(&path)?;
        }
    }
    Ok(())
}

/// Sum of the sizes of the given files.
pub fn total_size<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Result<u64> {
    paths.into_iter().try_fold(0, |total, path| {
        Ok(total + fs::metadata(path).with_path(path)?.len())
    })
}
