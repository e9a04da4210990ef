use std::path::Path;

use super::barrier::fork_join;
use crate::error::{Error, Phase, Result};
use crate::utils::partition_path;
use crate::ReduceFn;

/// Runs one reduce worker per partition file and waits for all of them.
///
/// The engine does not read the partitions itself; worker `j` just hands
/// `reduce_j`'s path to `reduce_fn`.
pub fn run_reducers(output: &Path, partitions: usize, reduce_fn: &ReduceFn) -> Result<()> {
    fork_join(Phase::Reduce, partitions, |index, cancel| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                phase: Phase::Reduce,
                index,
            });
        }
        let path = partition_path(output, index);
        reduce_fn(index, &path).map_err(|e| Error::callback(Phase::Reduce, index, e))?;
        tracing::debug!(index, "reduce worker done");
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn every_partition_gets_one_worker() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reduce_fn = crate::reduce_fn(move |index, path| {
            sink.lock().unwrap().push((index, path.to_path_buf()));
            Ok(())
        });
        run_reducers(dir.path(), 3, &reduce_fn).unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        let expected: Vec<_> = (0..3).map(|j| (j, partition_path(dir.path(), j))).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn no_partitions_means_no_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let reduce_fn = crate::reduce_fn(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        run_reducers(Path::new("/nonexistent"), 0, &reduce_fn).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_reducer_fails_the_phase() {
        let reduce_fn = crate::reduce_fn(|index, _| {
            anyhow::ensure!(index != 1, "partition {index} is corrupt");
            Ok(())
        });
        let err = run_reducers(Path::new("/tmp"), 3, &reduce_fn).unwrap_err();
        match err {
            Error::Callback {
                phase: Phase::Reduce,
                index: 1,
                source,
            } => assert_eq!(source.to_string(), "partition 1 is corrupt"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
