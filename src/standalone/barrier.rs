//! Fork/join execution of one parallel phase.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::{Error, Phase, Result};

/// Raised by the first failing worker of a phase; siblings poll it and stop.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runs `work(0..count)` on one scoped thread each and waits for all of them.
///
/// Results come back in index order. If any worker fails, the failure with
/// the lowest index that is not a [`Error::Cancelled`] is returned and the
/// rest are logged.
pub fn fork_join<T, F>(phase: Phase, count: usize, work: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &CancelFlag) -> Result<T> + Sync,
{
    let cancel = CancelFlag::default();
    let outcomes: Vec<Result<T>> = thread::scope(|s| {
        let handles: Vec<_> = (0..count)
            .map(|index| {
                let work = &work;
                let cancel = &cancel;
                s.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(index, cancel)))
                        .unwrap_or_else(|payload| {
                            Err(Error::Panicked {
                                phase,
                                index,
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    if outcome.is_err() {
                        cancel.cancel();
                    }
                    outcome
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    Err(Error::Panicked {
                        phase,
                        index,
                        message: panic_message(payload.as_ref()),
                    })
                })
            })
            .collect()
    });

    let mut results = Vec::with_capacity(count);
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(value) => results.push(value),
            Err(e) => failures.push(e),
        }
    }
    if failures.is_empty() {
        return Ok(results);
    }

    let failed = failures.len();
    let primary = failures.iter().position(|e| !e.is_cancelled()).unwrap_or(0);
    let error = failures.remove(primary);
    for other in failures.iter().filter(|e| !e.is_cancelled()) {
        tracing::warn!(%phase, error = %other, "additional worker failure");
    }
    tracing::error!(%phase, failed, error = %error, "phase failed");
    Err(error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
