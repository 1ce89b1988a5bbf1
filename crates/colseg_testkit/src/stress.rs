//! Concurrent readers for stress tests.
//!
//! Reader threads take fresh snapshots in a loop and check them while the
//! test rebuilds the segment underneath.

use colseg_core::{SegmentDirectory, SegmentReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Checks one snapshot, returning a description of the first problem.
pub type SnapshotCheck = fn(&SegmentReader) -> Result<(), String>;

/// Reader threads running until stopped.
pub struct ReaderPool {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<Result<usize, String>>>,
}

impl ReaderPool {
    /// Starts `threads` readers running `check` against fresh snapshots.
    pub fn spawn(dir: Arc<SegmentDirectory>, threads: usize, check: SnapshotCheck) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handles = (0..threads)
            .map(|_| {
                let dir = Arc::clone(&dir);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut snapshots = 0;
                    loop {
                        check(&dir.reader())?;
                        snapshots += 1;
                        if stop.load(Ordering::Acquire) {
                            return Ok(snapshots);
                        }
                    }
                })
            })
            .collect();
        Self { stop, handles }
    }

    /// Stops every reader and returns the number of snapshots checked.
    ///
    /// # Errors
    ///
    /// Returns the first check failure.
    pub fn stop(self) -> Result<usize, String> {
        self.stop.store(true, Ordering::Release);
        let mut total = 0;
        for handle in self.handles {
            total += handle
                .join()
                .map_err(|_| "reader thread panicked".to_string())??;
        }
        Ok(total)
    }
}

/// Checks a snapshot of the standard scenario.
///
/// Every snapshot must be internally consistent: the values of sampled
/// documents and, if present, the inverted index must agree with the
/// scenario data.
pub fn check_user_country(reader: &SegmentReader) -> Result<(), String> {
    let docs = reader.metadata().total_docs;
    let user = reader.column("userId").map_err(|e| e.to_string())?;
    let country = reader.column("country").map_err(|e| e.to_string())?;

    for doc in (0..docs).step_by(97) {
        if user.value(doc) != Some(crate::fixtures::user_id(doc)) {
            return Err(format!("userId mismatch at {doc} in {}", reader.generation()));
        }
        if country.value(doc) != Some(crate::fixtures::country(doc)) {
            return Err(format!("country mismatch at {doc} in {}", reader.generation()));
        }
    }

    if docs > 0 {
        let doc = docs / 2;
        let expected = crate::fixtures::user_id(doc);
        if let Some(hits) = user.doc_ids(&expected).map_err(|e| e.to_string())? {
            if !hits.contains(doc) || hits.len() != 1 {
                return Err(format!("inverted userId lookup wrong in {}", reader.generation()));
            }
        }
    }
    Ok(())
}
