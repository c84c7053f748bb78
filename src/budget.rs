//! Cooperative cancellation shared by every discovery phase.
//!
//! The primary mechanism is an in-process `Arc<AtomicBool>` flag (set by a
//! `ctrl_c` handler installed in the CLI); the `STOP` sentinel file from the
//! original design remains as a fallback for environments that can't deliver
//! a signal to this process.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct StopSignal {
    sentinel_path: PathBuf,
    cancelled: Arc<AtomicBool>,
}

impl StopSignal {
    #[must_use]
    pub fn new(sentinel_path: PathBuf, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            sentinel_path,
            cancelled,
        }
    }

    /// True once the cancellation flag is set or the `STOP` sentinel file exists.
    #[must_use]
    pub fn requested(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.sentinel_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_file_trips_the_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STOP");
        let stop = StopSignal::new(path.clone(), Arc::new(AtomicBool::new(false)));
        assert!(!stop.requested());
        std::fs::write(&path, "").unwrap();
        assert!(stop.requested());
    }

    #[test]
    fn cancel_flag_trips_the_signal() {
        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let stop = StopSignal::new(dir.path().join("STOP"), flag.clone());
        assert!(!stop.requested());
        flag.store(true, Ordering::Relaxed);
        assert!(stop.requested());
    }
}
