//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline reads files, calls the model and validates the
//! reply.
//!
//! # Example
//!
//! ```rust
//! use edgequake_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     read: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_file_read(&self, _index: usize, total: usize, name: &str, bytes: usize) {
//!         let done = self.read.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total} {name} ({bytes} bytes)");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { read: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it progresses.
///
/// File reads run concurrently, so `on_file_read` may be called from several
/// tasks and in completion order rather than input order. All methods have
/// no-op defaults.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once the request passed validation, before any file is read.
    fn on_extraction_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called after a file has been read and encoded.
    ///
    /// # Arguments
    /// * `index` — 0-indexed position of the file in the batch
    /// * `total` — number of files in the batch
    /// * `name`  — file name
    /// * `bytes` — raw size of the file
    fn on_file_read(&self, index: usize, total: usize, name: &str, bytes: usize) {
        let _ = (index, total, name, bytes);
    }

    /// Called just before the model request is sent.
    fn on_request_sent(&self, content_parts: usize) {
        let _ = content_parts;
    }

    /// Called when a non-empty dataset has been validated.
    fn on_extraction_complete(&self, records: usize) {
        let _ = records;
    }

    /// Called when the request fails at any stage after validation.
    fn on_extraction_error(&self, error: &str) {
        let _ = error;
    }
}

/// Callback that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Shared, thread-safe callback handle stored in the config.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_extraction_start(&self, total_files: usize) {
            self.events.lock().unwrap().push(format!("start:{total_files}"));
        }

        fn on_extraction_complete(&self, records: usize) {
            self.events.lock().unwrap().push(format!("done:{records}"));
        }
    }

    #[test]
    fn defaults_are_noops() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(3);
        cb.on_file_read(0, 3, "a.txt", 10);
        cb.on_request_sent(10);
        cb.on_extraction_complete(2);
        cb.on_extraction_error("boom");
    }

    #[test]
    fn overridden_methods_fire() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_extraction_start(2);
        cb.on_request_sent(7);
        cb.on_extraction_complete(5);
        assert_eq!(*rec.events.lock().unwrap(), vec!["start:2", "done:5"]);
    }

    #[test]
    fn callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopProgressCallback>();
        assert_send_sync::<ProgressCallback>();
    }
}
