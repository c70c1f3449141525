//! Progress-callback trait for batch, file and page events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::TranscriptionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through a batch. Callers forward them to a
//! terminal progress bar, a channel or a log without the library knowing how
//! the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use handscript::{BatchProgressCallback, TranscriptionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for PageCounter {
//!     fn on_page_complete(&self, _file_index: usize, page_num: usize, text_len: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}: {text_len} bytes");
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { pages: AtomicUsize::new(0) });
//!
//! let config = TranscriptionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes a batch.
///
/// File indices are 0-based positions in the upload order; page numbers are
/// 1-based. All methods have no-op defaults.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file is touched.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is validated.
    fn on_file_start(&self, file_index: usize, name: &str) {
        let _ = (file_index, name);
    }

    /// Called when a page was recognised.
    fn on_page_complete(&self, file_index: usize, page_num: usize, text_len: usize) {
        let _ = (file_index, page_num, text_len);
    }

    /// Called when a page failed after all attempts.
    fn on_page_error(&self, file_index: usize, page_num: usize, error: &str) {
        let _ = (file_index, page_num, error);
    }

    /// Called when a file produced a section.
    ///
    /// * `pages`: number of pages in the section (placeholders included)
    fn on_file_complete(&self, file_index: usize, name: &str, pages: usize) {
        let _ = (file_index, name, pages);
    }

    /// Called when a file was dropped from the output.
    fn on_file_error(&self, file_index: usize, name: &str, error: &str) {
        let _ = (file_index, name, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, succeeded: usize) {
        let _ = (total_files, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranscriptionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
