//! Data produced by a batch: per-page transcripts, per-file sections and the
//! status report handed back to the caller.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// The final state of one page.
///
/// A page that failed under the placeholder policy keeps the placeholder in
/// `text` and the cause in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTranscript {
    /// 1-based page number within its source file.
    pub page_num: usize,
    /// Recognised (post-processed) text, or the placeholder.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u32,
    pub error: Option<PageError>,
}

impl PageTranscript {
    /// A successfully recognised page.
    pub fn recognised(page_num: usize, text: impl Into<String>) -> Self {
        Self {
            page_num,
            text: text.into(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: None,
        }
    }

    /// A failed page whose body is `placeholder`.
    pub fn failed(error: PageError, placeholder: impl Into<String>) -> Self {
        Self {
            page_num: error.page(),
            text: placeholder.into(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One source file's heading plus its pages, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Source filename, used as the section heading.
    pub filename: String,
    pub pages: Vec<PageTranscript>,
}

impl DocumentSection {
    /// Page bodies in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|p| p.text.as_str())
    }

    /// Page numbers that fell back to the placeholder.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| !p.is_ok())
            .map(|p| p.page_num)
            .collect()
    }
}

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Succeeded,
    Failed { error: String },
}

/// Per-file line of the batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// Position in the upload order (0-based).
    pub index: usize,
    pub filename: String,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Pages in the section (0 for failed files).
    pub pages: usize,
    /// Pages that fell back to the placeholder.
    pub failed_pages: Vec<usize>,
    pub duration_ms: u64,
}

impl FileReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, FileStatus::Succeeded)
    }
}

/// Per-file status for a whole batch, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    /// First failure message, for batch-level error reporting.
    pub fn first_error(&self) -> Option<&str> {
        self.files.iter().find_map(|f| match &f.status {
            FileStatus::Failed { error } => Some(error.as_str()),
            FileStatus::Succeeded => None,
        })
    }
}

/// The result of a batch with at least one successful file.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// The assembled DOCX package.
    #[serde(skip)]
    pub document: Vec<u8>,
    /// Sections that went into `document`, in upload order.
    pub sections: Vec<DocumentSection>,
    pub report: BatchReport,
}
