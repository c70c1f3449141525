//! Error types for the handscript library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`HandscriptError`]: **Fatal** for whatever was being attempted: the
//!   whole batch (missing credential, nothing to assemble, every file failed)
//!   or a single file inside a batch (unreadable PDF, oversized upload). A
//!   file's error is recorded in the batch report and the batch moves on.
//!
//! * [`RecognitionError`]: one call to the external recognition service
//!   failed. Classified so the retry loop can tell transient failures from
//!   permanent ones. After the last attempt it is carried by
//!   [`PageError::RecognitionFailed`].
//!
//! * [`PageError`]: **Non-fatal**: a single page failed. Stored inside
//!   [`crate::output::PageTranscript`] so callers can see which pages fell
//!   back to the placeholder text.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the handscript library.
#[derive(Debug, Error)]
pub enum HandscriptError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The upload is empty, lacks the `%PDF` header, or pdfium refused it.
    #[error("'{name}' is not a readable PDF: {detail}")]
    UnreadablePdf { name: String, detail: String },

    /// An image upload could not be recognised or decoded.
    #[error("'{name}' is not a readable image: {detail}")]
    UnreadableImage { name: String, detail: String },

    /// The file extension is neither PDF nor a supported image format.
    #[error("'{name}' has an unsupported file type (expected .pdf or an image)")]
    UnsupportedFile { name: String },

    /// The upload exceeds the configured size cap.
    #[error("'{name}' is {size} bytes, above the {limit}-byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// A page failed under [`crate::config::PageFailurePolicy::AbortFile`].
    #[error("'{name}': {source}")]
    FileAborted {
        name: String,
        #[source]
        source: PageError,
    },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The recognition client was constructed without an API key.
    #[error("No credential configured for the '{backend}' recognition backend.\n{hint}")]
    MissingCredential { backend: String, hint: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// The batch contained zero files.
    #[error("No input files were supplied")]
    NoInput,

    /// Every file in the batch failed; there is nothing to assemble.
    #[error("All {total} files failed.\nFirst error: {first_error}")]
    AllFilesFailed { total: usize, first_error: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The DOCX package could not be built.
    #[error("Failed to assemble the Word document: {0}")]
    DocumentAssembly(String),

    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform (https://github.com/bblanchon/pdfium-binaries)\n\
and either place it on the system library path or pass --pdfium-lib / set PDFIUM_LIB_PATH.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to the external recognition service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RecognitionError {
    /// Connection, DNS, TLS or body-transfer failure.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not finish within the per-call timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 401/403 or an API-key error payload.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// HTTP 429 or a quota error payload.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Any other non-success status or error payload from the service.
    #[error("service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    /// The body did not match the expected response schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response was well-formed but carried no text.
    #[error("service returned no text")]
    EmptyResponse,
}

impl RecognitionError {
    /// Retrying will not help for credential or quota failures.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RecognitionError::Authentication(_) | RecognitionError::RateLimited(_)
        )
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageTranscript`] when a page fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Page rasterisation or PNG encoding failed.
    #[error("page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Recognition failed after all attempts.
    #[error("page {page}: recognition failed after {attempts} attempt(s): {source}")]
    RecognitionFailed {
        page: usize,
        attempts: u32,
        source: RecognitionError,
    },
}

impl PageError {
    /// 1-based page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::RecognitionFailed { page, .. } => {
                *page
            }
        }
    }
}
