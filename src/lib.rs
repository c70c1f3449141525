//! # handscript
//!
//! Transcribe scanned handwritten questionnaires into a Word document using a
//! multimodal AI service.
//!
//! Each page is rasterised and sent as an image to the recognition service
//! (Gemini by default). The returned text is cleaned up and collected per
//! file, and the whole batch ends up in one `.docx` with a heading per file
//! and a marker per page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads (PDF / image)
//!  │
//!  ├─ 1. Validate    extension, size cap, magic bytes
//!  ├─ 2. Render      rasterise pages lazily via pdfium (200 DPI)
//!  ├─ 3. Encode      PNG → base64
//!  ├─ 4. Recognize   Gemini generateContent, or any edgequake-llm provider
//!  ├─ 5. Polish      fences, whitespace, Japanese spacing
//!  ├─ 6. Aggregate   one section per file, pages in order
//!  └─ 7. Write       one DOCX for the batch
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handscript::{transcribe, write_document, SourceFile, TranscriptionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TranscriptionConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let files = vec![SourceFile::from_path("survey_01.pdf").await?];
//!
//!     let output = transcribe(files, &config).await?;
//!     write_document(&output.document, "transcription.docx").await?;
//!     eprintln!("{}/{} files", output.report.succeeded(), output.report.files.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `handscript` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! handscript = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{transcribe, transcribe_paths, transcribe_sync, write_document, Transcriber};
pub use config::{
    DocumentOptions, PageFailurePolicy, TranscriptionConfig, TranscriptionConfigBuilder,
};
pub use error::{HandscriptError, PageError, RecognitionError};
pub use output::{
    BatchOutput, BatchReport, DocumentSection, FileReport, FileStatus, PageTranscript,
};
pub use pipeline::encode::EncodedPage;
pub use pipeline::gemini::GeminiClient;
pub use pipeline::input::{transcription_file_name, SourceFile, SourceKind};
pub use pipeline::provider::ProviderRecognizer;
pub use pipeline::recognize::{Recognition, Recognizer};
pub use pipeline::render::{Page, PageIter, PdfiumRasterizer, Rasterizer, RenderSettings};
pub use pipeline::writer::{Block, DocumentLayout, DocumentWriter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
