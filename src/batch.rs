//! Batch orchestration: many uploads in, one Word document out.
//!
//! [`Transcriber`] drives every stage of [`crate::pipeline`] over a batch in
//! upload order. Failures are contained at the smallest scope that makes
//! sense: a bad page follows the [`PageFailurePolicy`], a bad file is
//! recorded in the report and skipped, and only a batch with nothing left to
//! assemble is an error.
//!
//! The free functions at the bottom are the convenience entry points used by
//! the CLI; they wire up the Gemini client and pdfium from a
//! [`TranscriptionConfig`].

use crate::config::{PageFailurePolicy, TranscriptionConfig};
use crate::error::{HandscriptError, PageError};
use crate::output::{
    BatchOutput, BatchReport, DocumentSection, FileReport, FileStatus, PageTranscript,
};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::encode::encode_page;
use crate::pipeline::gemini::GeminiClient;
use crate::pipeline::input::{SourceFile, SourceKind};
use crate::pipeline::recognize::{recognize_page, Recognizer};
use crate::pipeline::render::{image_pages, Page, PdfiumRasterizer, Rasterizer};
use crate::pipeline::writer::DocumentWriter;
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use crate::prompts::page_instruction;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

static NOOP_PROGRESS: NoopProgressCallback = NoopProgressCallback;

/// Runs batches against one rasterizer and one recognition backend.
///
/// The futures returned by [`Transcriber::run`] are not `Send`: an open
/// pdfium document is held across recognition calls so pages can be
/// rendered on demand. Drive them with `block_on`, `#[tokio::main]` or a
/// `LocalSet`. Page rendering runs on the task itself and blocks its worker
/// thread while pdfium draws a page.
pub struct Transcriber {
    rasterizer: Box<dyn Rasterizer>,
    recognizer: Arc<dyn Recognizer>,
    config: TranscriptionConfig,
}

impl Transcriber {
    pub fn new(
        rasterizer: Box<dyn Rasterizer>,
        recognizer: Arc<dyn Recognizer>,
        config: TranscriptionConfig,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            config,
        }
    }

    /// Transcribe `files` into a single document.
    ///
    /// # Errors
    /// - [`HandscriptError::NoInput`] for an empty batch
    /// - [`HandscriptError::AllFilesFailed`] when no file produced a section
    /// - [`HandscriptError::DocumentAssembly`] when packing the DOCX fails
    ///
    /// Per-file failures are reported in [`BatchOutput::report`].
    pub async fn run(&self, files: Vec<SourceFile>) -> Result<BatchOutput, HandscriptError> {
        self.run_inputs(files.into_iter().map(|f| (f.name.clone(), Ok(f))).collect())
            .await
    }

    /// Like [`Transcriber::run`], but some inputs may already have failed to load.
    async fn run_inputs(
        &self,
        inputs: Vec<(String, Result<SourceFile, HandscriptError>)>,
    ) -> Result<BatchOutput, HandscriptError> {
        if inputs.is_empty() {
            return Err(HandscriptError::NoInput);
        }

        let batch_start = Instant::now();
        let total = inputs.len();
        let progress = self.progress();
        progress.on_batch_start(total);
        info!("Starting batch: {} files via {}", total, self.recognizer.name());

        let mut sections = Vec::new();
        let mut report = BatchReport::default();

        for (index, (name, input)) in inputs.into_iter().enumerate() {
            progress.on_file_start(index, &name);
            let file_start = Instant::now();

            let outcome = match input {
                Ok(file) => self.transcribe_file(index, &file).await,
                Err(e) => Err(e),
            };
            let duration_ms = file_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(section) => {
                    info!(
                        "{}: {} pages ({} failed) in {}ms",
                        name,
                        section.pages.len(),
                        section.failed_pages().len(),
                        duration_ms
                    );
                    progress.on_file_complete(index, &name, section.pages.len());
                    report.total_input_tokens +=
                        section.pages.iter().map(|p| p.input_tokens).sum::<u64>();
                    report.total_output_tokens +=
                        section.pages.iter().map(|p| p.output_tokens).sum::<u64>();
                    report.files.push(FileReport {
                        index,
                        filename: name,
                        status: FileStatus::Succeeded,
                        pages: section.pages.len(),
                        failed_pages: section.failed_pages(),
                        duration_ms,
                    });
                    sections.push(section);
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!("{}: skipped: {}", name, error);
                    progress.on_file_error(index, &name, &error);
                    report.files.push(FileReport {
                        index,
                        filename: name,
                        status: FileStatus::Failed { error },
                        pages: 0,
                        failed_pages: Vec::new(),
                        duration_ms,
                    });
                }
            }
        }

        if sections.is_empty() {
            progress.on_batch_complete(total, 0);
            return Err(HandscriptError::AllFilesFailed {
                total,
                first_error: report.first_error().unwrap_or("unknown error").to_string(),
            });
        }

        let document = DocumentWriter::new(self.config.document.clone()).render(&sections)?;
        report.total_duration_ms = batch_start.elapsed().as_millis() as u64;

        info!(
            "Batch complete: {}/{} files, {} bytes, {}ms",
            report.succeeded(),
            total,
            document.len(),
            report.total_duration_ms
        );
        progress.on_batch_complete(total, report.succeeded());

        Ok(BatchOutput {
            document,
            sections,
            report,
        })
    }

    /// Validate, rasterise and recognise one file.
    async fn transcribe_file(
        &self,
        index: usize,
        file: &SourceFile,
    ) -> Result<DocumentSection, HandscriptError> {
        let kind = file.validate(self.config.max_file_bytes)?;
        let pages = match kind {
            SourceKind::Pdf => self.rasterizer.rasterize(&file.name, &file.bytes)?,
            SourceKind::Image => image_pages(&file.name, &file.bytes)?,
        };

        let prompt = self.config.prompt();
        let progress = self.progress();
        let mut results = stream::iter(pages)
            .map(|page| self.process_page(page, prompt))
            .buffered(self.config.concurrency.max(1));

        let mut transcripts = Vec::new();
        while let Some(result) = results.next().await {
            match result {
                Ok(transcript) => {
                    progress.on_page_complete(index, transcript.page_num, transcript.text.len());
                    transcripts.push(transcript);
                }
                Err(e) => {
                    warn!("{}: {}", file.name, e);
                    progress.on_page_error(index, e.page(), &e.to_string());
                    match self.config.page_failure_policy {
                        PageFailurePolicy::AbortFile => {
                            return Err(HandscriptError::FileAborted {
                                name: file.name.clone(),
                                source: e,
                            });
                        }
                        PageFailurePolicy::Placeholder => {
                            transcripts.push(PageTranscript::failed(e, &self.config.placeholder));
                        }
                    }
                }
            }
        }

        Ok(aggregate(file.name.clone(), transcripts))
    }

    /// Encode one rendered page and recognise it. The bitmap is dropped
    /// before the network call.
    async fn process_page(
        &self,
        page: Result<Page, PageError>,
        prompt: &str,
    ) -> Result<PageTranscript, PageError> {
        let page = page?;
        let page_num = page.page_num;
        let encoded = encode_page(page_num, &page.image)?;
        drop(page);

        let instruction = page_instruction(prompt, page_num);
        recognize_page(self.recognizer.as_ref(), &encoded, &instruction, &self.config).await
    }

    fn progress(&self) -> &dyn BatchProgressCallback {
        match self.config.progress_callback.as_deref() {
            Some(cb) => cb,
            None => &NOOP_PROGRESS,
        }
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Transcribe in-memory uploads with the Gemini backend.
///
/// The client is built first, so a missing API key fails with
/// [`HandscriptError::MissingCredential`] before any file is touched or any
/// request is sent.
pub async fn transcribe(
    files: Vec<SourceFile>,
    config: &TranscriptionConfig,
) -> Result<BatchOutput, HandscriptError> {
    let recognizer: Arc<dyn Recognizer> = Arc::new(GeminiClient::new(config)?);
    let rasterizer = PdfiumRasterizer::from_config(config)?;
    Transcriber::new(Box::new(rasterizer), recognizer, config.clone())
        .run(files)
        .await
}

/// Transcribe files read from disk with the given recognition backend.
///
/// A path that cannot be read becomes a failed entry in the report, like
/// any other per-file failure.
pub async fn transcribe_paths(
    paths: &[PathBuf],
    recognizer: Arc<dyn Recognizer>,
    config: &TranscriptionConfig,
) -> Result<BatchOutput, HandscriptError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        inputs.push((name, SourceFile::from_path(path).await));
    }

    let rasterizer = PdfiumRasterizer::from_config(config)?;
    Transcriber::new(Box::new(rasterizer), recognizer, config.clone())
        .run_inputs(inputs)
        .await
}

/// Synchronous wrapper around [`transcribe`].
///
/// Creates a temporary tokio runtime internally.
pub fn transcribe_sync(
    files: Vec<SourceFile>,
    config: &TranscriptionConfig,
) -> Result<BatchOutput, HandscriptError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HandscriptError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe(files, config))
}

/// Write DOCX bytes to `path`, creating parent directories.
///
/// Writes to a sibling temp file and renames it into place.
pub async fn write_document(bytes: &[u8], path: impl AsRef<Path>) -> Result<(), HandscriptError> {
    let path = path.as_ref();
    let write_err = |source| HandscriptError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
