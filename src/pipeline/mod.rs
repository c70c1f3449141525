//! Pipeline stages for questionnaire transcription.
//!
//! Each submodule implements one transformation step so it can be tested on
//! its own and swapped (a fake rasterizer, a different recognition backend)
//! without touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ recognize ──▶ postprocess ──▶ aggregate ──▶ writer
//! (validate) (pdfium)  (base64)   (Gemini/LLM)   (cleanup)      (section)     (DOCX)
//! ```
//!
//! 1. [`input`]     : classify each upload and reject bad ones early
//! 2. [`render`]    : rasterise pages lazily, one bitmap in memory at a time
//! 3. [`encode`]    : PNG-encode and base64-wrap each page
//! 4. [`recognize`] : the [`recognize::Recognizer`] seam plus the retry loop;
//!    [`gemini`] and [`provider`] are the two backends
//! 5. [`postprocess`] : deterministic cleanup of the returned text
//! 6. [`aggregate`] : page transcripts → one section per file, in page order
//! 7. [`writer`]    : sections → DOCX bytes

pub mod aggregate;
pub mod encode;
pub mod gemini;
pub mod input;
pub mod postprocess;
pub mod provider;
pub mod recognize;
pub mod render;
pub mod writer;
