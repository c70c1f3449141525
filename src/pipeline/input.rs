//! Input validation: classify an upload and reject it before any work.
//!
//! A batch receives named byte buffers. Each is classified by extension as a
//! PDF or a single-page image, then checked against the size cap and the
//! format's magic bytes so callers get a meaningful per-file error rather
//! than a pdfium failure deep in the pipeline.

use crate::error::HandscriptError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image extensions accepted as single-page sources.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff"];

/// What kind of source an upload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
}

impl SourceKind {
    /// Classify a filename by extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        if ext == "pdf" {
            Some(SourceKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceKind::Image)
        } else {
            None
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; the filename component becomes the name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, HandscriptError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { name, bytes })
    }

    /// Classify and validate the upload.
    pub fn validate(&self, max_bytes: u64) -> Result<SourceKind, HandscriptError> {
        let kind = SourceKind::from_name(&self.name).ok_or_else(|| {
            HandscriptError::UnsupportedFile {
                name: self.name.clone(),
            }
        })?;

        if self.bytes.is_empty() {
            return Err(unreadable(kind, &self.name, "file is empty"));
        }

        let size = self.bytes.len() as u64;
        if size > max_bytes {
            return Err(HandscriptError::FileTooLarge {
                name: self.name.clone(),
                size,
                limit: max_bytes,
            });
        }

        match kind {
            SourceKind::Pdf if !self.bytes.starts_with(b"%PDF") => {
                let magic: Vec<u8> = self.bytes.iter().take(4).copied().collect();
                Err(unreadable(
                    kind,
                    &self.name,
                    &format!("missing %PDF header (first bytes: {magic:?})"),
                ))
            }
            SourceKind::Image if !has_image_magic(&self.bytes) => Err(unreadable(
                kind,
                &self.name,
                "content does not match any supported image format",
            )),
            _ => Ok(kind),
        }
    }
}

fn unreadable(kind: SourceKind, name: &str, detail: &str) -> HandscriptError {
    match kind {
        SourceKind::Pdf => HandscriptError::UnreadablePdf {
            name: name.to_string(),
            detail: detail.to_string(),
        },
        SourceKind::Image => HandscriptError::UnreadableImage {
            name: name.to_string(),
            detail: detail.to_string(),
        },
    }
}

fn io_error(path: &Path, e: std::io::Error) -> HandscriptError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => HandscriptError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => HandscriptError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

/// PNG, JPEG, GIF, WebP, BMP or TIFF signature.
fn has_image_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(b"\xff\xd8")
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || (bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
        || bytes.starts_with(b"BM")
        || bytes.starts_with(b"II*\x00")
        || bytes.starts_with(b"MM\x00*")
}

/// Output filename for a per-file document: `{stem}_transcription.docx`.
///
/// Characters that are invalid on common filesystems become `_` and the stem
/// is capped at 100 characters.
pub fn transcription_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "transcription".to_string());

    let cleaned: String = stem
        .chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
        .take(100)
        .collect();

    format!("{}_transcription.docx", cleaned.trim())
}

/// Output paths for a batch of sources, one per name, in order.
///
/// Names that map to the same file (two `survey.pdf` uploads from different
/// folders) get a position suffix from the second occurrence on:
/// `survey_transcription.docx`, `survey_2_transcription.docx`.
pub fn transcription_paths<'a>(
    dir: &Path,
    source_names: impl IntoIterator<Item = &'a str>,
) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    let mut paths = Vec::new();

    for (i, name) in source_names.into_iter().enumerate() {
        let mut file_name = transcription_file_name(name);
        if taken.contains(&file_name) {
            let stem = file_name.trim_end_matches("_transcription.docx").to_string();
            let mut n = i + 1;
            loop {
                let candidate = format!("{stem}_{n}_transcription.docx");
                if !taken.contains(&candidate) {
                    file_name = candidate;
                    break;
                }
                n += 1;
            }
        }
        taken.insert(file_name.clone());
        paths.push(dir.join(file_name));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 1024;

    #[test]
    fn kind_from_extension() {
        assert_eq!(SourceKind::from_name("survey.PDF"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_name("scan.jpeg"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_name("notes.txt"), None);
        assert_eq!(SourceKind::from_name("noext"), None);
    }

    #[test]
    fn valid_pdf_header() {
        let f = SourceFile::new("a.pdf", b"%PDF-1.7\n...".to_vec());
        assert_eq!(f.validate(MAX).unwrap(), SourceKind::Pdf);
    }

    #[test]
    fn empty_pdf_is_unreadable() {
        let f = SourceFile::new("a.pdf", Vec::new());
        assert!(matches!(
            f.validate(MAX),
            Err(HandscriptError::UnreadablePdf { .. })
        ));
    }

    #[test]
    fn pdf_without_magic_is_unreadable() {
        let f = SourceFile::new("a.pdf", b"<html>".to_vec());
        let err = f.validate(MAX).unwrap_err();
        assert!(matches!(err, HandscriptError::UnreadablePdf { .. }));
        assert!(err.to_string().contains("%PDF"));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let mut bytes = b"%PDF".to_vec();
        bytes.resize(2048, b' ');
        let f = SourceFile::new("big.pdf", bytes);
        assert!(matches!(
            f.validate(MAX),
            Err(HandscriptError::FileTooLarge {
                size: 2048,
                limit: 1024,
                ..
            })
        ));
    }

    #[test]
    fn image_magic_checked() {
        let png = SourceFile::new("p.png", b"\x89PNG\r\n\x1a\n0000".to_vec());
        assert_eq!(png.validate(MAX).unwrap(), SourceKind::Image);

        let webp = SourceFile::new("w.webp", b"RIFF\0\0\0\0WEBPVP8 ".to_vec());
        assert_eq!(webp.validate(MAX).unwrap(), SourceKind::Image);

        let fake = SourceFile::new("p.png", b"not an image".to_vec());
        assert!(matches!(
            fake.validate(MAX),
            Err(HandscriptError::UnreadableImage { .. })
        ));
    }

    #[test]
    fn unsupported_extension() {
        let f = SourceFile::new("a.docx", b"PK".to_vec());
        assert!(matches!(
            f.validate(MAX),
            Err(HandscriptError::UnsupportedFile { .. })
        ));
    }

    #[test]
    fn output_file_names() {
        assert_eq!(
            transcription_file_name("survey_01.pdf"),
            "survey_01_transcription.docx"
        );
        assert_eq!(transcription_file_name("a:b?.pdf"), "a_b__transcription.docx");
        assert_eq!(transcription_file_name(".pdf"), ".pdf_transcription.docx");
        let long = format!("{}.pdf", "x".repeat(150));
        assert_eq!(
            transcription_file_name(&long),
            format!("{}_transcription.docx", "x".repeat(100))
        );
    }

    #[test]
    fn duplicate_names_get_distinct_paths() {
        let dir = Path::new("out");
        let paths = transcription_paths(dir, ["survey.pdf", "other.pdf", "survey.pdf", "survey.png"]);
        assert_eq!(
            paths,
            vec![
                dir.join("survey_transcription.docx"),
                dir.join("other_transcription.docx"),
                dir.join("survey_3_transcription.docx"),
                dir.join("survey_4_transcription.docx"),
            ]
        );
    }

    #[test]
    fn suffix_skips_names_already_taken() {
        let paths = transcription_paths(Path::new(""), ["a.pdf", "a_3.pdf", "a.pdf"]);
        let names: Vec<_> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(
            names,
            vec!["a_transcription.docx", "a_3_transcription.docx", "a_4_transcription.docx"]
        );
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = SourceFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, HandscriptError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn from_path_reads_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let f = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(f.name, "form.pdf");
        assert_eq!(f.bytes, b"%PDF-1.4");
    }
}
