//! Aggregation: per-page transcripts → one [`DocumentSection`] per file.

use crate::output::{DocumentSection, PageTranscript};

/// Collect one file's transcripts into a section ordered by page number.
///
/// Pages may arrive out of order when recognition runs concurrently; the
/// sort is stable, so duplicate page numbers keep their arrival order.
pub fn aggregate(filename: impl Into<String>, mut pages: Vec<PageTranscript>) -> DocumentSection {
    pages.sort_by_key(|p| p.page_num);
    DocumentSection {
        filename: filename.into(),
        pages,
    }
}
