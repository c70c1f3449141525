//! Integration tests for the pdfium rasterizer.
//!
//! These need a real pdfium shared library and are gated behind the
//! `PDFIUM_LIB_PATH` environment variable (a library file or the directory
//! holding it).
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test rasterize -- --nocapture

use handscript::{HandscriptError, PdfiumRasterizer, Rasterizer, RenderSettings};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless PDFIUM_LIB_PATH is set; otherwise bind pdfium.
macro_rules! rasterizer_or_skip {
    () => {{
        let Some(path) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) else {
            println!("SKIP — set PDFIUM_LIB_PATH to run pdfium tests");
            return;
        };
        PdfiumRasterizer::bind(
            Some(&path),
            RenderSettings {
                dpi: 72,
                max_rendered_pixels: 1000,
            },
        )
        .expect("bind pdfium")
    }};
}

/// A minimal PDF with `pages` blank US-Letter pages and a correct xref table.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn pages_render_in_document_order() {
    let rasterizer = rasterizer_or_skip!();
    let pdf = blank_pdf(3);

    let pages: Vec<_> = rasterizer
        .rasterize("three.pdf", &pdf)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(pages.iter().map(|p| p.page_num).collect::<Vec<_>>(), vec![1, 2, 3]);
    for page in &pages {
        // 612 × 792 pt at 72 DPI.
        assert_eq!((page.image.width(), page.image.height()), (612, 792));
    }
}

#[test]
fn zero_page_pdf_yields_nothing() {
    let rasterizer = rasterizer_or_skip!();
    let pdf = blank_pdf(0);
    let mut pages = rasterizer.rasterize("empty.pdf", &pdf).unwrap();
    assert!(pages.next().is_none());
}

#[test]
fn garbage_is_unreadable() {
    let rasterizer = rasterizer_or_skip!();
    let err = rasterizer
        .rasterize("junk.pdf", b"%PDF-1.4\nthis is not a pdf body")
        .err()
        .unwrap();
    assert!(matches!(err, HandscriptError::UnreadablePdf { ref name, .. } if name == "junk.pdf"));
}

#[test]
fn pixel_cap_bounds_the_long_edge() {
    let path = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) => PathBuf::from(p),
        None => {
            println!("SKIP — set PDFIUM_LIB_PATH to run pdfium tests");
            return;
        }
    };
    let rasterizer = PdfiumRasterizer::bind(
        Some(&path),
        RenderSettings {
            dpi: 600,
            max_rendered_pixels: 800,
        },
    )
    .unwrap();
    let pdf = blank_pdf(1);

    let page = rasterizer
        .rasterize("big.pdf", &pdf)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert!(page.image.height() <= 800, "height {}", page.image.height());
    assert!(page.image.width() <= 800, "width {}", page.image.width());
}
