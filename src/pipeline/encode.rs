//! Image encoding: `DynamicImage` → base64 PNG for the request body.
//!
//! Both recognition backends embed the page as inline base64 data. PNG is
//! lossless, so pen strokes keep their edges; JPEG artefacts around thin
//! strokes are enough to flip similar kana.

use crate::error::PageError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page image ready to send to the recognition service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// 1-based page number within its source file.
    pub page_num: usize,
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) image bytes.
    pub data: String,
}

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<EncodedPage, PageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {e}"),
        })?;

    let data = STANDARD.encode(&buf);
    debug!("Page {}: encoded image → {} bytes base64", page_num, data.len());

    Ok(EncodedPage {
        page_num,
        mime_type: "image/png".to_string(),
        data,
    })
}
