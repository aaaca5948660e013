//! PDF-to-PNG rasterization, modeled as a trait so the Ingest API stays a
//! pure orchestrator regardless of which rendering engine backs it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("failed to rasterize document: {0}")]
    Failed(String),
}

/// Converts a document's raw bytes into an ordered sequence of PNG page
/// images. For plain raster images the "rasterization" is the identity
/// transform (one page).
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, RasterizeError>;
}

/// Used for any already-raster input (`.png`, `.jpg`, `.jpeg`, `.tiff`,
/// `.bmp`, `.webp`): the submitted bytes are the one and only page.
pub struct PassthroughRasterizer;

impl Rasterizer for PassthroughRasterizer {
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, RasterizeError> {
        Ok(vec![bytes.to_vec()])
    }
}

#[cfg(feature = "pdf")]
pub struct PdfiumRasterizer {
    pdfium: pdfium_render::prelude::Pdfium,
    dpi: f32,
}

#[cfg(feature = "pdf")]
impl PdfiumRasterizer {
    /// `dpi` defaults to 150 per the ingest contract (spec.md §4.5).
    pub fn new(dpi: f32) -> Result<Self, RasterizeError> {
        let bindings = pdfium_render::prelude::Pdfium::bind_to_system_library()
            .map_err(|err| RasterizeError::Failed(err.to_string()))?;
        Ok(Self {
            pdfium: pdfium_render::prelude::Pdfium::new(bindings),
            dpi,
        })
    }
}

#[cfg(feature = "pdf")]
impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, RasterizeError> {
        use pdfium_render::prelude::*;

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|err| RasterizeError::Failed(err.to_string()))?;

        let scale = self.dpi / 72.0;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut pages = Vec::new();
        for page in document.pages().iter() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|err| RasterizeError::Failed(err.to_string()))?;
            let image = bitmap.as_image();
            let mut buf = std::io::Cursor::new(Vec::new());
            image
                .write_to(&mut buf, image::ImageFormat::Png)
                .map_err(|err| RasterizeError::Failed(err.to_string()))?;
            pages.push(buf.into_inner());
        }

        if pages.is_empty() {
            return Err(RasterizeError::Failed("document has no pages".to_string()));
        }

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_returns_the_input_as_a_single_page() {
        let r = PassthroughRasterizer;
        let pages = r.rasterize(b"fake-png-bytes").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0], b"fake-png-bytes");
    }
}
