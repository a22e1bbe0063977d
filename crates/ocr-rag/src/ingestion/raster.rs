//! PDF rasterization via poppler's `pdftoppm`

use std::fs;
use std::process::Command;

use crate::error::{Error, Result};

/// One page rendered to an image
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// 1-based page number
    pub page_number: u32,
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// File extension matching the encoding (`png`, `jpg`)
    pub extension: String,
}

impl PageImage {
    pub fn new(page_number: u32, bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            page_number,
            bytes,
            extension: extension.into(),
        }
    }
}

/// Turns a paginated document into per-page images
pub trait PageRasterizer: Send + Sync {
    /// Render every page at `dpi`, ordered by page number
    fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<PageImage>>;
}

/// Rasterizer backed by the `pdftoppm` command
pub struct PopplerRasterizer {
    program: String,
}

impl PopplerRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check if the rasterizer program can be spawned
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-v")
            .output()
            .map(|_| true) // -v prints to stderr and may exit non-zero
            .unwrap_or(false)
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<PageImage>> {
        let temp_dir = tempfile::Builder::new()
            .prefix("ocr-rag-raster-")
            .tempdir()
            .map_err(|e| Error::extraction(format!("Failed to create temp dir: {}", e)))?;

        let pdf_path = temp_dir.path().join("input.pdf");
        fs::write(&pdf_path, data)
            .map_err(|e| Error::extraction(format!("Failed to write temp PDF: {}", e)))?;

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(&pdf_path)
            .arg(temp_dir.path().join("page"))
            .output()
            .map_err(|e| Error::extraction(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(format!("{} error: {}", self.program, stderr.trim())));
        }

        let mut pages = Vec::new();
        for entry in fs::read_dir(temp_dir.path())
            .map_err(|e| Error::extraction(format!("Failed to read temp dir: {}", e)))?
        {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "png") {
                continue;
            }
            let Some(page_number) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(parse_page_number)
            else {
                continue;
            };
            let bytes = fs::read(&path)?;
            pages.push(PageImage::new(page_number, bytes, "png"));
        }

        // pdftoppm zero-pads names, but sort numerically regardless
        pages.sort_by_key(|p| p.page_number);

        tracing::debug!(pages = pages.len(), dpi, "Rasterized PDF");
        Ok(pages)
    }
}

/// Page number from a `pdftoppm` output stem such as `page-007`
fn parse_page_number(stem: &str) -> Option<u32> {
    stem.rsplit('-').next()?.parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_number() {
        assert_eq!(parse_page_number("page-1"), Some(1));
        assert_eq!(parse_page_number("page-007"), Some(7));
        assert_eq!(parse_page_number("page-120"), Some(120));
        assert_eq!(parse_page_number("page-0"), None);
        assert_eq!(parse_page_number("input"), None);
    }

    #[test]
    fn test_missing_program_is_extraction_error() {
        let rasterizer = PopplerRasterizer::new("ocr-rag-no-such-rasterizer");
        assert!(!rasterizer.is_available());
        let err = rasterizer.rasterize(b"%PDF-1.4", 200).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
