//! Document text extraction
//!
//! Maps raw upload bytes to per-page text. Images are one page, PDFs are
//! rasterized page by page, DOCX takes a degraded single-page path.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

use super::ocr::RecognitionService;
use super::raster::{PageImage, PageRasterizer};

/// Extracted text keyed by 1-based page number
pub type PageTexts = BTreeMap<u32, String>;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Single raster image (png, jpg, jpeg)
    Image,
    /// Paginated document (pdf)
    Pdf,
    /// Word-processor document (docx)
    Docx,
}

impl DocumentFormat {
    /// Detect format from the filename extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" => Ok(Self::Image),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "" => Err(Error::UnsupportedFormat(format!("'{}' has no extension", filename))),
            other => Err(Error::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// Cooperative cancellation shared between a job and its extraction
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Converts document bytes into per-page text
///
/// Blocking; callers on the async runtime go through `spawn_blocking`.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, data: &[u8], filename: &str, cancel: &CancelFlag) -> Result<PageTexts>;
}

/// Extractor backed by a rasterizer and the shared recognition service
pub struct DocumentExtractor {
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<RecognitionService>,
    dpi: u32,
}

impl DocumentExtractor {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, recognizer: Arc<RecognitionService>, dpi: u32) -> Self {
        Self {
            rasterizer,
            recognizer,
            dpi,
        }
    }

    fn recognize_all(&self, images: Vec<PageImage>, cancel: &CancelFlag) -> Result<PageTexts> {
        let mut pages = PageTexts::new();
        for image in images {
            if cancel.is_cancelled() {
                return Err(Error::extraction(format!(
                    "Cancelled before page {}",
                    image.page_number
                )));
            }
            let text = self.recognizer.recognize_page(&image)?;
            tracing::debug!(page = image.page_number, chars = text.len(), "Recognized page");
            pages.insert(image.page_number, text);
        }
        Ok(pages)
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, data: &[u8], filename: &str, cancel: &CancelFlag) -> Result<PageTexts> {
        let format = DocumentFormat::from_filename(filename)?;

        let images = match format {
            DocumentFormat::Image => {
                let ext = Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase())
                    .unwrap_or_else(|| "png".to_string());
                vec![PageImage::new(1, data.to_vec(), ext)]
            }
            DocumentFormat::Pdf => self.rasterizer.rasterize(data, self.dpi)?,
            DocumentFormat::Docx => return docx_placeholder_page(data),
        };

        self.recognize_all(images, cancel)
    }
}

/// Degraded DOCX path: the whole document's paragraph text as page 1
///
/// No layout rendering; a document without text yields no pages.
fn docx_placeholder_page(data: &[u8]) -> Result<PageTexts> {
    let doc = docx_rs::read_docx(data)
        .map_err(|e| Error::extraction(format!("Failed to read DOCX: {}", e)))?;

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            let mut line = String::new();
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            line.push_str(&t.text);
                        }
                    }
                }
            }
            paragraphs.push(line);
        }
    }

    let text = super::ocr::normalize_text(&paragraphs.join(" "));
    let mut pages = PageTexts::new();
    if !text.is_empty() {
        pages.insert(1, text);
    }
    Ok(pages)
}
