//! Document ingestion: format detection, rasterization and text recognition

pub mod extractor;
pub mod ocr;
pub mod raster;

pub use extractor::{CancelFlag, DocumentExtractor, DocumentFormat, PageTexts, TextExtractor};
pub use ocr::{
    AcceleratorMode, EngineFactory, RecognitionEngine, RecognitionError, RecognitionService,
    TesseractEngineFactory,
};
pub use raster::{PageImage, PageRasterizer, PopplerRasterizer};
