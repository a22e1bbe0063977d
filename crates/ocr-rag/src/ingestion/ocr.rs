//! Text recognition with accelerated-to-CPU degradation
//!
//! `RecognitionService` owns the current accelerator mode and a lazily created
//! engine for that mode. A resource-exhaustion failure on the accelerated
//! engine demotes the service to CPU for the rest of its lifetime; the failing
//! page is retried once on CPU and recorded as empty if that fails too.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;

use crate::config::OcrConfig;
use crate::error::{Error, Result};

use super::raster::PageImage;

/// Where recognition runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorMode {
    Accelerated,
    Cpu,
}

/// Failure of a single recognition call
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Accelerator ran out of memory or a similar capacity limit
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Any other failure
    #[error("recognition failed: {0}")]
    Failed(String),
}

/// A text recognition engine bound to one accelerator mode
pub trait RecognitionEngine: Send + Sync {
    /// Recognize the text of one page image
    fn recognize(&self, image: &PageImage) -> std::result::Result<String, RecognitionError>;

    /// Free accelerator memory after a resource-exhaustion failure
    fn release_memory(&self) {}
}

/// Creates engines for a given mode
pub trait EngineFactory: Send + Sync {
    fn create(&self, mode: AcceleratorMode) -> Result<Arc<dyn RecognitionEngine>>;
}

struct EngineSlot {
    mode: AcceleratorMode,
    engine: Option<Arc<dyn RecognitionEngine>>,
}

/// Shared recognition service injected into every extraction worker
pub struct RecognitionService {
    factory: Arc<dyn EngineFactory>,
    initial_mode: AcceleratorMode,
    slot: Mutex<EngineSlot>,
}

impl RecognitionService {
    pub fn new(factory: Arc<dyn EngineFactory>, initial_mode: AcceleratorMode) -> Self {
        Self {
            factory,
            initial_mode,
            slot: Mutex::new(EngineSlot {
                mode: initial_mode,
                engine: None,
            }),
        }
    }

    /// Current accelerator mode
    pub fn mode(&self) -> AcceleratorMode {
        self.slot.lock().mode
    }

    /// Restore the initial mode and drop the cached engine
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.mode = self.initial_mode;
        slot.engine = None;
        tracing::debug!(mode = ?self.initial_mode, "Recognition service reset");
    }

    /// Engine for the current mode, created on first use
    fn current_engine(&self) -> Result<(AcceleratorMode, Arc<dyn RecognitionEngine>)> {
        let mut slot = self.slot.lock();
        let mode = slot.mode;
        let engine = match &slot.engine {
            Some(engine) => engine.clone(),
            None => {
                let engine = self.factory.create(mode)?;
                tracing::info!(?mode, "Initialized recognition engine");
                slot.engine = Some(engine.clone());
                engine
            }
        };
        Ok((mode, engine))
    }

    /// Switch to CPU (once) and return the CPU engine
    fn demote_to_cpu(&self) -> Result<Arc<dyn RecognitionEngine>> {
        let mut slot = self.slot.lock();
        if slot.mode != AcceleratorMode::Cpu {
            tracing::warn!("Demoting text recognition to CPU for the rest of the process");
            slot.mode = AcceleratorMode::Cpu;
            slot.engine = None;
        }
        match &slot.engine {
            Some(engine) => Ok(engine.clone()),
            None => {
                let engine = self.factory.create(AcceleratorMode::Cpu)?;
                slot.engine = Some(engine.clone());
                Ok(engine)
            }
        }
    }

    /// Recognize one page
    ///
    /// Resource exhaustion never fails the call: the page is retried on CPU and
    /// comes back empty if the retry, or creating the CPU engine, fails. Other engine failures are
    /// returned as `Error::Extraction`.
    pub fn recognize_page(&self, image: &PageImage) -> Result<String> {
        let (mode, engine) = self.current_engine()?;

        match engine.recognize(image) {
            Ok(text) => Ok(normalize_text(&text)),
            Err(RecognitionError::ResourceExhausted(reason)) => {
                tracing::warn!(
                    page = image.page_number,
                    ?mode,
                    %reason,
                    "Recognition ran out of resources, retrying page on CPU"
                );
                engine.release_memory();
                drop(engine);

                let cpu = match self.demote_to_cpu() {
                    Ok(cpu) => cpu,
                    Err(e) => {
                        tracing::error!(
                            page = image.page_number,
                            error = %e,
                            "CPU engine unavailable, recording empty page"
                        );
                        return Ok(String::new());
                    }
                };
                match cpu.recognize(image) {
                    Ok(text) => Ok(normalize_text(&text)),
                    Err(e) => {
                        tracing::error!(
                            page = image.page_number,
                            error = %e,
                            "CPU retry failed, recording empty page"
                        );
                        Ok(String::new())
                    }
                }
            }
            Err(RecognitionError::Failed(reason)) => Err(Error::extraction(format!(
                "Recognition failed on page {}: {}",
                image.page_number, reason
            ))),
        }
    }
}

/// Collapse recognized fragments into single-spaced text
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ==================== Tesseract Command Engine ====================

/// Creates command-line recognition engines (tesseract by default)
pub struct TesseractEngineFactory {
    config: OcrConfig,
}

impl TesseractEngineFactory {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Mode the service should start in
    pub fn initial_mode(&self) -> AcceleratorMode {
        if self.config.accelerated {
            AcceleratorMode::Accelerated
        } else {
            AcceleratorMode::Cpu
        }
    }
}

impl EngineFactory for TesseractEngineFactory {
    fn create(&self, mode: AcceleratorMode) -> Result<Arc<dyn RecognitionEngine>> {
        let (program, extra_args) = match mode {
            AcceleratorMode::Accelerated => (
                self.config
                    .accelerated_command
                    .clone()
                    .unwrap_or_else(|| self.config.cpu_command.clone()),
                self.config.accelerator_args.clone(),
            ),
            AcceleratorMode::Cpu => (self.config.cpu_command.clone(), Vec::new()),
        };

        let available = Command::new(&program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !available {
            return Err(Error::extraction(format!(
                "Recognition program '{}' is not available. Install with: apt install tesseract-ocr",
                program
            )));
        }

        Ok(Arc::new(CommandEngine {
            program,
            languages: self.config.languages.join("+"),
            extra_args,
        }))
    }
}

struct CommandEngine {
    program: String,
    languages: String,
    extra_args: Vec<String>,
}

impl RecognitionEngine for CommandEngine {
    fn recognize(&self, image: &PageImage) -> std::result::Result<String, RecognitionError> {
        use std::io::Write;

        let mut file = tempfile::Builder::new()
            .prefix("ocr-rag-page-")
            .suffix(&format!(".{}", image.extension))
            .tempfile()
            .map_err(|e| RecognitionError::Failed(format!("Failed to create temp image: {}", e)))?;
        file.write_all(&image.bytes)
            .map_err(|e| RecognitionError::Failed(format!("Failed to write temp image: {}", e)))?;

        let mut command = Command::new(&self.program);
        command.arg(file.path()).arg("stdout");
        if !self.languages.is_empty() {
            command.arg("-l").arg(&self.languages);
        }
        command.args(&self.extra_args);

        let output = command
            .output()
            .map_err(|e| RecognitionError::Failed(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(classify_failure(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Map engine stderr to a recognition error
fn classify_failure(stderr: String) -> RecognitionError {
    let lower = stderr.to_lowercase();
    if lower.contains("out of memory") || lower.contains("cuda") || lower.contains("cublas") {
        RecognitionError::ResourceExhausted(stderr.trim().to_string())
    } else {
        RecognitionError::Failed(stderr.trim().to_string())
    }
}
