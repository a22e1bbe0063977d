//! Background extraction: admission, dispatch and the per-file pipeline

mod admission;
mod dispatcher;
mod job;
pub(crate) mod pipeline;

pub use admission::{Admission, AdmissionController, RejectReason};
pub use dispatcher::{Dispatcher, JobRunner, SubmissionError};
pub use job::ExtractionJob;
pub use pipeline::{IngestReport, IngestionPipeline};
