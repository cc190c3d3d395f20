pub mod document_ctx;
pub mod extraction_flow;
pub mod record_stream;

pub use document_ctx::DocumentCtx;
pub use extraction_flow::{ExtractionFlow, ExtractionOutcome};
pub use record_stream::{explanation_records, extraction_records, RecordStream};
