pub mod event;
pub mod question;

pub use event::{ObjectRoute, StorageEvent};
pub use question::{
    CandidateFields, ExplanationRecord, Options, QuestionBlock, QuestionRecord, SourceFormat,
};
