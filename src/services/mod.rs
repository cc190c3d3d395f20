//! 业务能力层（Services）
//!
//! 每个模块只提供一种能力，只处理单个块或单条记录，不关心流程顺序。

pub mod artifact_writer;
pub mod chunk_reader;
pub mod explainer;
pub mod extractor;
pub mod normalizer;
pub mod segmenter;
pub mod validator;

pub use artifact_writer::{explained_path, ArtifactWriter, CleanPaths};
pub use chunk_reader::StreamingChunkReader;
pub use explainer::{
    build_prompt, generate_or_placeholder, generator_from_config, is_placeholder,
    ExplanationGenerator, HttpExplainer, OpenAiExplainer,
};
pub use extractor::FieldExtractor;
pub use normalizer::normalize;
pub use validator::RecordValidator;
