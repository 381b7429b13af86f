//! The question-to-answer pipeline: translate, validate, execute, summarize.

pub mod executor;
pub mod pipeline;
pub mod summarizer;
pub mod translator;
pub mod validator;

pub use executor::QueryExecutor;
pub use pipeline::{Answer, AskPipeline, CancelToken, Stage};
pub use summarizer::ResultSummarizer;
pub use translator::QueryTranslator;
pub use validator::SqlPolicy;
