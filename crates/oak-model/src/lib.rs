// Model-provider boundary: everything that talks to the local embedding
// and summarization backends lives here, behind traits the engine can mock.

mod embedder;
mod error;
mod redaction;
mod summarizer;

pub use embedder::{Embedder, HttpEmbedder};
pub use error::{Error, Result};
pub use redaction::redact;
pub use summarizer::{
    BatchSummary, ExtractedObservation, HttpSummarizer, SummaryActivity, SummaryRequest,
    Summarizer,
};
