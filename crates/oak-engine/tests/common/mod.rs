// Not every test binary uses every helper here
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oak_engine::{Engine, EngineConfig};
use oak_model::{BatchSummary, Embedder, ExtractedObservation, Summarizer, SummaryRequest};
use oak_store::Database;
use oak_vector::VectorStore;

pub const TEST_DIM: usize = 16;

/// Deterministic bag-of-words embedder: tokens hash into a fixed number of
/// buckets, so overlapping text embeds nearby. Good enough to exercise
/// ranking without a model.
pub struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> oak_model::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; TEST_DIM];
                for token in text.split_whitespace() {
                    let mut bucket: usize = 7;
                    for byte in token.to_lowercase().bytes() {
                        bucket = bucket.wrapping_mul(31).wrapping_add(byte as usize);
                    }
                    vector[bucket % TEST_DIM] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dim(&self) -> usize {
        TEST_DIM
    }

    fn model_id(&self) -> &str {
        "mock-embedder"
    }
}

/// Embedder that always fails, for crash/outage scenarios
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    async fn embed(&self, _texts: &[String]) -> oak_model::Result<Vec<Vec<f32>>> {
        Err(oak_model::Error::BadEmbedding("provider down".to_string()))
    }

    fn dim(&self) -> usize {
        TEST_DIM
    }

    fn model_id(&self) -> &str {
        "down-embedder"
    }
}

/// Summarizer that derives one observation from the prompt text and counts
/// its calls.
pub struct MockSummarizer {
    pub calls: Mutex<usize>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> oak_model::Result<BatchSummary> {
        *self.calls.lock().unwrap() += 1;
        Ok(BatchSummary {
            classification: "feature".to_string(),
            observations: vec![ExtractedObservation {
                memory_type: "discovery".to_string(),
                observation_text: format!("working notes for: {}", request.prompt_text),
                file_path: None,
                tags: vec!["auto".to_string()],
                confidence: 0.9,
            }],
            response_summary: if request.is_session_end {
                Some(format!("session touched {} activities", request.activities.len()))
            } else {
                None
            },
        })
    }
}

/// Summarizer whose output never parses; batches fail and burn attempts
pub struct MalformedSummarizer;

#[async_trait]
impl Summarizer for MalformedSummarizer {
    async fn summarize(&self, _request: &SummaryRequest) -> oak_model::Result<BatchSummary> {
        Err(oak_model::Error::MalformedResponse(
            "not json at all".to_string(),
        ))
    }
}

pub fn build_engine(
    dir: &Path,
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn Summarizer>,
) -> Arc<Engine> {
    let db = Database::open(&dir.join("oak.db")).expect("open db");
    let vectors = VectorStore::open(dir).expect("open vectors");
    Arc::new(Engine::new(
        Arc::new(Mutex::new(db)),
        Arc::new(vectors),
        embedder,
        summarizer,
        EngineConfig::default(),
    ))
}

pub fn default_engine(dir: &Path) -> Arc<Engine> {
    build_engine(dir, Arc::new(MockEmbedder), Arc::new(MockSummarizer::new()))
}
