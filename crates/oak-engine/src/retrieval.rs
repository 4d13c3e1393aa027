use oak_types::{ConfidenceLevel, MemoryType, excerpt};
use oak_vector::{CODE_COLLECTION, MEMORY_COLLECTION, QueryHit};
use serde::{Deserialize, Serialize};

use crate::{Engine, Error, Result};

/// What to search; `All` fans out to every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    All,
    Code,
    Memory,
    Plans,
    Sessions,
}

impl SearchType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(SearchType::All),
            "code" => Some(SearchType::Code),
            "memory" => Some(SearchType::Memory),
            "plans" => Some(SearchType::Plans),
            "sessions" => Some(SearchType::Sessions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedItem {
    pub id: String,
    pub preview: String,
    pub metadata: serde_json::Value,
    pub confidence: ConfidenceLevel,
    /// Raw similarity after doc-type weighting; ranking input only
    #[serde(skip)]
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDigest {
    pub session_id: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub code: Vec<RetrievedItem>,
    pub memories: Vec<RetrievedItem>,
    pub plans: Vec<RetrievedItem>,
    pub sessions: Vec<SessionDigest>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
            && self.memories.is_empty()
            && self.plans.is_empty()
            && self.sessions.is_empty()
    }
}

/// Rank-relative confidence: top quartile high, next quartile medium, the
/// rest low. Hits must already be sorted by descending score, so grades
/// are monotone in raw similarity by construction.
fn grade(hits: &[QueryHit]) -> Vec<(QueryHit, ConfidenceLevel)> {
    let n = hits.len();
    if n == 0 {
        return Vec::new();
    }
    let quartile = n.div_ceil(4);
    hits.iter()
        .enumerate()
        .map(|(rank, hit)| {
            let level = if rank < quartile {
                ConfidenceLevel::High
            } else if rank < quartile * 2 {
                ConfidenceLevel::Medium
            } else {
                ConfidenceLevel::Low
            };
            (hit.clone(), level)
        })
        .collect()
}

/// Code results are re-weighted by doc type before grading: tests,
/// generated files and config carry less signal than source.
fn doc_type_weight(metadata: &serde_json::Value) -> f32 {
    match metadata.get("doc_type").and_then(serde_json::Value::as_str) {
        Some("test") | Some("generated") | Some("config") => 0.7,
        Some("source") => 1.1,
        _ => 1.0,
    }
}

impl Engine {
    /// Embed the query once and fan out to the requested collections.
    /// `floor` drops results graded below it. Degraded mode: if the
    /// embedder is unavailable the result is empty, never an error; the
    /// agent must not be blocked.
    pub async fn retrieve(
        &self,
        query: &str,
        search_type: SearchType,
        file_path: Option<&str>,
        floor: Option<ConfidenceLevel>,
    ) -> RetrievalResult {
        match self.retrieve_inner(query, search_type, file_path, floor).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "retrieval degraded to empty result");
                RetrievalResult::default()
            }
        }
    }

    async fn retrieve_inner(
        &self,
        query: &str,
        search_type: SearchType,
        file_path: Option<&str>,
        floor: Option<ConfidenceLevel>,
    ) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(Error::QueryValidation("empty retrieval query".to_string()));
        }

        let mut result = RetrievalResult::default();

        if matches!(search_type, SearchType::All | SearchType::Sessions) {
            result.sessions = self.recent_session_digests()?;
        }

        let wants_vectors = matches!(
            search_type,
            SearchType::All | SearchType::Code | SearchType::Memory | SearchType::Plans
        );
        if !wants_vectors {
            return Ok(result);
        }

        // Embedder outage degrades to whatever the relational store gave
        // us (session summaries); the agent still gets a response.
        let query_vector = match self.embedder.embed(&[query.to_string()]).await {
            Ok(vectors) => match vectors.into_iter().next() {
                Some(vector) => vector,
                None => return Ok(result),
            },
            Err(err) => {
                tracing::warn!(error = %err, "embedder unavailable; vector search skipped");
                return Ok(result);
            }
        };

        // Oversample so grading has a real distribution to rank against
        let oversample = |budget: usize| (budget * 4).max(8);

        if matches!(search_type, SearchType::All | SearchType::Code) {
            let mut hits = self.vectors.query(
                CODE_COLLECTION,
                &query_vector,
                oversample(self.config.max_code_chunks),
                None,
            )?;
            for hit in &mut hits {
                hit.score *= doc_type_weight(&hit.metadata);
            }
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            result.code = grade(&hits)
                .into_iter()
                .filter(|(_, level)| floor.is_none_or(|floor| *level <= floor))
                .take(self.config.max_code_chunks)
                .map(|(hit, level)| to_item(hit, level, self.config.max_code_lines))
                .collect();
        }

        if matches!(
            search_type,
            SearchType::All | SearchType::Memory | SearchType::Plans
        ) {
            let filter = file_path.map(|path| {
                let path = path.to_string();
                move |metadata: &serde_json::Value| {
                    metadata
                        .get("file_path")
                        .and_then(serde_json::Value::as_str)
                        .is_some_and(|candidate| candidate == path)
                }
            });
            let filter_ref: Option<&(dyn Fn(&serde_json::Value) -> bool)> = match &filter {
                Some(predicate) => Some(predicate),
                None => None,
            };

            let hits = self.vectors.query(
                MEMORY_COLLECTION,
                &query_vector,
                oversample(self.config.max_memories),
                filter_ref,
            )?;

            let live = self.drop_archived(hits)?;
            let graded = grade(&live);

            for (hit, level) in graded {
                if floor.is_some_and(|floor| level > floor) {
                    continue;
                }
                let is_plan = hit
                    .metadata
                    .get("memory_type")
                    .and_then(serde_json::Value::as_str)
                    == Some(MemoryType::Plan.as_str());

                let target = if is_plan {
                    &mut result.plans
                } else {
                    &mut result.memories
                };
                if target.len() < self.config.max_memories {
                    target.push(to_item(hit, level, self.config.max_code_lines));
                }
            }

            if matches!(search_type, SearchType::Plans) {
                result.memories.clear();
            }
        }

        Ok(result)
    }

    /// Vector deletion is lazy: archived or superseded observations keep
    /// their vectors until a rebuild, so retrieval filters them here.
    fn drop_archived(&self, hits: Vec<QueryHit>) -> Result<Vec<QueryHit>> {
        let db = self.db.lock().expect("db lock poisoned");
        let mut live = Vec::with_capacity(hits.len());
        for hit in hits {
            match db.get_observation(&hit.id)? {
                Some(row)
                    if !row.archived
                        && row.status != oak_types::ObservationStatus::Superseded =>
                {
                    live.push(hit);
                }
                // Entries with no backing row are code-chunk style ids or
                // stale vectors; either way they are not memories to show
                _ => {}
            }
        }
        Ok(live)
    }

    fn recent_session_digests(&self) -> Result<Vec<SessionDigest>> {
        let db = self.db.lock().expect("db lock poisoned");
        let summaries = db.recent_session_summaries(self.config.max_session_summaries)?;
        Ok(summaries
            .into_iter()
            .map(|row| SessionDigest {
                session_id: row.session_id,
                summary: excerpt(&row.observation_text, 240).to_string(),
            })
            .collect())
    }
}

fn to_item(hit: QueryHit, level: ConfidenceLevel, max_lines: usize) -> RetrievedItem {
    let preview = hit
        .metadata
        .get("preview")
        .and_then(serde_json::Value::as_str)
        .map(|p| clamp_lines(p, max_lines))
        .unwrap_or_default();
    RetrievedItem {
        id: hit.id,
        preview,
        metadata: hit.metadata,
        confidence: level,
        score: hit.score,
    }
}

fn clamp_lines(text: &str, max_lines: usize) -> String {
    let mut lines: Vec<&str> = text.lines().take(max_lines).collect();
    if lines.is_empty() {
        lines.push("");
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> QueryHit {
        QueryHit {
            id: id.to_string(),
            score,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_grade_quartiles() {
        let hits: Vec<QueryHit> = (0..8)
            .map(|i| hit(&format!("h{}", i), 1.0 - i as f32 * 0.1))
            .collect();
        let graded = grade(&hits);

        assert_eq!(graded[0].1, ConfidenceLevel::High);
        assert_eq!(graded[1].1, ConfidenceLevel::High);
        assert_eq!(graded[2].1, ConfidenceLevel::Medium);
        assert_eq!(graded[3].1, ConfidenceLevel::Medium);
        assert_eq!(graded[4].1, ConfidenceLevel::Low);
        assert_eq!(graded[7].1, ConfidenceLevel::Low);
    }

    #[test]
    fn test_grade_single_hit_is_high() {
        let graded = grade(&[hit("only", 0.4)]);
        assert_eq!(graded[0].1, ConfidenceLevel::High);
    }

    #[test]
    fn test_confidence_monotone_in_score() {
        let hits: Vec<QueryHit> = (0..12)
            .map(|i| hit(&format!("h{}", i), 1.0 - i as f32 * 0.05))
            .collect();
        let graded = grade(&hits);
        for window in graded.windows(2) {
            // Later rank never grades better than earlier rank
            assert!(window[0].1 <= window[1].1);
            assert!(window[0].0.score >= window[1].0.score);
        }
    }

    #[test]
    fn test_doc_type_weighting() {
        assert!(doc_type_weight(&serde_json::json!({"doc_type": "test"})) < 1.0);
        assert!(doc_type_weight(&serde_json::json!({"doc_type": "source"})) > 1.0);
        assert_eq!(doc_type_weight(&serde_json::json!({})), 1.0);
    }
}
