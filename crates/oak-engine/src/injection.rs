use crate::retrieval::{RetrievalResult, RetrievedItem};

/// Fixed extension-to-language table for fenced previews
fn language_hint(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or("");
    match extension {
        "rs" => "rust",
        "py" => "python",
        "ts" => "typescript",
        "tsx" => "tsx",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "go" => "go",
        "java" => "java",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "sh" | "bash" => "bash",
        "sql" => "sql",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        _ => "",
    }
}

fn metadata_str<'a>(item: &'a RetrievedItem, key: &str) -> Option<&'a str> {
    item.metadata.get(key).and_then(serde_json::Value::as_str)
}

/// Format a retrieval result into the `injected_context` string the agent
/// prepends to its next turn. The template is stable: header, recent
/// sessions, memories, then (for prompt-submit) relevant code.
pub fn build_injection(
    result: &RetrievalResult,
    index_status: &str,
    include_code: bool,
) -> Option<String> {
    if result.is_empty() {
        return None;
    }

    let mut out = String::new();
    out.push_str(&format!("[oak] {}\n", index_status));

    if !result.sessions.is_empty() {
        out.push_str("\nRecent sessions:\n");
        for session in &result.sessions {
            out.push_str(&format!("- {}\n", session.summary));
        }
    }

    let memories = result.memories.iter().chain(result.plans.iter());
    let mut wrote_header = false;
    for memory in memories {
        if !wrote_header {
            out.push_str("\nMemories:\n");
            wrote_header = true;
        }
        let type_marker = metadata_str(memory, "memory_type").unwrap_or("memory");
        match metadata_str(memory, "file_path") {
            Some(path) => out.push_str(&format!(
                "- [{}] {} ({})\n",
                type_marker, memory.preview, path
            )),
            None => out.push_str(&format!("- [{}] {}\n", type_marker, memory.preview)),
        }
    }

    if include_code && !result.code.is_empty() {
        out.push_str("\nRelevant Code:\n");
        for chunk in &result.code {
            let path = metadata_str(chunk, "file_path").unwrap_or("unknown");
            let symbol = metadata_str(chunk, "symbol").unwrap_or("");
            let start = chunk.metadata.get("start_line").and_then(serde_json::Value::as_i64);
            let end = chunk.metadata.get("end_line").and_then(serde_json::Value::as_i64);
            match (start, end) {
                (Some(start), Some(end)) => {
                    out.push_str(&format!("- {}:{}-{} {}\n", path, start, end, symbol))
                }
                _ => out.push_str(&format!("- {} {}\n", path, symbol)),
            }
            if !chunk.preview.is_empty() {
                out.push_str(&format!(
                    "```{}\n{}\n```\n",
                    language_hint(path),
                    chunk.preview
                ));
            }
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SessionDigest;
    use oak_types::ConfidenceLevel;

    fn memory_item(text: &str, memory_type: &str, file_path: Option<&str>) -> RetrievedItem {
        RetrievedItem {
            id: "obs-1".to_string(),
            preview: text.to_string(),
            metadata: serde_json::json!({
                "memory_type": memory_type,
                "file_path": file_path,
            }),
            confidence: ConfidenceLevel::High,
            score: 0.9,
        }
    }

    fn code_item() -> RetrievedItem {
        RetrievedItem {
            id: "chunk-1".to_string(),
            preview: "fn authenticate() {\n    // ...\n}".to_string(),
            metadata: serde_json::json!({
                "file_path": "src/auth.rs",
                "symbol": "authenticate",
                "start_line": 10,
                "end_line": 42,
            }),
            confidence: ConfidenceLevel::High,
            score: 0.8,
        }
    }

    #[test]
    fn test_empty_result_injects_nothing() {
        let result = RetrievalResult::default();
        assert!(build_injection(&result, "index ready", true).is_none());
    }

    #[test]
    fn test_full_template() {
        let result = RetrievalResult {
            code: vec![code_item()],
            memories: vec![memory_item(
                "auth module requires Redis",
                "gotcha",
                Some("src/auth.py"),
            )],
            plans: vec![],
            sessions: vec![SessionDigest {
                session_id: "S1".to_string(),
                summary: "implemented login flow".to_string(),
            }],
        };

        let injection = build_injection(&result, "index: 2 collections", true).unwrap();
        insta::assert_snapshot!(injection);
    }

    #[test]
    fn test_code_block_suppressed_when_not_requested() {
        let result = RetrievalResult {
            code: vec![code_item()],
            memories: vec![memory_item("note", "decision", None)],
            plans: vec![],
            sessions: vec![],
        };
        let injection = build_injection(&result, "index ready", false).unwrap();
        assert!(!injection.contains("Relevant Code"));
        assert!(injection.contains("[decision] note"));
    }

    #[test]
    fn test_language_hint_table() {
        assert_eq!(language_hint("src/auth.rs"), "rust");
        assert_eq!(language_hint("app.py"), "python");
        assert_eq!(language_hint("Makefile"), "");
    }
}
