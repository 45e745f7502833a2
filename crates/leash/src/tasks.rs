//! Ready-made tasks.
//!
//! Each follows the same two-phase shape: narrow the buffer with code
//! (search, head/tail, chunks), then ask the model about small, bounded
//! pieces. Aggregation happens here, never in a "summarize everything"
//! call. All loops have hard caps.

use crate::error::Result;
use crate::runner::TaskScope;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

const SECTION_PATTERN: &str = r"(abstract|introduction|summary|conclusion|results|discussion)";
const CLAIM_PATTERN: &str = r"(conclude|finding|result|important|significant|key|critical)";
const ERROR_PATTERN: &str = r"(error|exception|failed|fatal|critical)";

const DOCUMENT_TYPES: [&str; 5] = [
    "research_paper",
    "report",
    "article",
    "documentation",
    "other",
];
const ENTITY_TYPES: [&str; 4] = ["people", "organizations", "locations", "dates"];

const MAX_KEY_POINTS: usize = 3;
const MAX_ERRORS_ANALYZED: usize = 5;
const MAX_ENTITY_CHUNKS: usize = 5;

/// Title, type, abstract, key claims, and conclusion of a document.
pub fn analyze_document(scope: &TaskScope<'_>) -> Result<Value> {
    let ctx = scope.context();
    let gateway = scope.gateway();

    let head_chunk = ctx.head(500);
    let section_matches = ctx.search_with(SECTION_PATTERN, 10, false)?;
    let claim_matches = ctx.search_with(CLAIM_PATTERN, 5, false)?;

    let title = gateway
        .subcall(
            "Extract the document title or main heading from this text. \
             Return ONLY the title text, nothing else. \
             If no clear title exists, return 'Untitled Document'.",
            head_chunk,
        )?
        .trim()
        .to_string();

    let document_type = gateway.subcall_choice(
        "What type of document is this based on the opening?",
        head_chunk,
        &DOCUMENT_TYPES,
        Some("other"),
    )?;

    let abstract_text = match section_matches
        .iter()
        .find(|m| m.text.to_lowercase().contains("abstract"))
    {
        Some(m) => {
            let chunk = ctx.around_match(m, 50, 1000);
            let text = gateway.subcall(
                "Extract the abstract or summary section from this text. \
                 Return only the abstract content, not the heading.",
                chunk,
            )?;
            Some(text.trim().to_string())
        }
        None => None,
    };

    let mut key_points = Vec::new();
    for m in claim_matches.iter().take(MAX_KEY_POINTS) {
        let chunk = ctx.around_match(m, 100, 200);
        let point = gateway.subcall_json(
            "Extract the key claim or finding from this text. \
             Return JSON: {\"claim\": \"the main claim\", \"confidence\": \"high|medium|low\"}",
            chunk,
            Some(json!({"claim": "Unable to extract", "confidence": "low"})),
        )?;
        let mut entry = Map::new();
        entry.insert("position".into(), json!(m.start));
        entry.insert("line".into(), json!(m.line_number));
        merge_object(&mut entry, point);
        key_points.push(Value::Object(entry));
    }

    let conclusion = gateway
        .subcall(
            "Extract the main conclusion or final takeaway from this text. \
             Summarize in 1-2 sentences. If no clear conclusion, state that.",
            ctx.tail(1500),
        )?
        .trim()
        .to_string();

    let has_abstract = abstract_text.is_some();
    let claims_analyzed = key_points.len();
    Ok(json!({
        "analysis": {
            "document_length": ctx.len(),
            "title": title,
            "abstract": abstract_text,
            "key_points": key_points,
            "conclusion": conclusion,
            "document_type": document_type,
        },
        "metadata": {
            "sections_found": section_matches.len(),
            "claims_analyzed": claims_analyzed,
            "has_abstract": has_abstract,
        },
    }))
}

/// Locate error lines in a log and classify up to five of them.
pub fn find_errors_in_log(scope: &TaskScope<'_>) -> Result<Value> {
    let ctx = scope.context();
    let gateway = scope.gateway();

    let error_matches = ctx.search_with(ERROR_PATTERN, 10, false)?;

    let mut errors = Vec::new();
    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    for m in error_matches.iter().take(MAX_ERRORS_ANALYZED) {
        let chunk = ctx.around_match(m, 100, 200);
        let classification = gateway.subcall_json(
            "Classify this error. Return JSON: \
             {\"severity\": \"critical|warning|info\", \
             \"category\": \"network|database|auth|validation|other\", \
             \"message\": \"brief description\"}",
            chunk,
            Some(json!({"severity": "info", "category": "other", "message": "Unknown error"})),
        )?;

        let mut entry = Map::new();
        entry.insert("position".into(), json!(m.start));
        entry.insert("line".into(), json!(m.line_number));
        entry.insert("matched_text".into(), json!(m.text));
        merge_object(&mut entry, classification);

        let severity = entry
            .get("severity")
            .and_then(Value::as_str)
            .unwrap_or("info")
            .to_string();
        *by_severity.entry(severity).or_insert(0) += 1;
        errors.push(Value::Object(entry));
    }

    let analyzed = errors.len();
    Ok(json!({
        "errors": errors,
        "summary": {
            "total_matches": error_matches.len(),
            "analyzed": analyzed,
            "by_severity": by_severity,
        },
    }))
}

/// Named entities from the first five 2000-character windows, deduplicated.
pub fn extract_entities(scope: &TaskScope<'_>) -> Result<Value> {
    let ctx = scope.context();
    let gateway = scope.gateway();

    let mut found: BTreeMap<&str, Vec<Value>> =
        ENTITY_TYPES.iter().map(|t| (*t, Vec::new())).collect();
    let mut chunks_processed = 0;

    for chunk in ctx.chunks(2000, 100)?.take(MAX_ENTITY_CHUNKS) {
        let entities = gateway.subcall_json(
            "Extract named entities from this text. Return JSON: \
             {\"people\": [...], \"organizations\": [...], \
             \"locations\": [...], \"dates\": [...]}",
            chunk.text,
            Some(json!({"people": [], "organizations": [], "locations": [], "dates": []})),
        )?;

        for (entity_type, seen) in found.iter_mut() {
            let Some(items) = entities.get(*entity_type).and_then(Value::as_array) else {
                continue;
            };
            for item in items {
                if !seen.contains(item) {
                    seen.push(item.clone());
                }
            }
        }
        chunks_processed += 1;
    }

    Ok(json!({
        "entities": found,
        "metadata": {
            "chunks_processed": chunks_processed,
            "document_length": ctx.len(),
        },
    }))
}

/// Copy the fields of a JSON object answer into `entry`. Non-object
/// answers carry no fields and are dropped.
fn merge_object(entry: &mut Map<String, Value>, answer: Value) {
    if let Value::Object(fields) = answer {
        entry.extend(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{TaskRunner, TaskStatus};
    use crate::subcall::{FnBackend, RawCompletion};

    /// Answers by recognizing which instruction it was given.
    fn scripted(prompt: &str, _chunk: &str) -> std::result::Result<RawCompletion, String> {
        let text = if prompt.starts_with("Extract the document title") {
            "  Quarterly Findings  "
        } else if prompt.starts_with("What type of document") {
            "Report"
        } else if prompt.starts_with("Extract the abstract") {
            "We study things."
        } else if prompt.starts_with("Extract the key claim") {
            "{\"claim\": \"things improved\", \"confidence\": \"high\"}"
        } else if prompt.starts_with("Extract the main conclusion") {
            "Things are better."
        } else if prompt.starts_with("Classify this error") {
            "```json\n{\"severity\": \"critical\", \"category\": \"database\", \"message\": \"db down\"}\n```"
        } else if prompt.starts_with("Extract named entities") {
            "{\"people\": [\"Ada\"], \"organizations\": [\"ACME\"], \"locations\": [], \"dates\": [\"2024\"]}"
        } else {
            "unexpected"
        };
        Ok(RawCompletion::new(text, 200, 20))
    }

    #[test]
    fn analyze_document_assembles_findings() {
        let backend = FnBackend::new(scripted);
        let doc = "Quarterly Findings\n\nAbstract\nWe study things.\n\n\
                   Results\nA significant improvement was seen.\n\nConclusion\nThings are better.";
        let output = TaskRunner::new(&backend).run(doc, analyze_document);

        assert_eq!(output.status, TaskStatus::Completed, "{:?}", output.error);
        let result = output.result.unwrap();
        let analysis = &result["analysis"];
        assert_eq!(analysis["title"], "Quarterly Findings");
        assert_eq!(analysis["document_type"], "report");
        assert_eq!(analysis["abstract"], "We study things.");
        assert_eq!(analysis["conclusion"], "Things are better.");
        assert_eq!(analysis["key_points"][0]["claim"], "things improved");
        assert!(analysis["key_points"][0]["line"].as_u64().unwrap() >= 1);
        assert_eq!(result["metadata"]["has_abstract"], true);
    }

    #[test]
    fn find_errors_counts_by_severity() {
        let backend = FnBackend::new(scripted);
        let log = "ok\nERROR: db down\nok\nrequest failed\nok";
        let output = TaskRunner::new(&backend).run(log, find_errors_in_log);

        let result = output.result.unwrap();
        assert_eq!(result["summary"]["total_matches"], 2);
        assert_eq!(result["summary"]["by_severity"]["critical"], 2);
        assert_eq!(result["errors"][0]["line"], 2);
        assert_eq!(result["errors"][0]["matched_text"], "ERROR");
        assert_eq!(result["errors"][1]["category"], "database");
        assert_eq!(output.budget_summary.total_calls, 2);
    }

    #[test]
    fn extract_entities_caps_chunks_and_dedupes() {
        let backend = FnBackend::new(scripted);
        let doc = "x".repeat(20_000);
        let output = TaskRunner::new(&backend).run(&doc, extract_entities);

        let result = output.result.unwrap();
        assert_eq!(result["metadata"]["chunks_processed"], 5);
        assert_eq!(result["entities"]["people"], json!(["Ada"]));
        assert_eq!(result["entities"]["locations"], json!([]));
        assert_eq!(output.access_log_summary.operations_by_type["chunk"], 5);
    }

    #[test]
    fn tasks_stop_when_budget_runs_out() {
        let backend = FnBackend::new(scripted);
        let config = crate::guard::GuardConfig::builder()
            .max_cost(0.0)
            .build()
            .unwrap();
        let output = TaskRunner::new(&backend)
            .with_config(config)
            .run("fatal error", find_errors_in_log);
        assert_eq!(output.status, TaskStatus::Partial);
        assert_eq!(output.budget_summary.total_calls, 0);
    }
}
