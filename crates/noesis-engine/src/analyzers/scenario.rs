// crates/noesis-engine/src/analyzers/scenario.rs
// The exact example tools named in §8 Scenarios 1 and 3: `classify`,
// `enrich`, `summarize` (the linear-pipeline scenario) and `flaky` (the
// retry-then-success scenario). Implemented precisely as those scenarios
// require so the end-to-end tests in `tests/` can run the scenarios
// verbatim against real registered tools instead of fixtures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use noesis_types::{Field, Schema};
use serde_json::json;

use crate::registry::{HandlerFailure, ToolSpec};

/// `classify {text} -> {category}` (§8 Scenario 1). A short string is
/// "short", anything else is "long" — deterministic and good enough to
/// exercise a downstream reference.
pub fn classify_tool() -> ToolSpec {
    ToolSpec {
        name: "classify".to_string(),
        version: "1.0.0".to_string(),
        description: "Classifies input text into a coarse category.".to_string(),
        input_schema: Schema::object(BTreeMap::from([(
            "text".to_string(),
            Field::required(Schema::string()),
        )])),
        output_schema: Schema::object(BTreeMap::from([(
            "category".to_string(),
            Field::required(Schema::string()),
        )])),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                let category = if text.split_whitespace().count() <= 3 { "short" } else { "long" };
                Ok(json!({ "category": category }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

/// `enrich {category} -> {tags}` (§8 Scenario 1).
pub fn enrich_tool() -> ToolSpec {
    ToolSpec {
        name: "enrich".to_string(),
        version: "1.0.0".to_string(),
        description: "Expands a category into a list of related tags.".to_string(),
        input_schema: Schema::object(BTreeMap::from([(
            "category".to_string(),
            Field::required(Schema::string()),
        )])),
        output_schema: Schema::object(BTreeMap::from([(
            "tags".to_string(),
            Field::required(Schema::Array {
                items: Box::new(Schema::string()),
                min_items: None,
                max_items: None,
            }),
        )])),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let category = input.get("category").and_then(|v| v.as_str()).unwrap_or_default();
                let tags = match category {
                    "short" => vec!["concise".to_string(), "quick-read".to_string()],
                    "long" => vec!["detailed".to_string(), "in-depth".to_string()],
                    other => vec![format!("category:{other}")],
                };
                Ok(json!({ "tags": tags }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

/// `summarize {text, tags} -> {summary}` (§8 Scenario 1).
pub fn summarize_tool() -> ToolSpec {
    ToolSpec {
        name: "summarize".to_string(),
        version: "1.0.0".to_string(),
        description: "Produces a one-line summary annotated with tags.".to_string(),
        input_schema: Schema::object(BTreeMap::from([
            ("text".to_string(), Field::required(Schema::string())),
            (
                "tags".to_string(),
                Field::required(Schema::Array {
                    items: Box::new(Schema::string()),
                    min_items: None,
                    max_items: None,
                }),
            ),
        ])),
        output_schema: Schema::object(BTreeMap::from([(
            "summary".to_string(),
            Field::required(Schema::string()),
        )])),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                let tags: Vec<String> = input
                    .get("tags")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                Ok(json!({ "summary": format!("{text} [{}]", tags.join(", ")) }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

/// `flaky {key, failUntilAttempt} -> {ok}` (§8 Scenario 3): fails with
/// `handlerError` on every call for `key` until the `failUntilAttempt`-th,
/// then succeeds. The per-key attempt counter is process-global so a
/// workflow node's retries (which all reuse the same `key`) see it climb
/// across attempts, the way the scenario requires.
pub fn flaky_tool() -> ToolSpec {
    let attempts: Arc<Mutex<BTreeMap<String, AtomicU32>>> = Arc::new(Mutex::new(BTreeMap::new()));

    ToolSpec {
        name: "flaky".to_string(),
        version: "1.0.0".to_string(),
        description: "Fails with handlerError until its configured attempt, then succeeds. \
            Exercises retry/backoff behavior."
            .to_string(),
        input_schema: Schema::object(BTreeMap::from([
            (
                "key".to_string(),
                Field::required(Schema::string()).describe("isolates this call's attempt counter"),
            ),
            (
                "failUntilAttempt".to_string(),
                Field::optional(Schema::Integer { minimum: Some(1), maximum: None })
                    .describe("defaults to 3: attempts 1..N-1 fail, attempt N succeeds"),
            ),
        ])),
        output_schema: Schema::object(BTreeMap::from([(
            "ok".to_string(),
            Field::required(Schema::Boolean),
        )])),
        handler: Arc::new(move |_ctx, input| {
            let attempts = attempts.clone();
            Box::pin(async move {
                let key = input
                    .get("key")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| HandlerFailure::new("'key' is required"))?
                    .to_string();
                let fail_until = input
                    .get("failUntilAttempt")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(3) as u32;

                let attempt = {
                    let mut table = attempts.lock().expect("flaky attempt table poisoned");
                    let counter = table.entry(key).or_insert_with(|| AtomicU32::new(0));
                    counter.fetch_add(1, Ordering::SeqCst) + 1
                };

                if attempt < fail_until {
                    return Err(HandlerFailure::new(format!(
                        "flaky: attempt {attempt} of {fail_until} still failing"
                    )));
                }
                Ok(json!({ "ok": true }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}
