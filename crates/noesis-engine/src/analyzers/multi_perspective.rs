// crates/noesis-engine/src/analyzers/multi_perspective.rs
// Re-emits input text under N fixed labeled "perspectives" (§1
// "multi-perspective validation") — no actual independent reasoning, just
// enough structure for a workflow to fan a single input out into several
// labeled outputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use noesis_types::{Field, Schema};
use serde_json::json;

use crate::registry::ToolSpec;

const DEFAULT_PERSPECTIVES: &[&str] = &["optimist", "skeptic", "pragmatist"];

fn perspective_entry_schema() -> Schema {
    Schema::object(BTreeMap::from([
        ("label".to_string(), Field::required(Schema::string())),
        ("text".to_string(), Field::required(Schema::string())),
    ]))
}

pub fn tool_spec() -> ToolSpec {
    ToolSpec {
        name: "multi_perspective".to_string(),
        version: "1.0.0".to_string(),
        description: "Re-emits input text once per labeled perspective.".to_string(),
        input_schema: Schema::object(BTreeMap::from([
            ("text".to_string(), Field::required(Schema::string())),
            (
                "perspectives".to_string(),
                Field::optional(Schema::Array {
                    items: Box::new(Schema::string()),
                    min_items: Some(1),
                    max_items: None,
                })
                .describe("defaults to [optimist, skeptic, pragmatist]"),
            ),
        ])),
        output_schema: Schema::object(BTreeMap::from([(
            "perspectives".to_string(),
            Field::required(Schema::Array {
                items: Box::new(perspective_entry_schema()),
                min_items: None,
                max_items: None,
            }),
        )])),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                let labels: Vec<String> = input
                    .get("perspectives")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .filter(|v: &Vec<String>| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_PERSPECTIVES.iter().map(|s| s.to_string()).collect());

                let perspectives: Vec<_> = labels
                    .into_iter()
                    .map(|label| json!({"label": label, "text": text}))
                    .collect();
                Ok(json!({ "perspectives": perspectives }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}
