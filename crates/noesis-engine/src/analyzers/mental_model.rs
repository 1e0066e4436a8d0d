// crates/noesis-engine/src/analyzers/mental_model.rs
// Tags input text with one of a fixed list of named mental models by
// keyword heuristic — a stand-in for "mental-model application" (§1), not
// an implementation of what any of these models actually mean.

use std::collections::BTreeMap;
use std::sync::Arc;

use noesis_types::{Field, Schema};
use serde_json::json;

use crate::registry::ToolSpec;

const MODELS: &[(&str, &[&str])] = &[
    ("first-principles", &["fundamental", "assumption", "from scratch", "basics"]),
    ("inversion", &["avoid", "instead of", "opposite", "fail"]),
    ("opportunity-cost", &["trade-off", "tradeoff", "instead", "alternative", "cost"]),
    ("second-order-thinking", &["then what", "consequence", "downstream", "long-term"]),
    ("occams-razor", &["simplest", "simple explanation", "fewest assumptions"]),
];

fn output_schema() -> Schema {
    Schema::object(BTreeMap::from([
        (
            "model".to_string(),
            Field::required(Schema::Enum {
                values: MODELS.iter().map(|(name, _)| name.to_string()).collect(),
            }),
        ),
        ("rationale".to_string(), Field::required(Schema::string())),
    ]))
}

pub fn tool_spec() -> ToolSpec {
    ToolSpec {
        name: "mental_model".to_string(),
        version: "1.0.0".to_string(),
        description: "Tags input text with the named mental model its wording most resembles."
            .to_string(),
        input_schema: Schema::object(BTreeMap::from([(
            "text".to_string(),
            Field::required(Schema::string()),
        )])),
        output_schema: output_schema(),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                let lower = text.to_lowercase();
                let (model, rationale) = MODELS
                    .iter()
                    .find_map(|(name, keywords)| {
                        keywords
                            .iter()
                            .find(|kw| lower.contains(*kw))
                            .map(|kw| (*name, format!("matched keyword '{kw}'")))
                    })
                    .unwrap_or(("first-principles", "no keyword matched; defaulting".to_string()));
                Ok(json!({ "model": model, "rationale": rationale }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, ToolCall};
    use crate::registry::ToolRegistry;

    #[tokio::test]
    async fn tags_inversion_keyword() {
        let registry = ToolRegistry::new();
        registry.register(tool_spec()).unwrap();
        let dispatcher = Dispatcher::new(registry);
        let result = dispatcher
            .dispatch(ToolCall::new(
                "mental_model",
                json!({"text": "What should we avoid doing to prevent failure?"}),
            ))
            .await;
        assert!(result.is_ok());
        assert_eq!(result.output.unwrap()["model"], json!("inversion"));
    }

    #[tokio::test]
    async fn falls_back_to_first_principles_with_no_match() {
        let registry = ToolRegistry::new();
        registry.register(tool_spec()).unwrap();
        let dispatcher = Dispatcher::new(registry);
        let result = dispatcher
            .dispatch(ToolCall::new("mental_model", json!({"text": "hello there"})))
            .await;
        assert_eq!(result.output.unwrap()["model"], json!("first-principles"));
    }
}
