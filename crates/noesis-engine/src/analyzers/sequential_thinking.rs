// crates/noesis-engine/src/analyzers/sequential_thinking.rs
// Splits free text into a numbered sequence of steps. The simplest possible
// stand-in for "sequential decomposition" (§1): no planning, no revision of
// its own steps — just a deterministic sentence split a workflow can chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use noesis_types::{Field, Schema};
use serde_json::json;

use crate::registry::ToolSpec;

const DEFAULT_MAX_STEPS: usize = 20;

pub fn tool_spec() -> ToolSpec {
    ToolSpec {
        name: "sequential_thinking".to_string(),
        version: "1.0.0".to_string(),
        description: "Splits free text into a numbered sequence of steps.".to_string(),
        input_schema: Schema::object(BTreeMap::from([
            ("text".to_string(), Field::required(Schema::string())),
            (
                "maxSteps".to_string(),
                Field::optional(Schema::Integer { minimum: Some(1), maximum: Some(100) })
                    .describe("caps the number of steps returned; defaults to 20"),
            ),
        ])),
        output_schema: Schema::object(BTreeMap::from([(
            "steps".to_string(),
            Field::required(Schema::Array {
                items: Box::new(Schema::string()),
                min_items: None,
                max_items: None,
            }),
        )])),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                let max_steps = input
                    .get("maxSteps")
                    .and_then(|v| v.as_u64())
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_MAX_STEPS);
                let steps = split_into_steps(text, max_steps);
                Ok(json!({ "steps": steps }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

fn split_into_steps(text: &str, max_steps: usize) -> Vec<String> {
    text.split(['.', ';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max_steps)
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, ToolCall};
    use crate::registry::ToolRegistry;

    #[tokio::test]
    async fn splits_sentences_into_numbered_steps() {
        let registry = ToolRegistry::new();
        registry.register(tool_spec()).unwrap();
        let dispatcher = Dispatcher::new(registry);
        let result = dispatcher
            .dispatch(ToolCall::new(
                "sequential_thinking",
                json!({"text": "First, gather data. Then analyze it. Finally, decide."}),
            ))
            .await;
        assert!(result.is_ok());
        let steps = result.output.unwrap()["steps"].as_array().cloned().unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], json!("1. First, gather data"));
    }

    #[tokio::test]
    async fn max_steps_caps_the_output() {
        let registry = ToolRegistry::new();
        registry.register(tool_spec()).unwrap();
        let dispatcher = Dispatcher::new(registry);
        let result = dispatcher
            .dispatch(ToolCall::new(
                "sequential_thinking",
                json!({"text": "a. b. c. d.", "maxSteps": 2}),
            ))
            .await;
        let steps = result.output.unwrap()["steps"].as_array().cloned().unwrap();
        assert_eq!(steps.len(), 2);
    }
}
