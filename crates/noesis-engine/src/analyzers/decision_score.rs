// crates/noesis-engine/src/analyzers/decision_score.rs
// Weighted-sum scoring of named options against named criteria (§1
// "decision scoring") — pure arithmetic, no LLM. Options and criteria are
// arrays of `{name, value}` pairs rather than free-form maps because the
// Schema kinds (§4.A) don't include an open string-keyed map; this is the
// idiomatic shape for "named, weighted values" under this data model.

use std::collections::BTreeMap;
use std::sync::Arc;

use noesis_types::{Field, Schema};
use serde_json::{json, Value};

use crate::registry::{HandlerFailure, ToolSpec};

fn weighted_pair_schema(value_field: &str) -> Schema {
    Schema::object(BTreeMap::from([
        ("name".to_string(), Field::required(Schema::string())),
        (
            value_field.to_string(),
            Field::required(Schema::Number { minimum: None, maximum: None }),
        ),
    ]))
}

fn criterion_score_schema() -> Schema {
    Schema::object(BTreeMap::from([
        ("criterion".to_string(), Field::required(Schema::string())),
        (
            "value".to_string(),
            Field::required(Schema::Number { minimum: None, maximum: None }),
        ),
    ]))
}

fn option_schema() -> Schema {
    Schema::object(BTreeMap::from([
        ("name".to_string(), Field::required(Schema::string())),
        (
            "scores".to_string(),
            Field::required(Schema::Array {
                items: Box::new(criterion_score_schema()),
                min_items: Some(1),
                max_items: None,
            }),
        ),
    ]))
}

fn input_schema() -> Schema {
    Schema::object(BTreeMap::from([
        (
            "options".to_string(),
            Field::required(Schema::Array {
                items: Box::new(option_schema()),
                min_items: Some(1),
                max_items: None,
            }),
        ),
        (
            "criteria".to_string(),
            Field::required(Schema::Array {
                items: Box::new(weighted_pair_schema("weight")),
                min_items: Some(1),
                max_items: None,
            })
            .describe("named criterion weights; an option's score on a criterion not listed here is ignored"),
        ),
    ]))
}

fn output_schema() -> Schema {
    Schema::object(BTreeMap::from([(
        "ranked".to_string(),
        Field::required(Schema::Array {
            items: Box::new(weighted_pair_schema("score")),
            min_items: None,
            max_items: None,
        }),
    )]))
}

pub fn tool_spec() -> ToolSpec {
    ToolSpec {
        name: "decision_score".to_string(),
        version: "1.0.0".to_string(),
        description: "Ranks named options by a weighted sum of their per-criterion scores."
            .to_string(),
        input_schema: input_schema(),
        output_schema: output_schema(),
        handler: Arc::new(|_ctx, input| Box::pin(async move { score(&input) })),
        metadata: BTreeMap::new(),
    }
}

fn score(input: &Value) -> Result<Value, HandlerFailure> {
    let weights: BTreeMap<String, f64> = input["criteria"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|c| Some((c["name"].as_str()?.to_string(), c["weight"].as_f64()?)))
        .collect();

    let mut ranked: Vec<(String, f64)> = Vec::new();
    for option in input["options"].as_array().into_iter().flatten() {
        let name = option["name"]
            .as_str()
            .ok_or_else(|| HandlerFailure::new("option missing 'name'"))?
            .to_string();
        let mut total = 0.0;
        for entry in option["scores"].as_array().into_iter().flatten() {
            let criterion = entry["criterion"].as_str().unwrap_or_default();
            let value = entry["value"].as_f64().unwrap_or(0.0);
            if let Some(weight) = weights.get(criterion) {
                total += value * weight;
            }
        }
        ranked.push((name, total));
    }
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(json!({
        "ranked": ranked.into_iter().map(|(name, score)| json!({"name": name, "score": score})).collect::<Vec<_>>()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, ToolCall};
    use crate::registry::ToolRegistry;

    #[tokio::test]
    async fn ranks_options_by_weighted_score() {
        let registry = ToolRegistry::new();
        registry.register(tool_spec()).unwrap();
        let dispatcher = Dispatcher::new(registry);
        let result = dispatcher
            .dispatch(ToolCall::new(
                "decision_score",
                json!({
                    "criteria": [
                        {"name": "cost", "weight": 2.0},
                        {"name": "speed", "weight": 1.0}
                    ],
                    "options": [
                        {"name": "A", "scores": [{"criterion": "cost", "value": 1.0}, {"criterion": "speed", "value": 5.0}]},
                        {"name": "B", "scores": [{"criterion": "cost", "value": 5.0}, {"criterion": "speed", "value": 1.0}]}
                    ]
                }),
            ))
            .await;
        assert!(result.is_ok());
        let ranked = result.output.unwrap()["ranked"].clone();
        assert_eq!(ranked[0]["name"], json!("B"));
        assert_eq!(ranked[0]["score"], json!(11.0));
        assert_eq!(ranked[1]["score"], json!(7.0));
    }

    #[tokio::test]
    async fn criteria_not_present_in_an_options_scores_are_treated_as_zero() {
        let registry = ToolRegistry::new();
        registry.register(tool_spec()).unwrap();
        let dispatcher = Dispatcher::new(registry);
        let result = dispatcher
            .dispatch(ToolCall::new(
                "decision_score",
                json!({
                    "criteria": [{"name": "cost", "weight": 1.0}],
                    "options": [{"name": "A", "scores": [{"criterion": "unrelated", "value": 99.0}]}]
                }),
            ))
            .await;
        let ranked = result.output.unwrap()["ranked"].clone();
        assert_eq!(ranked[0]["score"], json!(0.0));
    }
}
