// crates/noesis-engine/src/tools.rs
// Generic utility tools (echo/concat/delay) registered alongside the
// `analyzers` catalog (SPEC_FULL "Built-in analyzer catalog") so a freshly
// built server has plain plumbing tools — useful for exercising timeouts
// and cancellation directly — as well as the labeled cognitive-analyzer
// stand-ins a workflow definition would actually reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use noesis_types::{Field, Schema};
use serde_json::json;

use crate::registry::{HandlerFailure, ToolRegistry, ToolSpec};

pub fn register_builtin_tools(registry: &ToolRegistry) -> crate::error::Result<()> {
    registry.register(echo_tool())?;
    registry.register(concat_tool())?;
    registry.register(delay_tool())?;
    crate::analyzers::register_analyzer_tools(registry)?;
    Ok(())
}

fn echo_tool() -> ToolSpec {
    ToolSpec {
        name: "echo".to_string(),
        version: "1.0.0".to_string(),
        description: "Returns its input unchanged.".to_string(),
        input_schema: Schema::object(BTreeMap::from([(
            "text".to_string(),
            Field::required(Schema::string()),
        )])),
        output_schema: Schema::object(BTreeMap::from([(
            "text".to_string(),
            Field::required(Schema::string()),
        )])),
        handler: Arc::new(|_ctx, input| Box::pin(async move { Ok(input) })),
        metadata: BTreeMap::new(),
    }
}

fn concat_tool() -> ToolSpec {
    ToolSpec {
        name: "concat".to_string(),
        version: "1.0.0".to_string(),
        description: "Joins two strings with an optional separator.".to_string(),
        input_schema: Schema::object(BTreeMap::from([
            ("a".to_string(), Field::required(Schema::string())),
            ("b".to_string(), Field::required(Schema::string())),
            (
                "separator".to_string(),
                Field::optional(Schema::string()).describe("defaults to empty string"),
            ),
        ])),
        output_schema: Schema::object(BTreeMap::from([(
            "result".to_string(),
            Field::required(Schema::string()),
        )])),
        handler: Arc::new(|_ctx, input| {
            Box::pin(async move {
                let a = input.get("a").and_then(|v| v.as_str()).unwrap_or_default();
                let b = input.get("b").and_then(|v| v.as_str()).unwrap_or_default();
                let sep = input.get("separator").and_then(|v| v.as_str()).unwrap_or_default();
                Ok(json!({ "result": format!("{a}{sep}{b}") }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

fn delay_tool() -> ToolSpec {
    ToolSpec {
        name: "delay".to_string(),
        version: "1.0.0".to_string(),
        description: "Sleeps for the given number of milliseconds, then returns. \
            Useful for exercising timeouts, cancellation, and retry behavior."
            .to_string(),
        input_schema: Schema::object(BTreeMap::from([(
            "millis".to_string(),
            Field::required(Schema::Integer { minimum: Some(0), maximum: None }),
        )])),
        output_schema: Schema::object(BTreeMap::from([(
            "sleptMillis".to_string(),
            Field::required(Schema::Integer { minimum: Some(0), maximum: None }),
        )])),
        handler: Arc::new(|ctx, input| {
            Box::pin(async move {
                let millis = input.get("millis").and_then(|v| v.as_u64()).unwrap_or(0);
                let requested = std::time::Duration::from_millis(millis);
                tokio::select! {
                    _ = tokio::time::sleep(requested) => {}
                    _ = ctx.cancelled() => {
                        return Err(HandlerFailure::with_kind(
                            "delay cancelled before it elapsed",
                            noesis_types::ErrorKind::Cancelled,
                        ));
                    }
                }
                Ok(json!({ "sleptMillis": millis }))
            })
        }),
        metadata: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, ToolCall};
    use serde_json::json;

    #[tokio::test]
    async fn builtin_tools_register_and_dispatch() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry).unwrap();
        let dispatcher = Dispatcher::new(registry);

        let result = dispatcher
            .dispatch(ToolCall::new("concat", json!({"a": "foo", "b": "bar", "separator": "-"})))
            .await;
        assert!(result.is_ok());
        assert_eq!(result.output.unwrap()["result"], json!("foo-bar"));
    }
}
