// crates/noesis-engine/src/analyzers/mod.rs
// Built-in analyzer catalog (SPEC_FULL "Built-in analyzer catalog"). §1
// puts the cognitive analyzers' domain logic explicitly out of scope ("the
// spec treats each as an opaque handler with typed input/output"); these
// are deliberately thin example handlers that exercise the registry,
// dispatcher and workflow engine end-to-end, not a reasoning engine.

mod decision_score;
mod mental_model;
mod multi_perspective;
mod scenario;
mod sequential_thinking;

use crate::registry::ToolRegistry;

/// Registers every built-in analyzer and example tool (§6 Scenarios 1 and
/// 3's `classify`/`enrich`/`summarize`/`flaky` included) into `registry`.
pub fn register_analyzer_tools(registry: &ToolRegistry) -> crate::error::Result<()> {
    registry.register(sequential_thinking::tool_spec())?;
    registry.register(mental_model::tool_spec())?;
    registry.register(decision_score::tool_spec())?;
    registry.register(multi_perspective::tool_spec())?;
    registry.register(scenario::classify_tool())?;
    registry.register(scenario::enrich_tool())?;
    registry.register(scenario::summarize_tool())?;
    registry.register(scenario::flaky_tool())?;
    Ok(())
}
