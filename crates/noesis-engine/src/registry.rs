// crates/noesis-engine/src/registry.rs
// Tool Registry (§4.C): name -> ToolSpec. Reads dominate writes, so the
// registry is a copy-on-write map behind an `ArcSwap` rather than a
// `RwLock` — `Get`/`List` never block a concurrent `Register`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use arc_swap::ArcSwap;
use noesis_types::{ToolDescriptor, Value};

use crate::error::{EngineError, Result};
use crate::handler::HandlerContext;

/// A tool's handler: a plain async function of validated input to output,
/// the "one function per tool" collapse the design notes call for (§9).
/// Boxed so the registry can hold heterogeneous handlers in one map.
pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, HandlerFailure>> + Send>>;
pub type Handler = Arc<dyn Fn(HandlerContext, Value) -> HandlerFuture + Send + Sync>;

/// What a handler may return on failure. Handlers that want a specific
/// `ErrorKind` surfaced (rare — most just return a message and get
/// `handlerError`) can say so explicitly.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub message: String,
    pub kind: Option<noesis_types::ErrorKind>,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerFailure {
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: noesis_types::ErrorKind) -> Self {
        HandlerFailure {
            message: message.into(),
            kind: Some(kind),
        }
    }
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// The registry's internal record (§3 ToolSpec). Carries the handler
/// closure, unlike [`ToolDescriptor`] which is the handler-free view
/// shipped over the wire.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_schema: noesis_types::Schema,
    pub output_schema: noesis_types::Schema,
    pub handler: Handler,
    pub metadata: std::collections::BTreeMap<String, Value>,
}

impl ToolSpec {
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

type Snapshot = HashMap<String, Arc<ToolSpec>>;

/// Mapping from tool name to `ToolSpec` (§4.C). Registration is rare;
/// concurrent `register()` calls are serialized via `rcu`'s compare-and-swap
/// retry loop rather than a lock. Lookups and listing never block on it.
#[derive(Clone)]
pub struct ToolRegistry {
    inner: Arc<ArcSwap<Snapshot>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            inner: Arc::new(ArcSwap::from_pointee(HashMap::new())),
        }
    }

    /// Registers a tool, replacing any prior spec under the same name
    /// atomically (§3 "re-registration under the same name replaces the
    /// prior spec atomically"; §4.C idempotent-for-identical-specs). Uses
    /// `rcu` rather than a plain load/clone/store so two concurrent
    /// `register()` calls for different names can't race and lose an
    /// update — the closure retries against the latest snapshot if another
    /// writer swaps the pointer first.
    pub fn register(&self, spec: ToolSpec) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(EngineError::InvalidParams(
                "tool name must not be empty".to_string(),
            ));
        }

        let spec = Arc::new(spec);
        self.inner.rcu(|current| {
            let mut next: Snapshot = (**current).clone();
            next.insert(spec.name.clone(), spec.clone());
            next
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolSpec>> {
        self.inner.load().get(name).cloned()
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.inner
            .load()
            .values()
            .map(|spec| spec.descriptor())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.load().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_types::Schema;
    use std::collections::BTreeMap;

    fn dummy_spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: "a test tool".to_string(),
            input_schema: Schema::object(BTreeMap::new()),
            output_schema: Schema::object(BTreeMap::new()),
            handler: Arc::new(|_ctx, _input| Box::pin(async { Ok(Value::Null) })),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = ToolRegistry::new();
        registry.register(dummy_spec("echo")).unwrap();
        let spec = registry.get("echo").expect("registered tool");
        assert_eq!(spec.name, "echo");
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = ToolRegistry::new();
        let err = registry.register(dummy_spec("")).unwrap_err();
        assert_eq!(err.kind(), noesis_types::ErrorKind::InvalidParams);
    }

    #[test]
    fn re_registration_replaces_the_prior_spec() {
        let registry = ToolRegistry::new();
        registry.register(dummy_spec("tool")).unwrap();
        let mut replacement = dummy_spec("tool");
        replacement.version = "2.0.0".to_string();
        registry.register(replacement).unwrap();

        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get("tool").unwrap().version, "2.0.0");
    }

    #[test]
    fn list_omits_handlers_and_reflects_all_registered_tools() {
        let registry = ToolRegistry::new();
        registry.register(dummy_spec("a")).unwrap();
        registry.register(dummy_spec("b")).unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
    }
}
