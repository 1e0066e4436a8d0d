//! Tool Registry data types (§4.C). `ToolDescriptor` is the handler-free
//! view returned by `List()` and shipped in `tools/list` responses; the
//! registry's internal `ToolSpec` (which also carries the handler closure)
//! lives in `noesis::registry` since handlers are behavior, not data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}
