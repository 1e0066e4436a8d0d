// crates/noesis-engine/src/schema/mod.rs
// Schema & Value behavior (§4.A). The shapes themselves live in `noesis-types`;
// this module holds the validator and coercion pass that operate on them.

pub mod coerce;
pub mod validate;

pub use coerce::coerce;
pub use validate::{validate, validate_with_refs};
