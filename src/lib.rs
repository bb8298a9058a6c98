//! Mask Schema
//!
//! Field masks and model schemas for JSON APIs.
//!
//! A mask is a compact description of the fields a client wants back, such as
//! `{name,address{city}}`. This library parses masks, applies them to JSON
//! values and to model declarations, and compiles models into OpenAPI 2
//! (Swagger) schema definitions.
//!
//! # Example
//!
//! ```
//! use mask_schema::{apply, apply_to_model, compile_model, Field, Model, ModelRegistry};
//! use serde_json::json;
//!
//! let data = json!({
//!     "name": "Jane",
//!     "age": 42,
//!     "address": { "street": "Main", "city": "Springfield" }
//! });
//! let masked = apply(&data, "name,address{city}", false).unwrap();
//! assert_eq!(masked, json!({ "name": "Jane", "address": { "city": "Springfield" } }));
//!
//! let mut registry = ModelRegistry::new();
//! registry
//!     .define(
//!         Model::new("Person")
//!             .field("name", Field::string().required())
//!             .field("age", Field::integer()),
//!     )
//!     .unwrap();
//!
//! let person = registry.get("Person").unwrap();
//! let slim = apply_to_model(person, "name", &registry, false).unwrap();
//! assert_eq!(
//!     compile_model(&slim, &registry).unwrap(),
//!     json!({
//!         "type": "object",
//!         "properties": { "name": { "type": "string" } },
//!         "required": ["name"]
//!     })
//! );
//! ```
//!
//! # Mask Syntax
//!
//! | Mask | Selects |
//! |------|---------|
//! | `a,b` | fields `a` and `b` |
//! | `a{b}` | field `a`, and `b` inside it |
//! | `a,*` | field `a` first, then every other field |
//! | `{a,b}` | same as `a,b`; outer braces are optional |
//!
//! Names may contain word characters, `:`, `-` and `*`. Whitespace between
//! tokens is ignored.

mod apply;
mod compiler;
mod error;
mod field;
mod linter;
mod loader;
mod marshal;
mod mask;
mod model;
mod types;
mod validator;

pub use apply::{apply, apply_to_field, apply_to_model, filter_by_mask};
pub use compiler::{
    compile_definitions, compile_field, compile_model, definitions_document, not_none, reference,
    REF_PREFIX,
};
pub use error::{
    LoadError, MarshalError, MaskError, MaskParseError, ModelError, SchemaError, ValidateError,
};
pub use field::{Field, FieldType, Kind, ModelRef};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    is_url, load_document, load_document_auto, load_document_str, load_registry,
    load_registry_auto,
};
pub use marshal::{marshal, MarshalOptions};
pub use mask::{parse as parse_mask, AsMask, Mask, MaskNode, WILDCARD};
pub use model::{Model, ModelRegistry, ResolvedModel};
pub use types::{
    json_type_name, mask_from_headers, mask_parameter, MaskOptions, DEFAULT_MASK_HEADER,
};
pub use validator::{model_document, validate, validate_against_schema};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
