//! Schema compilation - turns models and fields into OpenAPI 2 definitions.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::ModelError;
use crate::field::{Field, FieldType};
use crate::model::{Model, ModelRegistry};

/// Prefix of every model reference.
pub const REF_PREFIX: &str = "#/definitions/";

/// `{"$ref": "#/definitions/<name>"}`
pub fn reference(name: &str) -> Value {
    json!({ "$ref": format!("{}{}", REF_PREFIX, name) })
}

/// Drop every null-valued key.
pub fn not_none(mut map: Map<String, Value>) -> Map<String, Value> {
    map.retain(|_, v| !v.is_null());
    map
}

/// Compile one field into a schema fragment.
///
/// # Errors
///
/// Returns `ModelError::UnknownModel` for a reference to an unregistered model
/// and `ModelError::AmbiguousAncestor` for a polymorphic field whose models do
/// not share exactly one ancestor.
pub fn compile_field(field: &Field, registry: &ModelRegistry) -> Result<Value, ModelError> {
    let common = common_keywords(field);

    let schema = match &field.field_type {
        FieldType::Primitive(kind) => {
            let mut schema = Map::new();
            schema.insert("type".into(), json!(kind.schema_type()));
            schema.insert("format".into(), json!(kind.schema_format()));
            schema.extend(common);
            schema
        }
        FieldType::List {
            items,
            min_items,
            max_items,
            unique,
        } => {
            let mut schema = Map::new();
            schema.insert("type".into(), json!("array"));
            schema.insert("items".into(), compile_field(items, registry)?);
            schema.insert("minItems".into(), json!(min_items));
            schema.insert("maxItems".into(), json!(max_items));
            if *unique {
                schema.insert("uniqueItems".into(), json!(true));
            }
            schema.extend(common);
            schema
        }
        FieldType::Nested { model, as_list } => {
            registry.lookup(model.name())?;
            nested_schema(model.name(), *as_list, common)
        }
        FieldType::Polymorphic { mapping } => {
            let ancestor = registry.common_ancestor(mapping.values().map(String::as_str))?;
            nested_schema(ancestor.name(), false, common)
        }
    };

    Ok(Value::Object(not_none(schema)))
}

fn common_keywords(field: &Field) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("title".into(), json!(field.title));
    map.insert("description".into(), json!(field.description));
    if field.readonly {
        map.insert("readOnly".into(), json!(true));
    }
    map.insert("default".into(), json!(field.default));
    map.insert("example".into(), json!(field.example));
    map.insert("enum".into(), json!(field.enum_values));
    not_none(map)
}

/// Siblings of `$ref` are ignored by OpenAPI 2 tooling, so a reference that
/// carries its own keywords is wrapped in `allOf`.
fn nested_schema(name: &str, as_list: bool, common: Map<String, Value>) -> Map<String, Value> {
    let mut schema = Map::new();
    if as_list {
        schema.insert("type".into(), json!("array"));
        schema.insert("items".into(), reference(name));
    } else if !common.is_empty() {
        schema.insert("allOf".into(), json!([reference(name)]));
    } else if let Value::Object(bare) = reference(name) {
        schema = bare;
    }
    schema.extend(common);
    schema
}

/// Compile a model into a schema fragment.
///
/// A model without parents compiles to an object schema of its own fields. A
/// model with parents compiles to `allOf` over a reference to each parent,
/// followed by the object schema of its own fields.
///
/// # Example
///
/// ```
/// use mask_schema::{compile_model, Field, Model, ModelRegistry};
/// use serde_json::json;
///
/// let mut registry = ModelRegistry::new();
/// registry.define(Model::new("Parent").field("name", Field::string())).unwrap();
/// registry.inherit("Child", &["Parent"], [("extra", Field::string())]).unwrap();
///
/// let schema = compile_model(registry.get("Child").unwrap(), &registry).unwrap();
/// assert_eq!(schema, json!({
///     "allOf": [
///         {"$ref": "#/definitions/Parent"},
///         {"type": "object", "properties": {"extra": {"type": "string"}}}
///     ]
/// }));
/// ```
pub fn compile_model(model: &Model, registry: &ModelRegistry) -> Result<Value, ModelError> {
    let own = compile_own_fields(model, registry)?;
    if model.parents().is_empty() {
        return Ok(own);
    }

    let mut all_of = Vec::with_capacity(model.parents().len() + 1);
    for parent in model.parents() {
        registry.lookup(parent)?;
        all_of.push(reference(parent));
    }
    all_of.push(own);
    Ok(json!({ "allOf": all_of }))
}

fn compile_own_fields(model: &Model, registry: &ModelRegistry) -> Result<Value, ModelError> {
    let mut properties = Map::new();
    let mut required = BTreeSet::new();
    let mut discriminator = None;

    for (name, field) in model.fields() {
        properties.insert(name.clone(), compile_field(field, registry)?);
        if field.required {
            required.insert(name.as_str());
        }
        if field.discriminator {
            discriminator = Some(name.as_str());
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("description".into(), json!(model.description()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema.insert("discriminator".into(), json!(discriminator));
    schema.insert(
        "x-mask".into(),
        json!(model.default_mask().map(ToString::to_string)),
    );
    if model.is_strict() {
        schema.insert("additionalProperties".into(), json!(false));
    }

    Ok(Value::Object(not_none(schema)))
}

/// Compile every registered model, keyed by name.
///
/// The registry is checked first, so a dangling reference or an unresolvable
/// model fails the whole compilation.
pub fn compile_definitions(registry: &ModelRegistry) -> Result<Map<String, Value>, ModelError> {
    registry.check()?;

    let mut definitions = Map::new();
    for model in registry.iter() {
        definitions.insert(model.name().to_string(), compile_model(model, registry)?);
    }
    debug!(models = definitions.len(), "compiled definitions");
    Ok(definitions)
}

/// `{"definitions": {...}}` for the whole registry.
pub fn definitions_document(registry: &ModelRegistry) -> Result<Value, ModelError> {
    Ok(json!({ "definitions": compile_definitions(registry)? }))
}
