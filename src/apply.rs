//! Mask application.
//!
//! A mask filters two kinds of input: live JSON data, and the declared fields
//! of a model. Both produce new values; nothing is mutated in place.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{join_pointer, pointer, MaskError};
use crate::field::{Field, FieldType, ModelRef};
use crate::mask::{AsMask, Mask, MaskNode};
use crate::model::{Model, ModelRegistry, ResolvedModel};

/// Apply a mask to JSON data.
///
/// Arrays are filtered element-wise, objects key by key. Selected keys
/// missing from the data come out as `null` unless `skip_missing` is set.
///
/// # Errors
///
/// Returns `MaskError::Parse` for malformed mask text and
/// `MaskError::Inconsistent` when the mask selects into a scalar.
///
/// # Example
///
/// ```
/// use mask_schema::apply;
/// use serde_json::json;
///
/// let data = json!({"name": "John", "age": 42, "pets": [{"name": "Rex", "kind": "dog"}]});
/// let out = apply(&data, "name,pets{name}", false).unwrap();
/// assert_eq!(out, json!({"name": "John", "pets": [{"name": "Rex"}]}));
/// ```
pub fn apply<M: AsMask + ?Sized>(
    value: &Value,
    mask: &M,
    skip_missing: bool,
) -> Result<Value, MaskError> {
    let mask = mask.as_mask()?;
    trace!(mask = %mask, skip_missing, "applying mask to data");
    apply_value(value, mask.nodes(), skip_missing, "")
}

/// Filter one object by a list of mask nodes.
pub fn filter_by_mask(
    data: &Map<String, Value>,
    nodes: &[MaskNode],
    skip_missing: bool,
) -> Result<Map<String, Value>, MaskError> {
    filter_object(data, nodes, skip_missing, "")
}

fn apply_value(
    value: &Value,
    nodes: &[MaskNode],
    skip_missing: bool,
    path: &str,
) -> Result<Value, MaskError> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| apply_value(item, nodes, skip_missing, &format!("{}/{}", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => filter_object(map, nodes, skip_missing, path).map(Value::Object),
        _ => Err(MaskError::Inconsistent {
            path: pointer(path),
        }),
    }
}

fn filter_object(
    data: &Map<String, Value>,
    nodes: &[MaskNode],
    skip_missing: bool,
    path: &str,
) -> Result<Map<String, Value>, MaskError> {
    let mut out = Map::new();
    let mut wildcard = false;

    for node in nodes {
        match node {
            MaskNode::Wildcard => wildcard = true,
            MaskNode::Nested(name, children) => match data.get(name) {
                None if skip_missing => {}
                None | Some(Value::Null) => {
                    out.insert(name.clone(), Value::Null);
                }
                Some(nested) => {
                    let child_path = join_pointer(path, name);
                    let filtered = apply_value(nested, children, skip_missing, &child_path)?;
                    out.insert(name.clone(), filtered);
                }
            },
            MaskNode::Leaf(name) => match data.get(name) {
                None if skip_missing => {}
                value => {
                    out.insert(name.clone(), value.cloned().unwrap_or(Value::Null));
                }
            },
        }
    }

    if wildcard {
        for (key, value) in data {
            if !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(out)
}

/// Apply a mask to a model's declared fields.
///
/// The model is resolved first, so inherited fields can be selected. The
/// result is a parent-less copy with the same name; nested fields point to
/// masked copies of their targets. Names the model does not declare come out
/// as raw placeholder fields unless `skip_missing` is set.
///
/// # Errors
///
/// Returns `MaskError::Inconsistent` when the mask selects into a scalar
/// field, and `MaskError::Model` when a referenced model cannot be resolved.
pub fn apply_to_model<M: AsMask + ?Sized>(
    model: &Model,
    mask: &M,
    registry: &ModelRegistry,
    skip_missing: bool,
) -> Result<Model, MaskError> {
    let mask = mask.as_mask()?;
    trace!(model = model.name(), mask = %mask, "applying mask to model");
    let resolved = registry.resolve(model)?;
    mask_resolved(&resolved, mask.nodes(), registry, skip_missing, "")
}

/// Apply a mask to a single field descriptor.
pub fn apply_to_field<M: AsMask + ?Sized>(
    field: &Field,
    mask: &M,
    registry: &ModelRegistry,
    skip_missing: bool,
) -> Result<Field, MaskError> {
    let mask = mask.as_mask()?;
    mask_field(field, mask.nodes(), registry, skip_missing, "")
}

pub(crate) fn mask_resolved(
    resolved: &ResolvedModel,
    nodes: &[MaskNode],
    registry: &ModelRegistry,
    skip_missing: bool,
    path: &str,
) -> Result<Model, MaskError> {
    let mut masked = Model::new(resolved.name.clone()).strict(resolved.strict);
    if let Some(description) = &resolved.description {
        masked = masked.with_description(description.clone());
    }
    let mut selected: Vec<&str> = Vec::new();
    let mut wildcard = false;

    for node in nodes {
        let name = match node {
            MaskNode::Wildcard => {
                wildcard = true;
                continue;
            }
            MaskNode::Leaf(name) | MaskNode::Nested(name, _) => name,
        };
        let field = match (resolved.get(name), node) {
            (None, _) if skip_missing => continue,
            (None, _) => Field::raw(),
            (Some(field), MaskNode::Nested(_, children)) => {
                let child_path = join_pointer(path, name);
                mask_field(field, children, registry, skip_missing, &child_path)?
            }
            (Some(field), _) => field.clone(),
        };
        selected.push(name);
        masked = masked.field(name.clone(), field);
    }

    if wildcard {
        for (name, field) in &resolved.fields {
            if !selected.contains(&name.as_str()) {
                masked = masked.field(name.clone(), field.clone());
            }
        }
    }

    Ok(masked)
}

fn mask_field(
    field: &Field,
    nodes: &[MaskNode],
    registry: &ModelRegistry,
    skip_missing: bool,
    path: &str,
) -> Result<Field, MaskError> {
    let mut masked = field.clone();
    match &field.field_type {
        FieldType::Primitive(kind) if kind.is_opaque() => {
            masked.mask = Some(Mask::new(nodes.to_vec()));
        }
        FieldType::Primitive(_) => {
            return Err(MaskError::Inconsistent {
                path: pointer(path),
            });
        }
        FieldType::List {
            items,
            min_items,
            max_items,
            unique,
        } => {
            masked.field_type = FieldType::List {
                items: Box::new(mask_field(items, nodes, registry, skip_missing, path)?),
                min_items: *min_items,
                max_items: *max_items,
                unique: *unique,
            };
        }
        FieldType::Nested { model, as_list } => {
            let resolved = match model {
                ModelRef::Named(name) => registry.resolve_name(name)?,
                ModelRef::Masked(inner) => registry.resolve(inner)?,
            };
            let target = mask_resolved(&resolved, nodes, registry, skip_missing, path)?;
            masked.field_type = FieldType::Nested {
                model: ModelRef::Masked(Box::new(target)),
                as_list: *as_list,
            };
        }
        FieldType::Polymorphic { .. } => {
            masked.mask = Some(Mask::new(nodes.to_vec()));
        }
    }
    Ok(masked)
}
