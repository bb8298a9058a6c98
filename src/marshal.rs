//! Output marshalling - shapes a JSON value to a model.
//!
//! Only the model's fields are emitted, in declaration order. Values are read
//! from the field's `attribute` (a dotted path) or its name, coerced to the
//! field's kind, and fall back to the field default when missing.

use serde_json::{Map, Number, Value};
use tracing::trace;

use crate::apply::{apply, mask_resolved};
use crate::error::{join_pointer, pointer, MarshalError};
use crate::field::{Field, FieldType, Kind, ModelRef};
use crate::mask::Mask;
use crate::model::{Model, ModelRegistry};
use crate::types::json_type_name;

/// Options for marshalling.
#[derive(Debug, Clone, Default)]
pub struct MarshalOptions {
    /// Mask overriding the model's default mask.
    pub mask: Option<Mask>,
    /// Drop `null` and empty-object entries from the output.
    pub skip_none: bool,
    /// Wrap the output as `{envelope: output}`.
    pub envelope: Option<String>,
}

impl MarshalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn skip_none(mut self, skip_none: bool) -> Self {
        self.skip_none = skip_none;
        self
    }

    pub fn envelope(mut self, key: impl Into<String>) -> Self {
        self.envelope = Some(key.into());
        self
    }
}

/// Marshal `data` against the named model.
///
/// Arrays marshal element-wise. The explicit mask, or else the model's
/// default mask, is applied to the model's fields first (missing names are
/// skipped). The discriminator field is always stamped with the model name.
///
/// # Errors
///
/// Returns `MarshalError` on unknown models, inconsistent masks, values that
/// cannot be coerced to their field kind, and polymorphic values whose type
/// tag matches no mapped model.
pub fn marshal(
    data: &Value,
    model: &str,
    registry: &ModelRegistry,
    options: &MarshalOptions,
) -> Result<Value, MarshalError> {
    let model = registry.lookup(model)?;
    let ctx = Context {
        registry,
        skip_none: options.skip_none,
    };
    let out = ctx.model(data, model, options.mask.as_ref(), "")?;

    Ok(match &options.envelope {
        Some(key) => {
            let mut wrapped = Map::new();
            wrapped.insert(key.clone(), out);
            Value::Object(wrapped)
        }
        None => out,
    })
}

struct Context<'a> {
    registry: &'a ModelRegistry,
    skip_none: bool,
}

impl Context<'_> {
    fn model(
        &self,
        data: &Value,
        model: &Model,
        mask: Option<&Mask>,
        path: &str,
    ) -> Result<Value, MarshalError> {
        if let Value::Array(items) = data {
            return items
                .iter()
                .enumerate()
                .map(|(i, item)| self.model(item, model, mask, &format!("{}/{}", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }

        let object = match data {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(MarshalError::InvalidValue {
                    path: pointer(path),
                    expected: "object",
                    actual: json_type_name(other).to_string(),
                })
            }
        };

        let resolved = self.registry.resolve(model)?;
        let fields = match mask.or(resolved.mask.as_ref()) {
            Some(mask) => {
                trace!(model = %resolved.name, mask = %mask, "masking model for output");
                mask_resolved(&resolved, mask.nodes(), self.registry, true, path)
                    .map_err(MarshalError::from)?
                    .fields()
                    .to_vec()
            }
            None => resolved.fields.clone(),
        };

        let mut out = Map::new();
        for (name, field) in &fields {
            let field_path = join_pointer(path, name);
            let value = if field.discriminator {
                Value::String(resolved.name.clone())
            } else {
                let key = field.attribute.as_deref().unwrap_or(name);
                let raw = object.and_then(|map| get_value(map, key));
                self.field(field, raw, &field_path)?
            };

            if self.skip_none && is_empty(&value) {
                continue;
            }
            out.insert(name.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn field(&self, field: &Field, raw: Option<&Value>, path: &str) -> Result<Value, MarshalError> {
        let Some(value) = raw.filter(|v| !v.is_null()) else {
            return match (&field.field_type, &field.default) {
                (FieldType::Primitive(kind), Some(default)) => format(*kind, default, path),
                (_, Some(default)) => Ok(default.clone()),
                (_, None) => Ok(Value::Null),
            };
        };

        match &field.field_type {
            FieldType::Primitive(kind) if kind.is_opaque() => match &field.mask {
                Some(mask) => Ok(apply(value, mask, true)?),
                None => Ok(value.clone()),
            },
            FieldType::Primitive(kind) => format(*kind, value, path),
            FieldType::List { items, .. } => {
                let Value::Array(elements) = value else {
                    return Err(invalid(path, "array", value));
                };
                elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| {
                        self.field(items, Some(element), &format!("{}/{}", path, i))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            FieldType::Nested { model, as_list } => {
                let target = match model {
                    ModelRef::Named(name) => self.registry.lookup(name)?,
                    ModelRef::Masked(inner) => inner.as_ref(),
                };
                if *as_list && !value.is_array() {
                    return Err(invalid(path, "array", value));
                }
                self.model(value, target, None, path)
            }
            FieldType::Polymorphic { mapping } => {
                let ancestor = self
                    .registry
                    .common_ancestor(mapping.values().map(String::as_str))?;
                let resolved = self.registry.resolve(ancestor)?;
                let tag = resolved
                    .discriminator
                    .as_deref()
                    .and_then(|d| {
                        let key = resolved
                            .get(d)
                            .and_then(|f| f.attribute.as_deref())
                            .unwrap_or(d);
                        value.as_object().and_then(|map| get_value(map, key))
                    })
                    .and_then(Value::as_str);

                let Some(model) = tag.and_then(|t| mapping.get(t)) else {
                    return Err(MarshalError::UnmatchedType {
                        path: pointer(path),
                        tag: tag.map(str::to_string),
                    });
                };
                let target = self.registry.lookup(model)?;
                self.model(value, target, field.mask.as_ref(), path)
            }
        }
    }
}

/// Read a dotted path (`address.city`, `items.0`) from an object.
fn get_value<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    let mut parts = key.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(inner) => inner.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn invalid(path: &str, expected: &'static str, value: &Value) -> MarshalError {
    MarshalError::InvalidValue {
        path: pointer(path),
        expected,
        actual: json_type_name(value).to_string(),
    }
}

/// Truncate a float toward zero, rejecting values outside the `i64` range.
fn truncate(f: f64) -> Option<Value> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let t = f.trunc();
    (-LIMIT..LIMIT).contains(&t).then(|| Value::from(t as i64))
}

/// Coerce a value to a primitive kind.
fn format(kind: Kind, value: &Value, path: &str) -> Result<Value, MarshalError> {
    match kind {
        Kind::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(invalid(path, "string", other)),
        },
        Kind::Integer => {
            let parsed = match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => return Ok(value.clone()),
                Value::Number(n) => n.as_f64().and_then(truncate),
                Value::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .map(Value::from)
                        .or_else(|_| s.parse::<u64>().map(Value::from))
                        .ok()
                }
                _ => None,
            };
            parsed.ok_or_else(|| invalid(path, "integer", value))
        }
        Kind::Number => {
            let parsed = match value {
                Value::Number(_) => return Ok(value.clone()),
                Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64),
                _ => None,
            };
            parsed
                .map(Value::Number)
                .ok_or_else(|| invalid(path, "number", value))
        }
        Kind::Boolean => Ok(Value::Bool(match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        })),
        Kind::DateTime | Kind::Date => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(invalid(path, "date string", other)),
        },
        Kind::Raw | Kind::Object => Ok(value.clone()),
    }
}
