//! Document loading and model declarations.
//!
//! Handles loading JSON documents from files, strings, and HTTP URLs, and
//! turning declaration documents into a [`ModelRegistry`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::LoadError;
use crate::field::{Field, FieldType, Kind};
use crate::mask::Mask;
use crate::model::{Model, ModelRegistry};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails, the server answers
/// with an error status, or the body isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    debug!(url, "fetching document");
    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelDecl {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    mask: Option<String>,
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    inherits: Vec<String>,
    #[serde(default)]
    clone: Vec<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDecl {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    items: Option<Value>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    as_list: bool,
    #[serde(default)]
    mapping: BTreeMap<String, String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    readonly: bool,
    #[serde(default)]
    discriminator: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    example: Option<Value>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default, rename = "enum")]
    enum_values: Option<Vec<Value>>,
    #[serde(default)]
    min_items: Option<usize>,
    #[serde(default)]
    max_items: Option<usize>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    mask: Option<String>,
}

/// One parsed model declaration, not yet registered.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    pub name: String,
    pub description: Option<String>,
    pub mask: Option<Mask>,
    pub strict: bool,
    pub parents: Vec<String>,
    pub sources: Vec<String>,
    pub fields: Vec<(String, Field)>,
}

fn invalid(path: &str, message: impl ToString) -> LoadError {
    LoadError::InvalidDeclaration {
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn parse_mask(text: &str, path: String) -> Result<Mask, LoadError> {
    Mask::parse(text).map_err(|source| LoadError::InvalidMask { path, source })
}

/// Parse a model declaration found at JSON pointer `path`.
pub(crate) fn parse_declaration(value: &Value, path: &str) -> Result<Declaration, LoadError> {
    let decl = ModelDecl::deserialize(value).map_err(|e| invalid(path, e))?;
    if !decl.inherits.is_empty() && !decl.clone.is_empty() {
        return Err(invalid(path, "`inherits` and `clone` are mutually exclusive"));
    }

    let mask = decl
        .mask
        .as_deref()
        .map(|text| parse_mask(text, format!("{}/mask", path)))
        .transpose()?;

    let fields = decl
        .fields
        .iter()
        .map(|(name, value)| {
            parse_field(value, &format!("{}/fields/{}", path, name)).map(|f| (name.clone(), f))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Declaration {
        name: decl.name,
        description: decl.description,
        mask,
        strict: decl.strict,
        parents: decl.inherits,
        sources: decl.clone,
        fields,
    })
}

fn parse_field(value: &Value, path: &str) -> Result<Field, LoadError> {
    let decl = FieldDecl::deserialize(value).map_err(|e| invalid(path, e))?;

    let mut field = match decl.kind.as_str() {
        "list" => {
            let items = decl
                .items
                .as_ref()
                .ok_or_else(|| invalid(path, "list field requires `items`"))?;
            Field::list(parse_field(items, &format!("{}/items", path))?)
                .with_items_bounds(decl.min_items, decl.max_items)
        }
        "nested" => {
            let model = decl
                .model
                .clone()
                .ok_or_else(|| invalid(path, "nested field requires `model`"))?;
            if decl.as_list {
                Field::nested_list(model)
            } else {
                Field::nested(model)
            }
        }
        "polymorph" => {
            if decl.mapping.is_empty() {
                return Err(invalid(path, "polymorph field requires a non-empty `mapping`"));
            }
            Field::new(FieldType::Polymorphic {
                mapping: decl.mapping.clone(),
            })
        }
        other => Kind::parse(other)
            .map(Field::primitive)
            .ok_or_else(|| invalid(path, format!("unknown field type '{}'", other)))?,
    };

    field.required = decl.required;
    field.readonly = decl.readonly;
    field.discriminator = decl.discriminator;
    field.title = decl.title;
    field.description = decl.description;
    field.example = decl.example;
    field.default = decl.default;
    field.attribute = decl.attribute;
    field.enum_values = decl.enum_values;
    if decl.unique {
        field = field.unique_items();
    }
    if let Some(text) = &decl.mask {
        field.mask = Some(parse_mask(text, format!("{}/mask", path))?);
    }
    Ok(field)
}

/// Build the declared model and add it to the registry.
pub(crate) fn register_declaration(
    registry: &mut ModelRegistry,
    decl: Declaration,
) -> Result<(), LoadError> {
    let mut model = if decl.sources.is_empty() {
        decl.parents
            .iter()
            .fold(Model::new(decl.name), |model, parent| model.parent(parent))
    } else {
        let sources = decl
            .sources
            .iter()
            .map(|source| registry.resolve_name(source))
            .collect::<Result<Vec<_>, _>>()?;
        Model::from_sources(decl.name, &sources)
    };

    model = model.extend(decl.fields).strict(decl.strict);
    if let Some(description) = decl.description {
        model = model.with_description(description);
    }
    if let Some(mask) = decl.mask {
        model = model.with_mask(mask);
    }

    registry.define(model)?;
    Ok(())
}

fn declarations(document: &Value) -> Result<&Vec<Value>, LoadError> {
    document
        .get("models")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("/models", "expected an array of model declarations"))
}

/// Build a registry from a declaration document.
///
/// Models are registered in document order, so parents and clone sources must
/// be declared before the models that use them. Nested references may point
/// anywhere in the document.
///
/// # Errors
///
/// Returns `LoadError::InvalidDeclaration` or `LoadError::InvalidMask` with a
/// JSON pointer to the offending declaration, and `LoadError::Model` when the
/// registry rejects a model or a reference does not resolve.
pub fn load_registry(document: &Value) -> Result<ModelRegistry, LoadError> {
    let mut registry = ModelRegistry::new();
    for (i, value) in declarations(document)?.iter().enumerate() {
        let decl = parse_declaration(value, &format!("/models/{}", i))?;
        register_declaration(&mut registry, decl)?;
    }
    registry.check()?;
    debug!(models = registry.len(), "loaded model registry");
    Ok(registry)
}

/// Load a declaration document from a file path or URL and build a registry.
pub fn load_registry_auto(source: &str) -> Result<ModelRegistry, LoadError> {
    load_registry(&load_document_auto(source)?)
}

/// Model declarations of a document, paired with their JSON pointers.
pub(crate) fn declaration_values(document: &Value) -> Result<Vec<(String, &Value)>, LoadError> {
    Ok(declarations(document)?
        .iter()
        .enumerate()
        .map(|(i, value)| (format!("/models/{}", i), value))
        .collect())
}
