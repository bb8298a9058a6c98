//! Field descriptors: the shape of one model field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mask::Mask;
use crate::model::Model;

/// Primitive field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Integer,
    Number,
    Boolean,
    DateTime,
    Date,
    /// Arbitrary value passed through as-is.
    Raw,
    Object,
}

impl Kind {
    /// Parse a kind from its declaration name.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Kind::String),
            "integer" => Some(Kind::Integer),
            "number" => Some(Kind::Number),
            "boolean" => Some(Kind::Boolean),
            "datetime" => Some(Kind::DateTime),
            "date" => Some(Kind::Date),
            "raw" => Some(Kind::Raw),
            "object" => Some(Kind::Object),
            _ => None,
        }
    }

    /// JSON Schema `type` keyword.
    pub fn schema_type(&self) -> &'static str {
        match self {
            Kind::String | Kind::DateTime | Kind::Date => "string",
            Kind::Integer => "integer",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Raw | Kind::Object => "object",
        }
    }

    /// JSON Schema `format` keyword, if any.
    pub fn schema_format(&self) -> Option<&'static str> {
        match self {
            Kind::DateTime => Some("date-time"),
            Kind::Date => Some("date"),
            _ => None,
        }
    }

    /// Opaque kinds carry arbitrary structure a mask may still select into.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Kind::Raw | Kind::Object)
    }
}

/// Target of a nested field.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelRef {
    /// A registered model, looked up by name.
    Named(String),
    /// A masked copy of a model, produced by mask application.
    Masked(Box<Model>),
}

impl ModelRef {
    pub fn name(&self) -> &str {
        match self {
            ModelRef::Named(name) => name,
            ModelRef::Masked(model) => model.name(),
        }
    }
}

/// Structural variant of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(Kind),
    List {
        items: Box<Field>,
        min_items: Option<usize>,
        max_items: Option<usize>,
        unique: bool,
    },
    Nested {
        model: ModelRef,
        as_list: bool,
    },
    /// Concrete type tag to model name.
    Polymorphic { mapping: BTreeMap<String, String> },
}

/// One field of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub field_type: FieldType,
    pub required: bool,
    pub readonly: bool,
    pub discriminator: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<Value>>,
    /// Source key (dotted path) read when marshalling, if not the field name.
    pub attribute: Option<String>,
    /// Mask applied at output time (raw/object and polymorphic fields).
    pub mask: Option<Mask>,
}

impl Field {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            readonly: false,
            discriminator: false,
            title: None,
            description: None,
            example: None,
            default: None,
            enum_values: None,
            attribute: None,
            mask: None,
        }
    }

    pub fn primitive(kind: Kind) -> Self {
        Self::new(FieldType::Primitive(kind))
    }

    pub fn string() -> Self {
        Self::primitive(Kind::String)
    }

    pub fn integer() -> Self {
        Self::primitive(Kind::Integer)
    }

    pub fn number() -> Self {
        Self::primitive(Kind::Number)
    }

    pub fn boolean() -> Self {
        Self::primitive(Kind::Boolean)
    }

    pub fn datetime() -> Self {
        Self::primitive(Kind::DateTime)
    }

    pub fn date() -> Self {
        Self::primitive(Kind::Date)
    }

    pub fn raw() -> Self {
        Self::primitive(Kind::Raw)
    }

    pub fn object() -> Self {
        Self::primitive(Kind::Object)
    }

    pub fn list(items: Field) -> Self {
        Self::new(FieldType::List {
            items: Box::new(items),
            min_items: None,
            max_items: None,
            unique: false,
        })
    }

    /// Reference to a registered model.
    pub fn nested(model: impl Into<String>) -> Self {
        Self::new(FieldType::Nested {
            model: ModelRef::Named(model.into()),
            as_list: false,
        })
    }

    /// Reference to a registered model, rendered as an array of it.
    pub fn nested_list(model: impl Into<String>) -> Self {
        Self::new(FieldType::Nested {
            model: ModelRef::Named(model.into()),
            as_list: true,
        })
    }

    /// Union over models keyed by concrete type tag.
    pub fn polymorph<I, K, V>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(FieldType::Polymorphic {
            mapping: mapping
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Mark as the field that carries the concrete model name.
    pub fn discriminator(mut self) -> Self {
        self.discriminator = true;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_enum<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Set list length bounds. No effect on non-list fields.
    pub fn with_items_bounds(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        if let FieldType::List {
            min_items,
            max_items,
            ..
        } = &mut self.field_type
        {
            *min_items = min;
            *max_items = max;
        }
        self
    }

    /// Require unique list items. No effect on non-list fields.
    pub fn unique_items(mut self) -> Self {
        if let FieldType::List { unique, .. } = &mut self.field_type {
            *unique = true;
        }
        self
    }

    /// Names of registered models this field refers to, directly or through
    /// list items. Masked copies are not included.
    pub fn referenced_models(&self) -> Vec<&str> {
        match &self.field_type {
            FieldType::Primitive(_) => Vec::new(),
            FieldType::List { items, .. } => items.referenced_models(),
            FieldType::Nested {
                model: ModelRef::Named(name),
                ..
            } => vec![name.as_str()],
            FieldType::Nested { .. } => Vec::new(),
            FieldType::Polymorphic { mapping } => mapping.values().map(String::as_str).collect(),
        }
    }
}
