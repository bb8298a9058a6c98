//! Shared types and mask configuration.

use serde_json::{json, Value};

use crate::error::MaskParseError;
use crate::mask::Mask;

/// Header carrying the mask on incoming requests unless configured otherwise.
pub const DEFAULT_MASK_HEADER: &str = "X-Fields";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Options for mask extraction and application.
#[derive(Debug, Clone)]
pub struct MaskOptions {
    /// Name of the header carrying the mask. Matched case-insensitively.
    pub header: String,
    /// When true, keys selected by the mask but absent from the data are
    /// left out instead of being emitted as `null`.
    pub skip_missing: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskOptions {
    /// Create options reading `X-Fields` with missing keys emitted as `null`.
    pub fn new() -> Self {
        Self {
            header: DEFAULT_MASK_HEADER.to_string(),
            skip_missing: false,
        }
    }

    /// Read the mask from a different header.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Leave out selected keys that are missing from the data.
    pub fn skip_missing(mut self, skip_missing: bool) -> Self {
        self.skip_missing = skip_missing;
        self
    }
}

/// Extract and parse the mask from request headers.
///
/// Returns `Ok(None)` when the header is absent or blank.
///
/// # Errors
///
/// Returns `MaskParseError` if the header value is not a valid mask. HTTP
/// front ends usually answer that with a 400.
pub fn mask_from_headers<I, K, V>(
    headers: I,
    options: &MaskOptions,
) -> Result<Option<Mask>, MaskParseError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let value = headers
        .into_iter()
        .find(|(name, _)| name.as_ref().eq_ignore_ascii_case(&options.header));

    match value {
        Some((_, text)) if !text.as_ref().trim().is_empty() => Mask::parse(text.as_ref()).map(Some),
        _ => Ok(None),
    }
}

/// OpenAPI 2 header parameter describing the mask header.
pub fn mask_parameter(options: &MaskOptions) -> Value {
    json!({
        "name": options.header,
        "in": "header",
        "type": "string",
        "format": "mask",
        "description": "An optional fields mask",
    })
}
