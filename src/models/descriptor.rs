use serde_json::{Map, Value};

/// Mapping keys checked for an image reference, highest priority first.
pub const PRIORITY_FIELDS: [&str; 9] = [
    "url",
    "b64",
    "image",
    "data",
    "base64",
    "file_path",
    "path",
    "src",
    "image_url",
];

/// One raw image reference as returned by the generator.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageDescriptor {
    /// A path, URL or base64 string.
    Text(String),
    /// An object carrying one of [`PRIORITY_FIELDS`].
    Fields(Map<String, Value>),
    /// Anything else (numbers, booleans, nested arrays, null).
    Other(Value),
}

impl From<Value> for ImageDescriptor {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ImageDescriptor::Text(s),
            Value::Object(map) => ImageDescriptor::Fields(map),
            other => ImageDescriptor::Other(other),
        }
    }
}

impl From<&str> for ImageDescriptor {
    fn from(value: &str) -> Self {
        ImageDescriptor::Text(value.to_string())
    }
}

impl ImageDescriptor {
    /// Splits a generator response into descriptors.
    ///
    /// `null` yields nothing, an array yields its items and any other value
    /// is a single descriptor.
    pub fn from_response(response: &Value) -> Vec<ImageDescriptor> {
        match response {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().cloned().map(ImageDescriptor::from).collect(),
            other => vec![ImageDescriptor::from(other.clone())],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ImageDescriptor::Text(_) => "string",
            ImageDescriptor::Fields(_) => "object",
            ImageDescriptor::Other(Value::Null) => "null",
            ImageDescriptor::Other(Value::Bool(_)) => "bool",
            ImageDescriptor::Other(Value::Number(_)) => "number",
            ImageDescriptor::Other(_) => "array",
        }
    }
}
