use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::models::{ImageDescriptor, PRIORITY_FIELDS};

/// Classification of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An existing regular file on this machine.
    LocalPath(PathBuf),
    /// Opaque remote reference; not validated.
    Url(String),
    /// Raw base64 payload, possibly already a `data:` URI.
    InlineBase64(String),
    /// A `data:` URI or `http...` value found under a generic field.
    AlreadyResolved(String),
    /// Nothing usable; carries a displayable rendering of the input.
    Unrecognized(String),
}

impl Resolution {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolution::LocalPath(_) => "local-path",
            Resolution::Url(_) => "url",
            Resolution::InlineBase64(_) => "inline-base64",
            Resolution::AlreadyResolved(_) => "already-resolved",
            Resolution::Unrecognized(_) => "unrecognized",
        }
    }
}

pub fn resolve(descriptor: &ImageDescriptor) -> Resolution {
    match descriptor {
        ImageDescriptor::Text(text) => classify_location(text),
        ImageDescriptor::Fields(fields) => resolve_fields(fields),
        ImageDescriptor::Other(value) => Resolution::Unrecognized(display_value(value)),
    }
}

fn resolve_fields(fields: &Map<String, Value>) -> Resolution {
    log::debug!("Object with keys: {:?}", fields.keys().collect::<Vec<_>>());

    for field in PRIORITY_FIELDS {
        let value = match fields.get(field) {
            Some(value) if is_present(value) => value,
            _ => continue,
        };
        log::debug!("Inspecting field '{}': {}", field, preview(&display_value(value), 100));

        match (field, value) {
            ("url" | "file_path" | "path", Value::String(s)) => {
                let resolution = classify_location(s);
                log::info!("Field '{}' is {}", field, resolution.kind());
                return resolution;
            }
            ("url" | "file_path" | "path", other) => return Resolution::Url(other.to_string()),
            ("b64" | "base64", Value::String(s)) => {
                log::info!("Field '{}' is base64", field);
                return Resolution::InlineBase64(s.clone());
            }
            (_, Value::String(s)) if s.starts_with("data:") || s.starts_with("http") => {
                log::info!("Field '{}' is a URL or data URI", field);
                return Resolution::AlreadyResolved(s.clone());
            }
            _ => {}
        }
    }

    log::warn!("No usable image found in object");
    Resolution::Unrecognized(Value::Object(fields.clone()).to_string())
}

/// Tells a local file path from a URL-like string.
fn classify_location(value: &str) -> Resolution {
    if is_local_file(value) {
        Resolution::LocalPath(PathBuf::from(value))
    } else {
        Resolution::Url(value.to_string())
    }
}

fn is_local_file(value: &str) -> bool {
    !value.is_empty() && Path::new(value).is_file()
}

/// Empty strings, `null`, `false`, zero and empty containers do not count.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
