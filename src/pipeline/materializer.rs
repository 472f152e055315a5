use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};

use super::resolver::Resolution;
use crate::{
    config::Valves,
    error::{Result, ToolError},
    models::ResolvedImage,
};

pub const DEFAULT_MIME: &str = "image/png";

/// MIME type for a lower-cased extension; unknown extensions map to PNG.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        _ => DEFAULT_MIME,
    }
}

/// Wraps a raw base64 payload as a PNG data URI. Existing `data:` URIs pass through.
pub fn data_uri_from_base64(payload: &str) -> String {
    if payload.starts_with("data:") {
        log::debug!("Base64 value is already a data URI");
        return payload.to_string();
    }
    log::debug!("Wrapping base64 payload as data URI ({} chars)", payload.len());
    format!("data:{};base64,{}", DEFAULT_MIME, payload)
}

/// Turns local image files into data URIs within a size and format budget.
#[derive(Debug, Clone)]
pub struct Materializer {
    max_size_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl Materializer {
    pub fn new(max_size_bytes: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_size_bytes,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_valves(valves: &Valves) -> Self {
        Self::new(valves.max_file_size_bytes(), valves.supported_extensions())
    }

    /// Reads `path` and encodes it as `data:<mime>;base64,<payload>`.
    ///
    /// Size and extension are checked from metadata before any byte is read.
    /// A `data:` value is returned unchanged.
    pub fn materialize(&self, path: &str) -> Result<String> {
        if path.starts_with("data:") {
            return Ok(path.to_string());
        }
        log::debug!("Converting path to data URI: {}", path);

        let path = Path::new(path);
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(ToolError::NotAFile(path.to_path_buf()));
        }

        let size = metadata.len();
        if size > self.max_size_bytes {
            return Err(ToolError::FileTooLarge {
                size,
                limit: self.max_size_bytes,
            });
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(ToolError::UnsupportedFormat {
                extension,
                supported: self.allowed_extensions.clone(),
            });
        }

        log::debug!("Reading {} ({:.1}KB)", path.display(), size as f64 / 1024.0);
        let bytes = read_bounded(path, self.max_size_bytes)?;
        let payload = BASE64.encode(bytes);
        let mime = mime_for_extension(&extension);

        log::info!(
            "File converted: {}, {} chars, {:.1}KB",
            mime,
            payload.len(),
            size as f64 / 1024.0
        );
        Ok(format!("data:{};base64,{}", mime, payload))
    }

    /// Second pipeline stage: turns a classification into a deliverable image.
    ///
    /// Local files that cannot be materialized are logged and yield `None`.
    pub fn finish(&self, resolution: Resolution) -> Option<ResolvedImage> {
        let value = match resolution {
            Resolution::LocalPath(path) => {
                let display = path.display().to_string();
                match self.materialize(&display) {
                    Ok(uri) => uri,
                    Err(e @ (ToolError::FileTooLarge { .. } | ToolError::Io(_))) => {
                        log::error!("Could not materialize {}: {}", display, e);
                        return None;
                    }
                    Err(e) => {
                        log::warn!("Could not materialize {}: {}", display, e);
                        return None;
                    }
                }
            }
            Resolution::InlineBase64(payload) => data_uri_from_base64(&payload),
            Resolution::Url(value)
            | Resolution::AlreadyResolved(value)
            | Resolution::Unrecognized(value) => value,
        };
        ResolvedImage::new(value)
    }
}

/// Reads at most `limit` bytes; a file that grew past the limit after its
/// metadata was checked is rejected without buffering the rest.
fn read_bounded(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(ToolError::FileTooLarge {
            size: bytes.len() as u64,
            limit,
        });
    }
    Ok(bytes)
}
