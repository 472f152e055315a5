use crate::{
    error::{Result, ToolError},
    logger::LogLevel,
    pipeline::DeliveryMethod,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{env, fmt, str::FromStr};

pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;
pub const DEFAULT_SUPPORTED_FORMATS: &str = "png,jpg,jpeg,webp,gif,bmp,tiff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMethod {
    #[default]
    Auto,
    Direct,
    Markdown,
    Html,
}

impl EmitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitMethod::Auto => "auto",
            EmitMethod::Direct => "direct",
            EmitMethod::Markdown => "markdown",
            EmitMethod::Html => "html",
        }
    }

    /// Delivery methods in the order they are attempted.
    pub fn order(&self) -> [DeliveryMethod; 3] {
        use DeliveryMethod::*;
        match self {
            EmitMethod::Auto | EmitMethod::Direct => [Direct, Markdown, Html],
            EmitMethod::Markdown => [Markdown, Direct, Html],
            EmitMethod::Html => [Html, Direct, Markdown],
        }
    }
}

impl fmt::Display for EmitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmitMethod {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(EmitMethod::Auto),
            "direct" => Ok(EmitMethod::Direct),
            "markdown" => Ok(EmitMethod::Markdown),
            "html" => Ok(EmitMethod::Html),
            other => Err(ToolError::ConfigError(format!(
                "Unknown emit method '{}' (expected auto, direct, markdown or html)",
                other
            ))),
        }
    }
}

/// Admin-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Valves {
    #[serde(rename = "DEBUG_ENABLED")]
    pub debug_enabled: bool,
    #[serde(rename = "VERBOSE_LOGGING")]
    pub verbose_logging: bool,
    #[serde(rename = "EMIT_METHOD_PRIORITY")]
    pub emit_method_priority: EmitMethod,
    #[serde(rename = "MAX_FILE_SIZE_MB")]
    pub max_file_size_mb: u64,
    #[serde(rename = "SUPPORTED_FORMATS")]
    pub supported_formats: String,
}

impl Default for Valves {
    fn default() -> Self {
        Valves {
            debug_enabled: false,
            verbose_logging: false,
            emit_method_priority: EmitMethod::Auto,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            supported_formats: DEFAULT_SUPPORTED_FORMATS.to_string(),
        }
    }
}

impl Valves {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Valves::default();
        let flag = |name: &str| {
            env::var(name)
                .ok()
                .map_or(false, |val| matches!(val.trim(), "true" | "1" | "TRUE" | "True"))
        };

        let emit_method_priority = match env::var("EMIT_METHOD_PRIORITY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("{}; falling back to auto", e);
                EmitMethod::Auto
            }),
            Err(_) => defaults.emit_method_priority,
        };

        Valves {
            debug_enabled: flag("DEBUG_ENABLED"),
            verbose_logging: flag("VERBOSE_LOGGING"),
            emit_method_priority,
            max_file_size_mb: env::var("MAX_FILE_SIZE_MB")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.max_file_size_mb),
            supported_formats: env::var("SUPPORTED_FORMATS")
                .unwrap_or(defaults.supported_formats),
        }
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose_logging = enabled;
        self
    }

    pub fn with_emit_method(mut self, method: EmitMethod) -> Self {
        self.emit_method_priority = method;
        self
    }

    pub fn with_max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_mb = mb;
        self
    }

    pub fn with_supported_formats(mut self, formats: impl Into<String>) -> Self {
        self.supported_formats = formats.into();
        self
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Lower-cased extensions without the leading dot.
    pub fn supported_extensions(&self) -> Vec<String> {
        self.supported_formats
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    pub fn log_level(&self) -> LogLevel {
        if self.verbose_logging {
            LogLevel::Debug
        } else if self.debug_enabled {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }

    /// Whether failure traces and raw responses may be shown to the caller.
    pub fn exposes_internals(&self) -> bool {
        self.debug_enabled || self.verbose_logging
    }
}

/// Per-user configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserValves {
    #[serde(
        rename = "SHOW_PROCESSING_STATUS",
        alias = "show_processing_status",
        alias = "showProcessingStatus"
    )]
    pub show_processing_status: bool,
    #[serde(rename = "AUTO_ALT_TEXT", alias = "auto_alt_text", alias = "autoAltText")]
    pub auto_alt_text: bool,
}

impl Default for UserValves {
    fn default() -> Self {
        UserValves {
            show_processing_status: true,
            auto_alt_text: true,
        }
    }
}

impl UserValves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_show_status(mut self, enabled: bool) -> Self {
        self.show_processing_status = enabled;
        self
    }

    pub fn with_auto_alt_text(mut self, enabled: bool) -> Self {
        self.auto_alt_text = enabled;
        self
    }

    /// Reads host-supplied valves, falling back to defaults on anything malformed.
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        match serde_json::from_value(value.clone()) {
            Ok(valves) => valves,
            Err(e) => {
                log::warn!("Could not read user valves ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

/// The invoking user as handed over by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    pub id: Option<String>,
    pub valves: UserValves,
}

impl UserContext {
    pub fn new(id: impl Into<String>) -> Self {
        UserContext {
            id: Some(id.into()),
            valves: UserValves::default(),
        }
    }

    pub fn with_valves(mut self, valves: UserValves) -> Self {
        self.valves = valves;
        self
    }

    pub fn from_value(value: &Value) -> Self {
        let id = match value.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let valves = value
            .get("valves")
            .map(UserValves::from_value)
            .unwrap_or_default();
        UserContext { id, valves }
    }
}
