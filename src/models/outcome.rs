use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{EmitMethod, UserValves, Valves};

pub const RAW_HIDDEN: &str = "Hidden - enable VERBOSE_LOGGING to view";
pub const TRACE_HIDDEN: &str = "Enable DEBUG_ENABLED in valves for details";
pub const ERROR_PREFIX: &str = "Error interno: ";

/// Effective configuration echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValvesEcho {
    pub debug: bool,
    pub verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub emit_method: Option<EmitMethod>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_show_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_auto_alt: Option<bool>,
}

impl ValvesEcho {
    pub fn full(valves: &Valves, user: &UserValves) -> Self {
        Self {
            debug: valves.debug_enabled,
            verbose: valves.verbose_logging,
            emit_method: Some(valves.emit_method_priority),
            user_show_status: Some(user.show_processing_status),
            user_auto_alt: Some(user.auto_alt_text),
        }
    }

    pub fn admin_only(valves: &Valves) -> Self {
        Self {
            debug: valves.debug_enabled,
            verbose: valves.verbose_logging,
            emit_method: None,
            user_show_status: None,
            user_auto_alt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSuccess {
    pub success: bool,
    pub images: Vec<String>,
    pub images_emitted: usize,
    pub total_processed: usize,
    /// Generator response, or [`RAW_HIDDEN`] unless verbose logging is on.
    pub raw: Value,
    pub method: String,
    pub valves_config: ValvesEcho,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub success: bool,
    pub error: String,
    pub internal_trace: String,
    pub valves_config: ValvesEcho,
}

/// Result of [`crate::ImageGenerationTool::generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationOutcome {
    Success(GenerationSuccess),
    Failure(GenerationFailure),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    pub fn images(&self) -> &[String] {
        match self {
            GenerationOutcome::Success(s) => &s.images,
            GenerationOutcome::Failure(_) => &[],
        }
    }

    pub fn as_success(&self) -> Option<&GenerationSuccess> {
        match self {
            GenerationOutcome::Success(s) => Some(s),
            GenerationOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&GenerationFailure> {
        match self {
            GenerationOutcome::Failure(f) => Some(f),
            GenerationOutcome::Success(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
