//! Image generation tool for chat hosts.
//!
//! Asks the host's image backend for images, normalizes whatever comes back
//! (remote URLs, local file paths, inline base64, loosely shaped objects) into
//! URLs or `data:` URIs, and delivers each one to the chat UI as a direct
//! image event, Markdown, or HTML, falling back through the three in a
//! configured order.

pub mod config;
pub mod error;
pub mod host;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod tool;

pub use config::{EmitMethod, UserContext, UserValves, Valves};
pub use error::{Result, ToolError};
pub use host::{EventEmitter, ImageGenerator, StepsOverride, StepsSetting, UserDirectory, UserRecord};
pub use models::{
    Event, GenerateParams, GenerationFailure, GenerationOutcome, GenerationRequest,
    GenerationSuccess, ImageDescriptor, ResolvedImage, ValvesEcho,
};
pub use pipeline::{DeliveryMethod, Dispatcher, Materializer, Resolution};
pub use tool::{ImageGenerationTool, Invocation};
