use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::{UserContext, UserValves, Valves},
    error::{Result, ToolError},
    host::{EventEmitter, ImageGenerator, StepsOverride, StepsSetting, UserDirectory, UserRecord},
    logger,
    models::{
        Event, GenerateParams, GenerationFailure, GenerationOutcome, GenerationRequest,
        GenerationSuccess, ImageDescriptor, ValvesEcho, ERROR_PREFIX, RAW_HIDDEN, TRACE_HIDDEN,
    },
    pipeline::{self, alt_text, resolver::preview, Dispatcher, Materializer},
};

/// Per-call collaborators handed over by the host.
#[derive(Clone, Default)]
pub struct Invocation {
    pub user: Option<UserContext>,
    pub emitter: Option<Arc<dyn EventEmitter>>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserContext) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }
}

struct StatusReporter<'a> {
    emitter: Option<&'a dyn EventEmitter>,
    enabled: bool,
}

impl StatusReporter<'_> {
    async fn report(&self, description: &str, done: bool) {
        if !self.enabled {
            return;
        }
        let Some(emitter) = self.emitter else {
            return;
        };
        match emitter.emit(Event::status(description, done)).await {
            Ok(()) => log::debug!("Status emitted: {} (done: {})", description, done),
            Err(e) => log::error!("Error emitting status '{}': {}", description, e),
        }
    }
}

struct Delivered {
    raw: Value,
    images: Vec<String>,
    emitted: usize,
}

/// Generates images through the host and delivers them to the chat UI.
#[derive(Clone)]
pub struct ImageGenerationTool {
    valves: Valves,
    generator: Arc<dyn ImageGenerator>,
    users: Option<Arc<dyn UserDirectory>>,
    steps_setting: Option<Arc<dyn StepsSetting>>,
}

impl ImageGenerationTool {
    pub fn new(valves: Valves, generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            valves,
            generator,
            users: None,
            steps_setting: None,
        }
    }

    pub fn with_user_directory(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    /// Enables the temporary override of the host's default step count.
    pub fn with_steps_setting(mut self, setting: Arc<dyn StepsSetting>) -> Self {
        self.steps_setting = Some(setting);
        self
    }

    /// Runs one generation. Never fails: errors become [`GenerationOutcome::Failure`].
    pub async fn generate(&self, params: GenerateParams, invocation: Invocation) -> GenerationOutcome {
        logger::apply_valves(&self.valves);

        let user = invocation.user.unwrap_or_default();
        let user_valves = user.valves;
        let status = StatusReporter {
            emitter: invocation.emitter.as_deref(),
            enabled: user_valves.show_processing_status,
        };
        let request_id = Uuid::new_v4();

        log::info!("=== Starting image generation [{}] ===", request_id);
        log::info!(
            "Valves - debug: {}, verbose: {}; user - status: {}, alt text: {}",
            self.valves.debug_enabled,
            self.valves.verbose_logging,
            user_valves.show_processing_status,
            user_valves.auto_alt_text
        );
        log::info!("Prompt: {}", preview(&params.prompt, 100));
        log::info!("Dimensions: {}x{}, steps: {}", params.width, params.height, params.steps);
        log::debug!("Emit method: {}", self.valves.emit_method_priority);
        log::debug!("Supported formats: {}", self.valves.supported_formats);
        log::debug!("Max file size: {}MB", self.valves.max_file_size_mb);

        status.report("Initializing image generation...", false).await;

        // Held until this function returns; dropping it restores the host value.
        let _steps_override = match &self.steps_setting {
            Some(setting) => StepsOverride::acquire(setting.clone(), params.steps).await,
            None => None,
        };

        match self.run(&params, user.id.as_deref(), &user_valves, &status, invocation.emitter.as_deref()).await {
            Ok(delivered) => {
                let message = format!(
                    "Generation complete: {}/{} images shown",
                    delivered.emitted,
                    delivered.images.len()
                );
                status.report(&message, true).await;
                log::info!("{} [{}]", message, request_id);

                GenerationOutcome::Success(GenerationSuccess {
                    success: true,
                    total_processed: delivered.images.len(),
                    images_emitted: delivered.emitted,
                    images: delivered.images,
                    raw: if self.valves.verbose_logging {
                        delivered.raw
                    } else {
                        Value::String(RAW_HIDDEN.to_string())
                    },
                    method: "internal".to_string(),
                    valves_config: ValvesEcho::full(&self.valves, &user_valves),
                })
            }
            Err(e) => {
                let trace = error_trace(&e);
                log::error!("Critical error [{}]: {}", request_id, e);
                if self.valves.debug_enabled {
                    log::error!("Trace:\n{}", trace);
                }
                status.report(&format!("Error: {}", e), true).await;

                GenerationOutcome::Failure(GenerationFailure {
                    success: false,
                    error: format!("{}{}", ERROR_PREFIX, e),
                    internal_trace: if self.valves.exposes_internals() {
                        trace
                    } else {
                        TRACE_HIDDEN.to_string()
                    },
                    valves_config: ValvesEcho::admin_only(&self.valves),
                })
            }
        }
    }

    async fn run(
        &self,
        params: &GenerateParams,
        user_id: Option<&str>,
        user_valves: &UserValves,
        status: &StatusReporter<'_>,
        emitter: Option<&dyn EventEmitter>,
    ) -> Result<Delivered> {
        let request = GenerationRequest::from(params);
        log::info!(
            "Payload built: size={}, width={}, height={}, steps={}",
            request.size,
            request.width,
            request.height,
            request.steps
        );
        log::debug!("Full payload: {:?}", request);

        let user = self.lookup_user(user_id).await;

        status.report("Generating image...", false).await;
        log::info!("Calling image generator...");
        let response = self.generator.generate(&request, user.as_ref()).await?;
        log_response(&response, self.valves.verbose_logging);

        let descriptors = ImageDescriptor::from_response(&response);
        if response.is_null() {
            log::warn!("Generator returned nothing - no images to process");
        }
        let images = pipeline::normalize(&descriptors, &Materializer::from_valves(&self.valves));

        log::info!("Delivering {} image(s)", images.len());
        let dispatcher = Dispatcher::new(emitter);
        let mut emitted = 0;
        for (idx, image) in images.iter().enumerate() {
            log::info!("--- Delivering image {}/{} ---", idx + 1, images.len());
            let alt = alt_text(&params.prompt, idx + 1, user_valves.auto_alt_text);
            let delivered = dispatcher
                .deliver(
                    image.as_str(),
                    Some(request.width),
                    Some(request.height),
                    &alt,
                    self.valves.emit_method_priority,
                )
                .await;
            if delivered {
                emitted += 1;
            }
        }

        Ok(Delivered {
            raw: response,
            images: images.into_iter().map(|image| image.into_inner()).collect(),
            emitted,
        })
    }

    async fn lookup_user(&self, user_id: Option<&str>) -> Option<UserRecord> {
        let (users, id) = match (&self.users, user_id) {
            (Some(users), Some(id)) => (users, id),
            _ => return None,
        };
        match users.get_user_by_id(id).await {
            Ok(Some(user)) => {
                log::debug!("User resolved: {}", user.id);
                Some(user)
            }
            Ok(None) => {
                log::warn!("User {} not found", id);
                None
            }
            Err(e) => {
                log::warn!("Could not look up user {}: {}", id, e);
                None
            }
        }
    }
}

fn log_response(response: &Value, verbose: bool) {
    if verbose {
        log::debug!("Full response: {}", response);
        return;
    }
    match response {
        Value::Array(items) => log::info!("Response is a list of {} item(s)", items.len()),
        Value::Object(map) => log::info!(
            "Response is an object with keys: {:?}",
            map.keys().collect::<Vec<_>>()
        ),
        other => log::info!("Response value: {}", preview(&other.to_string(), 200)),
    }
}

fn error_trace(error: &ToolError) -> String {
    let mut trace = format!("{:?}", error);
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        trace.push_str(&format!("\nCaused by: {}", cause));
        source = cause.source();
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(Value);

    #[async_trait]
    impl ImageGenerator for Fixed {
        async fn generate(&self, _request: &GenerationRequest, _user: Option<&UserRecord>) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_no_emitter_still_succeeds() {
        let tool = ImageGenerationTool::new(
            Valves::new(),
            Arc::new(Fixed(json!("https://example.com/x.png"))),
        );
        let outcome = tool.generate(GenerateParams::new("sky"), Invocation::new()).await;
        let success = outcome.as_success().unwrap();
        assert_eq!(success.images, vec!["https://example.com/x.png"]);
        assert_eq!(success.images_emitted, 0);
        assert_eq!(success.total_processed, 1);
        assert_eq!(success.raw, json!(RAW_HIDDEN));
    }

    #[tokio::test]
    async fn test_verbose_exposes_raw_response() {
        let tool = ImageGenerationTool::new(
            Valves::new().with_verbose(true),
            Arc::new(Fixed(json!([{"b64": "QUJD"}]))),
        );
        let outcome = tool.generate(GenerateParams::new("sky"), Invocation::new()).await;
        assert_eq!(outcome.as_success().unwrap().raw, json!([{"b64": "QUJD"}]));
    }

    #[test]
    fn test_error_trace_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let trace = error_trace(&ToolError::Io(io));
        assert!(trace.starts_with("Io("));
        assert!(trace.contains("Caused by: disk gone"));
    }
}
