use async_trait::async_trait;
use clap::Parser;
use imagegen_tool::{
    logger::{self, LoggerConfig},
    Event, EventEmitter, GenerateParams, GenerationRequest, ImageGenerationTool, ImageGenerator,
    Invocation, UserRecord, Valves,
};
use serde_json::Value;
use std::sync::Arc;

/// Runs one image generation against descriptors given on the command line
#[derive(Parser, Debug)]
#[command(
    name = "imagegen-tool",
    version,
    about = "Normalize and deliver image descriptors as chat events"
)]
struct Cli {
    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 1024)]
    height: u32,

    #[arg(long, default_value_t = 20)]
    steps: u32,

    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i64>,

    /// Print log records as JSON lines
    #[arg(long)]
    json_logs: bool,

    prompt: String,

    /// Paths, URLs, base64 payloads or JSON objects returned as the generator response
    descriptors: Vec<String>,
}

impl Cli {
    fn params(&self) -> GenerateParams {
        let mut params = GenerateParams::new(self.prompt.clone())
            .with_size(self.width, self.height)
            .with_steps(self.steps);
        params.seed = self.seed;
        params
    }

    /// JSON objects are passed as objects, everything else as plain strings.
    fn descriptor_values(&self) -> Vec<Value> {
        self.descriptors
            .iter()
            .map(|raw| match serde_json::from_str::<Value>(raw) {
                Ok(value @ Value::Object(_)) => value,
                _ => Value::String(raw.clone()),
            })
            .collect()
    }
}

/// Hands back the descriptors given on the command line.
struct ReplayGenerator {
    descriptors: Vec<Value>,
}

#[async_trait]
impl ImageGenerator for ReplayGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        _user: Option<&UserRecord>,
    ) -> imagegen_tool::Result<Value> {
        log::info!("Replaying {} descriptor(s) for {}", self.descriptors.len(), request.size);
        Ok(Value::Array(self.descriptors.clone()))
    }
}

struct StdoutEmitter;

#[async_trait]
impl EventEmitter for StdoutEmitter {
    async fn emit(&self, event: Event) -> imagegen_tool::Result<()> {
        println!("{}", serde_json::to_string(&event)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();

    let valves = Valves::from_env();
    logger::init_with_config(LoggerConfig::from_valves(&valves).with_json_output(cli.json_logs))?;
    if !dotenv_loaded {
        log::debug!("No .env file found, using process environment");
    }

    let generator = ReplayGenerator {
        descriptors: cli.descriptor_values(),
    };
    let tool = ImageGenerationTool::new(valves, Arc::new(generator));
    let invocation = Invocation::new().with_emitter(Arc::new(StdoutEmitter));

    let outcome = tool.generate(cli.params(), invocation).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
