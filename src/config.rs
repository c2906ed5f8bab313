use clap::Parser;

/// API Pilot: AI-assisted k6 test planning with a simulated run.
#[derive(Parser, Debug, Clone)]
#[command(name = "api-pilot")]
pub struct CliArgs {
    /// HTTP port for the wizard API
    #[arg(long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the generative language API
    #[arg(long = "api-base", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Model key (see AI_MODELS) or a raw model id
    #[arg(short = 'm', long = "model", default_value = DEFAULT_MODEL_KEY)]
    pub model: String,

    /// API key for the prompt service
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Timeout for a single prompt call, in seconds
    #[arg(long = "request-timeout-secs", default_value_t = PROMPT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Seed the run simulation for reproducible samples
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PilotConfig {
    pub port: u16,
    pub api_base: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub seed: Option<u64>,
}

pub const DEFAULT_PORT: u16 = 9400;

// Prompt service
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL_KEY: &str = "flash";
pub const PROMPT_REQUEST_TIMEOUT_SECS: u64 = 120;

// AI model definitions: (key, model_id, display_name)
pub const AI_MODELS: &[(&str, &str, &str)] = &[
    ("flash", "gemini-2.0-flash", "Gemini 2.0 Flash"),
    ("pro", "gemini-1.5-pro", "Gemini 1.5 Pro"),
];

// Simulated run
pub const SAMPLE_PERIOD_SECS: u64 = 1;
pub const MAX_RUN_DURATION_SECS: u64 = 86_400;
pub const RAMP_UP_FRACTION: f64 = 0.25;

// Run configuration defaults
pub const DEFAULT_CONCURRENCY: u32 = 10;
pub const DEFAULT_DURATION: &str = "30s";

// Export artifacts
pub const SCRIPT_FILE_NAME: &str = "k6-script.js";
pub const SCRIPT_CONTENT_TYPE: &str = "text/javascript";
pub const REPORT_FILE_NAME: &str = "test-report.json";
pub const ARCHIVE_FILE_NAME: &str = "api-pilot-artifacts.zip";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

// Event log
pub const LOG_BUFFER_SIZE: usize = 500;

// SSE progress feed
pub const PROGRESS_STREAM_INTERVAL_MS: u64 = 1000;

/// Resolve a model key from `AI_MODELS`; unknown keys are treated as raw ids.
pub fn resolve_model_id(model: &str) -> String {
    AI_MODELS
        .iter()
        .find(|(key, _, _)| *key == model)
        .map(|(_, id, _)| id.to_string())
        .unwrap_or_else(|| model.to_string())
}

impl PilotConfig {
    pub fn from_args(args: CliArgs) -> Self {
        PilotConfig {
            port: args.port,
            api_base: args.api_base.trim_end_matches('/').to_string(),
            model_id: resolve_model_id(&args.model),
            api_key: args.api_key.filter(|k| !k.trim().is_empty()),
            request_timeout_secs: args.request_timeout_secs,
            seed: args.seed,
        }
    }
}

impl Default for PilotConfig {
    fn default() -> Self {
        PilotConfig {
            port: DEFAULT_PORT,
            api_base: DEFAULT_API_BASE.to_string(),
            model_id: resolve_model_id(DEFAULT_MODEL_KEY),
            api_key: None,
            request_timeout_secs: PROMPT_REQUEST_TIMEOUT_SECS,
            seed: None,
        }
    }
}
