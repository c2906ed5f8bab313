use api_pilot::config::*;
use clap::Parser;

#[test]
fn test_default_port() {
    assert_eq!(DEFAULT_PORT, 9400);
}

#[test]
fn test_export_file_names_are_distinct() {
    assert_ne!(SCRIPT_FILE_NAME, REPORT_FILE_NAME);
    assert!(SCRIPT_FILE_NAME.ends_with(".js"));
    assert!(REPORT_FILE_NAME.ends_with(".json"));
    assert!(ARCHIVE_FILE_NAME.ends_with(".zip"));
    assert_eq!(ARCHIVE_CONTENT_TYPE, "application/zip");
}

#[test]
fn test_ai_models_defined() {
    assert!(!AI_MODELS.is_empty());
    for (key, model_id, display_name) in AI_MODELS {
        assert!(!key.is_empty());
        assert!(!model_id.is_empty());
        assert!(!display_name.is_empty());
    }
}

#[test]
fn test_resolve_model_id() {
    assert_eq!(resolve_model_id("flash"), "gemini-2.0-flash");
    assert_eq!(resolve_model_id("gemini-exp-1206"), "gemini-exp-1206");
}

#[test]
fn test_config_from_args_defaults() {
    let args = CliArgs::parse_from(["api-pilot", "--api-key", "secret"]);
    let config = PilotConfig::from_args(args);

    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.api_base, DEFAULT_API_BASE);
    assert_eq!(config.model_id, "gemini-2.0-flash");
    assert_eq!(config.api_key.as_deref(), Some("secret"));
    assert_eq!(config.request_timeout_secs, PROMPT_REQUEST_TIMEOUT_SECS);
    assert!(config.seed.is_none());
}

#[test]
fn test_config_from_args_overrides() {
    let args = CliArgs::parse_from([
        "api-pilot",
        "--port",
        "8088",
        "--api-base",
        "http://localhost:9999/v1/",
        "-m",
        "pro",
        "--api-key",
        "  ",
        "--seed",
        "42",
    ]);
    let config = PilotConfig::from_args(args);

    assert_eq!(config.port, 8088);
    assert_eq!(config.api_base, "http://localhost:9999/v1");
    assert_eq!(config.model_id, "gemini-1.5-pro");
    assert!(config.api_key.is_none());
    assert_eq!(config.seed, Some(42));
}
