use super::*;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[openai\n").expect("should write");

    let config = load_existing_config(temp_dir.path());
    assert_eq!(config.openai, OpenAiConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn unreachable_api_is_reported() {
    let openai = OpenAiConfig {
        base_url: "http://127.0.0.1:1/v1/".to_string(),
        ..OpenAiConfig::default()
    };
    assert!(!test_api_connection(&openai, None));
}
