use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};

use toml::Value;

use sibyl_config::Error;

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(0);

const SAMPLE_CONFIG_TOML: &str = r#"
[service]
http_bind = "127.0.0.1:8080"
log_level = "info"

[storage.qdrant]
url        = "http://127.0.0.1:6334"
collection = "sections"
vector_dim = 1536

[providers.moderation]
api_base        = "https://api.openai.com"
api_key         = "key"
path            = "/v1/moderations"
timeout_ms      = 10000
default_headers = {}

[providers.embedding]
api_base        = "https://api.openai.com"
api_key         = "key"
path            = "/v1/embeddings"
model           = "text-embedding-ada-002"
dimensions      = 1536
timeout_ms      = 10000
default_headers = {}

[providers.completion]
api_base        = "https://api.openai.com/"
api_key         = "key"
path            = "/v1/completions"
timeout_ms      = 10000
default_headers = {}

[rate_limit]
max_requests = 10
window_secs  = 60
"#;

fn sample_toml<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render sample config.")
}

fn write_temp_config(contents: &str) -> PathBuf {
	let id = NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed);
	let path = env::temp_dir().join(format!("sibyl_config_{}_{id}.toml", std::process::id()));

	fs::write(&path, contents).expect("Failed to write temp config.");

	path
}

fn load(contents: &str) -> sibyl_config::Result<sibyl_config::Config> {
	let path = write_temp_config(contents);
	let result = sibyl_config::load(&path);
	let _ = fs::remove_file(&path);

	result
}

#[test]
fn loads_valid_config() {
	let cfg = load(SAMPLE_CONFIG_TOML).expect("Sample config must load.");

	assert_eq!(cfg.service.http_bind, "127.0.0.1:8080");
	assert_eq!(cfg.providers.embedding.dimensions, 1_536);
	assert_eq!(cfg.rate_limit.max_requests, 10);
}

#[test]
fn normalizes_trailing_slash_on_api_base() {
	let cfg = load(SAMPLE_CONFIG_TOML).expect("Sample config must load.");

	assert_eq!(cfg.providers.completion.api_base, "https://api.openai.com");
}

#[test]
fn rejects_zero_embedding_dimensions() {
	let toml = sample_toml(|root| {
		let providers = root["providers"].as_table_mut().unwrap();
		let embedding = providers["embedding"].as_table_mut().unwrap();

		embedding.insert("dimensions".to_string(), Value::Integer(0));
	});

	match load(&toml) {
		Err(Error::Validation { message }) => {
			assert!(message.contains("dimensions"), "unexpected message: {message}");
		},
		other => panic!("Expected a validation error, got {other:?}."),
	}
}

#[test]
fn rejects_dimension_mismatch_with_qdrant() {
	let toml = sample_toml(|root| {
		let storage = root["storage"].as_table_mut().unwrap();
		let qdrant = storage["qdrant"].as_table_mut().unwrap();

		qdrant.insert("vector_dim".to_string(), Value::Integer(768));
	});

	match load(&toml) {
		Err(Error::Validation { message }) => {
			assert!(message.contains("vector_dim"), "unexpected message: {message}");
		},
		other => panic!("Expected a validation error, got {other:?}."),
	}
}

#[test]
fn rejects_blank_provider_api_key() {
	let toml = sample_toml(|root| {
		let providers = root["providers"].as_table_mut().unwrap();
		let moderation = providers["moderation"].as_table_mut().unwrap();

		moderation.insert("api_key".to_string(), Value::String("  ".to_string()));
	});

	match load(&toml) {
		Err(Error::Validation { message }) => {
			assert!(message.contains("moderation"), "unexpected message: {message}");
		},
		other => panic!("Expected a validation error, got {other:?}."),
	}
}

#[test]
fn rejects_zero_rate_limit_window() {
	let toml = sample_toml(|root| {
		let rate_limit = root["rate_limit"].as_table_mut().unwrap();

		rate_limit.insert("window_secs".to_string(), Value::Integer(0));
	});

	assert!(matches!(load(&toml), Err(Error::Validation { .. })));
}
