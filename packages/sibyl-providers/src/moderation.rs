use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Asks the moderation endpoint whether the input is flagged as unsafe.
pub async fn moderate(cfg: &sibyl_config::ModerationProviderConfig, input: &str) -> Result<bool> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "input": input });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_moderation_response(json)
}

fn parse_moderation_response(json: Value) -> Result<bool> {
	json.get("results")
		.and_then(|v| v.as_array())
		.and_then(|results| results.first())
		.and_then(|result| result.get("flagged"))
		.and_then(|v| v.as_bool())
		.ok_or_else(|| eyre::eyre!("Moderation response is missing a flagged verdict."))
}
