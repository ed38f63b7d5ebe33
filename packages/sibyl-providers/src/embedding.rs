use std::{future::Future, time::Duration};

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Bounded exponential backoff for the embedding call. Upstream throttling is
/// the dominant failure mode and resolves with patience, so every failure is
/// retried uniformly until the attempt cap is hit.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
	pub max_attempts: u32,
	pub initial_delay: Duration,
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self { max_attempts: 10, initial_delay: Duration::from_secs(10) }
	}
}

/// Embeds a single sanitized query, retrying per `policy`.
pub async fn embed_with_backoff(
	cfg: &sibyl_config::EmbeddingProviderConfig,
	input: &str,
	policy: BackoffPolicy,
) -> Result<Vec<f32>> {
	retry_with_backoff(policy, || embed(cfg, input)).await
}

/// One embedding attempt, no retry.
pub async fn embed(cfg: &sibyl_config::EmbeddingProviderConfig, input: &str) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": input,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json)
}

pub async fn retry_with_backoff<T, F, Fut>(policy: BackoffPolicy, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut delay = policy.initial_delay;
	let mut last_error = None;

	for attempt in 1..=policy.max_attempts.max(1) {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				tracing::warn!(
					attempt,
					max_attempts = policy.max_attempts,
					error = %err,
					"Embedding attempt failed."
				);
				last_error = Some(err);
			},
		}

		if attempt < policy.max_attempts {
			tokio::time::sleep(delay).await;
			delay *= 2;
		}
	}

	Err(last_error.unwrap_or_else(|| eyre::eyre!("Embedding failed with no recorded error.")))
}

fn parse_embedding_response(json: Value) -> Result<Vec<f32>> {
	let embedding = json
		.get("data")
		.and_then(|v| v.as_array())
		.and_then(|data| data.first())
		.and_then(|item| item.get("embedding"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing an embedding array."))?;
	let mut vec = Vec::with_capacity(embedding.len());

	for value in embedding {
		let number =
			value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;

		vec.push(number as f32);
	}

	Ok(vec)
}
