use std::{pin::Pin, time::Duration};

use color_eyre::{Result, eyre};
use futures_core::Stream;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};

use crate::sse::SseParser;

/// Raw upstream data events, one JSON payload (or the `[DONE]` sentinel) per
/// item. Interpretation of the payloads belongs to the caller.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Issues the streaming generation request and hands back the event stream
/// without buffering the response.
///
/// The response body is decoded on a background task feeding a capacity-one
/// channel, so at most one upstream chunk is in flight; dropping the stream
/// closes the channel, which aborts the decode task and the upstream fetch.
pub async fn stream_completion(
	cfg: &sibyl_config::CompletionProviderConfig,
	payload: Value,
) -> Result<EventStream> {
	let client =
		Client::builder().connect_timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&payload)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		let text = res.text().await.unwrap_or_default();

		return Err(eyre::eyre!("Completion request failed with HTTP {status}: {text}"));
	}

	let (tx, rx) = mpsc::channel::<Result<String>>(1);

	tokio::spawn(async move {
		let mut bytes = res.bytes_stream();
		let mut parser = SseParser::new();

		while let Some(item) = bytes.next().await {
			let chunk = match item {
				Ok(chunk) => chunk,
				Err(err) => {
					let _ = tx.send(Err(eyre::eyre!("Upstream body error: {err}."))).await;

					return;
				},
			};
			let events = match parser.push(&chunk) {
				Ok(events) => events,
				Err(err) => {
					let _ = tx.send(Err(err)).await;

					return;
				},
			};

			for event in events {
				if tx.send(Ok(event)).await.is_err() {
					// Receiver dropped; stop decoding and let the fetch drop.
					return;
				}
			}
		}
	});

	Ok(Box::pin(ReceiverStream::new(rx)))
}
