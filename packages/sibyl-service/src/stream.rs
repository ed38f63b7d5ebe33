use std::{
	pin::Pin,
	task::{Context, Poll},
};

use futures_core::Stream;
use tracing::info;

use sibyl_domain::{ModelKind, approx_token_count};

use crate::{Error, Result};

/// Fixed separator between the references payload and the first content
/// bytes; clients split on it to recover both frames.
pub const STREAM_SEPARATOR: &str = "___START_RESPONSE_STREAM___";

/// Upstream marker ending the generation stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Leading chunks consisting solely of newlines are suppressed until this
/// many content chunks have been forwarded.
const ARTIFACT_WINDOW: u32 = 2;

/// One client-facing frame. The references frame goes out exactly once,
/// before any content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
	References(Vec<String>),
	Content(String),
}

impl StreamFrame {
	/// Wire encoding: references are JSON followed by the separator token,
	/// content is raw text.
	pub fn encode(&self) -> String {
		match self {
			Self::References(references) => {
				let json =
					serde_json::to_string(references).unwrap_or_else(|_| "[]".to_string());

				format!("{json}{STREAM_SEPARATOR}")
			},
			Self::Content(text) => text.clone(),
		}
	}
}

enum State {
	AwaitingFirstEvent,
	Streaming,
	Done,
	Errored,
}

/// Pull-based transform of upstream data events into client frames.
///
/// Advances one upstream event per poll, holds at most one decoded chunk
/// (stashed only while the references frame goes out first), and keeps a
/// running transcript for post-hoc token accounting. Dropping the stream
/// drops the upstream event source, cancelling the fetch behind it.
pub struct AnswerStream<S> {
	inner: S,
	kind: ModelKind,
	state: State,
	references: Option<Vec<String>>,
	pending: Option<String>,
	forwarded: u32,
	prompt_tokens: u32,
	transcript: String,
}

impl<S> AnswerStream<S>
where
	S: Stream<Item = color_eyre::Result<String>> + Unpin,
{
	pub fn new(inner: S, kind: ModelKind, references: Vec<String>, prompt: &str) -> Self {
		Self {
			inner,
			kind,
			state: State::AwaitingFirstEvent,
			references: Some(references),
			pending: None,
			forwarded: 0,
			prompt_tokens: approx_token_count(prompt),
			transcript: String::new(),
		}
	}

	/// Pulls the next frame; `None` once the stream has terminated.
	pub async fn next_frame(&mut self) -> Option<Result<StreamFrame>> {
		std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
	}

	fn forward(&mut self, text: String) -> StreamFrame {
		self.forwarded += 1;
		self.transcript.push_str(&text);

		StreamFrame::Content(text)
	}

	fn references_frame(&mut self) -> StreamFrame {
		StreamFrame::References(self.references.take().unwrap_or_default())
	}

	/// Terminates the stream, flushing the references frame if no content
	/// ever arrived. Accounting is logged here; it is best-effort only.
	fn finish(&mut self) -> Option<StreamFrame> {
		let frame = matches!(self.state, State::AwaitingFirstEvent)
			.then(|| self.references_frame());

		self.state = State::Done;

		let completion_tokens = approx_token_count(&self.transcript);

		info!(
			prompt_tokens = self.prompt_tokens,
			completion_tokens,
			total_tokens = self.prompt_tokens + completion_tokens,
			"Completion stream finished."
		);

		frame
	}
}

fn is_newline_artifact(text: &str) -> bool {
	!text.is_empty() && text.chars().all(|c| c == '\n')
}

impl<S> Stream for AnswerStream<S>
where
	S: Stream<Item = color_eyre::Result<String>> + Unpin,
{
	type Item = Result<StreamFrame>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();

		loop {
			if matches!(this.state, State::Done | State::Errored) {
				return Poll::Ready(None);
			}

			// Content stashed while the references frame went out first.
			if let Some(text) = this.pending.take() {
				return Poll::Ready(Some(Ok(this.forward(text))));
			}

			match Pin::new(&mut this.inner).poll_next(cx) {
				Poll::Pending => return Poll::Pending,
				Poll::Ready(None) => {
					// Upstream closed without the sentinel; treat it the same.
					return Poll::Ready(this.finish().map(Ok));
				},
				Poll::Ready(Some(Err(err))) => {
					this.state = State::Errored;

					return Poll::Ready(Some(Err(Error::UpstreamStream {
						message: err.to_string(),
					})));
				},
				Poll::Ready(Some(Ok(data))) => {
					if data == DONE_SENTINEL {
						return Poll::Ready(this.finish().map(Ok));
					}

					let event: serde_json::Value = match serde_json::from_str(&data) {
						Ok(event) => event,
						Err(err) => {
							this.state = State::Errored;

							return Poll::Ready(Some(Err(Error::UpstreamStream {
								message: format!("Failed to parse upstream event: {err}."),
							})));
						},
					};
					let Some(text) = this.kind.extract_content(&event) else {
						continue;
					};

					if this.forwarded < ARTIFACT_WINDOW && is_newline_artifact(&text) {
						continue;
					}
					if matches!(this.state, State::AwaitingFirstEvent) {
						this.state = State::Streaming;
						this.pending = Some(text);

						return Poll::Ready(Some(Ok(this.references_frame())));
					}

					return Poll::Ready(Some(Ok(this.forward(text))));
				},
			}
		}
	}
}
