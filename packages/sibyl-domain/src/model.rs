use serde_json::{Value, json};

use crate::MAX_OUTPUT_TOKENS;

const COMPLETION_MODELS: [&str; 9] = [
	"text-davinci-003",
	"text-davinci-002",
	"text-curie-001",
	"text-babbage-001",
	"text-ada-001",
	"davinci",
	"curie",
	"babbage",
	"ada",
];

/// Which request payload shape and response chunk shape a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
	Chat,
	Completion,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
	pub id: String,
	pub kind: ModelKind,
}

impl ModelSpec {
	/// Resolves a client-supplied model string. Unknown ids fall back to the
	/// chat shape, which every current upstream model supports.
	pub fn resolve(id: &str) -> Self {
		let kind = if COMPLETION_MODELS.contains(&id) {
			ModelKind::Completion
		} else {
			ModelKind::Chat
		};

		Self { id: id.to_string(), kind }
	}
}

impl ModelKind {
	/// Builds the upstream generation request body for this shape.
	pub fn request_payload(&self, model_id: &str, prompt: &str) -> Value {
		let mut payload = json!({
			"model": model_id,
			"temperature": 0.1,
			"top_p": 1,
			"frequency_penalty": 0,
			"presence_penalty": 0,
			"max_tokens": MAX_OUTPUT_TOKENS,
			"n": 1,
			"stream": true,
		});

		if let Some(body) = payload.as_object_mut() {
			match self {
				Self::Chat => {
					body.insert(
						"messages".to_string(),
						json!([{ "role": "user", "content": prompt }]),
					);
				},
				Self::Completion => {
					body.insert("prompt".to_string(), Value::String(prompt.to_string()));
				},
			}
		}

		payload
	}

	/// Pulls the generated text out of one parsed upstream event, if any.
	pub fn extract_content(&self, event: &Value) -> Option<String> {
		let choice = event.get("choices")?.as_array()?.first()?;
		let text = match self {
			Self::Chat => choice.get("delta")?.get("content")?.as_str()?,
			Self::Completion => choice.get("text")?.as_str()?,
		};

		Some(text.to_string())
	}
}
