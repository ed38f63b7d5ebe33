use crate::{MAX_PROMPT_LENGTH, model::ModelSpec, prompt::DEFAULT_I_DONT_KNOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeReject {
	EmptyPrompt,
}

/// An accepted question, immutable once constructed.
#[derive(Debug, Clone)]
pub struct Query {
	raw_prompt: String,
	sanitized: String,
	project_id: String,
	model: ModelSpec,
	i_dont_know_text: String,
}

impl Query {
	pub fn new(
		raw_prompt: &str,
		project_id: &str,
		model: ModelSpec,
		i_dont_know_text: Option<String>,
	) -> Result<Self, IntakeReject> {
		let raw_prompt: String = raw_prompt.chars().take(MAX_PROMPT_LENGTH).collect();
		let sanitized = sanitize(&raw_prompt);

		if sanitized.is_empty() {
			return Err(IntakeReject::EmptyPrompt);
		}

		let i_dont_know_text = i_dont_know_text
			.filter(|text| !text.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_I_DONT_KNOW.to_string());

		Ok(Self {
			raw_prompt,
			sanitized,
			project_id: project_id.to_string(),
			model,
			i_dont_know_text,
		})
	}

	pub fn raw_prompt(&self) -> &str {
		&self.raw_prompt
	}

	pub fn sanitized(&self) -> &str {
		&self.sanitized
	}

	pub fn project_id(&self) -> &str {
		&self.project_id
	}

	pub fn model(&self) -> &ModelSpec {
		&self.model
	}

	pub fn i_dont_know_text(&self) -> &str {
		&self.i_dont_know_text
	}
}

fn sanitize(raw: &str) -> String {
	raw.replace("\r\n", " ").replace(['\r', '\n'], " ").trim().to_string()
}
