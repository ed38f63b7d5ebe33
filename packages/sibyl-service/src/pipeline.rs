use tracing::{info, warn};

use sibyl_config::Config;
use sibyl_domain::{ModelSpec, Query, build_context, build_prompt};

use crate::{
	AnswerStream, Collaborators, Error, EventStream, RateLimitOutcome,
};

/// One answer request, as decoded from the inbound body plus the project id
/// resolved from the route.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
	pub project_id: String,
	pub model: String,
	pub prompt: String,
	pub i_dont_know_message: Option<String>,
}

/// A started answer: admission metadata plus the client-facing frame stream.
pub struct Answer {
	pub rate_limit: RateLimitOutcome,
	pub stream: AnswerStream<EventStream>,
}

/// A terminal pre-stream failure. Admission metadata is carried when the
/// request made it past the rate-limit check, so callers can still surface
/// the limit headers.
#[derive(Debug)]
pub struct Failure {
	pub rate_limit: Option<RateLimitOutcome>,
	pub error: Error,
}

impl From<Error> for Failure {
	fn from(error: Error) -> Self {
		Self { rate_limit: None, error }
	}
}

pub struct AnswerService {
	pub cfg: Config,
	pub collaborators: Collaborators,
}

impl AnswerService {
	pub fn new(cfg: Config, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators }
	}

	/// Runs the full pipeline up to the point where the upstream stream is
	/// open: intake, admission, moderation, embedding, retrieval, budgeting,
	/// prompt assembly, and the completion request. Each stage short-circuits
	/// with a typed error; once the returned stream is consumed, failures
	/// surface on the stream instead.
	pub async fn answer(&self, request: AnswerRequest) -> Result<Answer, Failure> {
		if request.project_id.trim().is_empty() {
			return Err(Error::MissingProject.into());
		}

		let spec = ModelSpec::resolve(&request.model);
		let query = Query::new(
			&request.prompt,
			&request.project_id,
			spec,
			request.i_dont_know_message,
		)
		.map_err(|_| Error::MissingPrompt)?;

		// Admission runs before any paid upstream call.
		let rate_limit = self.collaborators.rate_limiter.check(query.project_id()).await;

		if !rate_limit.allowed {
			return Err(Failure {
				rate_limit: Some(rate_limit),
				error: Error::RateLimited {
					limit: rate_limit.limit,
					remaining: rate_limit.remaining,
					retry_after_secs: rate_limit.retry_after.as_secs(),
				},
			});
		}

		let fail = |error: Error| Failure { rate_limit: Some(rate_limit), error };
		let flagged = self
			.collaborators
			.moderation
			.moderate(&self.cfg.providers.moderation, query.sanitized())
			.await
			.unwrap_or_else(|err| {
				// Moderation outages fail closed; generating unvetted answers
				// is worse than rejecting a safe query.
				warn!(error = %err, "Moderation call failed; rejecting the query.");

				true
			});

		if flagged {
			return Err(fail(Error::ContentRejected));
		}

		let vector = self
			.collaborators
			.embedding
			.embed(&self.cfg.providers.embedding, query.sanitized())
			.await
			.map_err(|err| fail(Error::EmbeddingFailed { message: err.to_string() }))?;

		if vector.len() != self.cfg.providers.embedding.dimensions as usize {
			return Err(fail(Error::EmbeddingFailed {
				message: format!(
					"Embedding dimension mismatch: got {}, expected {}.",
					vector.len(),
					self.cfg.providers.embedding.dimensions
				),
			}));
		}

		let sections = self
			.collaborators
			.retriever
			.retrieve(query.project_id(), vector)
			.await
			.map_err(|err| fail(Error::RetrievalFailed { message: err.to_string() }))?;

		if sections.is_empty() {
			return Err(fail(Error::NoRelevantContext));
		}

		let context = build_context(&sections);

		info!(
			project_id = query.project_id(),
			sections = sections.len(),
			used_tokens = context.used_tokens,
			references = context.references.len(),
			"Context assembled."
		);

		let prompt = build_prompt(&context, query.sanitized(), query.i_dont_know_text());
		let payload = query.model().kind.request_payload(&query.model().id, &prompt);
		let events = self
			.collaborators
			.completion
			.stream(&self.cfg.providers.completion, payload)
			.await
			.map_err(|err| fail(Error::UpstreamStream { message: err.to_string() }))?;
		let stream =
			AnswerStream::new(events, query.model().kind, context.references.clone(), &prompt);

		Ok(Answer { rate_limit, stream })
	}
}
