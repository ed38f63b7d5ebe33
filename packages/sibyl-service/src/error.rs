pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Per-request failure taxonomy. Every pre-stream failure is terminal; once
/// streaming has begun failures surface as `UpstreamStream` on the stream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("No project was specified.")]
	MissingProject,
	#[error("No prompt was provided.")]
	MissingPrompt,
	#[error("Too many requests. Try again in {retry_after_secs} seconds.")]
	RateLimited { limit: u32, remaining: u32, retry_after_secs: u64 },
	#[error("The query was rejected by content moderation.")]
	ContentRejected,
	#[error("Failed to embed the query: {message}")]
	EmbeddingFailed { message: String },
	#[error("No relevant sections were found for this query.")]
	NoRelevantContext,
	#[error("Failed to retrieve context sections: {message}")]
	RetrievalFailed { message: String },
	#[error("Upstream stream error: {message}")]
	UpstreamStream { message: String },
}
