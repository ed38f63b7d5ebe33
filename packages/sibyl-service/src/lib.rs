mod error;
pub mod pipeline;
pub mod rate_limit;
pub mod stream;

use std::{future::Future, pin::Pin, sync::Arc};

use futures_core::Stream;

pub use error::{Error, Result};
pub use pipeline::{Answer, AnswerRequest, AnswerService, Failure};
pub use rate_limit::{FixedWindowLimiter, RateLimitOutcome};
pub use stream::{AnswerStream, STREAM_SEPARATOR, StreamFrame};

use sibyl_config::{
	CompletionProviderConfig, EmbeddingProviderConfig, ModerationProviderConfig,
};
use sibyl_domain::{FileSection, MATCH_LIMIT, MIN_CONTENT_LENGTH, SIMILARITY_THRESHOLD};
use sibyl_providers::{completion, embedding, moderation};
use sibyl_storage::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw upstream data events feeding the stream transformer.
pub type EventStream = Pin<Box<dyn Stream<Item = color_eyre::Result<String>> + Send>>;

pub trait ModerationProvider
where
	Self: Send + Sync,
{
	fn moderate<'a>(
		&'a self,
		cfg: &'a ModerationProviderConfig,
		input: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<bool>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		input: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait SectionRetriever
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		project_id: &'a str,
		vector: Vec<f32>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<FileSection>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn stream<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		payload: serde_json::Value,
	) -> BoxFuture<'a, color_eyre::Result<EventStream>>;
}

pub trait RateLimiter
where
	Self: Send + Sync,
{
	fn check<'a>(&'a self, project_id: &'a str) -> BoxFuture<'a, RateLimitOutcome>;
}

/// Explicitly constructed collaborators, passed into the pipeline so tests
/// can substitute fakes for every outbound call.
#[derive(Clone)]
pub struct Collaborators {
	pub moderation: Arc<dyn ModerationProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub retriever: Arc<dyn SectionRetriever>,
	pub completion: Arc<dyn CompletionProvider>,
	pub rate_limiter: Arc<dyn RateLimiter>,
}

impl Collaborators {
	/// Wires the live providers around a qdrant store and a rate limiter.
	pub fn live(store: QdrantStore, rate_limiter: Arc<dyn RateLimiter>) -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			moderation: provider.clone(),
			embedding: provider.clone(),
			retriever: Arc::new(QdrantRetriever { store }),
			completion: provider,
			rate_limiter,
		}
	}
}

struct DefaultProviders;

impl ModerationProvider for DefaultProviders {
	fn moderate<'a>(
		&'a self,
		cfg: &'a ModerationProviderConfig,
		input: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		Box::pin(moderation::moderate(cfg, input))
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		input: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed_with_backoff(cfg, input, embedding::BackoffPolicy::default()))
	}
}

impl CompletionProvider for DefaultProviders {
	fn stream<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		payload: serde_json::Value,
	) -> BoxFuture<'a, color_eyre::Result<EventStream>> {
		Box::pin(completion::stream_completion(cfg, payload))
	}
}

/// Similarity retrieval backed by qdrant, under the fixed matching policy.
struct QdrantRetriever {
	store: QdrantStore,
}

impl SectionRetriever for QdrantRetriever {
	fn retrieve<'a>(
		&'a self,
		project_id: &'a str,
		vector: Vec<f32>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<FileSection>>> {
		Box::pin(async move {
			let sections = self
				.store
				.query_sections(
					project_id,
					vector,
					SIMILARITY_THRESHOLD,
					MATCH_LIMIT,
					MIN_CONTENT_LENGTH,
				)
				.await?;

			Ok(sections)
		})
	}
}
