use std::{
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};

use serde_json::Map;

use sibyl_config::{
	CompletionProviderConfig, Config, EmbeddingProviderConfig, ModerationProviderConfig,
	Providers, Qdrant, RateLimit, Service, Storage,
};
use sibyl_domain::FileSection;
use sibyl_service::{
	AnswerRequest, AnswerService, BoxFuture, Collaborators, CompletionProvider,
	EmbeddingProvider, Error, EventStream, ModerationProvider, RateLimitOutcome, RateLimiter,
	SectionRetriever, StreamFrame,
};

const DIMENSIONS: u32 = 4;

fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "sections".to_string(),
				vector_dim: DIMENSIONS,
			},
		},
		providers: Providers {
			moderation: ModerationProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/v1/moderations".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			embedding: EmbeddingProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "text-embedding-ada-002".to_string(),
				dimensions: DIMENSIONS,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			completion: CompletionProviderConfig {
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/v1/chat/completions".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		rate_limit: RateLimit { max_requests: 10, window_secs: 60 },
	}
}

#[derive(Default)]
struct Calls {
	moderation: AtomicU32,
	embedding: AtomicU32,
	retrieval: AtomicU32,
	completion: AtomicU32,
}

struct FakeLimiter {
	allowed: bool,
}

impl RateLimiter for FakeLimiter {
	fn check<'a>(&'a self, _project_id: &'a str) -> BoxFuture<'a, RateLimitOutcome> {
		let outcome = RateLimitOutcome {
			allowed: self.allowed,
			limit: 10,
			remaining: if self.allowed { 9 } else { 0 },
			retry_after: if self.allowed { Duration::ZERO } else { Duration::from_secs(60) },
		};

		Box::pin(async move { outcome })
	}
}

struct FakeModeration {
	calls: Arc<Calls>,
	flagged: bool,
}

impl ModerationProvider for FakeModeration {
	fn moderate<'a>(
		&'a self,
		_cfg: &'a ModerationProviderConfig,
		_input: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		self.calls.moderation.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(self.flagged) })
	}
}

struct FakeEmbedding {
	calls: Arc<Calls>,
	result: color_eyre::Result<Vec<f32>>,
}

impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_input: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		self.calls.embedding.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			match &self.result {
				Ok(vector) => Ok(vector.clone()),
				Err(err) => Err(color_eyre::eyre::eyre!("{err}")),
			}
		})
	}
}

struct FakeRetriever {
	calls: Arc<Calls>,
	sections: Vec<FileSection>,
}

impl SectionRetriever for FakeRetriever {
	fn retrieve<'a>(
		&'a self,
		_project_id: &'a str,
		_vector: Vec<f32>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<FileSection>>> {
		self.calls.retrieval.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(self.sections.clone()) })
	}
}

struct FakeCompletion {
	calls: Arc<Calls>,
	chunks: Vec<String>,
}

impl CompletionProvider for FakeCompletion {
	fn stream<'a>(
		&'a self,
		_cfg: &'a CompletionProviderConfig,
		_payload: serde_json::Value,
	) -> BoxFuture<'a, color_eyre::Result<EventStream>> {
		self.calls.completion.fetch_add(1, Ordering::SeqCst);

		let mut events: Vec<color_eyre::Result<String>> = self
			.chunks
			.iter()
			.map(|text| {
				Ok(serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
					.to_string())
			})
			.collect();

		events.push(Ok("[DONE]".to_string()));

		Box::pin(async move { Ok(Box::pin(tokio_stream::iter(events)) as EventStream) })
	}
}

struct Fixture {
	calls: Arc<Calls>,
	service: AnswerService,
}

fn fixture(
	allowed: bool,
	flagged: bool,
	embedding: color_eyre::Result<Vec<f32>>,
	sections: Vec<FileSection>,
	chunks: Vec<String>,
) -> Fixture {
	let calls = Arc::new(Calls::default());
	let collaborators = Collaborators {
		moderation: Arc::new(FakeModeration { calls: calls.clone(), flagged }),
		embedding: Arc::new(FakeEmbedding { calls: calls.clone(), result: embedding }),
		retriever: Arc::new(FakeRetriever { calls: calls.clone(), sections }),
		completion: Arc::new(FakeCompletion { calls: calls.clone(), chunks }),
		rate_limiter: Arc::new(FakeLimiter { allowed }),
	};

	Fixture { calls, service: AnswerService::new(test_config(), collaborators) }
}

fn section(path: &str, content: &str, token_count: u32) -> FileSection {
	FileSection {
		path: path.to_string(),
		content: content.to_string(),
		token_count,
		similarity: 0.9,
	}
}

fn request(prompt: &str) -> AnswerRequest {
	AnswerRequest {
		project_id: "project-1".to_string(),
		model: "gpt-3.5-turbo".to_string(),
		prompt: prompt.to_string(),
		i_dont_know_message: None,
	}
}

fn vector() -> Vec<f32> {
	vec![0.1; DIMENSIONS as usize]
}

#[tokio::test]
async fn rate_limit_denial_stops_all_further_work() {
	let fixture = fixture(
		false,
		false,
		Ok(vector()),
		vec![section("a.md", "content", 10)],
		vec!["hi".to_string()],
	);
	let failure =
		fixture.service.answer(request("question?")).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::RateLimited { .. }));
	assert!(failure.rate_limit.is_some());
	assert_eq!(fixture.calls.moderation.load(Ordering::SeqCst), 0);
	assert_eq!(fixture.calls.embedding.load(Ordering::SeqCst), 0);
	assert_eq!(fixture.calls.retrieval.load(Ordering::SeqCst), 0);
	assert_eq!(fixture.calls.completion.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn flagged_query_never_reaches_the_embedder() {
	let fixture = fixture(
		true,
		true,
		Ok(vector()),
		vec![section("a.md", "content", 10)],
		vec!["hi".to_string()],
	);
	let failure =
		fixture.service.answer(request("question?")).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::ContentRejected));
	assert_eq!(fixture.calls.moderation.load(Ordering::SeqCst), 1);
	assert_eq!(fixture.calls.embedding.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_prompt_fails_before_admission() {
	let fixture = fixture(true, false, Ok(vector()), Vec::new(), Vec::new());
	let failure = fixture.service.answer(request(" \n ")).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::MissingPrompt));
}

#[tokio::test]
async fn missing_project_fails_first() {
	let fixture = fixture(true, false, Ok(vector()), Vec::new(), Vec::new());
	let mut req = request("question?");

	req.project_id = "  ".to_string();

	let failure = fixture.service.answer(req).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::MissingProject));
}

#[tokio::test]
async fn embedding_failure_is_terminal() {
	let fixture = fixture(
		true,
		false,
		Err(color_eyre::eyre::eyre!("throttled")),
		vec![section("a.md", "content", 10)],
		Vec::new(),
	);
	let failure =
		fixture.service.answer(request("question?")).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::EmbeddingFailed { .. }));
	assert_eq!(fixture.calls.retrieval.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dimension_mismatch_is_an_embedding_failure() {
	let fixture = fixture(
		true,
		false,
		Ok(vec![0.1; 3]),
		vec![section("a.md", "content", 10)],
		Vec::new(),
	);
	let failure =
		fixture.service.answer(request("question?")).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::EmbeddingFailed { .. }));
}

#[tokio::test]
async fn no_sections_means_no_generation() {
	let fixture = fixture(true, false, Ok(vector()), Vec::new(), vec!["hi".to_string()]);
	let failure =
		fixture.service.answer(request("question?")).await.err().expect("must fail");

	assert!(matches!(failure.error, Error::NoRelevantContext));
	assert_eq!(fixture.calls.completion.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn end_to_end_frames_arrive_in_order() {
	let fixture = fixture(
		true,
		false,
		Ok(vector()),
		vec![section("support/refunds.md", "Refunds within 30 days.", 10)],
		vec!["Ref".to_string(), "unds".to_string(), " apply.".to_string()],
	);
	let answer = fixture.service.answer(request("What is the refund policy?")).await;
	let mut answer = answer.unwrap_or_else(|failure| panic!("{:?}", failure.error));

	assert!(answer.rate_limit.allowed);

	let mut frames = Vec::new();

	while let Some(frame) = answer.stream.next_frame().await {
		frames.push(frame.expect("stream error"));
	}

	assert_eq!(
		frames,
		vec![
			StreamFrame::References(vec!["support/refunds.md".to_string()]),
			StreamFrame::Content("Ref".to_string()),
			StreamFrame::Content("unds".to_string()),
			StreamFrame::Content(" apply.".to_string()),
		]
	);
	assert_eq!(fixture.calls.moderation.load(Ordering::SeqCst), 1);
	assert_eq!(fixture.calls.embedding.load(Ordering::SeqCst), 1);
	assert_eq!(fixture.calls.retrieval.load(Ordering::SeqCst), 1);
	assert_eq!(fixture.calls.completion.load(Ordering::SeqCst), 1);
}
