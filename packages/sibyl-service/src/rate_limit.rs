use std::{
	collections::HashMap,
	sync::Mutex,
	time::{Duration, Instant},
};

use crate::{BoxFuture, RateLimiter};

/// Admission outcome, read-only for the pipeline. `limit` and `remaining` are
/// surfaced as response metadata whatever the verdict.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitOutcome {
	pub allowed: bool,
	pub limit: u32,
	pub remaining: u32,
	pub retry_after: Duration,
}

struct Window {
	started_at: Instant,
	count: u32,
}

/// Fixed-window counter keyed by project id. Bookkeeping lives in memory;
/// durable storage is out of scope for the pipeline.
pub struct FixedWindowLimiter {
	max_requests: u32,
	window: Duration,
	windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
	pub fn new(cfg: &sibyl_config::RateLimit) -> Self {
		Self {
			max_requests: cfg.max_requests,
			window: Duration::from_secs(cfg.window_secs),
			windows: Mutex::new(HashMap::new()),
		}
	}

	fn admit(&self, project_id: &str) -> RateLimitOutcome {
		let now = Instant::now();
		let mut windows = self.windows.lock().unwrap_or_else(|err| err.into_inner());
		let window = windows
			.entry(project_id.to_string())
			.or_insert(Window { started_at: now, count: 0 });

		if now.duration_since(window.started_at) >= self.window {
			window.started_at = now;
			window.count = 0;
		}

		window.count += 1;

		let allowed = window.count <= self.max_requests;
		let retry_after = if allowed {
			Duration::ZERO
		} else {
			self.window.saturating_sub(now.duration_since(window.started_at))
		};

		RateLimitOutcome {
			allowed,
			limit: self.max_requests,
			remaining: self.max_requests.saturating_sub(window.count),
			retry_after,
		}
	}
}

impl RateLimiter for FixedWindowLimiter {
	fn check<'a>(&'a self, project_id: &'a str) -> BoxFuture<'a, RateLimitOutcome> {
		Box::pin(async move { self.admit(project_id) })
	}
}
