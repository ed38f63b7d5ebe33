pub mod context;
pub mod model;
pub mod prompt;
pub mod query;
pub mod tokens;

pub use context::{ContextWindow, FileSection, SECTION_SEPARATOR, build_context};
pub use model::{ModelKind, ModelSpec};
pub use prompt::{DEFAULT_I_DONT_KNOW, build_prompt};
pub use query::{IntakeReject, Query};
pub use tokens::approx_token_count;

/// Hard cap on the raw prompt, applied silently before sanitization.
pub const MAX_PROMPT_LENGTH: usize = 500;

/// Minimum cosine similarity for a section to count as a match.
pub const SIMILARITY_THRESHOLD: f32 = 0.78;

/// Maximum number of ranked sections fetched per query.
pub const MATCH_LIMIT: u64 = 10;

/// Sections shorter than this many characters are noise and are dropped.
pub const MIN_CONTENT_LENGTH: usize = 50;

/// Token budget for the assembled context window.
pub const CONTEXT_TOKEN_CUTOFF: u32 = 800;

/// Maximum number of tokens the completion may generate.
pub const MAX_OUTPUT_TOKENS: u32 = 500;
