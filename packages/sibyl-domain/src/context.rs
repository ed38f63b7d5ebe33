use crate::CONTEXT_TOKEN_CUTOFF;

/// Separator appended after each included section's text.
pub const SECTION_SEPARATOR: &str = "\n---\n";

/// A retrieved chunk of indexed document text, ranked best-match-first by the
/// retriever. The budgeter must not re-sort.
#[derive(Debug, Clone)]
pub struct FileSection {
	pub path: String,
	pub content: String,
	pub token_count: u32,
	pub similarity: f32,
}

/// The budgeted context, immutable once assembled.
#[derive(Debug, Clone)]
pub struct ContextWindow {
	pub text: String,
	pub used_tokens: u32,
	pub references: Vec<String>,
}

/// Walks ranked sections and accumulates text until the token budget is hit.
///
/// The cutoff check runs before a section is appended, so a section whose
/// token count would push the running total to or past the cutoff is excluded
/// entirely and the walk stops. A single oversized top match therefore yields
/// an empty window.
pub fn build_context(sections: &[FileSection]) -> ContextWindow {
	let mut text = String::new();
	let mut used_tokens = 0_u32;
	let mut references = Vec::new();

	for section in sections {
		if used_tokens.saturating_add(section.token_count) >= CONTEXT_TOKEN_CUTOFF {
			break;
		}

		used_tokens += section.token_count;
		text.push_str(section.content.trim());
		text.push_str(SECTION_SEPARATOR);

		if !references.contains(&section.path) {
			references.push(section.path.clone());
		}
	}

	ContextWindow { text, used_tokens, references }
}
