/// Rough character-based token estimate, used only for post-hoc accounting.
/// Four characters per token tracks the upstream tokenizer closely enough for
/// usage logs; it is never used to enforce a limit.
pub fn approx_token_count(text: &str) -> u32 {
	(text.chars().count() as u32).div_ceil(4)
}
