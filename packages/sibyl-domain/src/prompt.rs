use crate::context::ContextWindow;

pub const DEFAULT_I_DONT_KNOW: &str = "Sorry, I don't know how to help with that.";

/// Renders the fixed instruction template. Pure: the same inputs always yield
/// a byte-identical prompt.
pub fn build_prompt(context: &ContextWindow, question: &str, i_dont_know_text: &str) -> String {
	format!(
		"You are a very enthusiastic company representative who loves to help people! \
		Given the following sections from the documentation, answer the question using \
		only that information, outputted in Markdown format. If you are unsure and the \
		answer is not explicitly written in the documentation, say \"{i_dont_know_text}\".\n\
		\n\
		Context sections:\n\
		---\n\
		{context}\n\
		\n\
		Question: \"{question}\"\n\
		\n\
		Answer (including related code snippets if available):",
		context = context.text,
	)
}
