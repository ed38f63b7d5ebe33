use color_eyre::{Result, eyre};

/// Incremental server-sent-event parser.
///
/// Collects UTF-8 lines across arbitrary byte-chunk boundaries and emits one
/// data payload per blank-line-terminated event. Non-`data:` fields (`event:`,
/// `id:`, `retry:`, comments) are ignored.
pub struct SseParser {
	buf: Vec<u8>,
	data: String,
}

impl SseParser {
	pub fn new() -> Self {
		Self { buf: Vec::new(), data: String::new() }
	}

	/// Feeds raw bytes and returns every completed data payload.
	pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
		self.buf.extend_from_slice(chunk);

		let mut out = Vec::new();

		while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
			let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();

			line.pop();

			if line.ends_with(b"\r") {
				line.pop();
			}

			if line.is_empty() {
				if !self.data.is_empty() {
					if self.data.ends_with('\n') {
						self.data.pop();
					}

					out.push(std::mem::take(&mut self.data));
				}

				continue;
			}

			let text = std::str::from_utf8(&line)
				.map_err(|err| eyre::eyre!("Event line is not valid UTF-8: {err}."))?;

			if let Some(rest) = text.strip_prefix("data:") {
				self.data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
				self.data.push('\n');
			}
		}

		Ok(out)
	}
}

impl Default for SseParser {
	fn default() -> Self {
		Self::new()
	}
}
