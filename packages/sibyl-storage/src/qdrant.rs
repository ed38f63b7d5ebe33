use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, Value, value::Kind,
};
use tracing::warn;

use sibyl_domain::FileSection;

use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &sibyl_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Ranked similarity query over a project's indexed sections. Results come
	/// back best-match-first; callers must preserve that order.
	pub async fn query_sections(
		&self,
		project_id: &str,
		vector: Vec<f32>,
		threshold: f32,
		limit: u64,
		min_content_length: usize,
	) -> Result<Vec<FileSection>> {
		let filter = Filter::all([Condition::matches("project_id", project_id.to_string())]);
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.filter(filter)
			.score_threshold(threshold)
			.limit(limit)
			.with_payload(true);
		let response = self.client.query(search).await?;
		let mut sections = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(section) = section_from_payload(&point.payload, point.score) else {
				warn!(collection = %self.collection, "Skipping point with malformed payload.");

				continue;
			};

			if section.content.chars().count() < min_content_length {
				continue;
			}

			sections.push(section);
		}

		Ok(sections)
	}
}

fn section_from_payload(payload: &HashMap<String, Value>, score: f32) -> Option<FileSection> {
	let path = payload_str(payload, "path")?;
	let content = payload_str(payload, "content")?;
	let token_count = payload_u32(payload, "token_count")?;

	Some(FileSection { path, content, token_count, similarity: score })
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) => {
			if value.fract() == 0.0 && *value >= 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			}
		},
		_ => None,
	}
}
