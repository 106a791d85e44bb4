//! Downstream (caller-dialect) streaming chunk shapes (§3, §4.3).

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
	pub id: String,
	pub object: &'static str,
	pub created: u64,
	pub model: String,
	pub choices: Vec<ChunkChoice>,
	pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
	pub index: u32,
	pub delta: Delta,
	pub finish_reason: Option<&'static str>,
}

/// A delta carries only the fields that changed in this chunk; every field
/// is optional so most chunks are sparse.
///
/// `content` has a hand-written `Serialize` rather than a derive: the
/// first chunk of a stream produced by a tool call must carry an explicit
/// `"content": null` rather than omitting the key entirely (§4.3
/// first-chunk framing), which a plain `skip_serializing_if` cannot express
/// for one call site and not another.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
	pub role: Option<&'static str>,
	pub content: Option<String>,
	pub tool_calls: Option<Vec<ToolCallDelta>>,

	// Reasoning aliases (§6); writers emit only the primary pair.
	pub thinking: Option<String>,
	pub signature: Option<String>,

	/// Set once, by [`ResponseTransformer`](crate::stream::ResponseTransformer)
	/// on the first chunk of a stream, when that chunk carries a tool call
	/// and no content of its own. Never set by callers directly.
	#[serde(skip)]
	pub(crate) content_is_explicit_null: bool,
}

impl Delta {
	pub fn role_assistant() -> Self {
		Delta { role: Some("assistant"), ..Default::default() }
	}

	pub fn content(text: impl Into<String>) -> Self {
		Delta { content: Some(text.into()), ..Default::default() }
	}

	pub fn thinking(text: impl Into<String>, signature: Option<String>) -> Self {
		Delta { thinking: Some(text.into()), signature, ..Default::default() }
	}

	pub fn tool_call(delta: ToolCallDelta) -> Self {
		Delta { tool_calls: Some(vec![delta]), ..Default::default() }
	}

	pub fn with_role(mut self, role: &'static str) -> Self {
		self.role = Some(role);
		self
	}
}

impl Serialize for Delta {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		if let Some(role) = self.role {
			map.serialize_entry("role", role)?;
		}
		match &self.content {
			Some(text) => map.serialize_entry("content", text)?,
			None if self.content_is_explicit_null => map.serialize_entry("content", &Option::<&str>::None)?,
			None => {}
		}
		if let Some(tool_calls) = &self.tool_calls {
			map.serialize_entry("tool_calls", tool_calls)?;
		}
		if let Some(thinking) = &self.thinking {
			map.serialize_entry("thinking", thinking)?;
		}
		if let Some(signature) = &self.signature {
			map.serialize_entry("signature", signature)?;
		}
		map.end()
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
	pub index: u32,
	pub id: String,
	#[serde(rename = "type")]
	pub kind: &'static str,
	pub function: ToolCallFunctionDelta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunctionDelta {
	pub name: String,
	pub arguments: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
	pub prompt_tokens: u32,
	pub completion_tokens: u32,
	pub total_tokens: u32,
}

impl Usage {
	pub fn from_prompt_and_completion(prompt: u32, completion: u32) -> Self {
		Usage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: prompt + completion }
	}
}
