use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat roles recognized on the caller-facing (OpenAI) dialect.
///
/// `System` and `Developer` are both "system-like": the translator merges
/// both into Gemini's `systemInstruction` rather than `contents` (§3
/// invariant 1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ChatRole {
	System,
	Developer,
	User,
	Assistant,
	Tool,
}

impl ChatRole {
	/// System-like roles are merged into `systemInstruction`, never into `contents`.
	pub fn is_system_like(&self) -> bool {
		matches!(self, ChatRole::System | ChatRole::Developer)
	}
}

/// A message's content: either a plain string, or an ordered list of parts.
///
/// Most caller SDKs send a bare string for simple turns and a parts array
/// once multimodal or structured content is involved; both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum MessageContent {
	#[from]
	Text(String),
	#[from]
	Parts(Vec<ContentPart>),
}

impl MessageContent {
	/// Borrow as a plain string, if this content is the `Text` variant.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			MessageContent::Text(text) => Some(text.as_str()),
			MessageContent::Parts(_) => None,
		}
	}

	/// Concatenate every text part in order, joined with no separator.
	///
	/// Used when merging system/developer message content into
	/// `systemInstruction` (§4.1 step 3): for a `Text` content this is the
	/// string itself; for `Parts`, only `ContentPart::Text` parts
	/// contribute, any other part kind is ignored.
	pub fn joined_text(&self) -> String {
		match self {
			MessageContent::Text(text) => text.clone(),
			MessageContent::Parts(parts) => parts.iter().filter_map(ContentPart::as_text).collect::<Vec<_>>().join(""),
		}
	}

	/// True if there is no visible text at all (used after stripping a
	/// `<thinking>` block from a string content to decide whether a
	/// visible text part should still be appended).
	pub fn is_text_empty(&self) -> bool {
		match self {
			MessageContent::Text(text) => text.is_empty(),
			MessageContent::Parts(parts) => parts.is_empty(),
		}
	}
}

/// A single content segment within a `Parts` message.
///
/// Mirrors the OpenAI `type`-tagged part shape: `{"type":"text","text":...}`
/// and `{"type":"image_url","image_url":{"url":...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
	Text { text: String },
	ImageUrl { image_url: ImageUrlPart },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrlPart {
	pub url: String,
}

impl ContentPart {
	pub fn text(text: impl Into<String>) -> Self {
		ContentPart::Text { text: text.into() }
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			ContentPart::Text { text } => Some(text.as_str()),
			ContentPart::ImageUrl { .. } => None,
		}
	}

	pub fn as_image_url(&self) -> Option<&str> {
		match self {
			ContentPart::ImageUrl { image_url } => Some(image_url.url.as_str()),
			ContentPart::Text { .. } => None,
		}
	}
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
	pub id: String,
	#[serde(rename = "type", default = "default_tool_call_type")]
	pub kind: String,
	pub function: ToolCallFunction,
}

fn default_tool_call_type() -> String {
	"function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
	pub name: String,
	/// Arguments as a JSON-encoded string (OpenAI wire shape), not a parsed value.
	pub arguments: String,
}

/// Reasoning fields accepted on input / emitted on output, with the three
/// alias name pairs from §6 normalized behind one type.
///
/// Readers take the first non-empty *group* in priority order: primary
/// (`thinking`/`signature`), then `cot_summary`/`cot_id`, then
/// `reasoning_text`/`reasoning_opaque`.
#[derive(Debug, Clone, Default)]
pub struct ReasoningFields {
	pub thought_text: Option<String>,
	pub thought_signature: Option<String>,
}

impl ReasoningFields {
	/// Build from the raw alias fields carried on a message, per §6 priority.
	#[allow(clippy::too_many_arguments)]
	pub fn resolve(
		thinking: Option<&str>,
		signature: Option<&str>,
		cot_summary: Option<&str>,
		cot_id: Option<&str>,
		reasoning_text: Option<&str>,
		reasoning_opaque: Option<&str>,
	) -> Option<Self> {
		let groups = [(thinking, signature), (cot_summary, cot_id), (reasoning_text, reasoning_opaque)];
		for (text, sig) in groups {
			if let Some(text) = text.filter(|t| !t.is_empty()) {
				return Some(ReasoningFields {
					thought_text: Some(text.to_string()),
					thought_signature: sig.filter(|s| !s.is_empty()).map(str::to_string),
				});
			}
		}
		None
	}

	pub fn is_empty(&self) -> bool {
		self.thought_text.is_none()
	}
}

/// Raw JSON-valued tool arguments, used internally once a `ToolCall`'s
/// `arguments` string is parsed for forwarding to Gemini's `functionCall.args`.
pub fn parse_tool_arguments(arguments: &str) -> Value {
	serde_json::from_str(arguments).unwrap_or(Value::Object(Default::default()))
}
