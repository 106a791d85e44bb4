use crate::chat::message::{ChatRole, MessageContent, ReasoningFields, ToolCall};
use crate::models::ReasoningEffort;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single chat message (system, developer, user, assistant, or tool).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
	pub role: ChatRole,

	/// Absent for an assistant message that carries only tool calls.
	#[serde(default)]
	pub content: Option<MessageContent>,

	/// Present only on assistant messages.
	#[serde(default)]
	pub tool_calls: Option<Vec<ToolCall>>,

	/// Present only on tool messages; identifies which tool call this is a result for.
	#[serde(default)]
	pub tool_call_id: Option<String>,

	// -- Reasoning field aliases (§6); independent of `content`.
	#[serde(default)]
	pub thinking: Option<String>,
	#[serde(default)]
	pub signature: Option<String>,
	#[serde(default)]
	pub cot_summary: Option<String>,
	#[serde(default)]
	pub cot_id: Option<String>,
	#[serde(default)]
	pub reasoning_text: Option<String>,
	#[serde(default)]
	pub reasoning_opaque: Option<String>,
}

impl Message {
	/// Resolve this message's reasoning fields per the §6 alias priority.
	pub fn reasoning_fields(&self) -> Option<ReasoningFields> {
		ReasoningFields::resolve(
			self.thinking.as_deref(),
			self.signature.as_deref(),
			self.cot_summary.as_deref(),
			self.cot_id.as_deref(),
			self.reasoning_text.as_deref(),
			self.reasoning_opaque.as_deref(),
		)
	}

	/// Content rendered to text regardless of shape, falling back to
	/// stringifying non-string/non-array JSON (used for tool message content
	/// per §4.1 step 4, and the user-message fallback in step 5).
	pub fn content_as_text(&self) -> String {
		match &self.content {
			Some(MessageContent::Text(text)) => text.clone(),
			Some(MessageContent::Parts(parts)) => parts.iter().filter_map(|p| p.as_text()).collect::<Vec<_>>().join(""),
			None => String::new(),
		}
	}
}

/// Effort wrapper accepted as nested `{"reasoning": {"effort": "..."}}`,
/// the alternative to a top-level `reasoning_effort` (§4.1 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningEffortField {
	pub effort: ReasoningEffort,
}

/// A tool/function declaration as sent by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
	#[serde(rename = "type", default = "default_tool_type")]
	pub kind: String,
	pub function: FunctionDef,
}

fn default_tool_type() -> String {
	"function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub parameters: Option<Value>,
}

/// `tool_choice` directive: `"none"`, `"auto"`, or a specific function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
	Mode(String),
	Function { function: ToolChoiceFunction },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
	pub name: String,
}

/// The caller-facing chat-completion request (OpenAI dialect).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
	pub model: String,
	pub messages: Vec<Message>,
	#[serde(default)]
	pub temperature: Option<f64>,
	#[serde(default)]
	pub stream: Option<bool>,
	#[serde(default)]
	pub reasoning_effort: Option<ReasoningEffort>,
	#[serde(default)]
	pub reasoning: Option<ReasoningEffortField>,
	#[serde(default)]
	pub tools: Option<Vec<ToolDef>>,
	#[serde(default)]
	pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
	/// Resolve the effective reasoning effort per §4.1 step 2: prefer the
	/// top-level field, else the nested `reasoning.effort`.
	pub fn effective_reasoning_effort(&self) -> Option<ReasoningEffort> {
		self.reasoning_effort.or_else(|| self.reasoning.as_ref().map(|r| r.effort))
	}

	pub fn is_streaming(&self) -> bool {
		self.stream.unwrap_or(false)
	}
}
