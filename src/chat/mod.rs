//! Caller-dialect (OpenAI chat-completion) data model: the request shape this
//! crate accepts, and the parts/role/tool-call types that compose it.

mod message;
mod request;

pub use message::{
	ChatRole, ContentPart, ImageUrlPart, MessageContent, ReasoningFields, ToolCall, ToolCallFunction, parse_tool_arguments,
};
pub use request::{ChatRequest, FunctionDef, Message, ReasoningEffortField, ToolChoice, ToolChoiceFunction, ToolDef};
