//! Translates a caller-dialect [`ChatRequest`] into a [`GeminiRequest`] (§4.1).
//!
//! Total and infallible: malformed or unexpected input degrades gracefully
//! rather than producing an error, since a proxy has no business rejecting
//! a request its caller already committed to sending upstream.

use crate::cache::SignatureCache;
use crate::chat::{ChatRequest, ChatRole, ContentPart, Message, MessageContent, ToolChoice};
use crate::gemini::types::{
	FunctionCallPart, FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, FunctionResponsePart,
	GeminiContent, GeminiPart, GeminiRequest, GenerationConfig, InlineDataPart, TextPart, ThinkingConfig, ToolConfig,
	ToolDeclaration,
};
use crate::models::{self, ReasoningEffort};
use crate::schema::to_gemini_parameters;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Result of translation: the resolved model name (needed by the upstream
/// envelope and by the downstream chunk framing) alongside the body.
#[derive(Debug, Clone)]
pub struct TranslatedRequest {
	pub resolved_model: String,
	pub body: GeminiRequest,
}

impl TranslatedRequest {
	/// Wrap into the wire envelope the upstream client actually posts:
	/// `{model, project, request}` (§3 data model).
	pub fn into_upstream_envelope(self, project: impl Into<String>) -> crate::gemini::types::UpstreamEnvelope {
		crate::gemini::types::UpstreamEnvelope { model: self.resolved_model, project: project.into(), request: self.body }
	}
}

/// Translate one caller request. `cache` supplies thought-signature recovery
/// for assistant turns that carry tool calls but no inline reasoning fields.
pub fn translate_request(chat: &ChatRequest, cache: &SignatureCache) -> TranslatedRequest {
	let resolved_model = models::resolve_model(&chat.model).to_string();
	let effort = chat.effective_reasoning_effort();

	let system_instruction = build_system_instruction(&chat.messages);
	let contents = build_contents(&chat.messages, cache);
	let tools = build_tools(chat);
	let tool_config = build_tool_config(chat);
	let generation_config = build_generation_config(chat, &resolved_model, effort);

	let body = GeminiRequest { contents, system_instruction, tools, tool_config, generation_config };
	TranslatedRequest { resolved_model, body }
}

fn build_system_instruction(messages: &[Message]) -> Option<GeminiContent> {
	let mut combined = String::new();
	for message in messages.iter().filter(|m| m.role.is_system_like()) {
		if let Some(content) = &message.content {
			combined.push_str(&content.joined_text());
		}
	}
	if combined.is_empty() { None } else { Some(GeminiContent::system(combined)) }
}

fn build_contents(messages: &[Message], cache: &SignatureCache) -> Vec<GeminiContent> {
	let mut contents = Vec::new();
	let mut tool_call_names: HashMap<String, String> = HashMap::new();
	let thinking_tag_re = Regex::new(r"(?s)<thinking[^>]*>(.*?)</thinking>").expect("static regex");

	let remaining: Vec<&Message> = messages.iter().filter(|m| !m.role.is_system_like()).collect();
	let mut i = 0;
	while i < remaining.len() {
		let message = remaining[i];
		match message.role {
			ChatRole::Tool => {
				let mut parts = Vec::new();
				while i < remaining.len() && remaining[i].role == ChatRole::Tool {
					let tool_message = remaining[i];
					let name = tool_message
						.tool_call_id
						.as_deref()
						.and_then(|id| tool_call_names.get(id))
						.cloned()
						.unwrap_or_else(|| "unknown".to_string());
					parts.push(GeminiPart::FunctionResponse(FunctionResponsePart {
						name,
						response: tool_response_value(tool_message),
					}));
					i += 1;
				}
				contents.push(GeminiContent { role: Some("user".to_string()), parts });
			}
			ChatRole::Assistant => {
				for tool_call in message.tool_calls.iter().flatten() {
					tool_call_names.insert(tool_call.id.clone(), tool_call.function.name.clone());
				}
				contents.push(build_assistant_content(message, cache, &thinking_tag_re));
				i += 1;
			}
			ChatRole::User | ChatRole::System | ChatRole::Developer => {
				contents.push(GeminiContent { role: Some("user".to_string()), parts: build_user_parts(message) });
				i += 1;
			}
		}
	}
	contents
}

fn tool_response_value(message: &Message) -> Value {
	match &message.content {
		Some(MessageContent::Text(text)) => {
			serde_json::from_str::<Value>(text).unwrap_or_else(|_| json!({"result": text}))
		}
		Some(MessageContent::Parts(_)) => json!({"result": message.content_as_text()}),
		None => json!({}),
	}
}

fn build_user_parts(message: &Message) -> Vec<GeminiPart> {
	static DATA_URL_RE_PATTERN: &str = r"^data:(image/[^;]+);base64,(.+)$";
	let data_url_re = Regex::new(DATA_URL_RE_PATTERN).expect("static regex");

	match &message.content {
		Some(MessageContent::Text(text)) => vec![GeminiPart::Text(TextPart::plain(text.clone()))],
		Some(MessageContent::Parts(parts)) => parts
			.iter()
			.filter_map(|part| match part {
				ContentPart::Text { text } => {
					let mut text = text.clone();
					if !text.ends_with('\n') {
						text.push('\n');
					}
					Some(GeminiPart::Text(TextPart::plain(text)))
				}
				ContentPart::ImageUrl { image_url } => data_url_re.captures(&image_url.url).map(|caps| {
					GeminiPart::InlineData(InlineDataPart { mime_type: caps[1].to_string(), data: caps[2].to_string() })
				}),
			})
			.collect(),
		None => vec![GeminiPart::Text(TextPart::plain(String::new()))],
	}
}

fn build_assistant_content(message: &Message, cache: &SignatureCache, thinking_tag_re: &Regex) -> GeminiContent {
	let mut thought_text = message.reasoning_fields().and_then(|f| f.thought_text);
	let mut thought_signature = message.reasoning_fields().and_then(|f| f.thought_signature);

	if thought_text.is_none() {
		for tool_call in message.tool_calls.iter().flatten() {
			if let Some(hit) = cache.get(&tool_call.id) {
				thought_text = Some(hit.thought_text);
				thought_signature = hit.signature;
				break;
			}
		}
	}

	let mut visible_text = message.content_as_text();
	if thought_text.is_none() {
		if let Some(MessageContent::Text(text)) = &message.content {
			if let Some(caps) = thinking_tag_re.captures(text) {
				thought_text = Some(caps[1].to_string());
				let full_match = caps.get(0).expect("group 0 always matches");
				visible_text = format!("{}{}", &text[..full_match.start()], &text[full_match.end()..]);
			}
		}
	}

	let mut parts = Vec::new();
	if let Some(text) = thought_text.filter(|t| !t.is_empty()) {
		parts.push(GeminiPart::Text(TextPart::thought(text, thought_signature.clone())));
	}
	if !visible_text.is_empty() {
		parts.push(GeminiPart::Text(TextPart::plain(visible_text)));
	}
	for tool_call in message.tool_calls.iter().flatten() {
		let args = crate::chat::parse_tool_arguments(&tool_call.function.arguments);
		parts.push(GeminiPart::FunctionCall(FunctionCallPart {
			name: tool_call.function.name.clone(),
			args,
			thought_signature: thought_signature.clone(),
		}));
	}

	GeminiContent { role: Some("model".to_string()), parts }
}

fn build_tools(chat: &ChatRequest) -> Option<Vec<ToolDeclaration>> {
	let tools = chat.tools.as_ref()?;
	if tools.is_empty() {
		return None;
	}
	let function_declarations = tools
		.iter()
		.map(|tool| FunctionDeclaration {
			name: tool.function.name.clone(),
			description: tool.function.description.clone(),
			parameters: to_gemini_parameters(tool.function.parameters.as_ref()),
		})
		.collect();
	Some(vec![ToolDeclaration { function_declarations }])
}

fn build_tool_config(chat: &ChatRequest) -> Option<ToolConfig> {
	match chat.tool_choice.as_ref()? {
		ToolChoice::Mode(mode) => match mode.as_str() {
			"none" => Some(ToolConfig {
				function_calling_config: FunctionCallingConfig { mode: FunctionCallingMode::None, allowed_function_names: None },
			}),
			"auto" => Some(ToolConfig {
				function_calling_config: FunctionCallingConfig { mode: FunctionCallingMode::Auto, allowed_function_names: None },
			}),
			_ => None,
		},
		ToolChoice::Function { function } => Some(ToolConfig {
			function_calling_config: FunctionCallingConfig {
				mode: FunctionCallingMode::Any,
				allowed_function_names: Some(vec![function.name.clone()]),
			},
		}),
	}
}

fn build_generation_config(chat: &ChatRequest, resolved_model: &str, effort: Option<ReasoningEffort>) -> GenerationConfig {
	let temperature = chat.temperature.unwrap_or(models::DEFAULT_TEMPERATURE);
	let thinking_config = if models::is_thinking_model(resolved_model) {
		let budget = effort.map(models::budget_for).unwrap_or(models::DEFAULT_THINKING_BUDGET);
		Some(ThinkingConfig { thinking_budget: budget.thinking_budget, include_thoughts: budget.include_thoughts })
	} else {
		effort
			.map(models::budget_for)
			.map(|budget| ThinkingConfig { thinking_budget: budget.thinking_budget, include_thoughts: budget.include_thoughts })
	};
	GenerationConfig { temperature, thinking_config }
}
