use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::fmt;

/// The wire envelope actually posted to `generateContent`/`streamGenerateContent`:
/// the resolved model and project alongside the translated request body (§3
/// data model: "Gemini request. `model`, `project`, and a body containing
/// `contents`…").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEnvelope {
	pub model: String,
	pub project: String,
	pub request: GeminiRequest,
}

/// The inner request body: `contents`, `systemInstruction`, `tools`,
/// `toolConfig`, and `generationConfig`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
	pub contents: Vec<GeminiContent>,
	pub system_instruction: Option<GeminiContent>,
	pub tools: Option<Vec<ToolDeclaration>>,
	pub tool_config: Option<ToolConfig>,
	pub generation_config: GenerationConfig,
}

/// One turn: either `"user"` or `"model"`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
	pub role: Option<String>,
	pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
	pub fn system(text: impl Into<String>) -> Self {
		GeminiContent { role: None, parts: vec![GeminiPart::Text(TextPart::plain(text))] }
	}
}

/// A single part within a turn.
///
/// Gemini's wire shape is a flat object keyed by exactly one of `text`,
/// `functionCall`, `functionResponse`, or `inlineData` — not an
/// externally-tagged `{"Text": {...}}` wrapper — so this carries a hand
/// written `Serialize`/`Deserialize` rather than a derive.
#[derive(Debug, Clone)]
pub enum GeminiPart {
	Text(TextPart),
	FunctionCall(FunctionCallPart),
	FunctionResponse(FunctionResponsePart),
	InlineData(InlineDataPart),
}

impl Serialize for GeminiPart {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		use serde::ser::SerializeMap;
		match self {
			GeminiPart::Text(part) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("text", &part.text)?;
				if let Some(thought) = part.thought {
					map.serialize_entry("thought", &thought)?;
				}
				if let Some(sig) = &part.thought_signature {
					map.serialize_entry("thoughtSignature", sig)?;
				}
				map.end()
			}
			GeminiPart::FunctionCall(part) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("functionCall", part)?;
				if let Some(sig) = &part.thought_signature {
					map.serialize_entry("thoughtSignature", sig)?;
				}
				map.end()
			}
			GeminiPart::FunctionResponse(part) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("functionResponse", part)?;
				map.end()
			}
			GeminiPart::InlineData(part) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("inlineData", part)?;
				map.end()
			}
		}
	}
}

impl<'de> Deserialize<'de> for GeminiPart {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct PartVisitor;

		impl<'de> Visitor<'de> for PartVisitor {
			type Value = GeminiPart;

			fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
				formatter.write_str("a Gemini Part object")
			}

			fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
				let mut text: Option<String> = None;
				let mut thought: Option<bool> = None;
				let mut thought_signature: Option<String> = None;
				let mut function_call: Option<FunctionCallPart> = None;
				let mut function_response: Option<FunctionResponsePart> = None;
				let mut inline_data: Option<InlineDataPart> = None;

				while let Some(key) = map.next_key::<String>()? {
					match key.as_str() {
						"text" => text = Some(map.next_value()?),
						"thought" => thought = Some(map.next_value()?),
						"thoughtSignature" => thought_signature = Some(map.next_value()?),
						"functionCall" => function_call = Some(map.next_value()?),
						"functionResponse" => function_response = Some(map.next_value()?),
						"inlineData" => inline_data = Some(map.next_value()?),
						_ => {
							let _ignored: de::IgnoredAny = map.next_value()?;
						}
					}
				}

				if let Some(mut part) = function_call {
					part.thought_signature = part.thought_signature.or(thought_signature);
					return Ok(GeminiPart::FunctionCall(part));
				}
				if let Some(part) = function_response {
					return Ok(GeminiPart::FunctionResponse(part));
				}
				if let Some(part) = inline_data {
					return Ok(GeminiPart::InlineData(part));
				}
				if let Some(text) = text {
					return Ok(GeminiPart::Text(TextPart { text, thought, thought_signature }));
				}
				Err(de::Error::custom("Gemini Part object had none of text/functionCall/functionResponse/inlineData"))
			}
		}

		deserializer.deserialize_map(PartVisitor)
	}
}

#[derive(Debug, Clone, Default)]
pub struct TextPart {
	pub text: String,
	pub thought: Option<bool>,
	pub thought_signature: Option<String>,
}

impl TextPart {
	pub fn plain(text: impl Into<String>) -> Self {
		TextPart { text: text.into(), thought: None, thought_signature: None }
	}

	pub fn thought(text: impl Into<String>, signature: Option<String>) -> Self {
		TextPart { text: text.into(), thought: Some(true), thought_signature: signature }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallPart {
	pub name: String,
	pub args: Value,
	#[serde(skip)]
	pub thought_signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponsePart {
	pub name: String,
	pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineDataPart {
	pub mime_type: String,
	pub data: String,
}

/// A tool entry: one `functionDeclarations` bundle per request (§4.1 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclaration {
	pub function_declarations: Vec<FunctionDeclaration>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
	pub name: String,
	pub description: Option<String>,
	pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
	pub function_calling_config: FunctionCallingConfig,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
	pub mode: FunctionCallingMode,
	pub allowed_function_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FunctionCallingMode {
	#[serde(rename = "AUTO")]
	Auto,
	#[serde(rename = "ANY")]
	Any,
	#[serde(rename = "NONE")]
	None,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
	pub temperature: f64,
	pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
	pub thinking_budget: u32,
	pub include_thoughts: bool,
}
