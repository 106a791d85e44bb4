//! Gemini `generateContent`/`streamGenerateContent` request/response shapes,
//! and the translator from the caller dialect into them.

mod translator;
mod types;

pub use translator::{TranslatedRequest, translate_request};
pub use types::{
	FunctionCallPart, FunctionDeclaration, FunctionResponsePart, GeminiContent, GeminiPart, GeminiRequest,
	GenerationConfig, InlineDataPart, TextPart, ThinkingConfig, ToolConfig, ToolDeclaration, UpstreamEnvelope,
};
