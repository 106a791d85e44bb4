//! Upstream model tables: canonical names, the thinking-enabled set, and the
//! reasoning-effort -> thinking-budget map.
//!
//! Mirrors the shape of a provider's model table (c.f. the Gemini adapter's
//! `MODELS`/reasoning constants), but scoped to Code Assist's small surface
//! rather than a general catalog.

/// Default model used when the caller's `model` field is empty or unrecognized.
pub const DEFAULT_THINKING_MODEL: &str = "gemini-2.5-pro";

/// Upstream model identifiers this proxy knows about.
pub const KNOWN_MODELS: &[&str] = &[
	"gemini-2.5-pro",
	"gemini-2.5-flash",
	"gemini-2.5-flash-lite",
];

/// Models for which `thinkingConfig` is mandatory.
const THINKING_MODELS: &[&str] = &["gemini-2.5-pro", "gemini-2.5-flash"];

/// Default generation temperature when the caller does not specify one.
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Default endpoint for the Code Assist backend.
pub const DEFAULT_ENDPOINT: &str = "https://cloudcode-pa.googleapis.com/";

/// API version segment used in `{endpoint}/{version}:{method}`.
pub const DEFAULT_API_VERSION: &str = "v1internal";

/// Resolve a caller-supplied model name to a canonical upstream model name.
///
/// Unknown names fall back to [`DEFAULT_THINKING_MODEL`] (§4.1 step 1).
pub fn resolve_model(requested: &str) -> &str {
	KNOWN_MODELS
		.iter()
		.find(|&&known| known == requested)
		.copied()
		.unwrap_or(DEFAULT_THINKING_MODEL)
}

/// Whether `thinkingConfig` is mandatory for this (already-resolved) model.
pub fn is_thinking_model(model: &str) -> bool {
	THINKING_MODELS.contains(&model)
}

/// Caller-facing reasoning effort, accepted either top-level or nested under
/// `reasoning.effort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
	Low,
	Medium,
	High,
}

/// `thinkingConfig` shape the translator needs to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingBudget {
	pub thinking_budget: u32,
	pub include_thoughts: bool,
}

/// Default thinking budget used for thinking models when no effort is given.
pub const DEFAULT_THINKING_BUDGET: ThinkingBudget = ThinkingBudget {
	thinking_budget: 8192,
	include_thoughts: true,
};

/// Maps a [`ReasoningEffort`] to its thinking budget (§4.1 step 8).
pub fn budget_for(effort: ReasoningEffort) -> ThinkingBudget {
	let thinking_budget = match effort {
		ReasoningEffort::Low => 1024,
		ReasoningEffort::Medium => 8192,
		ReasoningEffort::High => 24576,
	};
	ThinkingBudget {
		thinking_budget,
		include_thoughts: true,
	}
}
