//! JSON-Schema -> Gemini parameter mapper.
//!
//! Gemini's `functionDeclarations[].parameters` only accepts a restricted
//! subset of JSON Schema: no `additionalProperties`, no `$schema`, no
//! `const`, and no keyword-specific validation vocab beyond `type`,
//! `properties`, `items`, `required`, `enum`, `description`. Tool schemas
//! declared by OpenAI-dialect callers routinely carry the wider vocabulary
//! (JSON Schema draft 2020-12 via most SDK codegen), so this walks the tree
//! and drops what Gemini rejects rather than erroring.

use serde_json::Value;
use value_ext::JsonValueExt;

/// Keys Gemini's schema validator does not accept anywhere in the tree.
const UNSUPPORTED_KEYS: &[&str] = &["additionalProperties", "$schema", "title", "default", "examples", "const"];

/// Normalize a caller-supplied JSON Schema into the subset Gemini accepts.
///
/// A missing/empty schema maps to `{}` (§4.1 step 6). The walk is
/// recursive and non-failing: unrecognized structure is left as-is rather
/// than rejected, since Gemini will simply ignore keys it does not
/// understand as long as the disallowed ones above are gone.
pub fn to_gemini_parameters(schema: Option<&Value>) -> Value {
	let Some(schema) = schema else {
		return serde_json::json!({});
	};
	if schema.is_null() {
		return serde_json::json!({});
	}

	let mut schema = schema.clone();
	schema.x_walk(|parent_map, name| {
		if UNSUPPORTED_KEYS.contains(&name) {
			parent_map.remove(name);
		}
		true
	});
	schema
}
