//! Cross-module scenarios from the conversation round-trip: caller request in,
//! upstream envelope out, and back, exercising more than one module per test
//! the way a unit test for a single module cannot.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use gca_proxy_core::cache::SignatureCache;
use gca_proxy_core::chat::{
	ChatRequest, ChatRole, FunctionDef, Message, MessageContent, ToolCall, ToolCallFunction, ToolChoice, ToolChoiceFunction, ToolDef,
};
use gca_proxy_core::fallback::{FallbackCoordinator, FallbackTable};
use gca_proxy_core::gemini::{GeminiPart, translate_request};
use gca_proxy_core::response::build_chat_response;
use gca_proxy_core::sse::SseStream;
use gca_proxy_core::stream::ResponseTransformer;
use std::sync::Arc;

fn cache() -> SignatureCache {
	let dir = tempfile::tempdir().unwrap();
	SignatureCache::open(dir.path().join("cache.json")).unwrap()
}

fn plain_message(role: ChatRole, content: &str) -> Message {
	Message {
		role,
		content: Some(MessageContent::Text(content.to_string())),
		tool_calls: None,
		tool_call_id: None,
		thinking: None,
		signature: None,
		cot_summary: None,
		cot_id: None,
		reasoning_text: None,
		reasoning_opaque: None,
	}
}

fn bare_request(messages: Vec<Message>) -> ChatRequest {
	ChatRequest {
		model: "gemini-2.5-pro".into(),
		messages,
		temperature: None,
		stream: None,
		reasoning_effort: None,
		reasoning: None,
		tools: None,
		tool_choice: None,
	}
}

/// S1: a plain user prompt translates into the exact envelope shape, wired
/// with the project id the caller supplies.
#[test]
fn s1_simple_user_prompt_produces_expected_envelope() {
	let chat = bare_request(vec![plain_message(ChatRole::User, "Hello world")]);
	let translated = translate_request(&chat, &cache());
	let envelope = translated.into_upstream_envelope("test");

	let json = serde_json::to_value(&envelope).unwrap();
	assert_eq!(json["project"], "test");
	assert_eq!(json["request"]["contents"][0]["role"], "user");
	assert_eq!(json["request"]["contents"][0]["parts"][0]["text"], "Hello world");
	assert_eq!(json["request"]["generationConfig"]["temperature"], 1.0);
	assert_eq!(json["request"]["generationConfig"]["thinkingConfig"]["thinkingBudget"], 8192);
	assert_eq!(json["request"]["generationConfig"]["thinkingConfig"]["includeThoughts"], true);
}

/// S3: a specific tool-choice becomes `mode: ANY` with the allow-list pinned
/// to that one function.
#[test]
fn s3_specific_tool_choice_pins_allowed_function_names() {
	let mut chat = bare_request(vec![plain_message(ChatRole::User, "call f")]);
	chat.tools = Some(vec![ToolDef { kind: "function".into(), function: FunctionDef { name: "f".into(), description: None, parameters: None } }]);
	chat.tool_choice = Some(ToolChoice::Function { function: ToolChoiceFunction { name: "f".into() } });

	let translated = translate_request(&chat, &cache());
	let tool_config = translated.body.tool_config.unwrap();
	assert_eq!(tool_config.function_calling_config.allowed_function_names, Some(vec!["f".to_string()]));
	let json = serde_json::to_value(tool_config).unwrap();
	assert_eq!(json["functionCallingConfig"]["mode"], "ANY");
}

/// A full two-turn conversation: the first turn's assistant message carries a
/// thinking block and a tool call which gets cached during translation; the
/// caller then sends back a tool result plus a fresh assistant turn that
/// relies on the cache (rather than inline reasoning) to recover the
/// signature, mirroring how a real client round-trips a tool call without
/// echoing back opaque reasoning fields it never saw (S5, across a full
/// two-request conversation instead of one seeded cache).
#[test]
fn two_turn_conversation_recovers_signature_from_first_turn_cache() {
	let shared_cache = cache();

	let turn_one_assistant = Message {
		role: ChatRole::Assistant,
		content: Some(MessageContent::Text("<thinking>I should call a function</thinking>".into())),
		tool_calls: Some(vec![ToolCall { id: "call_1".into(), kind: "function".into(), function: ToolCallFunction { name: "f".into(), arguments: "{}".into() } }]),
		tool_call_id: None,
		thinking: None,
		signature: None,
		cot_summary: None,
		cot_id: None,
		reasoning_text: None,
		reasoning_opaque: None,
	};
	let turn_one = bare_request(vec![plain_message(ChatRole::User, "call f please"), turn_one_assistant]);
	let _translated_one = translate_request(&turn_one, &shared_cache);
	// No thought_signature arrived from upstream on this turn, so nothing new is cached;
	// the cache only gains entries once an upstream reply actually carries a signature.
	assert!(shared_cache.get("call_1").is_none());

	// Simulate the upstream reply to turn one: a thought part with a signature
	// immediately followed by the function call, as in S5.
	let upstream_reply = serde_json::json!({
		"response": {"candidates": [{"content": {"parts": [
			{"text": "I should call a function", "thought": true, "thoughtSignature": "sig123"},
			{"functionCall": {"name": "f", "args": {}}}
		]}}]}
	});
	let response = build_chat_response(&upstream_reply, "chatcmpl-1", "gemini-2.5-pro", 0, &shared_cache);
	let minted_call_id = response.choices[0].message.tool_calls.as_ref().unwrap()[0].id.clone();
	assert!(shared_cache.get(&minted_call_id).is_some());

	// Turn two: caller echoes back the minted id's tool result and a fresh
	// assistant turn that re-uses it, without resending any reasoning text.
	let mut tool_result = plain_message(ChatRole::Tool, r#"{"ok":true}"#);
	tool_result.tool_call_id = Some(minted_call_id.clone());
	let turn_two_assistant = Message {
		role: ChatRole::Assistant,
		content: None,
		tool_calls: Some(vec![ToolCall {
			id: minted_call_id.clone(),
			kind: "function".into(),
			function: ToolCallFunction { name: "f".into(), arguments: "{}".into() },
		}]),
		tool_call_id: None,
		thinking: None,
		signature: None,
		cot_summary: None,
		cot_id: None,
		reasoning_text: None,
		reasoning_opaque: None,
	};
	let turn_two = bare_request(vec![turn_two_assistant, tool_result]);
	let translated_two = translate_request(&turn_two, &shared_cache);

	let model_turn = &translated_two.body.contents[0];
	match &model_turn.parts[0] {
		GeminiPart::Text(part) => {
			assert_eq!(part.thought_signature.as_deref(), Some("sig123"));
			assert_eq!(part.text, "I should call a function");
		}
		_ => panic!("expected recovered thought part first"),
	}
	match &model_turn.parts[1] {
		GeminiPart::FunctionCall(part) => assert_eq!(part.thought_signature.as_deref(), Some("sig123")),
		_ => panic!("expected function call part"),
	}
	let tool_turn = &translated_two.body.contents[1];
	match &tool_turn.parts[0] {
		GeminiPart::FunctionResponse(part) => assert_eq!(part.name, "f"),
		_ => panic!("expected function response part matched by id"),
	}
}

/// S6: the exact three-way fragmentation from the spec's streaming scenario,
/// split across arbitrary envelope boundaries that land mid-tag.
#[tokio::test]
async fn s6_streaming_splitter_survives_arbitrary_envelope_fragmentation() {
	fn text_envelope(text: &str) -> serde_json::Value {
		serde_json::json!({"response": {"candidates": [{"content": {"parts": [{"text": text}]}}]}})
	}

	let envelopes = vec![text_envelope("pre<thi"), text_envelope("nking>secret</thin"), text_envelope("king>post")];
	let cache = Arc::new(cache());
	let transformer = ResponseTransformer::new(stream::iter(envelopes), "chatcmpl-s6", "gemini-2.5-pro", 0, cache);
	let chunks: Vec<_> = transformer.collect().await;

	assert_eq!(chunks[0].choices[0].delta.role, Some("assistant"));
	assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some("pre"));
	assert_eq!(chunks[1].choices[0].delta.thinking.as_deref(), Some("secret"));
	assert_eq!(chunks[2].choices[0].delta.content.as_deref(), Some("post"));
	assert_eq!(chunks.last().unwrap().choices[0].finish_reason, Some("stop"));
}

/// The SSE line parser feeding straight into the chunk transformer, as the
/// upstream client wires them together, with a `data:` line split mid-chunk
/// right at a multi-byte JSON boundary.
#[tokio::test]
async fn sse_bytes_flow_through_transformer_into_chat_chunks() {
	fn sse_frame(text: &str) -> String {
		let envelope = serde_json::json!({"response": {"candidates": [{"content": {"parts": [{"text": text}]}}]}});
		format!("data: {}\n\n", envelope)
	}

	let first = sse_frame("hello ");
	let second = sse_frame("world");
	// Split the second frame awkwardly, mid payload.
	let split_at = second.len() / 2;
	let raw_chunks: Vec<reqwest::Result<Bytes>> =
		vec![Ok(Bytes::from(first)), Ok(Bytes::from(second[..split_at].to_string())), Ok(Bytes::from(second[split_at..].to_string()))];

	let sse = SseStream::new(stream::iter(raw_chunks));
	let cache = Arc::new(cache());
	let transformer = ResponseTransformer::new(sse, "chatcmpl-sse", "gemini-2.5-flash", 0, cache);
	let chunks: Vec<_> = transformer.collect().await;

	let visible: String = chunks.iter().filter_map(|c| c.choices[0].delta.content.clone()).collect();
	assert_eq!(visible, "hello world");
	assert_eq!(chunks.last().unwrap().choices[0].finish_reason, Some("stop"));
}

/// The fallback coordinator wrapping a non-streaming call whose payload is a
/// real `translate_request` envelope, confirming the coordinator's generic
/// bound composes with the actual request type rather than just `Value`.
#[tokio::test]
async fn fallback_coordinator_retries_real_translated_envelope_on_rate_limit() {
	use gca_proxy_core::error::Error;

	let chat = bare_request(vec![plain_message(ChatRole::User, "hi")]);
	let translated = translate_request(&chat, &cache());
	let envelope = translated.into_upstream_envelope("proj");

	let coordinator = FallbackCoordinator::new(FallbackTable::default());
	let attempts = std::sync::atomic::AtomicU32::new(0);
	let result = coordinator
		.call_non_streaming("gemini-2.5-pro", |model| {
			let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			let envelope = envelope.clone();
			async move {
				if n == 0 {
					assert_eq!(model, "gemini-2.5-pro");
					Err(Error::Upstream { status: 503, body: "busy".into() })
				} else {
					assert_eq!(model, "gemini-2.5-flash");
					Ok(envelope)
				}
			}
		})
		.await
		.unwrap();

	assert_eq!(result.0.model, "gemini-2.5-pro");
	assert!(result.1.unwrap().contains("gemini-2.5-flash"));
}
