//! Project discovery / onboarding handshake (§4.7).
//!
//! A one-shot protocol run when no project id is configured: try
//! `loadCodeAssist` first, and only fall through to the `onboardUser` poll
//! loop if that call does not already resolve a project. The result is
//! cached on the owning [`UpstreamClient`] instance.

use crate::error::{Error, Result};
use crate::upstream::client::UpstreamClient;
use serde_json::{Value, json};
use std::time::Duration;

const DEFAULT_PROJECT_PLACEHOLDER: &str = "default-project";
const ONBOARD_POLL_ATTEMPTS: u32 = 30;
const ONBOARD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A tier entry from `loadCodeAssist`'s `allowedTiers`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Tier {
	pub id: String,
	#[serde(rename = "isDefault", default)]
	pub is_default: bool,
}

impl UpstreamClient {
	/// Resolve the effective project id, running the onboarding handshake at
	/// most once. Subsequent calls return the cached value.
	pub async fn resolve_project(&self) -> Result<String> {
		if let Some(project) = self.current_project().await {
			return Ok(project);
		}

		let load_response = self
			.call_endpoint(
				"loadCodeAssist",
				json!({"cloudaicompanionProject": DEFAULT_PROJECT_PLACEHOLDER, "metadata": {"duetProject": DEFAULT_PROJECT_PLACEHOLDER}}),
			)
			.await?;

		if let Some(project) = load_response.get("cloudaicompanionProject").and_then(Value::as_str) {
			self.set_project(project.to_string()).await;
			return Ok(project.to_string());
		}

		let tier_id = pick_tier(&load_response);
		let project = self.onboard_user_poll(&tier_id).await?;
		self.set_project(project.clone()).await;
		Ok(project)
	}

	async fn onboard_user_poll(&self, tier_id: &str) -> Result<String> {
		for attempt in 0..ONBOARD_POLL_ATTEMPTS {
			let response = self
				.call_endpoint("onboardUser", json!({"tierId": tier_id, "cloudaicompanionProject": DEFAULT_PROJECT_PLACEHOLDER}))
				.await?;

			if response.get("done").and_then(Value::as_bool).unwrap_or(false) {
				let project = response
					.pointer("/response/cloudaicompanionProject/id")
					.and_then(Value::as_str)
					.unwrap_or(DEFAULT_PROJECT_PLACEHOLDER);
				return Ok(project.to_string());
			}

			tracing::debug!("onboarding not yet done, polling again (attempt {attempt}, tier {tier_id})");
			tokio::time::sleep(ONBOARD_POLL_INTERVAL).await;
		}
		Err(Error::OnboardingTimeout { attempts: ONBOARD_POLL_ATTEMPTS })
	}
}

fn pick_tier(load_response: &Value) -> String {
	let tiers: Vec<Tier> = load_response
		.get("allowedTiers")
		.and_then(|v| serde_json::from_value::<Vec<Tier>>(v.clone()).ok())
		.unwrap_or_default();
	tiers.into_iter().find(|t| t.is_default).map(|t| t.id).unwrap_or_else(|| "free-tier".to_string())
}
