//! Authenticated upstream dispatch (§4.4) and the onboarding/project
//! discovery handshake (§4.7).

mod client;
mod onboarding;
mod token_source;

pub use client::UpstreamClient;
pub use onboarding::Tier;
pub use token_source::{EnvTokenSource, TokenSource};
