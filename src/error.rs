use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Translation (caller dialect -> Gemini dialect) is total and never
/// produces an `Error` — malformed input is coerced per the translator's
/// rules instead. The variants here are the failures that can only occur
/// once the proxy talks to the network or to disk.
#[derive(Debug, From)]
pub enum Error {
	/// The upstream responded with a non-2xx status.
	Upstream { status: u16, body: String },

	/// The onboarding poll loop exceeded its attempt budget without
	/// observing `done: true`.
	OnboardingTimeout { attempts: u32 },

	/// A `TokenSource` could not produce a bearer token.
	TokenUnavailable { cause: String },

	/// The fallback coordinator retried and the fallback attempt also
	/// failed; carries the original error's status for diagnostics.
	FallbackExhausted { original_status: u16 },

	/// The signature cache's durable file could not be read or written.
	#[from]
	CacheIo(std::io::Error),

	/// The signature cache's durable file contained invalid JSON.
	#[from]
	CacheCorrupt(serde_json::Error),

	/// Transport-level failure talking to the upstream (connection reset,
	/// TLS failure, truncated body, etc.).
	#[from]
	Transport(reqwest::Error),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for Error {
	fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
