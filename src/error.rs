//! Service-level error types shared across the credential cache, upstream client, and stores.

// self
use crate::_prelude::*;

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Authentication against the upstream panel failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Upstream resource call failed after the allowed retry.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Grant ledger could not be persisted.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Request was refused before any upstream call.
	#[error(transparent)]
	Policy(#[from] PolicyViolation),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Configuration and startup failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Upstream base URL cannot carry path segments.
	#[error("Upstream base URL `{url}` cannot be used as a base.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while obtaining an admin bearer token.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the credentials with status {status}: {body}")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// Token endpoint succeeded without an `access_token`.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint returned an `exp`/`expires_in` outside the supported range.
	#[error("Token expiry exceeds the supported range.")]
	ExpiryOutOfRange,
	/// Network failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Failures raised by authenticated resource calls.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Resource call finished with a status outside the accepted set.
	#[error("{method} {path} failed: {status} {body}")]
	Status {
		/// HTTP method of the failed call.
		method: String,
		/// Request path.
		path: String,
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// Successful response carried a body that is not JSON.
	#[error("{path} returned a body that is not valid JSON.")]
	Decode {
		/// Request path.
		path: String,
		/// Parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Request payload could not be encoded as JSON.
	#[error("Failed to encode the request body for {path}.")]
	Encode {
		/// Request path.
		path: String,
		/// Encoding failure.
		#[source]
		source: serde_json::Error,
	},
	/// Network failure while calling the resource endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Grant preconditions that reject a request before any upstream call.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PolicyViolation {
	/// Request carried neither a `Referer` nor an `Origin` header.
	#[error("Forbidden")]
	MissingBrowserOrigin,
	/// The emergency grant was already applied to this user.
	#[error("Already used")]
	AlreadyUsed {
		/// User the grant was requested for.
		username: String,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream panel: {source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
