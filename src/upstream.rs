//! Authenticated client for the upstream panel's admin API.
//!
//! Every call obtains a bearer token from the shared [`CredentialCache`]. A `401` response
//! invalidates that token, forces one refresh, and retries the request exactly once; any other
//! non-accepted status (including a second `401`) surfaces as [`UpstreamError::Status`]. Nothing
//! else is retried, since replaying a mutating `PUT` blindly is unsafe.

pub mod user;

pub use user::*;

// crates.io
use reqwest::{Method, header::CONTENT_TYPE};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{CredentialCache, TokenSecret},
	error::{ConfigError, TransportError, UpstreamError},
};

/// Statuses accepted from a `GET`.
const GET_ACCEPTED: &[StatusCode] = &[StatusCode::OK];
/// Statuses accepted from a `PUT`.
const PUT_ACCEPTED: &[StatusCode] = &[StatusCode::OK, StatusCode::NO_CONTENT];

/// Bearer-authenticated upstream client with a single transparent retry on `401`.
#[derive(Clone)]
pub struct UpstreamClient {
	http: ReqwestClient,
	base_url: Url,
	credentials: Arc<CredentialCache>,
}
impl UpstreamClient {
	/// Creates a client rooted at `base_url`.
	pub fn new(
		http: ReqwestClient,
		base_url: Url,
		credentials: Arc<CredentialCache>,
	) -> Result<Self, ConfigError> {
		if base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: base_url.into() });
		}

		Ok(Self { http, base_url, credentials })
	}

	/// Resolves path segments against the base URL, percent-encoding each segment.
	pub fn endpoint(&self, segments: &[&str]) -> Url {
		endpoint(&self.base_url, segments)
	}

	/// Performs an authenticated `GET` and returns the parsed JSON body.
	pub async fn get(&self, segments: &[&str]) -> Result<Value> {
		let url = self.endpoint(segments);
		let body = self.send(Method::GET, &url, None, GET_ACCEPTED).await?;

		serde_json::from_str(&body)
			.map_err(|source| UpstreamError::Decode { path: url.path().to_owned(), source }.into())
	}

	/// Performs an authenticated JSON `PUT`.
	pub async fn put<T>(&self, segments: &[&str], payload: &T) -> Result<()>
	where
		T: ?Sized + Serialize,
	{
		let url = self.endpoint(segments);
		let body = serde_json::to_vec(payload).map_err(|source| UpstreamError::Encode {
			path: url.path().to_owned(),
			source,
		})?;

		self.send(Method::PUT, &url, Some(body), PUT_ACCEPTED).await?;

		Ok(())
	}

	/// Reads the quota attributes of `username`.
	pub async fn fetch_user(&self, username: &str) -> Result<UpstreamUser> {
		let body = self.get(&["api", "user", username]).await?;

		Ok(UpstreamUser::from_json(&body))
	}

	/// Writes new quota attributes for `username`.
	pub async fn update_user(&self, username: &str, quota: &UserQuota) -> Result<()> {
		self.put(&["api", "user", username], quota).await
	}

	async fn send(
		&self,
		method: Method,
		url: &Url,
		body: Option<Vec<u8>>,
		accepted: &[StatusCode],
	) -> Result<String> {
		let token = self.credentials.token().await?;
		let (mut status, mut text) = self.dispatch(&method, url, body.clone(), &token).await?;

		if status == StatusCode::UNAUTHORIZED {
			tracing::debug!(%method, path = url.path(), "Upstream rejected the bearer token; refreshing once.");
			self.credentials.invalidate(&token);

			let token = self.credentials.token().await?;

			(status, text) = self.dispatch(&method, url, body, &token).await?;
		}

		if !accepted.contains(&status) {
			return Err(UpstreamError::Status {
				method: method.to_string(),
				path: url.path().to_owned(),
				status: status.as_u16(),
				body: text,
			}
			.into());
		}

		Ok(text)
	}

	async fn dispatch(
		&self,
		method: &Method,
		url: &Url,
		body: Option<Vec<u8>>,
		token: &TokenSecret,
	) -> Result<(StatusCode, String), UpstreamError> {
		let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(token.expose());

		if let Some(body) = body {
			request = request.header(CONTENT_TYPE, "application/json").body(body);
		}

		let response = request.send().await.map_err(TransportError::from)?;
		let status = response.status();
		let text = response.text().await.map_err(TransportError::from)?;

		Ok((status, text))
	}
}
impl Debug for UpstreamClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UpstreamClient")
			.field("base_url", &self.base_url.as_str())
			.field("credentials", &self.credentials)
			.finish()
	}
}

/// Resolves path segments against `base`, keeping any path prefix the base already carries.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
	let mut url = base.clone();

	if let Ok(mut path) = url.path_segments_mut() {
		path.pop_if_empty().extend(segments);
	}

	url
}
