//! Admin password-grant authenticator backed by reqwest.

// self
use crate::{
	_prelude::*,
	auth::{AuthFuture, Authenticator, Credential, TokenSecret},
	error::{AuthError, TransportError},
};

/// Posts `{username, password, grant_type=password}` to the admin token endpoint.
#[derive(Clone)]
pub struct PasswordAuthenticator {
	http: ReqwestClient,
	token_url: Url,
	username: String,
	password: TokenSecret,
}
impl PasswordAuthenticator {
	/// Creates an authenticator for the provided token endpoint and admin account.
	pub fn new(
		http: ReqwestClient,
		token_url: Url,
		username: impl Into<String>,
		password: TokenSecret,
	) -> Self {
		Self { http, token_url, username: username.into(), password }
	}

	async fn request_token(&self) -> Result<Credential, AuthError> {
		let form = [
			("username", self.username.as_str()),
			("password", self.password.expose()),
			("grant_type", "password"),
		];
		let response = self
			.http
			.post(self.token_url.clone())
			.form(&form)
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let body = response.text().await.map_err(TransportError::from)?;

		if !status.is_success() {
			return Err(AuthError::Rejected { status: status.as_u16(), body });
		}

		Credential::from_token_response(&body, status.as_u16(), OffsetDateTime::now_utc())
	}
}
impl Authenticator for PasswordAuthenticator {
	fn authenticate(&self) -> AuthFuture<'_> {
		Box::pin(self.request_token())
	}
}
impl Debug for PasswordAuthenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PasswordAuthenticator")
			.field("token_url", &self.token_url.as_str())
			.field("username", &self.username)
			.field("password", &self.password)
			.finish()
	}
}
