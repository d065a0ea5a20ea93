//! HTTP surface: `GET /emergency/{username}` and `POST /emergency/{username}/grant`.
//!
//! The router answers any origin, method, and header because it is called from a captive
//! browser page served elsewhere.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Json, Router,
	extract::{Path as UrlPath, State},
	http::{
		HeaderMap, HeaderName,
		header::{ORIGIN, REFERER},
	},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialCache, PasswordAuthenticator},
	config::Config,
	error::PolicyViolation,
	grant::{BrowserEvidence, CheckReport, GrantAmount, GrantReceipt, GrantRequest, GrantService},
	store::FileStore,
	upstream::UpstreamClient,
};

type SharedState = Arc<GrantService>;

/// Wires the credential cache, upstream client, file store, and grant service from `config`.
pub fn build_service(config: &Config) -> Result<GrantService> {
	let http = config.http_client()?;
	let authenticator = PasswordAuthenticator::new(
		http.clone(),
		crate::upstream::endpoint(&config.base_url, &["api", "admin", "token"]),
		config.admin_username.clone(),
		config.admin_password.clone(),
	);
	let credentials = Arc::new(CredentialCache::new(Arc::new(authenticator)));
	let upstream = UpstreamClient::new(http, config.base_url.clone(), credentials)?;
	let store = FileStore::open(&config.store_path)?;

	tracing::info!(store = %store.path().display(), "Grant store ready.");

	Ok(GrantService::new(Arc::new(upstream), Arc::new(store)))
}

/// Builds the router with permissive CORS and request tracing.
pub fn router(service: Arc<GrantService>) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/emergency/{username}", get(check))
		.route("/emergency/{username}/grant", post(grant))
		.with_state(service)
		.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
		.layer(TraceLayer::new_for_http())
}

/// Serves the router on `addr` until `shutdown` resolves.
pub async fn serve(
	addr: SocketAddr,
	service: Arc<GrantService>,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
	let listener = TcpListener::bind(addr).await?;

	tracing::info!(addr = %listener.local_addr()?, "Emergency grant API listening.");

	axum::serve(listener, router(service)).with_graceful_shutdown(shutdown).await
}

async fn health() -> impl IntoResponse {
	Json(json!({ "status": "ok" }))
}

async fn check(
	State(service): State<SharedState>,
	UrlPath(username): UrlPath<String>,
) -> Result<Json<CheckReport>, ApiError> {
	Ok(Json(service.check(&username).await?))
}

async fn grant(
	State(service): State<SharedState>,
	UrlPath(username): UrlPath<String>,
	headers: HeaderMap,
	Json(amount): Json<GrantAmount>,
) -> Result<Json<GrantReceipt>, ApiError> {
	let evidence = browser_evidence(&headers);
	let receipt = service.grant(GrantRequest { username, amount, evidence }).await?;

	Ok(Json(receipt))
}

/// Collects `Referer`/`Origin`; any non-empty raw value counts, including non-ASCII bytes.
fn browser_evidence(headers: &HeaderMap) -> BrowserEvidence {
	let header = |name: HeaderName| {
		headers.get(name).map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
	};

	BrowserEvidence { referer: header(REFERER), origin: header(ORIGIN) }
}

/// Maps service errors onto HTTP responses with a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError(Error);
impl ApiError {
	/// HTTP status for the wrapped error.
	pub fn status(&self) -> StatusCode {
		match &self.0 {
			Error::Policy(PolicyViolation::MissingBrowserOrigin) => StatusCode::FORBIDDEN,
			Error::Policy(PolicyViolation::AlreadyUsed { .. }) => StatusCode::BAD_REQUEST,
			Error::Auth(_) | Error::Upstream(_) => StatusCode::BAD_GATEWAY,
			Error::Storage(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		Self(err)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();

		if status.is_server_error() {
			tracing::error!(error = %self.0, "Request failed.");
		}

		(status, Json(json!({ "detail": self.0.to_string() }))).into_response()
	}
}
