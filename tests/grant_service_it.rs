// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::{OffsetDateTime, macros::datetime};
// self
use emergency_grant::{
	auth::{AuthFuture, Authenticator, Credential, CredentialCache},
	error::{Error, PolicyViolation, UpstreamError},
	grant::{BrowserEvidence, GrantAmount, GrantRequest, GrantService},
	reqwest::Client,
	store::{FileStore, GrantLedger, GrantRecord, GrantStore, MemoryStore},
	upstream::UpstreamClient,
	url::Url,
};

const NOW: i64 = 1_735_689_600;
const GIB: u64 = 1_073_741_824;
const DAY: u64 = 86_400;

struct StaticAuthenticator;
impl Authenticator for StaticAuthenticator {
	fn authenticate(&self) -> AuthFuture<'_> {
		Box::pin(async { Ok(Credential::new("token-1", datetime!(2100-01-01 00:00 UTC))) })
	}
}

/// Mirrors the service's `--verify-tls=false` client so the mock server's self-signed certificate
/// is accepted.
fn http_client() -> Client {
	Client::builder()
		.danger_accept_invalid_certs(true)
		.build()
		.expect("Test HTTP client should build.")
}

fn fixed_now() -> OffsetDateTime {
	datetime!(2025-01-01 00:00 UTC)
}

fn service(server: &MockServer, store: Arc<dyn GrantStore>) -> GrantService {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let credentials = Arc::new(CredentialCache::new(Arc::new(StaticAuthenticator)));
	let upstream =
		UpstreamClient::new(http_client(), base, credentials).expect("Upstream client should build.");

	GrantService::new(Arc::new(upstream), store).with_clock(fixed_now)
}

fn request(username: &str) -> GrantRequest {
	GrantRequest {
		username: username.into(),
		amount: GrantAmount { add_bytes: GIB, add_seconds: DAY },
		evidence: BrowserEvidence::origin("https://captive.example.com"),
	}
}

fn granted_record() -> GrantRecord {
	GrantRecord {
		used: true,
		granted_at: NOW,
		saved_data_limit: 500_000_000,
		saved_expire: 0,
		granted_data_limit: 1_573_741_824,
		granted_expire: NOW + DAY as i64,
	}
}

#[tokio::test]
async fn grant_applies_once_and_records_snapshot() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = service(&server, Arc::new(store.clone()));
	let get = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({ "data_limit": 500_000_000, "expire": null }));
		})
		.await;
	let put = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/user/alice").json_body(json!({
				"data_limit": 1_573_741_824_i64,
				"expire": NOW + DAY as i64,
			}));
			then.status(200).json_body(json!({}));
		})
		.await;
	let receipt = service.grant(request("alice")).await.expect("First grant should succeed.");

	assert!(receipt.ok);
	assert_eq!(receipt.username, "alice");
	assert_eq!(store.snapshot().get("alice"), Some(&granted_record()));

	let err = service.grant(request("alice")).await.expect_err("Second grant must be refused.");

	assert!(matches!(err, Error::Policy(PolicyViolation::AlreadyUsed { .. })));

	get.assert_calls_async(1).await;
	put.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_grants_for_one_user_write_upstream_once() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = Arc::new(service(&server, Arc::new(store.clone())));
	let get = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({ "data_limit": 10, "expire": 0 }));
		})
		.await;
	let put = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/user/alice");
			then.status(200).json_body(json!({}));
		})
		.await;
	let handles = (0..4)
		.map(|_| {
			let service = service.clone();

			tokio::spawn(async move { service.grant(request("alice")).await })
		})
		.collect::<Vec<_>>();
	let mut granted = 0;
	let mut refused = 0;

	for handle in handles {
		match handle.await.expect("Grant task should not panic.") {
			Ok(_) => granted += 1,
			Err(Error::Policy(PolicyViolation::AlreadyUsed { .. })) => refused += 1,
			Err(other) => panic!("Unexpected grant error: {other:?}."),
		}
	}

	assert_eq!(granted, 1);
	assert_eq!(refused, 3);
	assert!(store.snapshot().is_used("alice"));

	get.assert_calls_async(1).await;
	put.assert_calls_async(1).await;
}

#[tokio::test]
async fn grants_for_different_users_keep_both_records() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = Arc::new(service(&server, Arc::new(store.clone())));

	for username in ["alice", "bob"] {
		let path = format!("/api/user/{username}");

		server
			.mock_async(|when, then| {
				when.method(GET).path(path.as_str());
				then.status(200).json_body(json!({ "data_limit": 0, "expire": 0 }));
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(PUT).path(path.as_str());
				then.status(200).json_body(json!({}));
			})
			.await;
	}

	let (a, b) = tokio::join!(service.grant(request("alice")), service.grant(request("bob")));

	a.expect("Grant for alice should succeed.");
	b.expect("Grant for bob should succeed.");

	let ledger = store.snapshot();

	assert!(ledger.is_used("alice"));
	assert!(ledger.is_used("bob"));
}

#[tokio::test]
async fn missing_browser_evidence_is_refused_before_upstream() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = service(&server, Arc::new(store.clone()));
	let any = server
		.mock_async(|when, then| {
			when.path("/api/user/alice");
			then.status(200).json_body(json!({}));
		})
		.await;
	let mut request = request("alice");

	request.evidence = BrowserEvidence { referer: Some(String::new()), origin: None };

	let err = service.grant(request).await.expect_err("Grant without evidence must fail.");

	assert!(matches!(err, Error::Policy(PolicyViolation::MissingBrowserOrigin)));
	assert!(store.snapshot().is_empty());

	any.assert_calls_async(0).await;
}

#[tokio::test]
async fn failed_upstream_write_records_nothing() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = service(&server, Arc::new(store.clone()));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({ "data_limit": 1, "expire": 1 }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/user/alice");
			then.status(500).body("database locked");
		})
		.await;

	let err = service.grant(request("alice")).await.expect_err("Failed PUT must fail the grant.");

	match err {
		Error::Upstream(UpstreamError::Status { method, status, body, .. }) => {
			assert_eq!(method, "PUT");
			assert_eq!(status, 500);
			assert_eq!(body, "database locked");
		},
		other => panic!("Unexpected grant error: {other:?}."),
	}

	assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn failed_upstream_read_records_nothing() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = service(&server, Arc::new(store.clone()));
	let put = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/user/ghost");
			then.status(200);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/ghost");
			then.status(404).body("{\"detail\":\"User not found\"}");
		})
		.await;

	let err = service.grant(request("ghost")).await.expect_err("Unknown user must fail.");

	assert!(matches!(err, Error::Upstream(UpstreamError::Status { status: 404, .. })));
	assert!(store.snapshot().is_empty());

	put.assert_calls_async(0).await;
}

#[tokio::test]
async fn future_expiry_is_extended_from_itself() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let service = service(&server, Arc::new(store.clone()));
	let expire = NOW + 10 * DAY as i64;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({ "data_limit": "2048", "expire": expire }));
		})
		.await;

	let put = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/api/user/alice")
				.json_body(json!({ "data_limit": 2048 + 1024, "expire": expire + 3600 }));
			then.status(204);
		})
		.await;
	let mut request = request("alice");

	request.amount = GrantAmount { add_bytes: 1024, add_seconds: 3600 };

	service.grant(request).await.expect("Grant should succeed.");

	put.assert_async().await;
}

#[tokio::test]
async fn check_reports_unused_without_upstream_call() {
	let server = MockServer::start_async().await;
	let service = service(&server, Arc::new(MemoryStore::default()));
	let any = server
		.mock_async(|when, then| {
			when.path("/api/user/alice");
			then.status(200).json_body(json!({}));
		})
		.await;
	let report = service.check("alice").await.expect("Check should succeed.");

	assert_eq!(report.username, "alice");
	assert!(!report.used);
	assert_eq!(report.renewed, None);
	assert_eq!(report.record, None);

	any.assert_calls_async(0).await;
}

#[tokio::test]
async fn check_keeps_record_while_upstream_holds_granted_values() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::with_ledger(GrantLedger::from_iter([("alice".into(), granted_record())]));
	let service = service(&server, Arc::new(store.clone()));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({
				"data_limit": 1_573_741_824_i64,
				"expire": NOW + DAY as i64,
			}));
		})
		.await;

	let report = service.check("alice").await.expect("Check should succeed.");

	assert!(report.used);
	assert_eq!(report.record, Some(granted_record()));
	assert!(store.snapshot().is_used("alice"));
}

#[tokio::test]
async fn check_clears_record_after_upstream_renewal() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::with_ledger(GrantLedger::from_iter([("alice".into(), granted_record())]));
	let service = service(&server, Arc::new(store.clone()));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({
				"data_limit": 1_573_741_824_i64,
				"expire": NOW + 31 * DAY as i64,
			}));
		})
		.await;

	let report = service.check("alice").await.expect("Check should succeed.");

	assert!(!report.used);
	assert_eq!(report.renewed, Some(true));
	assert!(store.snapshot().get("alice").is_none());
}

#[tokio::test]
async fn check_reports_used_when_upstream_is_unreachable() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::with_ledger(GrantLedger::from_iter([("alice".into(), granted_record())]));
	let service = service(&server, Arc::new(store.clone()));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(502).body("bad gateway");
		})
		.await;

	let report = service.check("alice").await.expect("Check should fold upstream errors.");

	assert!(report.used);
	assert_eq!(report.record, None);
	assert!(report.error.as_deref().is_some_and(|e| e.contains("502")));
	assert!(store.snapshot().is_used("alice"));
}

#[tokio::test]
async fn grant_persists_to_file_store() {
	let server = MockServer::start_async().await;
	let dir = std::env::temp_dir().join(format!(
		"emergency-grant-it-{}-{}",
		std::process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	));
	let path = dir.join("emergency_flags.json");
	let store = FileStore::open(&path).expect("File store should open.");
	let service = service(&server, Arc::new(store.clone()));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user/alice");
			then.status(200).json_body(json!({ "data_limit": 500_000_000, "expire": 0 }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/user/alice");
			then.status(200).json_body(json!({}));
		})
		.await;
	service.grant(request("alice")).await.expect("Grant should succeed.");

	let reopened = FileStore::open(&path).expect("File store should reopen.");

	assert_eq!(reopened.load().await.get("alice"), Some(&granted_record()));
	assert!(!store.temp_path().exists());

	let _ = std::fs::remove_dir_all(dir);
}
