//! Command-line and environment configuration.

// std
use std::net::SocketAddr;
// crates.io
use clap::{ArgAction, Parser, builder::BoolishValueParser};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Runtime configuration; every flag can also be supplied through the environment.
#[derive(Clone, Debug, Parser)]
#[command(name = "emergency-grant", version, about)]
pub struct Config {
	/// Base URL of the upstream panel.
	#[arg(long, env = "MARZBAN_BASE_URL")]
	pub base_url: Url,
	/// Admin account used to obtain bearer tokens.
	#[arg(long, env = "MARZBAN_ADMIN_USERNAME")]
	pub admin_username: String,
	/// Admin account password.
	#[arg(long, env = "MARZBAN_ADMIN_PASSWORD", hide_env_values = true, value_parser = parse_secret)]
	pub admin_password: TokenSecret,
	/// Verify the upstream TLS certificate.
	#[arg(
		long,
		env = "MARZBAN_VERIFY_SSL",
		default_value_t = false,
		action = ArgAction::Set,
		value_parser = BoolishValueParser::new(),
	)]
	pub verify_tls: bool,
	/// Grant ledger file; its directory is created at startup.
	#[arg(long, env = "EMERGENCY_STORE_PATH", default_value = "/var/lib/marzban/emergency_flags.json")]
	pub store_path: PathBuf,
	/// Address the HTTP API listens on.
	#[arg(long, env = "EMERGENCY_LISTEN", default_value = "0.0.0.0:8000")]
	pub listen: SocketAddr,
	/// Timeout applied to every upstream call, in seconds.
	#[arg(long, env = "MARZBAN_TIMEOUT_SECS", default_value_t = 10)]
	pub upstream_timeout_secs: u64,
	/// Emit JSON logs instead of human-readable ones.
	#[arg(
		long,
		env = "EMERGENCY_LOG_JSON",
		action = ArgAction::SetTrue,
		value_parser = BoolishValueParser::new(),
	)]
	pub log_json: bool,
}
impl Config {
	/// Builds the reqwest client shared by the authenticator and the upstream client.
	pub fn http_client(&self) -> Result<ReqwestClient, ConfigError> {
		let timeout = std::time::Duration::from_secs(self.upstream_timeout_secs);
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.connect_timeout(timeout)
			.danger_accept_invalid_certs(!self.verify_tls)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(client)
	}
}

fn parse_secret(value: &str) -> Result<TokenSecret, String> {
	Ok(TokenSecret::new(value))
}
