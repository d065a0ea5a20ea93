//! Admin credential model, the refresh-serializing cache, and the password-grant authenticator.

pub mod cache;
pub mod credential;
pub mod password;
pub mod secret;

pub use cache::*;
pub use credential::*;
pub use password::*;
pub use secret::*;
