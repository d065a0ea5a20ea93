//! Storage contract and built-in grant ledger stores.

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::*;

// self
use crate::_prelude::*;

/// Boxed future returned by [`GrantStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Whole-ledger persistence contract.
///
/// `load` never fails: a missing, unreadable, or malformed backing store yields an empty ledger.
/// `save` replaces the stored ledger atomically, so a subsequent `load` observes either the
/// complete previous ledger or the complete new one.
pub trait GrantStore
where
	Self: Send + Sync,
{
	/// Reads the current ledger.
	fn load(&self) -> StoreFuture<'_, GrantLedger>;

	/// Replaces the stored ledger with `ledger`.
	fn save<'a>(&'a self, ledger: &'a GrantLedger) -> StoreFuture<'a, Result<(), StoreError>>;
}

/// Error type produced by [`GrantStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
