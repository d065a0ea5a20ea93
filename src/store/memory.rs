//! Thread-safe in-memory [`GrantStore`] implementation for tests and embedding.

// self
use crate::{
	_prelude::*,
	store::{GrantLedger, GrantStore, StoreError, StoreFuture},
};

/// Storage backend that keeps the ledger in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<GrantLedger>>);
impl MemoryStore {
	/// Creates a store pre-populated with `ledger`.
	pub fn with_ledger(ledger: GrantLedger) -> Self {
		Self(Arc::new(RwLock::new(ledger)))
	}

	/// Returns a copy of the current ledger without going through the async contract.
	pub fn snapshot(&self) -> GrantLedger {
		self.0.read().clone()
	}
}
impl GrantStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, GrantLedger> {
		let map = self.0.clone();

		Box::pin(async move { map.read().clone() })
	}

	fn save<'a>(&'a self, ledger: &'a GrantLedger) -> StoreFuture<'a, Result<(), StoreError>> {
		let map = self.0.clone();

		Box::pin(async move {
			*map.write() = ledger.clone();

			Ok(())
		})
	}
}
