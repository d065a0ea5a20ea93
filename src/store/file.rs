//! JSON file-backed [`GrantStore`] with atomic replace-on-save.

// std
use std::{
	fs::{self, File},
	io::Write,
};
// self
use crate::{
	_prelude::*,
	store::{GrantLedger, GrantStore, StoreError, StoreFuture},
};

/// Persists the grant ledger to a single JSON file.
///
/// Every `load` re-reads the file so other writers sharing it are observed. Saves write a
/// sibling temporary file, fsync it, and rename it over the target; saves issued by one
/// process are serialized.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	write_guard: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens a store at the provided path, creating its parent directory if absent.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path, write_guard: Default::default() })
	}

	/// Path of the backing JSON file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Sibling path used for in-progress writes.
	pub fn temp_path(&self) -> PathBuf {
		let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

		name.push(".tmp");

		self.path.with_file_name(name)
	}

	fn load_snapshot(path: &Path) -> GrantLedger {
		let bytes = match fs::read(path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return GrantLedger::default(),
			Err(e) => {
				tracing::warn!(path = %path.display(), error = %e, "Grant store is unreadable; treating it as empty.");

				return GrantLedger::default();
			},
		};

		if bytes.is_empty() {
			return GrantLedger::default();
		}

		GrantLedger::from_json(&bytes).unwrap_or_else(|e| {
			tracing::warn!(path = %path.display(), error = %e, "Grant store is malformed; treating it as empty.");

			GrantLedger::default()
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, ledger: &GrantLedger) -> Result<(), StoreError> {
		let _writer = self.write_guard.lock();

		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&ledger.to_document()).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize grant ledger: {e}") }
		})?;
		let tmp_path = self.temp_path();

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl GrantStore for FileStore {
	fn load(&self) -> StoreFuture<'_, GrantLedger> {
		Box::pin(async move { Self::load_snapshot(&self.path) })
	}

	fn save<'a>(&'a self, ledger: &'a GrantLedger) -> StoreFuture<'a, Result<(), StoreError>> {
		Box::pin(async move { self.persist(ledger) })
	}
}
