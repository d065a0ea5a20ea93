//! Grant records, the in-memory ledger, and its versioned on-disk document.

// self
use crate::_prelude::*;

/// Snapshot of a single applied emergency grant.
///
/// `saved_*` hold the upstream values observed before the grant, `granted_*` the values written.
/// Timestamps and expiries are epoch seconds; `0` means unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
	/// Whether the one-time grant has been consumed.
	#[serde(default)]
	pub used: bool,
	/// Instant the grant was applied.
	#[serde(default)]
	pub granted_at: i64,
	/// Upstream data limit before the grant.
	#[serde(default)]
	pub saved_data_limit: i64,
	/// Upstream expiry before the grant.
	#[serde(default)]
	pub saved_expire: i64,
	/// Data limit written by the grant.
	#[serde(default)]
	pub granted_data_limit: i64,
	/// Expiry written by the grant.
	#[serde(default)]
	pub granted_expire: i64,
}

/// Mapping from username to its grant record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrantLedger(BTreeMap<String, GrantRecord>);
impl GrantLedger {
	/// Returns the record stored for `username`.
	pub fn get(&self, username: &str) -> Option<&GrantRecord> {
		self.0.get(username)
	}

	/// Returns `true` if `username` has a record marked used.
	pub fn is_used(&self, username: &str) -> bool {
		self.get(username).is_some_and(|record| record.used)
	}

	/// Inserts or replaces the record for `username`.
	pub fn insert(&mut self, username: impl Into<String>, record: GrantRecord) -> Option<GrantRecord> {
		self.0.insert(username.into(), record)
	}

	/// Removes the record for `username`.
	pub fn remove(&mut self, username: &str) -> Option<GrantRecord> {
		self.0.remove(username)
	}

	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if no records are stored.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Serializes the ledger into its current versioned document.
	pub fn to_document(&self) -> LedgerDocument<'_> {
		LedgerDocument { version: LEDGER_VERSION, grants: &self.0 }
	}

	/// Parses either the versioned document or the legacy bare mapping.
	pub fn from_json(bytes: &[u8]) -> Result<Self, LedgerParseError> {
		match serde_json::from_slice::<StoredLedger>(bytes)? {
			StoredLedger::Versioned(doc) if doc.version <= LEDGER_VERSION => Ok(Self(doc.grants)),
			StoredLedger::Versioned(doc) => Err(LedgerParseError::UnsupportedVersion(doc.version)),
			StoredLedger::Legacy(grants) => Ok(Self(grants)),
		}
	}
}
impl FromIterator<(String, GrantRecord)> for GrantLedger {
	fn from_iter<I: IntoIterator<Item = (String, GrantRecord)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Schema version written by this crate.
pub const LEDGER_VERSION: u32 = 1;

/// Borrowed on-disk representation written by [`GrantLedger::to_document`].
#[derive(Debug, Serialize)]
pub struct LedgerDocument<'a> {
	/// Schema version.
	pub version: u32,
	/// Records keyed by username.
	pub grants: &'a BTreeMap<String, GrantRecord>,
}

/// Reasons a stored ledger cannot be read.
#[derive(Debug, ThisError)]
pub enum LedgerParseError {
	/// Bytes are not a ledger document in any known layout.
	#[error("Ledger is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
	/// Document was written by a newer schema.
	#[error("Ledger schema version {0} is newer than this build supports.")]
	UnsupportedVersion(u32),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLedger {
	Versioned(VersionedLedger),
	Legacy(BTreeMap<String, GrantRecord>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct VersionedLedger {
	version: u32,
	grants: BTreeMap<String, GrantRecord>,
}
