// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The seam between the storage façade and a concurrency-control engine.
//!
//! Engines speak their own status vocabulary ([`Status`]); the single place
//! where it is translated into the public [`Error`] taxonomy is the
//! [`From<Status>`] impl below. Core code never matches on engine statuses
//! outside of the handful of control-flow cases called out in the trait
//! documentation (not-found on reads, scan-limit on cursors).

use crate::endpoint::KeyRange;
use crate::error::Error;
use crate::options::TransactionOptions;

/// Engine-native statuses.
///
/// The set mirrors what optimistic engines report: benign misses, transient
/// concurrent-mutation warnings observed while reading, and validation
/// failures raised at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	/// No record for the key.
	NotFound,
	/// A live record for the key already exists.
	AlreadyExists,
	/// A concurrent transaction is deleting the record being read.
	ConcurrentDelete,
	/// A concurrent transaction is inserting the record being read.
	ConcurrentInsert,
	/// A concurrent transaction is updating the record being read.
	ConcurrentUpdate,
	/// A scan cursor moved past its last record.
	ScanLimit,
	/// The scan handle is unknown to the engine, typically because the
	/// engine already invalidated it when the transaction aborted.
	InvalidHandle,
	/// Commit-time validation of the read set failed.
	Validation,
	/// Commit-time validation detected a phantom in a scanned range.
	Phantom,
	/// The session has no transaction in progress.
	Inactive,
	/// The engine cannot host another session.
	SessionLimit,
	/// Unclassified engine failure.
	Unknown,
}

impl Status {
	/// Whether this is one of the transient concurrent-mutation warnings
	/// that cursor reads retry a bounded number of times.
	pub fn is_concurrent_mutation(&self) -> bool {
		matches!(self, Status::ConcurrentDelete | Status::ConcurrentInsert | Status::ConcurrentUpdate)
	}
}

/// The one mapping from engine-native statuses to the public taxonomy.
impl From<Status> for Error {
	fn from(status: Status) -> Error {
		match status {
			Status::NotFound => Error::NotFound,
			Status::AlreadyExists => Error::AlreadyExists,
			Status::ConcurrentDelete | Status::ConcurrentInsert | Status::ConcurrentUpdate => {
				Error::AbortedRetryable
			},
			// end-of-scan is a not-found signal at the surface
			Status::ScanLimit => Error::NotFound,
			Status::InvalidHandle => Error::InvalidArgument,
			Status::Validation | Status::Phantom => Error::AbortedRetryable,
			Status::Inactive => Error::InactiveTransaction,
			Status::SessionLimit => Error::InvalidState,
			Status::Unknown => Error::Unknown,
		}
	}
}

/// Result type of engine calls.
pub type EngineResult<T> = std::result::Result<T, Status>;

/// How an engine serves range scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSupport {
	/// `scan` fetches all matching records up front; cursors over such
	/// engines are materialized.
	Materialized,
	/// The engine keeps a server-side cursor advanced one record at a time
	/// via `open_scan`/`read_from_scan`/`close_scan`.
	Cursor,
}

/// A transactional record engine.
///
/// One session corresponds to one [`Transaction`](crate::Transaction); the
/// session owns the engine-side context (read/write sets, open scans) and is
/// recycled across `begin` calls. All keys at this level are raw: storage
/// prefixes have already been applied by the caller.
pub trait Engine: Send + Sync + 'static {
	/// Engine-side per-transaction context.
	type Session: Send;
	/// Engine-side scan cursor state. Only meaningful when
	/// [`SCAN_SUPPORT`](Self::SCAN_SUPPORT) is [`ScanSupport::Cursor`].
	type ScanHandle: Send;

	/// Scan style served by this engine.
	const SCAN_SUPPORT: ScanSupport;

	/// Whether the engine can restore a previously persisted database.
	const SUPPORTS_RESTORE: bool = false;

	/// Creates a new session.
	fn session(&self) -> EngineResult<Self::Session>;

	/// Starts a transaction on the session.
	fn begin(&self, session: &mut Self::Session, options: &TransactionOptions) -> EngineResult<()>;

	/// Point lookup. `Status::NotFound` when there is no live record.
	fn get(&self, session: &mut Self::Session, key: &[u8]) -> EngineResult<Vec<u8>>;

	/// Inserts a record. `Status::AlreadyExists` when a live record exists.
	fn insert(&self, session: &mut Self::Session, key: &[u8], value: &[u8]) -> EngineResult<()>;

	/// Overwrites a record. `Status::NotFound` when there is no live record.
	fn update(&self, session: &mut Self::Session, key: &[u8], value: &[u8]) -> EngineResult<()>;

	/// Inserts or overwrites a record unconditionally.
	fn upsert(&self, session: &mut Self::Session, key: &[u8], value: &[u8]) -> EngineResult<()>;

	/// Deletes a record. `Status::NotFound` when there is no live record.
	fn delete(&self, session: &mut Self::Session, key: &[u8]) -> EngineResult<()>;

	/// Fetches every record in the range, in ascending key order.
	fn scan(&self, session: &mut Self::Session, range: &KeyRange) -> EngineResult<Vec<(Vec<u8>, Vec<u8>)>>;

	/// Opens an engine-side cursor over the range. `Status::NotFound` when
	/// the range is known to be empty.
	fn open_scan(&self, session: &mut Self::Session, range: &KeyRange) -> EngineResult<Self::ScanHandle>;

	/// Advances the cursor and returns the record under it.
	/// `Status::ScanLimit` past the last record; the `Concurrent*` statuses
	/// when the record is being mutated underneath the cursor.
	fn read_from_scan(
		&self,
		session: &mut Self::Session,
		handle: &mut Self::ScanHandle,
	) -> EngineResult<(Vec<u8>, Vec<u8>)>;

	/// Releases the cursor. `Status::InvalidHandle` when the engine already
	/// invalidated it; callers treat that as a no-op.
	fn close_scan(&self, session: &mut Self::Session, handle: Self::ScanHandle) -> EngineResult<()>;

	/// Commits the session's transaction. `Status::Validation` and
	/// `Status::Phantom` report optimistic-validation failures; the engine
	/// has already released the transaction in that case.
	fn commit(&self, session: &mut Self::Session) -> EngineResult<()>;

	/// Aborts the session's transaction. Expected to be infallible.
	fn abort(&self, session: &mut Self::Session) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_engine_statuses() {
		assert_eq!(Error::from(Status::NotFound), Error::NotFound);
		assert_eq!(Error::from(Status::AlreadyExists), Error::AlreadyExists);
		assert_eq!(Error::from(Status::ConcurrentDelete), Error::AbortedRetryable);
		assert_eq!(Error::from(Status::ConcurrentInsert), Error::AbortedRetryable);
		assert_eq!(Error::from(Status::ConcurrentUpdate), Error::AbortedRetryable);
		assert_eq!(Error::from(Status::Validation), Error::AbortedRetryable);
		assert_eq!(Error::from(Status::Phantom), Error::AbortedRetryable);
		assert_eq!(Error::from(Status::Inactive), Error::InactiveTransaction);
		assert_eq!(Error::from(Status::SessionLimit), Error::InvalidState);
		assert_eq!(Error::from(Status::InvalidHandle), Error::InvalidArgument);
	}

	#[test]
	fn concurrent_mutation_family() {
		assert!(Status::ConcurrentDelete.is_concurrent_mutation());
		assert!(Status::ConcurrentInsert.is_concurrent_mutation());
		assert!(Status::ConcurrentUpdate.is_concurrent_mutation());
		assert!(!Status::Validation.is_concurrent_mutation());
		assert!(!Status::ScanLimit.is_concurrent_mutation());
	}
}
