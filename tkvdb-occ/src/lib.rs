// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A tkvdb engine with optimistic concurrency control.
//!
//! Transactions read current committed state while recording the version of
//! everything they observe; commit validates the recorded versions (and
//! re-runs scanned ranges to catch phantoms) under the store lock before
//! installing the write set, so the first committer wins and losers abort
//! with a retryable status. Scans are served through engine-side cursors
//! advanced one record at a time; a record deleted underneath an open
//! cursor surfaces as a concurrent-delete warning on the read.
//!
//! Every installed write is also appended to a commit log of
//! [`LogRecord`]s, drainable with [`OccEngine::take_log_records`] for an
//! external shipper.

mod session;
mod store;

use std::collections::BTreeSet;

use tkvdb::endpoint::KeyRange;
use tkvdb::engine::{Engine, EngineResult, ScanSupport, Status};
use tkvdb::{Database, DatabaseOptions, LogRecord, Result, TransactionOptions, TransactionType};

pub use session::{OccScanHandle, OccSession};
use session::WriteOp;
use store::Store;

/// An engine fulfilling the `tkvdb` [`Engine`] trait with optimistic
/// concurrency control.
#[derive(Default)]
pub struct OccEngine {
	store: Store,
}

impl OccEngine {
	/// Hands out the log records accumulated by commits since the last
	/// call.
	pub fn take_log_records(&self) -> Vec<LogRecord> {
		self.store.take_log()
	}

	/// The session-visible state of `key`: a pending write shadows
	/// committed state.
	fn visible(&self, session: &mut OccSession, key: &[u8]) -> Option<Vec<u8>> {
		match session.writes.get(key) {
			Some(WriteOp::Put { value }) => Some(value.clone()),
			Some(WriteOp::Delete) => None,
			None => {
				let (version, value) = self.store.read(key);
				session.record_read(key, version);
				value
			},
		}
	}
}

impl Engine for OccEngine {
	type Session = OccSession;
	type ScanHandle = OccScanHandle;

	const SCAN_SUPPORT: ScanSupport = ScanSupport::Cursor;

	fn session(&self) -> EngineResult<OccSession> {
		Ok(OccSession::default())
	}

	fn begin(&self, session: &mut OccSession, options: &TransactionOptions) -> EngineResult<()> {
		session.clear();
		session.read_only = options.transaction_type() == TransactionType::ReadOnly;
		Ok(())
	}

	fn get(&self, session: &mut OccSession, key: &[u8]) -> EngineResult<Vec<u8>> {
		self.visible(session, key).ok_or(Status::NotFound)
	}

	fn insert(&self, session: &mut OccSession, key: &[u8], value: &[u8]) -> EngineResult<()> {
		if self.visible(session, key).is_some() {
			return Err(Status::AlreadyExists);
		}
		session.writes.insert(key.to_vec(), WriteOp::Put { value: value.to_vec() });
		Ok(())
	}

	fn update(&self, session: &mut OccSession, key: &[u8], value: &[u8]) -> EngineResult<()> {
		if self.visible(session, key).is_none() {
			return Err(Status::NotFound);
		}
		session.writes.insert(key.to_vec(), WriteOp::Put { value: value.to_vec() });
		Ok(())
	}

	fn upsert(&self, session: &mut OccSession, key: &[u8], value: &[u8]) -> EngineResult<()> {
		session.writes.insert(key.to_vec(), WriteOp::Put { value: value.to_vec() });
		Ok(())
	}

	fn delete(&self, session: &mut OccSession, key: &[u8]) -> EngineResult<()> {
		match session.writes.get(key) {
			Some(WriteOp::Delete) => return Err(Status::NotFound),
			Some(WriteOp::Put { .. }) => {
				let (version, committed) = self.store.read(key);
				session.record_read(key, version);
				if committed.is_some() {
					// the pending write shadowed a committed record
					session.writes.insert(key.to_vec(), WriteOp::Delete);
				} else {
					// the record only ever existed in this session
					session.writes.remove(key);
				}
				return Ok(());
			},
			None => {},
		}
		let (version, committed) = self.store.read(key);
		session.record_read(key, version);
		if committed.is_none() {
			return Err(Status::NotFound);
		}
		session.writes.insert(key.to_vec(), WriteOp::Delete);
		Ok(())
	}

	fn scan(&self, session: &mut OccSession, range: &KeyRange) -> EngineResult<Vec<(Vec<u8>, Vec<u8>)>> {
		let committed = self.store.live_records_in(range);
		let mut observed_keys = Vec::with_capacity(committed.len());
		let mut merged = std::collections::BTreeMap::new();
		for (key, version, value) in committed {
			session.record_read(&key, version);
			observed_keys.push(key.clone());
			merged.insert(key, value);
		}
		for (key, op) in session.writes.range::<[u8], _>(range.as_bounds()) {
			match op {
				WriteOp::Put { value } => {
					merged.insert(key.clone(), value.clone());
				},
				WriteOp::Delete => {
					merged.remove(key);
				},
			}
		}
		if !session.read_only {
			session.scans.push((range.clone(), observed_keys));
		}
		Ok(merged.into_iter().collect())
	}

	fn open_scan(&self, session: &mut OccSession, range: &KeyRange) -> EngineResult<OccScanHandle> {
		let committed_keys = self.store.live_keys_in(range);
		if !session.read_only {
			session.scans.push((range.clone(), committed_keys.clone()));
		}
		let mut keys: BTreeSet<Vec<u8>> = committed_keys.into_iter().collect();
		for (key, op) in session.writes.range::<[u8], _>(range.as_bounds()) {
			match op {
				WriteOp::Put { .. } => {
					keys.insert(key.clone());
				},
				WriteOp::Delete => {
					keys.remove(key);
				},
			}
		}
		if keys.is_empty() {
			return Err(Status::NotFound);
		}
		let id = session.next_scan_id;
		session.next_scan_id += 1;
		session.open_scans.insert(id);
		Ok(OccScanHandle { id, keys: keys.into_iter().collect(), position: 0 })
	}

	fn read_from_scan(
		&self,
		session: &mut OccSession,
		handle: &mut OccScanHandle,
	) -> EngineResult<(Vec<u8>, Vec<u8>)> {
		if !session.open_scans.contains(&handle.id) {
			return Err(Status::InvalidHandle);
		}
		loop {
			let key = match handle.keys.get(handle.position) {
				None => return Err(Status::ScanLimit),
				Some(key) => key.clone(),
			};
			match session.writes.get(&key) {
				Some(WriteOp::Put { value }) => {
					handle.position += 1;
					return Ok((key, value.clone()));
				},
				Some(WriteOp::Delete) => {
					// deleted by this very transaction, skip silently
					handle.position += 1;
					continue;
				},
				None => {},
			}
			let (version, value) = self.store.read(&key);
			match value {
				Some(value) => {
					session.record_read(&key, version);
					handle.position += 1;
					return Ok((key, value));
				},
				// the record vanished underneath the cursor; the position
				// is kept so the caller's bounded retry re-reads it
				None => return Err(Status::ConcurrentDelete),
			}
		}
	}

	fn close_scan(&self, session: &mut OccSession, handle: OccScanHandle) -> EngineResult<()> {
		if session.open_scans.remove(&handle.id) {
			Ok(())
		} else {
			Err(Status::InvalidHandle)
		}
	}

	fn commit(&self, session: &mut OccSession) -> EngineResult<()> {
		let result = if session.read_only {
			Ok(())
		} else {
			self.store.commit(&session.reads, &session.scans, &session.writes)
		};
		// the transaction is released whether validation passed or not,
		// invalidating any scan handle still open
		session.clear();
		result
	}

	fn abort(&self, session: &mut OccSession) -> EngineResult<()> {
		session.clear();
		Ok(())
	}
}

/// Creates an optimistically concurrent database with the given options.
pub fn create(options: &DatabaseOptions) -> Result<Database<OccEngine>> {
	Database::open(OccEngine::default(), options)
}
