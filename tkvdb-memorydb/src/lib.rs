// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A tkvdb engine living in memory.
//!
//! Sessions buffer their writes and apply them atomically at commit under a
//! single lock; commit never conflicts, so every transaction that reaches
//! commit succeeds. This is generally intended for tests and is not
//! particularly optimized.

use std::collections::BTreeMap;
use std::mem;

use parking_lot::RwLock;
use tkvdb::endpoint::KeyRange;
use tkvdb::engine::{Engine, EngineResult, ScanSupport, Status};
use tkvdb::{Database, DatabaseOptions, Result, TransactionOptions};

/// A buffered write: a new value, or a tombstone.
type Pending = Option<Vec<u8>>;

/// Engine-side transaction context: the write buffer.
#[derive(Default)]
pub struct MemorySession {
	writes: BTreeMap<Vec<u8>, Pending>,
}

impl MemorySession {
	fn pending(&self, key: &[u8]) -> Option<&Pending> {
		self.writes.get(key)
	}
}

/// An engine fulfilling the `tkvdb` [`Engine`] trait, living in memory.
#[derive(Default)]
pub struct MemoryEngine {
	committed: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
	fn exists(&self, session: &MemorySession, key: &[u8]) -> bool {
		match session.pending(key) {
			Some(Some(_)) => true,
			Some(None) => false,
			None => self.committed.read().contains_key(key),
		}
	}
}

impl Engine for MemoryEngine {
	type Session = MemorySession;
	type ScanHandle = ();

	const SCAN_SUPPORT: ScanSupport = ScanSupport::Materialized;

	fn session(&self) -> EngineResult<MemorySession> {
		Ok(MemorySession::default())
	}

	fn begin(&self, session: &mut MemorySession, _options: &TransactionOptions) -> EngineResult<()> {
		session.writes.clear();
		Ok(())
	}

	fn get(&self, session: &mut MemorySession, key: &[u8]) -> EngineResult<Vec<u8>> {
		match session.pending(key) {
			Some(Some(value)) => Ok(value.clone()),
			Some(None) => Err(Status::NotFound),
			None => self.committed.read().get(key).cloned().ok_or(Status::NotFound),
		}
	}

	fn insert(&self, session: &mut MemorySession, key: &[u8], value: &[u8]) -> EngineResult<()> {
		if self.exists(session, key) {
			return Err(Status::AlreadyExists);
		}
		session.writes.insert(key.to_vec(), Some(value.to_vec()));
		Ok(())
	}

	fn update(&self, session: &mut MemorySession, key: &[u8], value: &[u8]) -> EngineResult<()> {
		if !self.exists(session, key) {
			return Err(Status::NotFound);
		}
		session.writes.insert(key.to_vec(), Some(value.to_vec()));
		Ok(())
	}

	fn upsert(&self, session: &mut MemorySession, key: &[u8], value: &[u8]) -> EngineResult<()> {
		session.writes.insert(key.to_vec(), Some(value.to_vec()));
		Ok(())
	}

	fn delete(&self, session: &mut MemorySession, key: &[u8]) -> EngineResult<()> {
		if !self.exists(session, key) {
			return Err(Status::NotFound);
		}
		session.writes.insert(key.to_vec(), None);
		Ok(())
	}

	fn scan(&self, session: &mut MemorySession, range: &KeyRange) -> EngineResult<Vec<(Vec<u8>, Vec<u8>)>> {
		let committed = self.committed.read();
		let mut merged: BTreeMap<Vec<u8>, Pending> = committed
			.range::<[u8], _>(range.as_bounds())
			.map(|(k, v)| (k.clone(), Some(v.clone())))
			.collect();
		for (key, pending) in session.writes.range::<[u8], _>(range.as_bounds()) {
			merged.insert(key.clone(), pending.clone());
		}
		Ok(merged.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect())
	}

	fn open_scan(&self, _session: &mut MemorySession, _range: &KeyRange) -> EngineResult<()> {
		// materialized engine, never called
		Err(Status::Unknown)
	}

	fn read_from_scan(
		&self,
		_session: &mut MemorySession,
		_handle: &mut (),
	) -> EngineResult<(Vec<u8>, Vec<u8>)> {
		Err(Status::Unknown)
	}

	fn close_scan(&self, _session: &mut MemorySession, _handle: ()) -> EngineResult<()> {
		Err(Status::Unknown)
	}

	fn commit(&self, session: &mut MemorySession) -> EngineResult<()> {
		let mut committed = self.committed.write();
		for (key, pending) in mem::take(&mut session.writes) {
			match pending {
				Some(value) => {
					committed.insert(key, value);
				},
				None => {
					committed.remove(&key);
				},
			}
		}
		Ok(())
	}

	fn abort(&self, session: &mut MemorySession) -> EngineResult<()> {
		session.writes.clear();
		Ok(())
	}
}

/// Creates an in-memory database with the given options.
pub fn create(options: &DatabaseOptions) -> Result<Database<MemoryEngine>> {
	Database::open(MemoryEngine::default(), options)
}
