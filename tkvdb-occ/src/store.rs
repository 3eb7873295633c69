// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The versioned record store and commit-time validation.

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tkvdb::endpoint::KeyRange;
use tkvdb::engine::Status;
use tkvdb::{LogRecord, OperationType, StorageOptions};

use crate::session::WriteOp;

/// Version of keys that were never written. Live records and tombstones
/// both carry the commit version that produced them.
pub(crate) const NEVER_WRITTEN: u64 = 0;

struct Record {
	version: u64,
	/// `None` is a tombstone: deleted records keep their slot so that
	/// deletions remain visible to read validation.
	value: Option<Vec<u8>>,
}

/// The committed state shared by every session of one engine.
#[derive(Default)]
pub(crate) struct Store {
	records: RwLock<BTreeMap<Vec<u8>, Record>>,
	commit_version: AtomicU64,
	log: Mutex<Vec<LogRecord>>,
}

impl Store {
	/// Returns the version and live value of `key` in committed state.
	pub(crate) fn read(&self, key: &[u8]) -> (u64, Option<Vec<u8>>) {
		match self.records.read().get(key) {
			Some(record) => (record.version, record.value.clone()),
			None => (NEVER_WRITTEN, None),
		}
	}

	/// Returns the live records inside `range`, in key order.
	pub(crate) fn live_records_in(&self, range: &KeyRange) -> Vec<(Vec<u8>, u64, Vec<u8>)> {
		self.records
			.read()
			.range::<[u8], _>(range.as_bounds())
			.filter_map(|(key, record)| {
				record.value.as_ref().map(|value| (key.clone(), record.version, value.clone()))
			})
			.collect()
	}

	/// Returns the live keys inside `range`, in key order.
	pub(crate) fn live_keys_in(&self, range: &KeyRange) -> Vec<Vec<u8>> {
		self.records
			.read()
			.range::<[u8], _>(range.as_bounds())
			.filter(|(_, record)| record.value.is_some())
			.map(|(key, _)| key.clone())
			.collect()
	}

	/// Validates the read and scan sets against current committed state
	/// and, on success, installs the write set under a fresh commit
	/// version. First committer wins: the whole step runs under the store
	/// write lock.
	pub(crate) fn commit(
		&self,
		reads: &HashMap<Vec<u8>, u64>,
		scans: &[(KeyRange, Vec<Vec<u8>>)],
		writes: &BTreeMap<Vec<u8>, WriteOp>,
	) -> Result<(), Status> {
		let mut records = self.records.write();

		for (key, observed) in reads {
			let current = records.get(key).map(|record| record.version).unwrap_or(NEVER_WRITTEN);
			if current != *observed {
				return Err(Status::Validation);
			}
		}
		for (range, observed_keys) in scans {
			let current_live = records
				.range::<[u8], _>(range.as_bounds())
				.filter(|(_, record)| record.value.is_some())
				.map(|(key, _)| key);
			let mut observed = observed_keys.iter();
			for key in current_live {
				if observed.next().map(|k| k == key) != Some(true) {
					return Err(Status::Phantom);
				}
			}
			if observed.next().is_some() {
				return Err(Status::Phantom);
			}
		}

		if writes.is_empty() {
			return Ok(());
		}
		let version = self.commit_version.fetch_add(1, Ordering::SeqCst) + 1;
		let mut log_records = Vec::with_capacity(writes.len());
		for (minor_version, (key, op)) in writes.iter().enumerate() {
			let live_before = records.get(key).map(|record| record.value.is_some()).unwrap_or(false);
			match op {
				WriteOp::Put { value } => {
					records.insert(key.clone(), Record { version, value: Some(value.clone()) });
					log_records.push(LogRecord {
						key: key.clone(),
						value: value.clone(),
						major_version: version,
						minor_version: minor_version as u64,
						storage_id: StorageOptions::UNDEFINED,
						operation: if live_before { OperationType::Update } else { OperationType::Insert },
					});
				},
				WriteOp::Delete => {
					// a delete whose target vanished was caught by read
					// validation already
					if live_before {
						records.insert(key.clone(), Record { version, value: None });
						log_records.push(LogRecord {
							key: key.clone(),
							value: Vec::new(),
							major_version: version,
							minor_version: minor_version as u64,
							storage_id: StorageOptions::UNDEFINED,
							operation: OperationType::Delete,
						});
					}
				},
			}
		}
		self.log.lock().extend(log_records);
		Ok(())
	}

	/// Hands out the log records accumulated by commits so far.
	pub(crate) fn take_log(&self) -> Vec<LogRecord> {
		mem::take(&mut *self.log.lock())
	}
}
