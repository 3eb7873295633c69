// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::info;
use parking_lot::Mutex;

use crate::endpoint::{next_neighbor, KeyRange};
use crate::engine::{Engine, Status};
use crate::error::{Error, Result};
use crate::options::{
	DatabaseOptions, OpenMode, StorageOptions, TransactionOperation, TransactionOptions,
};
use crate::sequence::SequenceMap;
use crate::storage::Storage;
use crate::transaction::Transaction;

/// The attribute key enabling performance tracking.
const KEY_PERFORMANCE_TRACKING: &str = "perf";

/// First byte of storage metadata record keys. User record keys start with
/// a storage prefix, which never begins with this byte.
const META_PREFIX: u8 = 0x00;

fn meta_key(storage_prefix: &[u8]) -> Vec<u8> {
	let mut key = Vec::with_capacity(storage_prefix.len() + 1);
	key.push(META_PREFIX);
	key.extend_from_slice(storage_prefix);
	key
}

fn encode_storage_options(options: &StorageOptions) -> Vec<u8> {
	let mut value = Vec::with_capacity(8 + options.payload().len());
	value.extend_from_slice(&options.storage_id().to_le_bytes());
	value.extend_from_slice(options.payload());
	value
}

fn decode_storage_options(value: &[u8]) -> Result<StorageOptions> {
	if value.len() < 8 {
		return Err(Error::InvalidArgument);
	}
	let mut id_bytes = [0u8; 8];
	id_bytes.copy_from_slice(&value[..8]);
	let storage_id = u64::from_le_bytes(id_bytes);
	let options = if storage_id == StorageOptions::UNDEFINED {
		StorageOptions::default()
	} else {
		StorageOptions::new(storage_id)
	};
	Ok(options.with_payload(value[8..].to_vec()))
}

/// A transactional key-value database over an [`Engine`].
///
/// The database owns the engine, the storage registry and the performance
/// counters. It is safe to share between threads; individual
/// [`Transaction`]s are not.
pub struct Database<E: Engine> {
	engine: E,
	/// Serializes storage registry mutations.
	storage_metadata: Mutex<()>,
	enable_tracking: bool,
	waits_for_commit: bool,
	alive: AtomicBool,
	transaction_count: AtomicU64,
	retry_count: AtomicU64,
	transaction_process_time_us: AtomicU64,
	transaction_wait_time_us: AtomicU64,
	sequences: SequenceMap,
}

impl<E: Engine> Database<E> {
	/// Opens a database over `engine`.
	///
	/// [`OpenMode::Restore`] fails with [`Error::Unsupported`] unless the
	/// engine persists data. The `perf` attribute switches performance
	/// tracking: `""`, `"0"` and `"false"` disable it, `"1"` and `"true"`
	/// enable it, anything else is an invalid argument.
	pub fn open(engine: E, options: &DatabaseOptions) -> Result<Self> {
		if options.open_mode() == OpenMode::Restore && !E::SUPPORTS_RESTORE {
			return Err(Error::Unsupported);
		}
		let enable_tracking = match options.attribute(KEY_PERFORMANCE_TRACKING) {
			None | Some("") | Some("0") | Some("false") => false,
			Some("1") | Some("true") => true,
			Some(_) => return Err(Error::InvalidArgument),
		};
		Ok(Self {
			engine,
			storage_metadata: Mutex::new(()),
			enable_tracking,
			waits_for_commit: true,
			alive: AtomicBool::new(true),
			transaction_count: AtomicU64::new(0),
			retry_count: AtomicU64::new(0),
			transaction_process_time_us: AtomicU64::new(0),
			transaction_wait_time_us: AtomicU64::new(0),
			sequences: SequenceMap::new(),
		})
	}

	/// Shuts the database down. When tracking is enabled the counters are
	/// reported through the logger. Transactions can no longer be begun
	/// afterwards.
	pub fn shutdown(&self) -> Result<()> {
		if self.enable_tracking {
			info!("transaction count: {}", self.transaction_count());
			info!("retry count: {}", self.retry_count());
			info!("transaction process time: {}us", self.transaction_process_time().as_micros());
			info!("transaction wait time: {}us", self.transaction_wait_time().as_micros());
		}
		self.alive.store(false, Ordering::SeqCst);
		Ok(())
	}

	/// Whether [`shutdown`](Self::shutdown) has not been called yet.
	pub fn alive(&self) -> bool {
		self.alive.load(Ordering::SeqCst)
	}

	/// Whether performance tracking is enabled.
	pub fn enable_tracking(&self) -> bool {
		self.enable_tracking
	}

	/// Whether commits wait for group commit. Always true: asynchronous
	/// commit is unsupported.
	pub fn waits_for_commit(&self) -> bool {
		self.waits_for_commit
	}

	/// Number of driver-executed transactions, not counting retries.
	pub fn transaction_count(&self) -> u64 {
		self.transaction_count.load(Ordering::Relaxed)
	}

	/// Number of transaction retries performed by the driver.
	pub fn retry_count(&self) -> u64 {
		self.retry_count.load(Ordering::Relaxed)
	}

	/// Accumulated time spent in user callbacks.
	pub fn transaction_process_time(&self) -> Duration {
		Duration::from_micros(self.transaction_process_time_us.load(Ordering::Relaxed))
	}

	/// Accumulated time spent beginning transactions.
	pub fn transaction_wait_time(&self) -> Duration {
		Duration::from_micros(self.transaction_wait_time_us.load(Ordering::Relaxed))
	}

	/// Returns the sequence map of this database.
	pub fn sequences(&self) -> &SequenceMap {
		&self.sequences
	}

	/// Returns the engine backing this database, for engine-specific
	/// features such as draining commit logs.
	pub fn engine(&self) -> &E {
		&self.engine
	}

	/// Begins a new transaction.
	pub fn transaction(&self, options: TransactionOptions) -> Result<Transaction<'_, E>> {
		if !self.alive() {
			return Err(Error::InvalidState);
		}
		Transaction::new(self, options)
	}

	/// Creates a new storage space named `name`.
	///
	/// [`Error::AlreadyExists`] when a storage of that name is registered.
	pub fn create_storage(&self, name: &[u8], options: StorageOptions) -> Result<Storage> {
		Storage::validate_name(name)?;
		let mut tx = self.transaction(TransactionOptions::default())?;
		let result = self.create_storage_locked(&mut tx, name, options);
		if result.is_err() {
			tx.abort()?;
		}
		result
	}

	fn create_storage_locked(
		&self,
		tx: &mut Transaction<'_, E>,
		name: &[u8],
		options: StorageOptions,
	) -> Result<Storage> {
		if self.find_storage(tx, name)?.is_some() {
			return Err(Error::AlreadyExists);
		}
		// not found, create a new one holding the metadata lock
		let _guard = self.storage_metadata.lock();
		if self.find_storage(tx, name)?.is_some() {
			return Err(Error::AlreadyExists);
		}
		let storage = Storage::new(name, options);
		let value = encode_storage_options(storage.options());
		self.engine.upsert(tx.session_mut(), &meta_key(storage.prefix()), &value)?;
		tx.commit(false)?;
		Ok(storage)
	}

	/// Returns the registered storage named `name`.
	pub fn get_storage(&self, name: &[u8]) -> Result<Storage> {
		Storage::validate_name(name)?;
		let mut tx = self.transaction(TransactionOptions::default())?;
		let found = self.find_storage(&mut tx, name);
		tx.abort()?;
		match found {
			Ok(Some(storage)) => Ok(storage),
			Ok(None) => Err(Error::NotFound),
			// metadata lookups do not surface engine retry statuses
			Err(error) if error.is_retryable() => Err(Error::NotFound),
			Err(error) => Err(error),
		}
	}

	fn find_storage(&self, tx: &mut Transaction<'_, E>, name: &[u8]) -> Result<Option<Storage>> {
		let prefix = Storage::prefix_for(name);
		match self.engine.get(tx.session_mut(), &meta_key(&prefix)) {
			Ok(value) => Ok(Some(Storage::new(name, decode_storage_options(&value)?))),
			Err(Status::NotFound) => Ok(None),
			Err(status) => Err(status.into()),
		}
	}

	/// Deletes `storage`: unregisters it and removes every record under its
	/// prefix.
	pub fn delete_storage(&self, storage: &Storage) -> Result<()> {
		let mut tx = self.transaction(TransactionOptions::default())?;
		match self.erase_storage(&mut tx, storage) {
			Ok(()) => tx.commit(false),
			Err(error) => {
				tx.abort()?;
				Err(error)
			},
		}
	}

	fn erase_storage(&self, tx: &mut Transaction<'_, E>, storage: &Storage) -> Result<()> {
		let _guard = self.storage_metadata.lock();
		match self.engine.delete(tx.session_mut(), &meta_key(storage.prefix())) {
			// deleting an unregistered storage still purges its records
			Ok(()) | Err(Status::NotFound) => {},
			Err(status) => return Err(status.into()),
		}
		let range = KeyRange {
			begin: storage.prefix().to_vec(),
			begin_exclusive: false,
			end: next_neighbor(storage.prefix()),
			end_exclusive: true,
		};
		let records = self.engine.scan(tx.session_mut(), &range)?;
		for (key, _) in records {
			match self.engine.delete(tx.session_mut(), &key) {
				Ok(()) | Err(Status::NotFound) => {},
				Err(status) => return Err(status.into()),
			}
		}
		Ok(())
	}

	/// Runs `callback` inside a transaction and finishes it according to
	/// the returned [`TransactionOperation`].
	///
	/// Retryable commit failures and [`TransactionOperation::Retry`] run
	/// the callback again, up to the
	/// [`retry_count`](TransactionOptions::retry_count) bound; when the
	/// bound is exhausted the last retryable status is surfaced.
	pub fn transaction_exec<F>(&self, options: &TransactionOptions, mut callback: F) -> Result<()>
	where
		F: FnMut(&mut Transaction<'_, E>) -> TransactionOperation,
	{
		if self.enable_tracking {
			self.transaction_count.fetch_add(1, Ordering::Relaxed);
		}
		let mut remaining = options.retry_count();
		loop {
			let at_begin = self.enable_tracking.then(Instant::now);
			let mut tx = self.transaction(options.clone())?;
			let at_process = self.enable_tracking.then(Instant::now);
			let operation = callback(&mut tx);
			if let (Some(at_begin), Some(at_process)) = (at_begin, at_process) {
				let at_end = Instant::now();
				self.transaction_wait_time_us
					.fetch_add((at_process - at_begin).as_micros() as u64, Ordering::Relaxed);
				self.transaction_process_time_us
					.fetch_add((at_end - at_process).as_micros() as u64, Ordering::Relaxed);
			}
			match operation {
				TransactionOperation::Commit => match tx.commit(false) {
					Ok(()) => return Ok(()),
					Err(error) if error.is_retryable() => {
						info!("commit failed, retrying transaction: {error}");
						self.retry_count.fetch_add(1, Ordering::Relaxed);
						if remaining == 0 {
							return Err(error);
						}
						if remaining != TransactionOptions::INF {
							remaining -= 1;
						}
					},
					Err(error) => return Err(error),
				},
				TransactionOperation::Rollback => {
					tx.abort()?;
					return Err(Error::UserRollback);
				},
				TransactionOperation::Error => {
					tx.abort()?;
					return Err(Error::UserError);
				},
				TransactionOperation::Retry => {
					tx.abort()?;
					self.retry_count.fetch_add(1, Ordering::Relaxed);
					if remaining == 0 {
						return Err(Error::AbortedRetryable);
					}
					if remaining != TransactionOptions::INF {
						remaining -= 1;
					}
				},
			}
		}
	}
}
