// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use smallvec::SmallVec;

use crate::cursor::Cursor;
use crate::endpoint::{resolve_range, EndPointKind};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::options::{PutOperation, StorageOptions, TableArea};
use crate::transaction::Transaction;

/// Separates the storage name from the record key inside raw keys. Storage
/// names must not contain it, which keeps storage prefixes pairwise
/// prefix-free and disjoint from the metadata namespace.
const PREFIX_DELIMITER: u8 = 0x00;

/// A named key space inside a database.
///
/// Every record of a storage lives under the storage's byte prefix in the
/// engine's global key order; all keys accepted and returned by the methods
/// here are relative to the storage. A `Storage` value is a plain handle:
/// it stays usable after the underlying storage was deleted, but its
/// operations will then act on an empty key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
	name: Vec<u8>,
	prefix: Vec<u8>,
	options: StorageOptions,
}

impl Storage {
	pub(crate) fn new(name: &[u8], options: StorageOptions) -> Self {
		Self { name: name.to_vec(), prefix: Self::prefix_for(name), options }
	}

	pub(crate) fn validate_name(name: &[u8]) -> Result<()> {
		if name.is_empty() || name.contains(&PREFIX_DELIMITER) {
			return Err(Error::InvalidArgument);
		}
		Ok(())
	}

	pub(crate) fn prefix_for(name: &[u8]) -> Vec<u8> {
		let mut prefix = Vec::with_capacity(name.len() + 1);
		prefix.extend_from_slice(name);
		prefix.push(PREFIX_DELIMITER);
		prefix
	}

	/// Returns the storage name.
	pub fn name(&self) -> &[u8] {
		&self.name
	}

	/// Returns the byte prefix qualifying this storage's records.
	pub fn prefix(&self) -> &[u8] {
		&self.prefix
	}

	/// Returns the storage options.
	pub fn options(&self) -> &StorageOptions {
		&self.options
	}

	/// Returns the storage id, or [`StorageOptions::UNDEFINED`].
	pub fn storage_id(&self) -> u64 {
		self.options.storage_id()
	}

	/// Returns a reference to this storage for write-preserve and
	/// read-area declarations.
	pub fn table_area(&self) -> TableArea {
		TableArea::from_prefix(self.prefix.clone())
	}

	fn qualify(&self, key: &[u8]) -> SmallVec<[u8; 32]> {
		let mut qualified = SmallVec::with_capacity(self.prefix.len() + key.len());
		qualified.extend_from_slice(&self.prefix);
		qualified.extend_from_slice(key);
		qualified
	}

	/// Looks up the value under `key`.
	///
	/// The returned bytes live in the transaction's buffer and stay valid
	/// until the next data-plane call on the same transaction, which the
	/// borrow enforces.
	pub fn get<'t, E: Engine>(
		&self,
		tx: &'t mut Transaction<'_, E>,
		key: &[u8],
	) -> Result<Option<&'t [u8]>> {
		tx.check_active()?;
		tx.check_readable(self)?;
		let qualified = self.qualify(key);
		let engine = tx.database().engine();
		match engine.get(tx.session_mut(), &qualified) {
			Ok(value) => {
				*tx.buffer_mut() = value;
				Ok(Some(tx.buffer()))
			},
			Err(crate::engine::Status::NotFound) => Ok(None),
			Err(status) => Err(status.into()),
		}
	}

	/// Writes `value` under `key` according to `operation`:
	/// [`PutOperation::Create`] fails with [`Error::AlreadyExists`] on a
	/// present key, [`PutOperation::Update`] with [`Error::NotFound`] on an
	/// absent one, and [`PutOperation::CreateOrUpdate`] never fails on
	/// either ground.
	pub fn put<E: Engine>(
		&self,
		tx: &mut Transaction<'_, E>,
		key: &[u8],
		value: &[u8],
		operation: PutOperation,
	) -> Result<()> {
		tx.check_active()?;
		tx.check_writable(self)?;
		let qualified = self.qualify(key);
		let engine = tx.database().engine();
		let result = match operation {
			PutOperation::Create => engine.insert(tx.session_mut(), &qualified, value),
			PutOperation::Update => engine.update(tx.session_mut(), &qualified, value),
			PutOperation::CreateOrUpdate => engine.upsert(tx.session_mut(), &qualified, value),
		};
		match result {
			Ok(()) => Ok(()),
			Err(status) => {
				let error = Error::from(status);
				let benign = matches!(
					(operation, error),
					(PutOperation::Create, Error::AlreadyExists) | (PutOperation::Update, Error::NotFound)
				);
				if benign || error.is_retryable() {
					Err(error)
				} else {
					log::error!("put failed on storage {:?}: {error}", self.name);
					panic!("unexpected engine failure on put: {error}");
				}
			},
		}
	}

	/// Deletes the record under `key`. [`Error::NotFound`] when absent.
	pub fn remove<E: Engine>(&self, tx: &mut Transaction<'_, E>, key: &[u8]) -> Result<()> {
		tx.check_active()?;
		tx.check_writable(self)?;
		let qualified = self.qualify(key);
		let engine = tx.database().engine();
		match engine.delete(tx.session_mut(), &qualified) {
			Ok(()) => Ok(()),
			Err(status) => {
				let error = Error::from(status);
				if error == Error::NotFound || error.is_retryable() {
					Err(error)
				} else {
					log::error!("remove failed on storage {:?}: {error}", self.name);
					panic!("unexpected engine failure on remove: {error}");
				}
			},
		}
	}

	/// Opens a cursor over the records between the two endpoints, in
	/// ascending key order. Keys yielded by the cursor are relative to this
	/// storage.
	pub fn scan<'t, 'db, E: Engine>(
		&self,
		tx: &'t mut Transaction<'db, E>,
		begin: &[u8],
		begin_kind: EndPointKind,
		end: &[u8],
		end_kind: EndPointKind,
	) -> Result<Cursor<'t, 'db, E>> {
		tx.check_active()?;
		tx.check_readable(self)?;
		let range = resolve_range(&self.prefix, begin, begin_kind, end, end_kind);
		Cursor::new(tx, self.prefix.len(), range)
	}

	/// Opens a cursor over every key starting with `prefix`; an empty
	/// prefix scans the whole storage.
	pub fn scan_prefix<'t, 'db, E: Engine>(
		&self,
		tx: &'t mut Transaction<'db, E>,
		prefix: &[u8],
	) -> Result<Cursor<'t, 'db, E>> {
		let kind =
			if prefix.is_empty() { EndPointKind::Unbound } else { EndPointKind::PrefixedInclusive };
		self.scan(tx, prefix, kind, prefix, kind)
	}

	/// Opens a cursor over `[begin, end]` with per-endpoint exclusivity; an
	/// empty endpoint key leaves that side unbounded.
	pub fn scan_range<'t, 'db, E: Engine>(
		&self,
		tx: &'t mut Transaction<'db, E>,
		begin: &[u8],
		begin_exclusive: bool,
		end: &[u8],
		end_exclusive: bool,
	) -> Result<Cursor<'t, 'db, E>> {
		let begin_kind = if begin.is_empty() {
			EndPointKind::Unbound
		} else if begin_exclusive {
			EndPointKind::Exclusive
		} else {
			EndPointKind::Inclusive
		};
		let end_kind = if end.is_empty() {
			EndPointKind::Unbound
		} else if end_exclusive {
			EndPointKind::Exclusive
		} else {
			EndPointKind::Inclusive
		};
		self.scan(tx, begin, begin_kind, end, end_kind)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names_are_validated() {
		assert_eq!(Storage::validate_name(b""), Err(Error::InvalidArgument));
		assert_eq!(Storage::validate_name(b"a\0b"), Err(Error::InvalidArgument));
		assert_eq!(Storage::validate_name(b"orders"), Ok(()));
	}

	#[test]
	fn prefixes_are_prefix_free() {
		let a = Storage::prefix_for(b"a");
		let ab = Storage::prefix_for(b"ab");
		assert!(!ab.starts_with(&a));
		assert!(!a.starts_with(&ab));
	}

	#[test]
	fn qualification() {
		let storage = Storage::new(b"S", StorageOptions::default());
		assert_eq!(storage.prefix(), b"S\0");
		assert_eq!(&storage.qualify(b"key")[..], b"S\0key");
		assert_eq!(&storage.qualify(b"")[..], b"S\0");
	}
}
