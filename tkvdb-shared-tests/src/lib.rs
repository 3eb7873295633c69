// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared tests for tkvdb functionality, to be executed against actual
//! engines.
//!
//! Every test expects a freshly opened database; counters and registry
//! contents are asserted as if nothing ran before.

use std::collections::BTreeMap;

use tkvdb::engine::Engine;
use tkvdb::{
	Database, EndPointKind, Error, PutOperation, Result, StorageOptions, TransactionOperation,
	TransactionOptions, TransactionState, TransactionType,
};

fn default_tx<E: Engine>(db: &Database<E>) -> Result<tkvdb::Transaction<'_, E>> {
	db.transaction(TransactionOptions::new())
}

/// A test for put and get across transactions.
pub fn test_put_and_get<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	storage.put(&mut tx, b"K", b"testing", PutOperation::Create)?;
	tx.commit(false)?;

	tx.reset()?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"testing"[..]));
	// stable across repeated reads
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"testing"[..]));
	tx.commit(false)?;
	Ok(())
}

/// A test for reading back uncommitted writes of the same transaction.
pub fn test_get_uncommitted<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	assert_eq!(storage.get(&mut tx, b"K")?, None);
	storage.put(&mut tx, b"K", b"testing", PutOperation::Create)?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"testing"[..]));
	tx.commit(false)?;
	Ok(())
}

/// A test for the three put operations.
pub fn test_put_operations<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	storage.put(&mut tx, b"K", b"a", PutOperation::CreateOrUpdate)?;
	tx.commit(false)?;
	tx.reset()?;

	assert_eq!(storage.put(&mut tx, b"K", b"b1", PutOperation::Create), Err(Error::AlreadyExists));
	storage.put(&mut tx, b"K", b"b2", PutOperation::Update)?;
	tx.commit(false)?;
	tx.reset()?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"b2"[..]));

	assert_eq!(storage.put(&mut tx, b"L", b"c1", PutOperation::Update), Err(Error::NotFound));
	storage.put(&mut tx, b"L", b"c2", PutOperation::Create)?;
	tx.commit(false)?;
	tx.reset()?;
	assert_eq!(storage.get(&mut tx, b"L")?, Some(&b"c2"[..]));

	storage.put(&mut tx, b"K", b"d1", PutOperation::CreateOrUpdate)?;
	storage.put(&mut tx, b"M", b"d2", PutOperation::CreateOrUpdate)?;
	tx.commit(false)?;
	tx.reset()?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"d1"[..]));
	assert_eq!(storage.get(&mut tx, b"M")?, Some(&b"d2"[..]));
	tx.commit(false)?;
	Ok(())
}

/// A test for delete and its visibility.
pub fn test_remove<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	assert_eq!(storage.remove(&mut tx, b"K"), Err(Error::NotFound));
	storage.put(&mut tx, b"K", b"testing", PutOperation::Create)?;
	tx.commit(false)?;
	tx.reset()?;

	storage.remove(&mut tx, b"K")?;
	assert_eq!(storage.get(&mut tx, b"K")?, None);
	tx.commit(false)?;
	tx.reset()?;
	assert_eq!(storage.get(&mut tx, b"K")?, None);
	tx.commit(false)?;
	Ok(())
}

/// A test for prefix scans: exact-prefix records are included, siblings of
/// the prefix are not.
pub fn test_scan_prefix<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	for (key, value) in [
		("a", "A"),
		("a/", "a-"),
		("a/a", "a-a"),
		("a/a/c", "a-a-c"),
		("a/b", "a-b"),
		("b", "b"),
	] {
		storage.put(&mut tx, key.as_bytes(), value.as_bytes(), PutOperation::CreateOrUpdate)?;
	}
	tx.commit(false)?;
	tx.reset()?;

	let mut cursor = storage.scan(
		&mut tx,
		b"a/",
		EndPointKind::PrefixedInclusive,
		b"a/",
		EndPointKind::PrefixedInclusive,
	)?;
	for (key, value) in [("a/", "a-"), ("a/a", "a-a"), ("a/a/c", "a-a-c"), ("a/b", "a-b")] {
		assert!(cursor.next()?);
		assert_eq!(cursor.key(), key.as_bytes());
		assert_eq!(cursor.value(), value.as_bytes());
	}
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

fn put_alphabet<'db, E: Engine>(
	db: &'db Database<E>,
	storage: &tkvdb::Storage,
) -> Result<tkvdb::Transaction<'db, E>> {
	let mut tx = default_tx(db)?;
	for (key, value) in [("a", "A"), ("b", "B"), ("c", "C"), ("d", "D"), ("e", "E")] {
		storage.put(&mut tx, key.as_bytes(), value.as_bytes(), PutOperation::CreateOrUpdate)?;
	}
	tx.commit(false)?;
	tx.reset()?;
	Ok(tx)
}

/// A test for inclusive range bounds.
pub fn test_scan_range<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = put_alphabet(db, &storage)?;
	let mut cursor =
		storage.scan(&mut tx, b"b", EndPointKind::Inclusive, b"d", EndPointKind::Inclusive)?;
	for (key, value) in [("b", "B"), ("c", "C"), ("d", "D")] {
		assert!(cursor.next()?);
		assert_eq!(cursor.key(), key.as_bytes());
		assert_eq!(cursor.value(), value.as_bytes());
	}
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test for exclusive range bounds.
pub fn test_scan_range_exclusive<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = put_alphabet(db, &storage)?;
	let mut cursor =
		storage.scan(&mut tx, b"b", EndPointKind::Exclusive, b"d", EndPointKind::Exclusive)?;
	assert!(cursor.next()?);
	assert_eq!(cursor.key(), b"c");
	assert_eq!(cursor.value(), b"C");
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test for unbound endpoints: the whole storage, endpoint keys ignored.
pub fn test_scan_unbound<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = put_alphabet(db, &storage)?;
	let mut cursor = storage.scan(&mut tx, b"b", EndPointKind::Unbound, b"d", EndPointKind::Unbound)?;
	for key in ["a", "b", "c", "d", "e"] {
		assert!(cursor.next()?);
		assert_eq!(cursor.key(), key.as_bytes());
	}
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test for prefixed endpoints on both sides.
pub fn test_scan_prefixed_endpoints<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	for (key, value) in [("a", "A"), ("b", "B"), ("b1", "B1"), ("c", "C"), ("d", "D"), ("d1", "D1")] {
		storage.put(&mut tx, key.as_bytes(), value.as_bytes(), PutOperation::CreateOrUpdate)?;
	}
	tx.commit(false)?;
	tx.reset()?;

	// prefixed-inclusive end pulls in extensions of the end key
	let mut cursor = storage.scan(
		&mut tx,
		b"b",
		EndPointKind::PrefixedInclusive,
		b"d",
		EndPointKind::PrefixedInclusive,
	)?;
	for key in ["b", "b1", "c", "d", "d1"] {
		assert!(cursor.next()?);
		assert_eq!(cursor.key(), key.as_bytes());
	}
	assert!(!cursor.next()?);
	drop(cursor);

	// prefixed-exclusive begin skips extensions of the begin key
	let mut cursor = storage.scan(
		&mut tx,
		b"b",
		EndPointKind::PrefixedExclusive,
		b"d",
		EndPointKind::PrefixedExclusive,
	)?;
	assert!(cursor.next()?);
	assert_eq!(cursor.key(), b"c");
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test for provably empty intervals: the cursor must not touch the
/// engine and reports end immediately.
pub fn test_scan_empty_interval<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = put_alphabet(db, &storage)?;

	let mut cursor =
		storage.scan(&mut tx, b"d", EndPointKind::Inclusive, b"b", EndPointKind::Inclusive)?;
	assert!(!cursor.next()?);
	// advancing past the end stays at the end
	assert!(!cursor.next()?);
	drop(cursor);

	let mut cursor =
		storage.scan(&mut tx, b"b", EndPointKind::Exclusive, b"b", EndPointKind::Exclusive)?;
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test for scans over an empty storage.
pub fn test_scan_empty_storage<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	let mut cursor = storage.scan_prefix(&mut tx, b"")?;
	assert!(!cursor.next()?);
	drop(cursor);
	tx.abort()?;
	Ok(())
}

/// A test for scans observing writes of their own uncommitted transaction.
pub fn test_scan_uncommitted<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	for (key, value) in [("a/", "a-"), ("a/a", "a-a"), ("b", "b")] {
		storage.put(&mut tx, key.as_bytes(), value.as_bytes(), PutOperation::CreateOrUpdate)?;
	}
	let mut cursor = storage.scan_prefix(&mut tx, b"a/")?;
	for (key, value) in [("a/", "a-"), ("a/a", "a-a")] {
		assert!(cursor.next()?);
		assert_eq!(cursor.key(), key.as_bytes());
		assert_eq!(cursor.value(), value.as_bytes());
	}
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test that records of one storage never leak into scans of another.
pub fn test_prefix_isolation<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage_a = db.create_storage(b"a", StorageOptions::default())?;
	let storage_b = db.create_storage(b"b", StorageOptions::default())?;
	let storage_ab = db.create_storage(b"ab", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	storage_b.put(&mut tx, b"a", b"B", PutOperation::CreateOrUpdate)?;
	storage_ab.put(&mut tx, b"x", b"AB", PutOperation::CreateOrUpdate)?;
	tx.commit(false)?;
	tx.reset()?;

	let mut cursor = storage_a.scan_prefix(&mut tx, b"")?;
	assert!(!cursor.next()?);
	drop(cursor);
	tx.commit(false)?;
	Ok(())
}

/// A test for write isolation between storages sharing a key.
pub fn test_storage_isolation<E: Engine>(db: &Database<E>) -> Result<()> {
	let first = db.create_storage(b"S1", StorageOptions::default())?;
	let second = db.create_storage(b"S2", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	first.put(&mut tx, b"k", b"one", PutOperation::CreateOrUpdate)?;
	second.put(&mut tx, b"k", b"two", PutOperation::CreateOrUpdate)?;
	tx.commit(false)?;
	tx.reset()?;

	assert_eq!(first.get(&mut tx, b"k")?, Some(&b"one"[..]));
	assert_eq!(second.get(&mut tx, b"k")?, Some(&b"two"[..]));
	first.remove(&mut tx, b"k")?;
	assert_eq!(first.get(&mut tx, b"k")?, None);
	assert_eq!(second.get(&mut tx, b"k")?, Some(&b"two"[..]));
	tx.commit(false)?;
	Ok(())
}

/// A test for the storage registry round trip.
pub fn test_storage_registry<E: Engine>(db: &Database<E>) -> Result<()> {
	assert_eq!(db.get_storage(b"R"), Err(Error::NotFound));

	let created = db.create_storage(b"R", StorageOptions::new(7).with_payload(b"meta".to_vec()))?;
	assert_eq!(created.storage_id(), 7);
	let fetched = db.get_storage(b"R")?;
	assert_eq!(fetched, created);
	assert_eq!(fetched.options().payload(), b"meta");

	// a second create leaves the first registration untouched
	assert_eq!(db.create_storage(b"R", StorageOptions::default()), Err(Error::AlreadyExists));
	assert_eq!(db.get_storage(b"R")?.storage_id(), 7);

	// deletion unregisters and purges the records
	let mut tx = default_tx(db)?;
	created.put(&mut tx, b"k", b"v", PutOperation::CreateOrUpdate)?;
	tx.commit(false)?;
	db.delete_storage(&created)?;
	assert_eq!(db.get_storage(b"R"), Err(Error::NotFound));

	let recreated = db.create_storage(b"R", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	assert_eq!(recreated.get(&mut tx, b"k")?, None);
	let mut cursor = recreated.scan_prefix(&mut tx, b"")?;
	assert!(!cursor.next()?);
	drop(cursor);
	tx.abort()?;
	Ok(())
}

/// A test for storage name validation.
pub fn test_storage_names<E: Engine>(db: &Database<E>) -> Result<()> {
	assert_eq!(db.create_storage(b"", StorageOptions::default()), Err(Error::InvalidArgument));
	assert_eq!(db.create_storage(b"a\0b", StorageOptions::default()), Err(Error::InvalidArgument));
	assert_eq!(db.get_storage(b""), Err(Error::InvalidArgument));
	Ok(())
}

/// A test for the transaction lifecycle contract.
pub fn test_inactive_transaction<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	assert!(tx.active());
	tx.commit(false)?;
	assert!(!tx.active());

	// double commit and all data-plane calls on an inactive transaction
	assert_eq!(tx.commit(false), Err(Error::InactiveTransaction));
	assert_eq!(storage.get(&mut tx, b"K"), Err(Error::InactiveTransaction));
	assert_eq!(
		storage.put(&mut tx, b"K", b"V", PutOperation::CreateOrUpdate),
		Err(Error::InactiveTransaction)
	);
	assert_eq!(storage.remove(&mut tx, b"K"), Err(Error::InactiveTransaction));
	assert!(storage.scan_prefix(&mut tx, b"").err() == Some(Error::InactiveTransaction));

	// abort is idempotent, also after commit
	tx.abort()?;
	tx.abort()?;
	assert_eq!(tx.commit(false), Err(Error::InactiveTransaction));
	Ok(())
}

/// A test for session reuse through reset.
pub fn test_transaction_reset<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	assert_eq!(tx.reset(), Err(Error::InvalidState));
	storage.put(&mut tx, b"K", b"a", PutOperation::Create)?;
	tx.commit(false)?;
	tx.reset()?;
	assert!(tx.active());
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"a"[..]));
	tx.abort()?;
	tx.reset()?;
	assert!(tx.active());
	tx.abort()?;
	Ok(())
}

/// A test for the transaction state probe.
pub fn test_transaction_state<E: Engine>(db: &Database<E>) -> Result<()> {
	let mut tx = default_tx(db)?;
	assert_eq!(tx.state(), TransactionState::Started);
	tx.commit(false)?;
	assert_eq!(tx.state(), TransactionState::Durable);
	tx.reset()?;
	tx.abort()?;
	assert_eq!(tx.state(), TransactionState::Aborted);
	Ok(())
}

/// A test that dropping an active transaction discards its writes.
pub fn test_implicit_abort_on_drop<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	{
		let mut tx = default_tx(db)?;
		storage.put(&mut tx, b"K", b"V", PutOperation::CreateOrUpdate)?;
		// dropped while active
	}
	let mut tx = default_tx(db)?;
	assert_eq!(storage.get(&mut tx, b"K")?, None);
	tx.abort()?;
	Ok(())
}

/// A test that group-commit waiting is reported as unsupported.
pub fn test_wait_group_commit_unsupported<E: Engine>(db: &Database<E>) -> Result<()> {
	let mut tx = default_tx(db)?;
	assert_eq!(tx.commit(true), Err(Error::Unsupported));
	assert_eq!(tx.wait_commit(std::time::Duration::from_millis(1)), Err(Error::Unsupported));
	// the transaction is untouched and can still commit normally
	assert!(tx.active());
	tx.commit(false)?;
	Ok(())
}

/// A test for the driver's commit path.
pub fn test_transaction_exec_commit<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	db.transaction_exec(&TransactionOptions::new(), |tx| {
		storage.put(tx, b"K", b"V", PutOperation::CreateOrUpdate).unwrap();
		TransactionOperation::Commit
	})?;
	let mut tx = default_tx(db)?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"V"[..]));
	tx.abort()?;
	Ok(())
}

/// A test for the driver's rollback and error paths.
pub fn test_transaction_exec_rollback_and_error<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let result = db.transaction_exec(&TransactionOptions::new(), |tx| {
		storage.put(tx, b"K", b"V", PutOperation::CreateOrUpdate).unwrap();
		TransactionOperation::Rollback
	});
	assert_eq!(result, Err(Error::UserRollback));

	let result = db.transaction_exec(&TransactionOptions::new(), |_| TransactionOperation::Error);
	assert_eq!(result, Err(Error::UserError));

	let mut tx = default_tx(db)?;
	assert_eq!(storage.get(&mut tx, b"K")?, None);
	tx.abort()?;
	Ok(())
}

/// A test for the driver's retry path: the callback runs again and the
/// retry counter advances.
pub fn test_transaction_exec_retry<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut calls = 0usize;
	let options = TransactionOptions::new().with_retry_count(2);
	db.transaction_exec(&options, |tx| {
		calls += 1;
		if calls == 1 {
			return TransactionOperation::Retry;
		}
		storage.put(tx, b"K", b"V", PutOperation::CreateOrUpdate).unwrap();
		TransactionOperation::Commit
	})?;
	assert_eq!(calls, 2);
	assert_eq!(db.retry_count(), 1);

	let mut tx = default_tx(db)?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"V"[..]));
	tx.abort()?;
	Ok(())
}

/// A test for retry exhaustion: the bound counts retries, not attempts.
pub fn test_transaction_exec_retry_exhaustion<E: Engine>(db: &Database<E>) -> Result<()> {
	let mut calls = 0usize;
	let options = TransactionOptions::new().with_retry_count(2);
	let result = db.transaction_exec(&options, |_| {
		calls += 1;
		TransactionOperation::Retry
	});
	assert_eq!(result, Err(Error::AbortedRetryable));
	assert_eq!(calls, 3);

	// a zero bound surfaces the first retryable outcome
	let mut calls = 0usize;
	let result = db.transaction_exec(&TransactionOptions::new(), |_| {
		calls += 1;
		TransactionOperation::Retry
	});
	assert_eq!(result, Err(Error::AbortedRetryable));
	assert_eq!(calls, 1);
	Ok(())
}

/// A test for read-only transactions rejecting writes.
pub fn test_read_only_rejects_writes<E: Engine>(db: &Database<E>) -> Result<()> {
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = default_tx(db)?;
	storage.put(&mut tx, b"K", b"V", PutOperation::CreateOrUpdate)?;
	tx.commit(false)?;

	let options = TransactionOptions::new().with_transaction_type(TransactionType::ReadOnly);
	let mut tx = db.transaction(options)?;
	assert_eq!(storage.get(&mut tx, b"K")?, Some(&b"V"[..]));
	assert_eq!(
		storage.put(&mut tx, b"K", b"W", PutOperation::CreateOrUpdate),
		Err(Error::IllegalOperation)
	);
	assert_eq!(storage.remove(&mut tx, b"K"), Err(Error::IllegalOperation));
	tx.commit(false)?;
	Ok(())
}

/// A test for long transactions writing only inside their write preserves.
pub fn test_long_write_preserve<E: Engine>(db: &Database<E>) -> Result<()> {
	let preserved = db.create_storage(b"wp1", StorageOptions::default())?;
	let other = db.create_storage(b"wp2", StorageOptions::default())?;
	let options = TransactionOptions::new()
		.with_transaction_type(TransactionType::Long)
		.with_write_preserve(preserved.table_area());
	let mut tx = db.transaction(options)?;
	preserved.put(&mut tx, b"K", b"V", PutOperation::CreateOrUpdate)?;
	assert_eq!(
		other.put(&mut tx, b"K", b"V", PutOperation::CreateOrUpdate),
		Err(Error::WriteWithoutWritePreserve)
	);
	// reads are not restricted by write preserves
	assert_eq!(other.get(&mut tx, b"K")?, None);
	tx.commit(false)?;

	let mut tx = default_tx(db)?;
	assert_eq!(preserved.get(&mut tx, b"K")?, Some(&b"V"[..]));
	tx.abort()?;
	Ok(())
}

/// A test for inclusive and exclusive read areas.
pub fn test_read_areas<E: Engine>(db: &Database<E>) -> Result<()> {
	let inside = db.create_storage(b"ra1", StorageOptions::default())?;
	let outside = db.create_storage(b"ra2", StorageOptions::default())?;

	let options = TransactionOptions::new().with_read_area_inclusive(inside.table_area());
	let mut tx = db.transaction(options)?;
	assert_eq!(inside.get(&mut tx, b"K")?, None);
	assert_eq!(outside.get(&mut tx, b"K"), Err(Error::IllegalOperation));
	assert!(outside.scan_prefix(&mut tx, b"").err() == Some(Error::IllegalOperation));
	tx.abort()?;

	let options = TransactionOptions::new().with_read_area_exclusive(outside.table_area());
	let mut tx = db.transaction(options)?;
	assert_eq!(inside.get(&mut tx, b"K")?, None);
	assert_eq!(outside.get(&mut tx, b"K"), Err(Error::IllegalOperation));
	tx.abort()?;
	Ok(())
}

/// A test for the sequence map contract.
pub fn test_sequences<E: Engine>(db: &Database<E>) -> Result<()> {
	let sequences = db.sequences();
	let id = sequences.create();
	assert!(sequences.put(id, 1, 10));
	assert_eq!(sequences.get(id).map(|v| (v.version(), v.value())), Some((1, 10)));
	assert!(!sequences.put(id, 1, 20));
	assert_eq!(sequences.get(id).map(|v| (v.version(), v.value())), Some((1, 10)));
	assert!(sequences.put(id, 3, 30));
	assert_eq!(sequences.get(id).map(|v| (v.version(), v.value())), Some((3, 30)));
	assert!(!sequences.put(id, 2, 20));
	assert!(sequences.remove(id));
	assert!(!sequences.put(id, 4, 40));
	assert_eq!(sequences.get(id), None);
	Ok(())
}

/// A test that shutdown refuses further transactions.
pub fn test_shutdown<E: Engine>(db: &Database<E>) -> Result<()> {
	assert!(db.alive());
	db.shutdown()?;
	assert!(!db.alive());
	assert!(db.transaction(TransactionOptions::new()).err() == Some(Error::InvalidState));
	Ok(())
}

/// Applies `ops` (key, insert-or-delete) through the API and checks the
/// committed state against an abstract map model. Returns whether they
/// agree.
pub fn check_visible_set<E: Engine>(db: &Database<E>, ops: &[(Vec<u8>, bool)]) -> Result<bool> {
	let storage = db.create_storage(b"model", StorageOptions::default())?;
	let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
	let mut tx = default_tx(db)?;
	for (key, insert) in ops {
		if *insert {
			storage.put(&mut tx, key, key, PutOperation::CreateOrUpdate)?;
			model.insert(key.clone(), key.clone());
		} else {
			let removed = storage.remove(&mut tx, key);
			let model_removed = model.remove(key).is_some();
			match removed {
				Ok(()) if model_removed => {},
				Err(Error::NotFound) if !model_removed => {},
				_ => return Ok(false),
			}
		}
	}
	tx.commit(false)?;
	tx.reset()?;

	let mut seen = Vec::new();
	let mut cursor = storage.scan_prefix(&mut tx, b"")?;
	while cursor.next()? {
		seen.push((cursor.key().to_vec(), cursor.value().to_vec()));
	}
	drop(cursor);
	tx.abort()?;
	let expected: Vec<_> = model.into_iter().collect();
	Ok(seen == expected)
}

fn within_lower(key: &[u8], bound: &[u8], kind: EndPointKind) -> bool {
	match kind {
		EndPointKind::Unbound => true,
		EndPointKind::PrefixedInclusive | EndPointKind::Inclusive => key >= bound,
		EndPointKind::Exclusive => key > bound,
		EndPointKind::PrefixedExclusive => key > bound && !key.starts_with(bound),
	}
}

fn within_upper(key: &[u8], bound: &[u8], kind: EndPointKind) -> bool {
	match kind {
		EndPointKind::Unbound => true,
		EndPointKind::PrefixedInclusive => key <= bound || key.starts_with(bound),
		EndPointKind::Inclusive => key <= bound,
		EndPointKind::Exclusive | EndPointKind::PrefixedExclusive => key < bound,
	}
}

/// Puts `keys` and checks an endpoint-kind scan against direct filtering by
/// the endpoint predicates. Returns whether they agree.
pub fn check_scan_matches_filter<E: Engine>(
	db: &Database<E>,
	keys: &[Vec<u8>],
	begin: &[u8],
	begin_kind: EndPointKind,
	end: &[u8],
	end_kind: EndPointKind,
) -> Result<bool> {
	let storage = db.create_storage(b"filter", StorageOptions::default())?;
	let mut model: BTreeMap<Vec<u8>, ()> = BTreeMap::new();
	let mut tx = default_tx(db)?;
	for key in keys {
		storage.put(&mut tx, key, key, PutOperation::CreateOrUpdate)?;
		model.insert(key.clone(), ());
	}
	tx.commit(false)?;
	tx.reset()?;

	let expected: Vec<Vec<u8>> = model
		.into_keys()
		.filter(|key| within_lower(key, begin, begin_kind) && within_upper(key, end, end_kind))
		.collect();

	let mut seen = Vec::new();
	let mut cursor = storage.scan(&mut tx, begin, begin_kind, end, end_kind)?;
	while cursor.next()? {
		seen.push(cursor.key().to_vec());
	}
	drop(cursor);
	tx.abort()?;
	Ok(seen == expected)
}
