// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Concurrency behavior of the optimistic engine through the public API.

use tkvdb::{
	Database, DatabaseOptions, Error, OperationType, PutOperation, Result, StorageOptions,
	TransactionOperation, TransactionOptions,
};
use tkvdb_occ::{create, OccEngine};

fn db() -> Database<OccEngine> {
	create(&DatabaseOptions::new()).unwrap()
}

#[test]
fn conflicting_writers_abort_retryably() -> Result<()> {
	let db = db();
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut setup = db.transaction(TransactionOptions::new())?;
	storage.put(&mut setup, b"k", b"0", PutOperation::Create)?;
	setup.commit(false)?;

	let mut first = db.transaction(TransactionOptions::new())?;
	let mut second = db.transaction(TransactionOptions::new())?;
	assert_eq!(storage.get(&mut first, b"k")?, Some(&b"0"[..]));
	assert_eq!(storage.get(&mut second, b"k")?, Some(&b"0"[..]));
	storage.put(&mut first, b"k", b"1", PutOperation::Update)?;
	storage.put(&mut second, b"k", b"2", PutOperation::Update)?;

	first.commit(false)?;
	assert_eq!(second.commit(false), Err(Error::AbortedRetryable));
	assert!(!second.active());

	// the losing session retries from the start and succeeds
	second.reset()?;
	assert_eq!(storage.get(&mut second, b"k")?, Some(&b"1"[..]));
	storage.put(&mut second, b"k", b"2", PutOperation::Update)?;
	second.commit(false)?;

	let mut check = db.transaction(TransactionOptions::new())?;
	assert_eq!(storage.get(&mut check, b"k")?, Some(&b"2"[..]));
	check.abort()?;
	Ok(())
}

#[test]
fn cursor_aborts_after_concurrent_delete() -> Result<()> {
	let db = db();
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut setup = db.transaction(TransactionOptions::new())?;
	storage.put(&mut setup, b"a", b"1", PutOperation::Create)?;
	storage.put(&mut setup, b"b", b"2", PutOperation::Create)?;
	setup.commit(false)?;

	let mut scanner = db.transaction(TransactionOptions::new())?;
	let mut cursor = storage.scan_prefix(&mut scanner, b"")?;
	assert!(cursor.next()?);
	assert_eq!(cursor.key(), b"a");

	let mut deleter = db.transaction(TransactionOptions::new())?;
	storage.remove(&mut deleter, b"b")?;
	deleter.commit(false)?;

	// the bounded retry cannot resolve a committed delete; the scanning
	// transaction is aborted underneath the cursor
	assert_eq!(cursor.next(), Err(Error::AbortedRetryable));
	drop(cursor);
	assert!(!scanner.active());
	assert_eq!(storage.get(&mut scanner, b"a"), Err(Error::InactiveTransaction));
	Ok(())
}

#[test]
fn scans_are_phantom_protected() -> Result<()> {
	let db = db();
	let storage = db.create_storage(b"S", StorageOptions::default())?;

	let mut scanner = db.transaction(TransactionOptions::new())?;
	let mut cursor = storage.scan_prefix(&mut scanner, b"")?;
	assert!(!cursor.next()?);
	drop(cursor);

	let mut writer = db.transaction(TransactionOptions::new())?;
	storage.put(&mut writer, b"k", b"v", PutOperation::Create)?;
	writer.commit(false)?;

	storage.put(&mut scanner, b"other", b"x", PutOperation::CreateOrUpdate)?;
	assert_eq!(scanner.commit(false), Err(Error::AbortedRetryable));
	Ok(())
}

#[test]
fn driver_retries_real_conflicts() -> Result<()> {
	let db = db();
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut setup = db.transaction(TransactionOptions::new())?;
	storage.put(&mut setup, b"k", b"0", PutOperation::Create)?;
	setup.commit(false)?;

	let mut calls = 0usize;
	let options = TransactionOptions::new().with_retry_count(TransactionOptions::INF);
	db.transaction_exec(&options, |tx| {
		calls += 1;
		let observed = storage.get(tx, b"k").unwrap().unwrap().to_vec();
		if calls == 1 {
			// a competing transaction commits between read and commit
			let mut rival = db.transaction(TransactionOptions::new()).unwrap();
			storage.put(&mut rival, b"k", b"rival", PutOperation::Update).unwrap();
			rival.commit(false).unwrap();
		}
		storage.put(tx, b"k", &[observed.len() as u8], PutOperation::Update).unwrap();
		TransactionOperation::Commit
	})?;
	assert_eq!(calls, 2);
	assert_eq!(db.retry_count(), 1);

	let mut check = db.transaction(TransactionOptions::new())?;
	assert_eq!(storage.get(&mut check, b"k")?, Some(&[5u8][..]));
	check.abort()?;
	Ok(())
}

#[test]
fn commit_log_is_drainable() -> Result<()> {
	let db = db();
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	// the registry write is a commit like any other; drain it away
	let registry_log = db.engine().take_log_records();
	assert_eq!(registry_log.len(), 1);

	let mut tx = db.transaction(TransactionOptions::new())?;
	storage.put(&mut tx, b"k", b"v", PutOperation::Create)?;
	storage.put(&mut tx, b"l", b"w", PutOperation::Create)?;
	tx.commit(false)?;
	tx.reset()?;
	storage.remove(&mut tx, b"k")?;
	tx.commit(false)?;

	let log = db.engine().take_log_records();
	assert_eq!(log.len(), 3);
	assert_eq!(log[0].operation, OperationType::Insert);
	assert_eq!(log[1].operation, OperationType::Insert);
	assert_eq!(log[0].major_version, log[1].major_version);
	assert_eq!(log[2].operation, OperationType::Delete);
	assert!(log[2].major_version > log[1].major_version);
	// raw keys carry the storage prefix
	assert!(log[0].key.ends_with(b"k"));
	assert!(db.engine().take_log_records().is_empty());
	Ok(())
}

#[test]
fn aborted_transactions_leave_no_trace() -> Result<()> {
	let db = db();
	let storage = db.create_storage(b"S", StorageOptions::default())?;
	let mut tx = db.transaction(TransactionOptions::new())?;
	storage.put(&mut tx, b"k", b"v", PutOperation::Create)?;
	tx.abort()?;

	tx.reset()?;
	assert_eq!(storage.get(&mut tx, b"k")?, None);
	tx.abort()?;
	assert!(db.engine().take_log_records().len() == 1, "only the registry record is logged");
	Ok(())
}
