// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use quickcheck::quickcheck;
use tkvdb::{Database, DatabaseOptions, EndPointKind, Error, OpenMode, Result};
use tkvdb_memorydb::{create, MemoryEngine};
use tkvdb_shared_tests as st;

fn db() -> Database<MemoryEngine> {
	create(&DatabaseOptions::new()).unwrap()
}

#[test]
fn put_and_get() -> Result<()> {
	st::test_put_and_get(&db())
}

#[test]
fn get_uncommitted() -> Result<()> {
	st::test_get_uncommitted(&db())
}

#[test]
fn put_operations() -> Result<()> {
	st::test_put_operations(&db())
}

#[test]
fn remove() -> Result<()> {
	st::test_remove(&db())
}

#[test]
fn scan_prefix() -> Result<()> {
	st::test_scan_prefix(&db())
}

#[test]
fn scan_range() -> Result<()> {
	st::test_scan_range(&db())
}

#[test]
fn scan_range_exclusive() -> Result<()> {
	st::test_scan_range_exclusive(&db())
}

#[test]
fn scan_unbound() -> Result<()> {
	st::test_scan_unbound(&db())
}

#[test]
fn scan_prefixed_endpoints() -> Result<()> {
	st::test_scan_prefixed_endpoints(&db())
}

#[test]
fn scan_empty_interval() -> Result<()> {
	st::test_scan_empty_interval(&db())
}

#[test]
fn scan_empty_storage() -> Result<()> {
	st::test_scan_empty_storage(&db())
}

#[test]
fn scan_uncommitted() -> Result<()> {
	st::test_scan_uncommitted(&db())
}

#[test]
fn prefix_isolation() -> Result<()> {
	st::test_prefix_isolation(&db())
}

#[test]
fn storage_isolation() -> Result<()> {
	st::test_storage_isolation(&db())
}

#[test]
fn storage_registry() -> Result<()> {
	st::test_storage_registry(&db())
}

#[test]
fn storage_names() -> Result<()> {
	st::test_storage_names(&db())
}

#[test]
fn inactive_transaction() -> Result<()> {
	st::test_inactive_transaction(&db())
}

#[test]
fn transaction_reset() -> Result<()> {
	st::test_transaction_reset(&db())
}

#[test]
fn transaction_state() -> Result<()> {
	st::test_transaction_state(&db())
}

#[test]
fn implicit_abort_on_drop() -> Result<()> {
	st::test_implicit_abort_on_drop(&db())
}

#[test]
fn wait_group_commit_unsupported() -> Result<()> {
	st::test_wait_group_commit_unsupported(&db())
}

#[test]
fn transaction_exec_commit() -> Result<()> {
	st::test_transaction_exec_commit(&db())
}

#[test]
fn transaction_exec_rollback_and_error() -> Result<()> {
	st::test_transaction_exec_rollback_and_error(&db())
}

#[test]
fn transaction_exec_retry() -> Result<()> {
	st::test_transaction_exec_retry(&db())
}

#[test]
fn transaction_exec_retry_exhaustion() -> Result<()> {
	st::test_transaction_exec_retry_exhaustion(&db())
}

#[test]
fn read_only_rejects_writes() -> Result<()> {
	st::test_read_only_rejects_writes(&db())
}

#[test]
fn long_write_preserve() -> Result<()> {
	st::test_long_write_preserve(&db())
}

#[test]
fn read_areas() -> Result<()> {
	st::test_read_areas(&db())
}

#[test]
fn sequences() -> Result<()> {
	st::test_sequences(&db())
}

#[test]
fn shutdown() -> Result<()> {
	st::test_shutdown(&db())
}

#[test]
fn restore_is_unsupported() {
	let options = DatabaseOptions::new().with_open_mode(OpenMode::Restore);
	assert!(matches!(create(&options), Err(Error::Unsupported)));
}

#[test]
fn perf_attribute_is_validated() {
	for accepted in ["", "0", "false", "1", "true"] {
		let options = DatabaseOptions::new().with_attribute("perf", accepted);
		assert!(create(&options).is_ok(), "perf={accepted:?} should be accepted");
	}
	let options = DatabaseOptions::new().with_attribute("perf", "yes");
	assert!(matches!(create(&options), Err(Error::InvalidArgument)));
}

#[test]
fn tracking_counts_driver_transactions() -> Result<()> {
	let db = create(&DatabaseOptions::new().with_attribute("perf", "1"))?;
	assert!(db.enable_tracking());
	db.transaction_exec(&Default::default(), |_| tkvdb::TransactionOperation::Commit)?;
	db.transaction_exec(&Default::default(), |_| tkvdb::TransactionOperation::Commit)?;
	assert_eq!(db.transaction_count(), 2);
	db.shutdown()
}

fn kind(raw: u8) -> EndPointKind {
	match raw % 5 {
		0 => EndPointKind::Unbound,
		1 => EndPointKind::PrefixedInclusive,
		2 => EndPointKind::Inclusive,
		3 => EndPointKind::Exclusive,
		_ => EndPointKind::PrefixedExclusive,
	}
}

fn clamp_keys(keys: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
	keys.into_iter()
		.filter(|key| !key.is_empty())
		.map(|mut key| {
			key.truncate(8);
			key
		})
		.collect()
}

quickcheck! {
	fn visible_set_matches_model(ops: Vec<(Vec<u8>, bool)>) -> bool {
		let ops: Vec<_> =
			ops.into_iter().filter(|(key, _)| !key.is_empty() && key.len() <= 8).collect();
		st::check_visible_set(&db(), &ops).unwrap()
	}

	fn scans_match_endpoint_predicates(
		keys: Vec<Vec<u8>>,
		begin: Vec<u8>,
		begin_kind: u8,
		end: Vec<u8>,
		end_kind: u8
	) -> bool {
		let keys = clamp_keys(keys);
		let mut begin = begin;
		begin.truncate(8);
		let mut end = end;
		end.truncate(8);
		st::check_scan_matches_filter(&db(), &keys, &begin, kind(begin_kind), &end, kind(end_kind))
			.unwrap()
	}
}
