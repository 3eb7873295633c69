// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Option objects consumed by database open, storage creation and
//! transaction begin.

use std::collections::BTreeMap;
use std::fmt;

/// Database open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
	/// Restore the target database; fail if nothing was persisted.
	Restore,
	/// Create the target database, restoring what exists.
	#[default]
	CreateOrRestore,
}

impl fmt::Display for OpenMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OpenMode::Restore => f.write_str("RESTORE"),
			OpenMode::CreateOrRestore => f.write_str("CREATE_OR_RESTORE"),
		}
	}
}

/// Options for opening a database.
#[derive(Debug, Clone, Default)]
pub struct DatabaseOptions {
	open_mode: OpenMode,
	attributes: BTreeMap<String, String>,
}

impl DatabaseOptions {
	/// Creates options with the default open mode and no attributes.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the open mode.
	pub fn open_mode(&self) -> OpenMode {
		self.open_mode
	}

	/// Sets the open mode.
	pub fn with_open_mode(mut self, mode: OpenMode) -> Self {
		self.open_mode = mode;
		self
	}

	/// Returns the attribute value for `key`, if any.
	pub fn attribute(&self, key: &str) -> Option<&str> {
		self.attributes.get(key).map(String::as_str)
	}

	/// Adds or replaces an attribute.
	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}

	/// Iterates over all attributes in key order.
	pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
		self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// Per-storage options carried by each [`Storage`](crate::Storage).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageOptions {
	storage_id: Option<u64>,
	payload: Vec<u8>,
}

impl StorageOptions {
	/// Sentinel for a storage without an assigned id.
	pub const UNDEFINED: u64 = u64::MAX;

	/// Creates options with the given storage id.
	pub fn new(storage_id: u64) -> Self {
		Self { storage_id: Some(storage_id), payload: Vec::new() }
	}

	/// Returns the storage id, or [`StorageOptions::UNDEFINED`].
	pub fn storage_id(&self) -> u64 {
		self.storage_id.unwrap_or(Self::UNDEFINED)
	}

	/// Sets the opaque metadata payload.
	pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
		self.payload = payload;
		self
	}

	/// Returns the opaque metadata payload.
	pub fn payload(&self) -> &[u8] {
		&self.payload
	}
}

/// Transaction kind requested at begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionType {
	/// Short transaction governed by optimistic concurrency control.
	#[default]
	Short,
	/// Long transaction with pre-declared write preserves.
	Long,
	/// Read-only transaction; writes are rejected.
	ReadOnly,
}

impl fmt::Display for TransactionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransactionType::Short => f.write_str("SHORT"),
			TransactionType::Long => f.write_str("LONG"),
			TransactionType::ReadOnly => f.write_str("READ_ONLY"),
		}
	}
}

/// A storage referenced by a write preserve or read area declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableArea {
	prefix: Vec<u8>,
}

impl TableArea {
	pub(crate) fn from_prefix(prefix: Vec<u8>) -> Self {
		Self { prefix }
	}

	pub(crate) fn prefix(&self) -> &[u8] {
		&self.prefix
	}
}

/// Options for beginning a transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
	transaction_type: TransactionType,
	retry_count: usize,
	write_preserves: Vec<TableArea>,
	read_areas_inclusive: Vec<TableArea>,
	read_areas_exclusive: Vec<TableArea>,
}

impl TransactionOptions {
	/// Retry the transaction until a fatal error occurs.
	pub const INF: usize = usize::MAX;

	/// Creates the default options: a short transaction that is never
	/// retried by [`transaction_exec`](crate::Database::transaction_exec).
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the transaction type.
	pub fn transaction_type(&self) -> TransactionType {
		self.transaction_type
	}

	/// Sets the transaction type.
	pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
		self.transaction_type = transaction_type;
		self
	}

	/// Returns the maximum number of retry attempts used by the driver:
	/// `0` never retries, [`TransactionOptions::INF`] retries until a fatal
	/// error.
	pub fn retry_count(&self) -> usize {
		self.retry_count
	}

	/// Sets the driver retry bound.
	pub fn with_retry_count(mut self, count: usize) -> Self {
		self.retry_count = count;
		self
	}

	/// Returns the storages a long transaction intends to write.
	pub fn write_preserves(&self) -> &[TableArea] {
		&self.write_preserves
	}

	/// Declares a storage the transaction intends to write.
	pub fn with_write_preserve(mut self, area: TableArea) -> Self {
		self.write_preserves.push(area);
		self
	}

	/// Returns the storages the transaction restricts its reads to.
	pub fn read_areas_inclusive(&self) -> &[TableArea] {
		&self.read_areas_inclusive
	}

	/// Restricts reads to the given storage; may be repeated.
	pub fn with_read_area_inclusive(mut self, area: TableArea) -> Self {
		self.read_areas_inclusive.push(area);
		self
	}

	/// Returns the storages the transaction must not read.
	pub fn read_areas_exclusive(&self) -> &[TableArea] {
		&self.read_areas_exclusive
	}

	/// Forbids reads from the given storage; may be repeated.
	pub fn with_read_area_exclusive(mut self, area: TableArea) -> Self {
		self.read_areas_exclusive.push(area);
		self
	}
}

/// How a put resolves against an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutOperation {
	/// Fail with already-exists when a record is present.
	Create,
	/// Fail with not-found when no record is present.
	Update,
	/// Insert or overwrite unconditionally.
	#[default]
	CreateOrUpdate,
}

/// Verdict returned by a transaction callback to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOperation {
	/// Commit the current transaction.
	Commit,
	/// Abort and roll back the current transaction.
	Rollback,
	/// Report an unrecoverable user error.
	Error,
	/// Abort the current transaction and run the callback again.
	Retry,
}

impl fmt::Display for TransactionOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransactionOperation::Commit => f.write_str("COMMIT"),
			TransactionOperation::Rollback => f.write_str("ROLLBACK"),
			TransactionOperation::Error => f.write_str("ERROR"),
			TransactionOperation::Retry => f.write_str("RETRY"),
		}
	}
}

/// Coarse lifecycle state reported by [`Transaction::state`](crate::Transaction::state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
	/// The transaction has not started yet.
	WaitingStart,
	/// The transaction is in progress.
	Started,
	/// The transaction is waiting for commit validation.
	WaitingCcCommit,
	/// The transaction was aborted.
	Aborted,
	/// The transaction committed and is waiting to become durable.
	WaitingDurable,
	/// The transaction committed.
	Durable,
}

impl fmt::Display for TransactionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransactionState::WaitingStart => f.write_str("WAITING_START"),
			TransactionState::Started => f.write_str("STARTED"),
			TransactionState::WaitingCcCommit => f.write_str("WAITING_CC_COMMIT"),
			TransactionState::Aborted => f.write_str("ABORTED"),
			TransactionState::WaitingDurable => f.write_str("WAITING_DURABLE"),
			TransactionState::Durable => f.write_str("DURABLE"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn database_options_attributes() {
		let options = DatabaseOptions::new()
			.with_open_mode(OpenMode::Restore)
			.with_attribute("perf", "1")
			.with_attribute("location", "/tmp/db");
		assert_eq!(options.open_mode(), OpenMode::Restore);
		assert_eq!(options.attribute("perf"), Some("1"));
		assert_eq!(options.attribute("location"), Some("/tmp/db"));
		assert_eq!(options.attribute("missing"), None);
		// last write wins
		let options = options.with_attribute("perf", "0");
		assert_eq!(options.attribute("perf"), Some("0"));
	}

	#[test]
	fn storage_options_defaults() {
		let options = StorageOptions::default();
		assert_eq!(options.storage_id(), StorageOptions::UNDEFINED);
		assert!(options.payload().is_empty());

		let options = StorageOptions::new(100).with_payload(b"metadata".to_vec());
		assert_eq!(options.storage_id(), 100);
		assert_eq!(options.payload(), b"metadata");
	}

	#[test]
	fn transaction_options_builder() {
		let options = TransactionOptions::new();
		assert_eq!(options.transaction_type(), TransactionType::Short);
		assert_eq!(options.retry_count(), 0);

		let options = TransactionOptions::new()
			.with_transaction_type(TransactionType::Long)
			.with_retry_count(TransactionOptions::INF)
			.with_write_preserve(TableArea::from_prefix(b"wp\0".to_vec()));
		assert_eq!(options.transaction_type(), TransactionType::Long);
		assert_eq!(options.retry_count(), TransactionOptions::INF);
		assert_eq!(options.write_preserves().len(), 1);
	}

	#[test]
	fn operation_labels() {
		assert_eq!(TransactionOperation::Commit.to_string(), "COMMIT");
		assert_eq!(TransactionOperation::Rollback.to_string(), "ROLLBACK");
		assert_eq!(TransactionOperation::Error.to_string(), "ERROR");
		assert_eq!(TransactionOperation::Retry.to_string(), "RETRY");
		assert_eq!(TransactionType::ReadOnly.to_string(), "READ_ONLY");
		assert_eq!(OpenMode::CreateOrRestore.to_string(), "CREATE_OR_RESTORE");
	}
}
