// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Status taxonomy of the public API.

use thiserror::Error;

/// Outcome of an API operation that did not return a value.
///
/// The variants fall into a few families. `NotFound`, `AlreadyExists` and
/// `UserRollback` are benign signals that callers are expected to branch on.
/// `AbortedRetryable`, `ConflictOnWritePreserve` and
/// `WaitingForOtherTransaction` are transient conflicts: the transaction was
/// aborted by the engine but retrying it from the beginning may succeed.
/// Everything else is either a contract violation by the caller or an
/// environment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
	/// The target element does not exist.
	#[error("NOT_FOUND")]
	NotFound,
	/// The target element already exists.
	#[error("ALREADY_EXISTS")]
	AlreadyExists,
	/// The transaction was rolled back on user request.
	#[error("USER_ROLLBACK")]
	UserRollback,
	/// Unknown engine error.
	#[error("ERR_UNKNOWN")]
	Unknown,
	/// I/O error reported by the engine.
	#[error("ERR_IO_ERROR")]
	IoError,
	/// API arguments are invalid.
	#[error("ERR_INVALID_ARGUMENT")]
	InvalidArgument,
	/// API state is invalid.
	#[error("ERR_INVALID_STATE")]
	InvalidState,
	/// The requested operation is unsupported.
	#[error("ERR_UNSUPPORTED")]
	Unsupported,
	/// The transaction callback reported a user-defined error.
	#[error("ERR_USER_ERROR")]
	UserError,
	/// The transaction was aborted.
	#[error("ERR_ABORTED")]
	Aborted,
	/// The transaction was aborted, but retrying it from the start may
	/// resolve the situation. When this is returned from inside a
	/// transaction callback, finish the callback with
	/// [`TransactionOperation::Retry`](crate::TransactionOperation::Retry);
	/// between explicit begin and commit, abort the transaction and begin a
	/// new one.
	#[error("ERR_ABORTED_RETRYABLE")]
	AbortedRetryable,
	/// The call timed out.
	#[error("ERR_TIME_OUT")]
	TimeOut,
	/// The feature is not yet implemented.
	#[error("ERR_NOT_IMPLEMENTED")]
	NotImplemented,
	/// The operation is not valid in the current transaction.
	#[error("ERR_ILLEGAL_OPERATION")]
	IllegalOperation,
	/// The operation conflicted on a write preserve.
	#[error("ERR_CONFLICT_ON_WRITE_PRESERVE")]
	ConflictOnWritePreserve,
	/// The operation is blocked by another transaction.
	#[error("ERR_WAITING_FOR_OTHER_TRANSACTION")]
	WaitingForOtherTransaction,
	/// A long transaction issued a write without preserving the storage.
	#[error("ERR_WRITE_WITHOUT_WRITE_PRESERVE")]
	WriteWithoutWritePreserve,
	/// The transaction is already committed or aborted.
	#[error("ERR_INACTIVE_TRANSACTION")]
	InactiveTransaction,
}

impl Error {
	/// Whether the error indicates a transient conflict that may resolve if
	/// the whole transaction is retried.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Error::AbortedRetryable | Error::ConflictOnWritePreserve | Error::WaitingForOtherTransaction
		)
	}
}

/// The result type used throughout the API.
pub type Result<T> = std::result::Result<T, Error>;
