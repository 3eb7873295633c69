// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use log::warn;

use crate::database::Database;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::options::{TransactionOptions, TransactionState, TransactionType};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Active,
	Committed,
	Aborted,
}

/// A transaction bound to a database session.
///
/// All data-plane calls go through a transaction and require it to be
/// active. A transaction is active from creation (or [`reset`](Self::reset))
/// until [`commit`](Self::commit) or [`abort`](Self::abort). Dropping an
/// active transaction aborts it and logs a warning, since it usually
/// indicates a usage error.
///
/// A transaction must not be shared between threads; the engine session it
/// owns is single-threaded by contract.
pub struct Transaction<'db, E: Engine> {
	db: &'db Database<E>,
	session: E::Session,
	buffer: Vec<u8>,
	state: State,
	options: TransactionOptions,
}

impl<'db, E: Engine> Transaction<'db, E> {
	pub(crate) fn new(db: &'db Database<E>, options: TransactionOptions) -> Result<Self> {
		let mut session = db.engine().session().map_err(Error::from)?;
		db.engine().begin(&mut session, &options)?;
		Ok(Self { db, session, buffer: Vec::with_capacity(1024), state: State::Active, options })
	}

	/// Returns the database this transaction belongs to.
	pub fn database(&self) -> &'db Database<E> {
		self.db
	}

	/// Returns the options the transaction was started with.
	pub fn options(&self) -> &TransactionOptions {
		&self.options
	}

	/// Whether the transaction is neither committed nor aborted.
	pub fn active(&self) -> bool {
		self.state == State::Active
	}

	/// Returns the coarse lifecycle state.
	pub fn state(&self) -> TransactionState {
		match self.state {
			State::Active => TransactionState::Started,
			State::Committed => TransactionState::Durable,
			State::Aborted => TransactionState::Aborted,
		}
	}

	/// Commits the transaction.
	///
	/// `wait_group_commit` is unsupported by the in-process engines and
	/// yields [`Error::Unsupported`] without touching the transaction.
	/// Returns [`Error::AbortedRetryable`] when optimistic validation
	/// fails; the transaction is inactive afterwards either way.
	pub fn commit(&mut self, wait_group_commit: bool) -> Result<()> {
		if wait_group_commit {
			return Err(Error::Unsupported);
		}
		if self.state != State::Active {
			return Err(Error::InactiveTransaction);
		}
		match self.db.engine().commit(&mut self.session) {
			Ok(()) => {
				self.state = State::Committed;
				Ok(())
			},
			Err(status) => {
				let error = Error::from(status);
				if error.is_retryable() {
					// the engine has already released the transaction
					self.state = State::Aborted;
					Err(error)
				} else {
					log::error!("engine commit failed: {error}");
					panic!("unexpected engine commit failure: {error}");
				}
			},
		}
	}

	/// Aborts the transaction. A no-op on an inactive transaction.
	pub fn abort(&mut self) -> Result<()> {
		if self.state != State::Active {
			return Ok(());
		}
		if let Err(status) = self.db.engine().abort(&mut self.session) {
			log::error!("engine abort failed: {status:?}");
			panic!("abort should always be successful");
		}
		self.state = State::Aborted;
		Ok(())
	}

	/// Waits for an asynchronous commit to become durable.
	///
	/// Asynchronous commit is not supported by the in-process engines, so
	/// this always reports [`Error::Unsupported`].
	pub fn wait_commit(&mut self, _timeout: std::time::Duration) -> Result<()> {
		Err(Error::Unsupported)
	}

	/// Recycles this object for a new transaction on the same session.
	///
	/// The transaction must be inactive.
	pub fn reset(&mut self) -> Result<()> {
		if self.state == State::Active {
			return Err(Error::InvalidState);
		}
		self.db.engine().begin(&mut self.session, &self.options)?;
		self.buffer.clear();
		self.state = State::Active;
		Ok(())
	}

	/// Returns the transaction-local buffer holding the most recently read
	/// value. Its content is valid until the next data-plane call on this
	/// transaction.
	pub fn buffer(&self) -> &[u8] {
		&self.buffer
	}

	pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
		&mut self.buffer
	}

	pub(crate) fn session_mut(&mut self) -> &mut E::Session {
		&mut self.session
	}

	pub(crate) fn check_active(&self) -> Result<()> {
		if self.state == State::Active {
			Ok(())
		} else {
			Err(Error::InactiveTransaction)
		}
	}

	pub(crate) fn check_readable(&self, storage: &Storage) -> Result<()> {
		let inclusive = self.options.read_areas_inclusive();
		if !inclusive.is_empty() && !inclusive.iter().any(|area| area.prefix() == storage.prefix()) {
			return Err(Error::IllegalOperation);
		}
		if self.options.read_areas_exclusive().iter().any(|area| area.prefix() == storage.prefix()) {
			return Err(Error::IllegalOperation);
		}
		Ok(())
	}

	pub(crate) fn check_writable(&self, storage: &Storage) -> Result<()> {
		match self.options.transaction_type() {
			TransactionType::Short => Ok(()),
			TransactionType::ReadOnly => Err(Error::IllegalOperation),
			TransactionType::Long => {
				let preserved = self
					.options
					.write_preserves()
					.iter()
					.any(|area| area.prefix() == storage.prefix());
				if preserved {
					Ok(())
				} else {
					Err(Error::WriteWithoutWritePreserve)
				}
			},
		}
	}
}

impl<'db, E: Engine> Drop for Transaction<'db, E> {
	fn drop(&mut self) {
		if self.state == State::Active {
			// usually this implies a usage error
			warn!("aborting a transaction implicitly");
			if let Err(status) = self.db.engine().abort(&mut self.session) {
				log::error!("implicit abort failed: {status:?}");
			}
		}
	}
}
