// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::endpoint::KeyRange;
use crate::engine::{Engine, ScanSupport, Status};
use crate::error::{Error, Result};
use crate::transaction::Transaction;

/// Attempts per record before a concurrent-mutation warning aborts the
/// owning transaction.
const SCAN_RETRY_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	/// Not positioned yet.
	Init,
	/// Positioned on a valid record.
	Body,
	/// Moved past the last record.
	SawEof,
	/// Terminal: empty interval at construction, or error short-circuit.
	End,
}

enum Body<E: Engine> {
	/// Interval proved empty by the endpoint rewriter; no engine state.
	Empty,
	/// All records were fetched when the cursor was constructed.
	Materialized { records: Vec<(Vec<u8>, Vec<u8>)>, index: usize },
	/// Engine-side cursor, opened lazily on the first advance.
	Piecemeal { range: KeyRange, handle: Option<E::ScanHandle>, current: Option<(Vec<u8>, Vec<u8>)> },
}

/// A forward-only cursor over a key range of one storage.
///
/// Whether the records are fetched eagerly or streamed from an engine-side
/// scan handle depends on the engine's [`ScanSupport`]; the surface is the
/// same either way. The cursor borrows its transaction exclusively, so it
/// can never outlive it and no other data-plane call can invalidate the
/// current entry while the cursor exists.
pub struct Cursor<'t, 'db, E: Engine> {
	tx: &'t mut Transaction<'db, E>,
	prefix_len: usize,
	state: State,
	body: Body<E>,
}

impl<'t, 'db, E: Engine> Cursor<'t, 'db, E> {
	pub(crate) fn new(
		tx: &'t mut Transaction<'db, E>,
		prefix_len: usize,
		range: Option<KeyRange>,
	) -> Result<Self> {
		let range = match range {
			None => return Ok(Self { tx, prefix_len, state: State::End, body: Body::Empty }),
			Some(range) => range,
		};
		let body = match E::SCAN_SUPPORT {
			ScanSupport::Materialized => {
				let engine = tx.database().engine();
				let records = engine.scan(tx.session_mut(), &range).map_err(Error::from)?;
				Body::Materialized { records, index: 0 }
			},
			ScanSupport::Cursor => Body::Piecemeal { range, handle: None, current: None },
		};
		Ok(Self { tx, prefix_len, state: State::Init, body })
	}

	/// Advances to the next record.
	///
	/// Returns `Ok(true)` when positioned on a record, `Ok(false)` past the
	/// end, and [`Error::AbortedRetryable`] when the engine kept reporting
	/// concurrent mutations; in that case the owning transaction has been
	/// aborted and the cursor is terminal.
	pub fn next(&mut self) -> Result<bool> {
		match self.state {
			State::End | State::SawEof => return Ok(false),
			State::Init | State::Body => {},
		}
		let engine = self.tx.database().engine();
		match &mut self.body {
			Body::Empty => {
				self.state = State::End;
				Ok(false)
			},
			Body::Materialized { records, index } => {
				let next_index = if self.state == State::Init { 0 } else { *index + 1 };
				if next_index < records.len() {
					*index = next_index;
					self.state = State::Body;
					Ok(true)
				} else {
					self.state = State::SawEof;
					Ok(false)
				}
			},
			Body::Piecemeal { range, handle, current } => {
				if handle.is_none() {
					match engine.open_scan(self.tx.session_mut(), range) {
						Ok(opened) => *handle = Some(opened),
						Err(Status::NotFound) => {
							self.state = State::SawEof;
							return Ok(false);
						},
						Err(Status::ScanLimit) => {
							log::error!("too many open scans");
							self.state = State::End;
							return Err(Error::Unknown);
						},
						Err(status) => {
							self.state = State::End;
							return Err(status.into());
						},
					}
				}
				let opened = handle.as_mut().expect("scan handle opened above; qed");
				let mut attempts = SCAN_RETRY_ATTEMPTS;
				loop {
					match engine.read_from_scan(self.tx.session_mut(), opened) {
						Ok(record) => {
							*current = Some(record);
							self.state = State::Body;
							return Ok(true);
						},
						Err(Status::ScanLimit) => {
							*current = None;
							self.state = State::SawEof;
							return Ok(false);
						},
						Err(status) if status.is_concurrent_mutation() => {
							attempts -= 1;
							if attempts == 0 {
								self.tx.abort()?;
								self.state = State::End;
								return Err(Error::AbortedRetryable);
							}
						},
						Err(status) => {
							self.state = State::End;
							return Err(status.into());
						},
					}
				}
			},
		}
	}

	/// The key under the cursor, relative to the storage.
	///
	/// Must only be called when the last [`next`](Self::next) returned
	/// `Ok(true)`.
	pub fn key(&self) -> &[u8] {
		let raw = self.raw_entry();
		&raw.0[self.prefix_len..]
	}

	/// The value under the cursor.
	///
	/// Must only be called when the last [`next`](Self::next) returned
	/// `Ok(true)`.
	pub fn value(&self) -> &[u8] {
		&self.raw_entry().1
	}

	fn raw_entry(&self) -> &(Vec<u8>, Vec<u8>) {
		assert!(self.state == State::Body, "cursor is not positioned on an entry");
		match &self.body {
			Body::Materialized { records, index } => &records[*index],
			Body::Piecemeal { current, .. } => {
				current.as_ref().expect("cursor in BODY state has a current entry; qed")
			},
			Body::Empty => unreachable!("empty cursor cannot reach BODY state"),
		}
	}
}

impl<'t, 'db, E: Engine> Drop for Cursor<'t, 'db, E> {
	fn drop(&mut self) {
		if let Body::Piecemeal { handle, .. } = &mut self.body {
			if let Some(opened) = handle.take() {
				let engine = self.tx.database().engine();
				match engine.close_scan(self.tx.session_mut(), opened) {
					Ok(()) => {},
					// the engine already invalidated the handle, e.g. when
					// the transaction aborted underneath the cursor
					Err(Status::InvalidHandle) => {},
					Err(status) => log::error!("failed to close scan handle: {status:?}"),
				}
			}
		}
	}
}
