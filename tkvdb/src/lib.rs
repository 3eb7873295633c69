// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Transactional key-value storage abstraction.
//!
//! A [`Database`] maps named [`Storage`]s onto the global byte-key order of
//! an [`Engine`](engine::Engine) via per-storage key prefixes, and mediates
//! all reads and writes through [`Transaction`]s with commit/abort
//! semantics defined by the engine's concurrency control. Range scans go
//! through a forward-only [`Cursor`] whose endpoints support prefix
//! semantics in addition to plain inclusive/exclusive bounds.
//!
//! The crate ships the abstraction only; pick an engine crate (for example
//! `tkvdb-memorydb` or `tkvdb-occ`) to obtain a working database:
//!
//! ```ignore
//! let db = Database::open(MemoryEngine::default(), &DatabaseOptions::new())?;
//! let storage = db.create_storage(b"orders", StorageOptions::default())?;
//! let mut tx = db.transaction(TransactionOptions::new())?;
//! storage.put(&mut tx, b"k", b"v", PutOperation::CreateOrUpdate)?;
//! tx.commit(false)?;
//! ```

mod cursor;
mod database;
pub mod endpoint;
pub mod engine;
mod error;
mod log_record;
mod options;
mod sequence;
mod storage;
mod transaction;

pub use cursor::Cursor;
pub use database::Database;
pub use endpoint::EndPointKind;
pub use error::{Error, Result};
pub use log_record::{LogRecord, OperationType};
pub use options::{
	DatabaseOptions, OpenMode, PutOperation, StorageOptions, TableArea, TransactionOperation,
	TransactionOptions, TransactionState, TransactionType,
};
pub use sequence::{SequenceId, SequenceMap, SequenceValue, SequenceVersion, VersionedValue};
pub use storage::Storage;
pub use transaction::Transaction;
