// Copyright 2024 Tkvdb Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, HashMap, HashSet};

use tkvdb::endpoint::KeyRange;

/// A buffered write of one session.
pub(crate) enum WriteOp {
	Put { value: Vec<u8> },
	Delete,
}

/// Engine-side transaction context: the read, write and scan sets, plus the
/// scan handles the engine has not invalidated yet.
#[derive(Default)]
pub struct OccSession {
	pub(crate) read_only: bool,
	/// Key to the committed version observed on first read. Validated
	/// against current state at commit.
	pub(crate) reads: HashMap<Vec<u8>, u64>,
	pub(crate) writes: BTreeMap<Vec<u8>, WriteOp>,
	/// Scanned ranges with the committed-live keys observed in them, for
	/// phantom detection. Own writes are deliberately excluded.
	pub(crate) scans: Vec<(KeyRange, Vec<Vec<u8>>)>,
	pub(crate) open_scans: HashSet<u64>,
	pub(crate) next_scan_id: u64,
}

impl OccSession {
	/// Records the version observed for `key`. The first observation wins,
	/// so re-reads validate against what the transaction actually saw
	/// first.
	pub(crate) fn record_read(&mut self, key: &[u8], version: u64) {
		if !self.read_only {
			self.reads.entry(key.to_vec()).or_insert(version);
		}
	}

	pub(crate) fn clear(&mut self) {
		self.reads.clear();
		self.writes.clear();
		self.scans.clear();
		self.open_scans.clear();
	}
}

/// An engine-side cursor: the keys that matched the range when the scan was
/// opened, and the read position.
pub struct OccScanHandle {
	pub(crate) id: u64,
	pub(crate) keys: Vec<Vec<u8>>,
	pub(crate) position: usize,
}
