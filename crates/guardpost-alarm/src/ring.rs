//! Fixed-capacity circular history of per-client request timestamps.

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Circular buffer of request timestamps. Appending is O(1); once the
/// buffer is full the oldest entry is silently overwritten. Traversal is
/// always oldest → newest.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActivityRing {
	items: Vec<Timestamp>,
	capacity: usize,
	/// Index of the oldest entry while the buffer is full
	head: usize,
}

impl ActivityRing {
	pub fn new(capacity: usize) -> Self {
		Self { items: Vec::with_capacity(capacity.max(1)), capacity: capacity.max(1), head: 0 }
	}

	pub fn push(&mut self, t: Timestamp) {
		if self.items.len() < self.capacity {
			self.items.push(t);
		} else {
			self.items[self.head] = t;
			self.head = (self.head + 1) % self.capacity;
		}
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Most recent entry
	pub fn last(&self) -> Option<Timestamp> {
		if self.items.is_empty() {
			return None;
		}
		let idx = (self.head + self.items.len() - 1) % self.items.len();
		Some(self.items[idx])
	}

	/// Entries from oldest to newest
	pub fn iter(&self) -> impl Iterator<Item = Timestamp> + '_ {
		let n = self.items.len();
		(0..n).map(move |i| self.items[(self.head + i) % n.max(1)])
	}

	/// Number of entries with a timestamp inside the window
	/// `(now - interval, now]`. Entries are stored oldest-first, so once
	/// an entry is inside the window all following ones are too.
	pub fn count_since(&self, now: Timestamp, interval: CheckInterval) -> usize {
		let edge = now.sub_secs(i64::from(interval.as_secs()));
		let n = self.items.len();
		for (seen, t) in self.iter().enumerate() {
			if t > edge {
				return n - seen;
			}
		}
		0
	}
}


// vim: ts=4
