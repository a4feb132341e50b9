//! Per-client activity records and the concurrent store holding them.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::exceedance::ExceedanceTracker;
use crate::prelude::*;
use crate::ring::ActivityRing;

/// Store key: one record per (user, client address) pair within a service.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ClientKey {
	pub user_id: UserId,
	pub client_ip: IpAddr,
}

impl ClientKey {
	pub fn new(user_id: UserId, client_ip: IpAddr) -> Self {
		Self { user_id, client_ip }
	}
}

impl std::fmt::Display for ClientKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{}", self.user_id, self.client_ip)
	}
}

impl Default for ClientKey {
	fn default() -> Self {
		Self { user_id: UserId::INVALID, client_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED) }
	}
}

/// Recent requests and limit-exceedance state for one client of one
/// service.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClientActivity {
	pub requests: ActivityRing,
	pub exceedance: ExceedanceTracker,
	/// Only ever advances forward; the decision engine is its sole writer.
	pub last_report_at: Option<Timestamp>,
}

impl ClientActivity {
	pub fn new(ring_capacity: usize, exceedance_buffer: usize) -> Self {
		Self {
			requests: ActivityRing::new(ring_capacity),
			exceedance: ExceedanceTracker::new(exceedance_buffer),
			last_report_at: None,
		}
	}

	pub fn num_req_since(&self, now: Timestamp, interval: CheckInterval) -> usize {
		self.requests.count_since(now, interval)
	}
}

/// Concurrency-safe map of client activity for one service. Entry-level
/// locking via dashmap: the dispatcher and offloaded sweep tasks may touch
/// different keys in parallel, and a single key's ring operations are
/// atomic under the entry lock.
#[derive(Debug, Default)]
pub struct ClientActivityStore {
	clients: DashMap<ClientKey, ClientActivity>,
}

impl ClientActivityStore {
	pub fn new() -> Self {
		Self { clients: DashMap::new() }
	}

	pub fn from_entries(entries: Vec<(ClientKey, ClientActivity)>) -> Self {
		Self { clients: entries.into_iter().collect() }
	}

	pub fn contains(&self, key: &ClientKey) -> bool {
		self.clients.contains_key(key)
	}

	/// Run `f` against the (lazily created) record for `key`, holding the
	/// entry lock for the duration of the closure.
	pub fn with_entry<T>(
		&self,
		key: ClientKey,
		ring_capacity: usize,
		exceedance_buffer: usize,
		f: impl FnOnce(&mut ClientActivity) -> T,
	) -> T {
		let mut entry = self
			.clients
			.entry(key)
			.or_insert_with(|| ClientActivity::new(ring_capacity, exceedance_buffer));
		f(entry.value_mut())
	}

	/// Run `f` against an existing record, if any.
	pub fn with_existing<T>(
		&self,
		key: &ClientKey,
		f: impl FnOnce(&mut ClientActivity) -> T,
	) -> Option<T> {
		self.clients.get_mut(key).map(|mut entry| f(entry.value_mut()))
	}

	pub fn remove(&self, key: &ClientKey) {
		self.clients.remove(key);
	}

	/// Drop every client whose most recent request predates `edge`.
	/// Returns the number of removed entries.
	pub fn evict_idle_since(&self, edge: Timestamp) -> usize {
		let before = self.clients.len();
		self.clients
			.retain(|_, activity| activity.requests.last().is_some_and(|last| last >= edge));
		before - self.clients.len()
	}

	pub fn for_each(&self, mut f: impl FnMut(&ClientKey, &ClientActivity)) {
		for entry in &self.clients {
			f(entry.key(), entry.value());
		}
	}

	pub fn len(&self) -> usize {
		self.clients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.is_empty()
	}

	/// Sum of retained request records over all clients (summary metric)
	pub fn total_requests(&self) -> usize {
		self.clients.iter().map(|entry| entry.value().requests.len()).sum()
	}

	pub fn snapshot_entries(&self) -> Vec<(ClientKey, ClientActivity)> {
		self.clients.iter().map(|entry| (*entry.key(), entry.value().clone())).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	fn key(user: i64) -> ClientKey {
		ClientKey::new(UserId(user), "1.2.3.4".parse().unwrap())
	}

	#[test]
	fn test_key_format() {
		assert_eq!(key(7).to_string(), "7@1.2.3.4");
	}

	#[test]
	fn test_lazy_creation_and_counts() {
		let store = ClientActivityStore::new();
		assert!(!store.contains(&key(7)));
		store.with_entry(key(7), 16, 4, |activity| {
			activity.requests.push(Timestamp(100));
			activity.requests.push(Timestamp(110));
		});
		assert!(store.contains(&key(7)));
		assert_eq!(store.len(), 1);
		assert_eq!(store.total_requests(), 2);
		let n = store
			.with_existing(&key(7), |a| a.num_req_since(Timestamp(110), CheckInterval(60)));
		assert_eq!(n, Some(2));
	}

	#[test]
	fn test_evict_idle() {
		let store = ClientActivityStore::new();
		store.with_entry(key(1), 16, 4, |a| a.requests.push(Timestamp(100)));
		store.with_entry(key(2), 16, 4, |a| a.requests.push(Timestamp(500)));
		let removed = store.evict_idle_since(Timestamp(200));
		assert_eq!(removed, 1);
		assert!(!store.contains(&key(1)));
		assert!(store.contains(&key(2)));
	}

	#[test]
	fn test_concurrent_dispatch_and_sweep() {
		// the dispatcher appends while a sweep task evicts; per-entry
		// atomicity must hold and the ring never exceeds capacity
		let store = Arc::new(ClientActivityStore::new());
		let writer = {
			let store = Arc::clone(&store);
			std::thread::spawn(move || {
				for i in 0..2000i64 {
					store.with_entry(key(i % 8), 16, 4, |a| {
						a.requests.push(Timestamp(i));
					});
				}
			})
		};
		let sweeper = {
			let store = Arc::clone(&store);
			std::thread::spawn(move || {
				for i in 0..200i64 {
					store.evict_idle_since(Timestamp(i * 10));
				}
			})
		};
		writer.join().unwrap();
		sweeper.join().unwrap();
		store.for_each(|_, activity| assert!(activity.requests.len() <= 16));
	}

	#[test]
	fn test_snapshot_entries_round_trip() {
		let store = ClientActivityStore::new();
		store.with_entry(key(1), 16, 4, |a| a.requests.push(Timestamp(100)));
		store.with_entry(key(2), 16, 4, |a| a.requests.push(Timestamp(200)));
		let restored = ClientActivityStore::from_entries(store.snapshot_entries());
		assert_eq!(restored.len(), 2);
		assert_eq!(restored.total_requests(), 2);
	}
}

// vim: ts=4
