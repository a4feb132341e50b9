//! Periodically refreshed cache of user IDs exempt from checking.

use dashmap::DashMap;
use std::sync::Arc;

use guardpost_types::guard_adapter::AllowListAdapter;

use crate::prelude::*;
use crate::registry::ServiceRegistry;

/// Per-service allow list, fully replaced (not merged) on each reload.
/// In between reloads the decision engine only reads it.
#[derive(Debug, Default)]
pub struct AllowListCache {
	users: DashMap<Box<str>, Vec<UserId>>,
}

impl AllowListCache {
	pub fn new() -> Self {
		Self { users: DashMap::new() }
	}

	/// Reload the allow list of every registered service from the external
	/// store. A failing service keeps its previous list; the failure is
	/// logged and never interrupts the engine.
	pub async fn reload(&self, registry: &ServiceRegistry, adapter: &Arc<dyn AllowListAdapter>) {
		let mut total = 0usize;
		for service in registry.service_names() {
			match adapter.allow_list_users(&service).await {
				Ok(list) => {
					total += list.len();
					self.users.insert(service, list);
				}
				Err(err) => {
					error!(
						service = %service,
						error = %err,
						"Failed to reload user allow list"
					);
				}
			}
		}
		info!(items_loaded = total, "Reloaded user allow lists for all services");
	}

	/// True when the event should not be counted at all: the user is
	/// allow-listed for the service, or the identity is invalid/anonymous.
	pub fn is_ignorable(&self, service: &str, user_id: UserId) -> bool {
		if !user_id.is_valid() {
			return true;
		}
		self.users
			.get(service)
			.is_some_and(|list| list.value().contains(&user_id))
	}
}


// vim: ts=4
