//! Registered backend services and their limit configuration.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::activity::ClientActivityStore;
use crate::prelude::*;

pub const DFLT_CLEANUP_PROBABILITY: f64 = 0.5;

/// One request-rate limit: at most `threshold` requests per check interval.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Limit {
	#[serde(rename = "reqPerTimeThreshold")]
	pub threshold: u32,
	#[serde(rename = "reqCheckingIntervalSecs")]
	pub check_interval: CheckInterval,
}

/// Alarm setup for a concrete service.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAlarmConf {
	pub recipients: Vec<String>,
	/// Probability that processing one event also schedules an idle-client
	/// sweep for the service
	#[serde(default)]
	pub cleanup_probability: f64,
}

/// Everything the engine keeps about one watched service: its alarm
/// configuration, the limits per check interval, and its clients' recent
/// activity. Created at registration, never deleted while the process runs.
#[derive(Debug)]
pub struct ServiceEntry {
	pub service: Box<str>,
	pub conf: ServiceAlarmConf,
	pub limits: BTreeMap<CheckInterval, u32>,
	pub clients: ClientActivityStore,
}

impl ServiceEntry {
	pub fn longest_interval(&self) -> Option<CheckInterval> {
		self.limits.keys().next_back().copied()
	}
}

/// Concurrent map of service name → entry.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
	services: DashMap<Box<str>, Arc<ServiceEntry>>,
}

impl ServiceRegistry {
	pub fn new() -> Self {
		Self { services: DashMap::new() }
	}

	/// Register a service for watching. An unset cleanup probability falls
	/// back to a logged default.
	pub fn register(&self, service: &str, mut conf: ServiceAlarmConf, limits: &[Limit]) {
		if conf.cleanup_probability == 0.0 {
			warn!(
				service = service,
				value = DFLT_CLEANUP_PROBABILITY,
				"Service's cleanupProbability not set, using default"
			);
			conf.cleanup_probability = DFLT_CLEANUP_PROBABILITY;
		}
		let limits: BTreeMap<CheckInterval, u32> =
			limits.iter().map(|l| (l.check_interval, l.threshold)).collect();
		let entry = Arc::new(ServiceEntry {
			service: service.into(),
			conf,
			limits,
			clients: ClientActivityStore::new(),
		});
		self.services.insert(service.into(), entry);
		info!(service = service, "Registered alarm for service");
	}

	pub fn get(&self, service: &str) -> Option<Arc<ServiceEntry>> {
		self.services.get(service).map(|entry| Arc::clone(entry.value()))
	}

	pub fn for_each(&self, mut f: impl FnMut(&Arc<ServiceEntry>)) {
		for entry in &self.services {
			f(entry.value());
		}
	}

	pub fn service_names(&self) -> Vec<Box<str>> {
		self.services.iter().map(|entry| entry.key().clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.services.len()
	}

	pub fn is_empty(&self) -> bool {
		self.services.is_empty()
	}

	/// Replace the activity store of a registered service (snapshot reload).
	/// Configuration always comes from the running process, only client
	/// state is adopted from the snapshot.
	pub fn restore_clients(&self, service: &str, clients: ClientActivityStore) {
		if let Some(entry) = self.services.get(service) {
			let old = entry.value();
			let restored = Arc::new(ServiceEntry {
				service: old.service.clone(),
				conf: old.conf.clone(),
				limits: old.limits.clone(),
				clients,
			});
			drop(entry);
			self.services.insert(service.into(), restored);
		} else {
			warn!(service = service, "Snapshot contains unregistered service, skipping");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn limits() -> Vec<Limit> {
		vec![
			Limit { threshold: 10, check_interval: CheckInterval(60) },
			Limit { threshold: 1000, check_interval: CheckInterval(3600) },
		]
	}

	#[test]
	fn test_register_and_lookup() {
		let registry = ServiceRegistry::new();
		registry.register(
			"demo",
			ServiceAlarmConf { recipients: vec!["ops@example.com".into()], cleanup_probability: 0.3 },
			&limits(),
		);
		let entry = registry.get("demo").unwrap();
		assert_eq!(entry.limits.get(&CheckInterval(60)), Some(&10));
		assert_eq!(entry.longest_interval(), Some(CheckInterval(3600)));
		assert!(registry.get("other").is_none());
	}

	#[test]
	fn test_default_cleanup_probability() {
		let registry = ServiceRegistry::new();
		registry.register(
			"demo",
			ServiceAlarmConf { recipients: vec![], cleanup_probability: 0.0 },
			&limits(),
		);
		let entry = registry.get("demo").unwrap();
		assert!((entry.conf.cleanup_probability - DFLT_CLEANUP_PROBABILITY).abs() < 1e-9);
	}

	#[test]
	fn test_limit_serde_field_names() {
		let limit = Limit { threshold: 10, check_interval: CheckInterval(60) };
		let json = serde_json::to_value(limit).unwrap();
		assert_eq!(json["reqPerTimeThreshold"], 10);
		assert_eq!(json["reqCheckingIntervalSecs"], 60);
	}
}

// vim: ts=4
