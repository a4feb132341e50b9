//! In-memory collaborator implementations.
//!
//! These back the trait boundaries with process-local state: enough for a
//! single-node gateway and for wiring the engine without external
//! databases. Deployments with shared stores implement the same traits
//! against their own backends.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use guardpost_types::guard_adapter::{
	AllowListAdapter, BanAdapter, BanId, User, UserBan, UserDirectory,
};
use guardpost_types::reporting_adapter::{ReportingWriter, SummaryRecord};

use crate::config::{ServiceConfig, UserConfig};
use crate::prelude::*;

/// Allow list seeded from the configuration file.
#[derive(Debug, Default)]
pub struct ConfigAllowList {
	users: HashMap<Box<str>, Vec<UserId>>,
}

impl ConfigAllowList {
	pub fn from_services(services: &[ServiceConfig]) -> Self {
		let users = services
			.iter()
			.map(|service| {
				(
					service.name.as_str().into(),
					service.allow_list.iter().map(|id| UserId(*id)).collect(),
				)
			})
			.collect();
		Self { users }
	}
}

#[async_trait]
impl AllowListAdapter for ConfigAllowList {
	async fn allow_list_users(&self, service: &str) -> GpResult<Vec<UserId>> {
		Ok(self.users.get(service).cloned().unwrap_or_default())
	}
}

/// Process-local ban store. Bans survive only as long as the process;
/// issued IDs are unique within it.
#[derive(Debug, Default)]
pub struct MemBanStore {
	bans: DashMap<BanId, UserBan>,
	next_id: AtomicI64,
}

impl MemBanStore {
	pub fn new() -> Self {
		Self { bans: DashMap::new(), next_id: AtomicI64::new(1) }
	}
}

#[async_trait]
impl BanAdapter for MemBanStore {
	async fn ban_user(
		&self,
		user_id: UserId,
		report_id: Option<&str>,
		start: Timestamp,
		end: Timestamp,
	) -> GpResult<BanId> {
		let overlapping = self
			.bans
			.iter()
			.any(|entry| entry.value().user_id == user_id && entry.value().overlaps(start, end));
		if overlapping {
			return Err(Error::UserAlreadyBanned);
		}
		let ban_id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.bans.insert(
			ban_id,
			UserBan {
				ban_id,
				user_id,
				report_id: report_id.map(Into::into),
				start,
				end,
				active: true,
			},
		);
		Ok(ban_id)
	}

	async fn find_ban_by_report(&self, report_id: &str) -> GpResult<Option<UserBan>> {
		Ok(self
			.bans
			.iter()
			.find(|entry| entry.value().report_id.as_deref() == Some(report_id))
			.map(|entry| entry.value().clone()))
	}
}

/// User directory seeded from the configuration file.
#[derive(Debug, Default)]
pub struct ConfigUserDirectory {
	users: HashMap<UserId, User>,
}

impl ConfigUserDirectory {
	pub fn from_users(users: &[UserConfig]) -> Self {
		let users = users
			.iter()
			.map(|user| {
				(
					UserId(user.id),
					User {
						id: UserId(user.id),
						username: user.username.as_str().into(),
						first_name: user.first_name.as_deref().map(Into::into),
						last_name: user.last_name.as_deref().map(Into::into),
						affiliation: user.affiliation.as_deref().map(Into::into),
					},
				)
			})
			.collect();
		Self { users }
	}
}

#[async_trait]
impl UserDirectory for ConfigUserDirectory {
	async fn user_info(&self, user_id: UserId) -> GpResult<Option<User>> {
		Ok(self.users.get(&user_id).cloned())
	}
}

/// Reporting sink that writes summary records to the log. Stands in for a
/// time-series backend.
#[derive(Debug, Default)]
pub struct LogReportingWriter;

impl ReportingWriter for LogReportingWriter {
	fn write(&self, table: &str, record: SummaryRecord) {
		info!(
			table,
			at = %record.created,
			tags = ?record.tags,
			fields = ?record.fields,
			"Summary record"
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_ban_overlap_rejected() {
		let store = MemBanStore::new();
		let first = store
			.ban_user(UserId(7), Some("abc"), Timestamp(100), Timestamp(200))
			.await
			.unwrap();
		let err = store
			.ban_user(UserId(7), Some("def"), Timestamp(150), Timestamp(250))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::UserAlreadyBanned));
		// disjoint period and other users are fine
		store.ban_user(UserId(7), None, Timestamp(300), Timestamp(400)).await.unwrap();
		store.ban_user(UserId(8), None, Timestamp(150), Timestamp(250)).await.unwrap();

		let found = store.find_ban_by_report("abc").await.unwrap().unwrap();
		assert_eq!(found.ban_id, first);
		assert!(store.find_ban_by_report("missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_config_seeded_lookup() {
		let services = vec![ServiceConfig {
			name: "demo".into(),
			recipients: vec![],
			cleanup_probability: 0.0,
			limits: vec![],
			allow_list: vec![5, 8],
		}];
		let allow = ConfigAllowList::from_services(&services);
		assert_eq!(allow.allow_list_users("demo").await.unwrap(), vec![UserId(5), UserId(8)]);
		assert!(allow.allow_list_users("other").await.unwrap().is_empty());

		let users = vec![UserConfig {
			id: 7,
			username: "mallory".into(),
			first_name: None,
			last_name: None,
			affiliation: Some("acme".into()),
		}];
		let dir = ConfigUserDirectory::from_users(&users);
		let user = dir.user_info(UserId(7)).await.unwrap().unwrap();
		assert_eq!(&*user.username, "mallory");
		assert!(dir.user_info(UserId(9)).await.unwrap().is_none());
	}
}

// vim: ts=4
