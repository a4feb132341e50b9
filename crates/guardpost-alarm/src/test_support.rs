//! Stub collaborators shared by the unit tests in this crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use guardpost_types::guard_adapter::{
	AllowListAdapter, BanAdapter, BanId, User, UserBan, UserDirectory,
};
use guardpost_types::notify_adapter::{Notification, NotifyConf, NotifyTransport};
use guardpost_types::reporting_adapter::{ReportingWriter, SummaryRecord};

use crate::prelude::*;

/// Allow-list adapter backed by a fixed in-memory map, optionally failing
/// every lookup.
#[derive(Debug, Default)]
pub struct StaticAllowList {
	users: HashMap<Box<str>, Vec<UserId>>,
	fail: bool,
}

impl StaticAllowList {
	pub fn with_users(service: &str, ids: &[i64]) -> Self {
		let mut users = HashMap::new();
		users.insert(service.into(), ids.iter().map(|id| UserId(*id)).collect());
		Self { users, fail: false }
	}

	pub fn failing() -> Self {
		Self { users: HashMap::new(), fail: true }
	}
}

#[async_trait]
impl AllowListAdapter for StaticAllowList {
	async fn allow_list_users(&self, service: &str) -> GpResult<Vec<UserId>> {
		if self.fail {
			return Err(Error::Internal("allow list store unavailable".into()));
		}
		Ok(self.users.get(service).cloned().unwrap_or_default())
	}
}

/// Ban store keeping issued bans in memory, rejecting overlaps like the
/// real store does.
#[derive(Debug, Default)]
pub struct MemBanStore {
	bans: Mutex<Vec<UserBan>>,
	next_id: AtomicI64,
}

impl MemBanStore {
	pub fn new() -> Self {
		Self { bans: Mutex::new(Vec::new()), next_id: AtomicI64::new(1) }
	}

	pub fn bans(&self) -> Vec<UserBan> {
		self.bans.lock().clone()
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
		let mut bans = self.bans.lock();
		if bans.iter().any(|ban| ban.user_id == user_id && ban.overlaps(start, end)) {
			return Err(Error::UserAlreadyBanned);
		}
		let ban_id = self.next_id.fetch_add(1, Ordering::Relaxed);
		bans.push(UserBan {
			ban_id,
			user_id,
			report_id: report_id.map(Into::into),
			start,
			end,
			active: true,
		});
		Ok(ban_id)
	}

	async fn find_ban_by_report(&self, report_id: &str) -> GpResult<Option<UserBan>> {
		Ok(self
			.bans
			.lock()
			.iter()
			.find(|ban| ban.report_id.as_deref() == Some(report_id))
			.cloned())
	}
}

/// User directory resolving a fixed set of users; unknown IDs are `None`,
/// a failing directory errors on every lookup.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
	users: HashMap<UserId, User>,
	fail: bool,
}

impl StaticUserDirectory {
	pub fn with_user(id: i64, username: &str) -> Self {
		let mut users = HashMap::new();
		users.insert(
			UserId(id),
			User {
				id: UserId(id),
				username: username.into(),
				first_name: None,
				last_name: None,
				affiliation: None,
			},
		);
		Self { users, fail: false }
	}

	pub fn failing() -> Self {
		Self { users: HashMap::new(), fail: true }
	}
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
	async fn user_info(&self, user_id: UserId) -> GpResult<Option<User>> {
		if self.fail {
			return Err(Error::Internal("user directory unavailable".into()));
		}
		Ok(self.users.get(&user_id).cloned())
	}
}

/// Notification transport that records everything it is asked to send.
/// Clones share the recording, so tests can keep a probe handle after
/// moving the transport into the engine.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotify {
	sent: Arc<Mutex<Vec<(Vec<String>, Notification)>>>,
}

impl RecordingNotify {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn sent(&self) -> Vec<(Vec<String>, Notification)> {
		self.sent.lock().clone()
	}
}

impl NotifyTransport for RecordingNotify {
	fn send_notification(
		&self,
		_conf: &NotifyConf,
		recipients: &[String],
		notification: &Notification,
	) -> GpResult<()> {
		self.sent.lock().push((recipients.to_vec(), notification.clone()));
		Ok(())
	}
}

/// Reporting sink recording summary records per table.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
	records: Arc<Mutex<Vec<(String, SummaryRecord)>>>,
}

impl RecordingReporter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn records(&self) -> Vec<(String, SummaryRecord)> {
		self.records.lock().clone()
	}
}

impl ReportingWriter for RecordingReporter {
	fn write(&self, table: &str, record: SummaryRecord) {
		self.records.lock().push((table.to_string(), record));
	}
}

// vim: ts=4
