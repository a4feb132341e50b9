//! Adapters for the stores the alarm core collaborates with: the per-service
//! user allow list, the ban store, and the user directory.
//!
//! Guardpost never talks to a database directly; the surrounding gateway
//! wires in implementations of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;

pub type BanId = i64;

/// Gateway user record as kept by the user directory.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct User {
	pub id: UserId,
	pub username: Box<str>,
	#[serde(rename = "firstName")]
	pub first_name: Option<Box<str>>,
	#[serde(rename = "lastName")]
	pub last_name: Option<Box<str>>,
	pub affiliation: Option<Box<str>>,
}

impl User {
	/// Sentinel record used when the user directory cannot resolve an ID.
	/// Failed lookups degrade to this instead of aborting report creation.
	pub fn invalid() -> Self {
		Self {
			id: UserId::INVALID,
			username: "invalid".into(),
			first_name: Some("-".into()),
			last_name: Some("-".into()),
			affiliation: Some("-".into()),
		}
	}
}

/// An issued (possibly expired) user ban.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBan {
	pub ban_id: BanId,
	pub user_id: UserId,
	pub report_id: Option<Box<str>>,
	pub start: Timestamp,
	pub end: Timestamp,
	pub active: bool,
}

impl UserBan {
	pub fn overlaps(&self, start: Timestamp, end: Timestamp) -> bool {
		self.active && self.start <= end && start <= self.end
	}
}

/// Per-service list of user IDs excluded from request counting and limit
/// checking. The list is reloaded periodically and fully replaced each time.
#[async_trait]
pub trait AllowListAdapter: Send + Sync + Debug {
	async fn allow_list_users(&self, service: &str) -> GpResult<Vec<UserId>>;
}

/// Persistent ban issuance. `ban_user` must return
/// [`Error::UserAlreadyBanned`](crate::error::Error::UserAlreadyBanned)
/// when an active ban overlapping the requested period already exists.
#[async_trait]
pub trait BanAdapter: Send + Sync + Debug {
	async fn ban_user(
		&self,
		user_id: UserId,
		report_id: Option<&str>,
		start: Timestamp,
		end: Timestamp,
	) -> GpResult<BanId>;

	/// Ban that was issued for a specific alarm report, if any
	async fn find_ban_by_report(&self, report_id: &str) -> GpResult<Option<UserBan>>;
}

/// Read-only lookup of gateway users. `Ok(None)` means "no such user";
/// an `Err` is a collaborator failure the caller may degrade from.
#[async_trait]
pub trait UserDirectory: Send + Sync + Debug {
	async fn user_info(&self, user_id: UserId) -> GpResult<Option<User>>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ban_overlap() {
		let ban = UserBan {
			ban_id: 1,
			user_id: UserId(7),
			report_id: None,
			start: Timestamp(100),
			end: Timestamp(200),
			active: true,
		};
		assert!(ban.overlaps(Timestamp(150), Timestamp(250)));
		assert!(ban.overlaps(Timestamp(50), Timestamp(100)));
		assert!(!ban.overlaps(Timestamp(201), Timestamp(300)));

		let inactive = UserBan { active: false, ..ban };
		assert!(!inactive.overlaps(Timestamp(150), Timestamp(250)));
	}

	#[test]
	fn test_invalid_user_sentinel() {
		let user = User::invalid();
		assert!(!user.id.is_valid());
		assert_eq!(&*user.username, "invalid");
	}
}

// vim: ts=4
