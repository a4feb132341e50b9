//! Common types used throughout Guardpost.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

// UserId //
//********//

/// Numeric user identity as resolved by the gateway's session layer.
///
/// `INVALID` marks an unknown/undefined user. Note that this is different
/// from an "anonymous user", which is typically a real database record the
/// gateway is configured with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl UserId {
	pub const INVALID: UserId = UserId(-1);

	pub fn is_valid(self) -> bool {
		self.0 > Self::INVALID.0
	}
}

impl std::fmt::Display for UserId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for UserId {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for UserId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(UserId(i64::deserialize(deserializer)?))
	}
}

// Timestamp //
//***********//

/// Unix timestamp with second precision.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
	/// Seconds elapsed since `earlier` (negative when `earlier` is in the future)
	pub fn secs_since(self, earlier: Timestamp) -> i64 {
		self.0 - earlier.0
	}

	pub fn add_secs(self, secs: i64) -> Timestamp {
		Timestamp(self.0 + secs)
	}

	pub fn sub_secs(self, secs: i64) -> Timestamp {
		Timestamp(self.0 - secs)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

pub fn now() -> Timestamp {
	let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
	Timestamp(res.as_secs() as i64)
}

// CheckInterval //
//***************//

/// Sliding time window (seconds) against which a request-rate limit is
/// evaluated, e.g. "max X requests per 1 hour". A service may configure
/// multiple intervals with their own limits (hourly, daily, ...).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CheckInterval(pub u32);

impl CheckInterval {
	pub fn as_secs(self) -> u32 {
		self.0
	}

	pub fn duration(self) -> Duration {
		Duration::from_secs(u64::from(self.0))
	}
}

impl std::fmt::Display for CheckInterval {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}s", self.0)
	}
}

impl Serialize for CheckInterval {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_u32(self.0)
	}
}

impl<'de> Deserialize<'de> for CheckInterval {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(CheckInterval(u32::deserialize(deserializer)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_user_id_validity() {
		assert!(!UserId::INVALID.is_valid());
		assert!(!UserId(-5).is_valid());
		assert!(UserId(0).is_valid());
		assert!(UserId(42).is_valid());
	}

	#[test]
	fn test_timestamp_arithmetic() {
		let t = Timestamp(1000);
		assert_eq!(t.add_secs(60), Timestamp(1060));
		assert_eq!(t.sub_secs(60), Timestamp(940));
		assert_eq!(t.add_secs(60).secs_since(t), 60);
		assert_eq!(t.secs_since(t.add_secs(60)), -60);
	}

	#[test]
	fn test_check_interval_display() {
		assert_eq!(CheckInterval(300).to_string(), "300s");
		assert_eq!(CheckInterval(300).duration(), Duration::from_secs(300));
	}
}

// vim: ts=4
