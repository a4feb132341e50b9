//! Notification transport boundary.
//!
//! Alarm notifications are delivered by whatever transport the server wires
//! in (SMTP in production, a recording stub in tests). Sends happen on
//! worker threads, so the trait is deliberately synchronous — an SMTP
//! round-trip blocking a worker is fine, blocking the dispatcher is not.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::prelude::*;

/// A single notification message. Paragraphs are rendered as separate
/// blocks by the transport (HTML `<p>`, plain-text blank-line separated).
#[derive(Clone, Debug)]
pub struct Notification {
	pub subject: String,
	pub paragraphs: Vec<String>,
}

/// Transport-level configuration, shared by all alarm notifications.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConf {
	pub sender: String,
	pub smtp_server: String,
	#[serde(default)]
	pub smtp_username: String,
	#[serde(default)]
	pub smtp_password: String,
	/// Public base URL the confirmation links are built from
	pub confirmation_base_url: String,
}

pub trait NotifyTransport: Send + Sync + Debug {
	fn send_notification(
		&self,
		conf: &NotifyConf,
		recipients: &[String],
		notification: &Notification,
	) -> GpResult<()>;
}

// vim: ts=4
