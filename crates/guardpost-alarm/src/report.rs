//! Alarm reports and the human review/confirmation protocol.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use uuid::Uuid;

use guardpost_types::guard_adapter::User;

use crate::prelude::*;
use crate::registry::Limit;

/// Frozen view of the offending traffic at report-creation time.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
	pub service: Box<str>,
	pub num_requests: usize,
	pub user_id: UserId,
	pub client_ip: IpAddr,
	pub created: Timestamp,
}

/// One confirmation appended by a reviewer. Either the e-mail or the user
/// ID identifies the reviewer, depending on which confirmation entry point
/// was used.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Reviewer {
	#[serde(rename = "userId")]
	pub user_id: Option<UserId>,
	pub email: Option<Box<str>>,
	#[serde(rename = "datetime")]
	pub reviewed: Timestamp,
}

/// A detected limit exceedance awaiting (or holding) human review.
///
/// Repeated confirmations are accepted on purpose; the full reviewer list
/// is exported so duplicates stay visible to operators.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmReport {
	pub request_info: RequestSnapshot,
	pub rules: Limit,
	pub created: Timestamp,
	pub reviewed: Option<Timestamp>,
	pub review_code: Box<str>,
	pub user_info: Option<User>,
	pub reviews: Vec<Reviewer>,
}

/// Opaque unique token authorizing a confirmation action: a fresh random
/// identifier run through a cryptographic digest, hex-encoded.
fn generate_review_code() -> Box<str> {
	let id = Uuid::new_v4();
	let sum = Sha256::digest(id.to_string().as_bytes());
	sum.iter().map(|b| format!("{:02x}", b)).collect::<String>().into()
}

impl AlarmReport {
	pub fn new(request_info: RequestSnapshot, rules: Limit, created: Timestamp) -> Self {
		Self {
			request_info,
			rules,
			created,
			reviewed: None,
			review_code: generate_review_code(),
			user_info: None,
			reviews: Vec::with_capacity(5),
		}
	}

	pub fn is_reviewed(&self) -> bool {
		!self.reviews.is_empty()
	}

	/// How far over the limit the snapshot was, in percent of the limit
	pub fn exceed_percent(&self) -> f64 {
		(self.request_info.num_requests as f64 / f64::from(self.rules.threshold.max(1)) - 1.0)
			* 100.0
	}

	pub fn confirm_via_email(&mut self, code: &str, reviewer_mail: &str, at: Timestamp) -> GpResult<()> {
		if code != &*self.review_code {
			return Err(Error::ConfirmationKeyNotFound);
		}
		if reviewer_mail.is_empty() {
			return Err(Error::MissingReviewerIdentity);
		}
		self.push_review(Reviewer {
			user_id: None,
			email: Some(reviewer_mail.into()),
			reviewed: at,
		});
		Ok(())
	}

	pub fn confirm_via_id(&mut self, code: &str, reviewer_id: UserId, at: Timestamp) -> GpResult<()> {
		if code != &*self.review_code {
			return Err(Error::ConfirmationKeyNotFound);
		}
		if reviewer_id.0 <= 0 {
			return Err(Error::MissingReviewerIdentity);
		}
		self.push_review(Reviewer { user_id: Some(reviewer_id), email: None, reviewed: at });
		Ok(())
	}

	fn push_review(&mut self, review: Reviewer) {
		let at = review.reviewed;
		self.reviews.push(review);
		if self.reviews.len() == 1 {
			self.reviewed = Some(at);
		}
	}
}

/// Process-wide log of alarm reports, shared between the decision engine
/// (appends) and the HTTP surface (reads, confirmations, cleanup).
#[derive(Debug, Default)]
pub struct ReportLog {
	reports: RwLock<Vec<AlarmReport>>,
}

impl ReportLog {
	pub fn new() -> Self {
		Self { reports: RwLock::new(Vec::new()) }
	}

	pub fn push(&self, report: AlarmReport) {
		self.reports.write().push(report);
	}

	pub fn len(&self) -> usize {
		self.reports.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.reports.read().is_empty()
	}

	/// All reports, sorted by creation time
	pub fn list_sorted(&self) -> Vec<AlarmReport> {
		let mut reports = self.reports.read().clone();
		reports.sort_by_key(|report| report.created);
		reports
	}

	pub fn find_by_code(&self, code: &str) -> Option<AlarmReport> {
		self.reports.read().iter().find(|report| &*report.review_code == code).cloned()
	}

	/// Run a confirmation against the report matching `code`, returning the
	/// updated report. The closure runs under the log's write lock.
	pub fn confirm_with(
		&self,
		code: &str,
		f: impl FnOnce(&mut AlarmReport) -> GpResult<()>,
	) -> GpResult<AlarmReport> {
		let mut reports = self.reports.write();
		let report = reports
			.iter_mut()
			.find(|report| &*report.review_code == code)
			.ok_or(Error::ConfirmationKeyNotFound)?;
		f(report)?;
		Ok(report.clone())
	}

	/// Retention cleanup: drop reports older than `max_age_secs` unless
	/// they are still unreviewed (kept as pending work, unless
	/// `also_non_reviewed` is set). Returns (deleted, remaining).
	pub fn clean(&self, now: Timestamp, max_age_secs: i64, also_non_reviewed: bool) -> (usize, usize) {
		let edge = now.sub_secs(max_age_secs);
		let mut reports = self.reports.write();
		let before = reports.len();
		reports.retain(|report| {
			report.created > edge || (!also_non_reviewed && !report.is_reviewed())
		});
		reports.sort_by_key(|report| report.created);
		(before - reports.len(), reports.len())
	}

	pub fn replace_all(&self, reports: Vec<AlarmReport>) {
		*self.reports.write() = reports;
	}

	pub fn snapshot(&self) -> Vec<AlarmReport> {
		self.reports.read().clone()
	}
}


// vim: ts=4
