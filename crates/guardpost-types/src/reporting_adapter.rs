//! Reporting sink boundary for periodic service-level summaries.

use std::collections::HashMap;
use std::fmt::Debug;

use crate::prelude::*;

/// One record for a time-series reporting backend: a set of indexed tags
/// plus measured fields, stamped with the measurement time.
#[derive(Clone, Debug)]
pub struct SummaryRecord {
	pub created: Timestamp,
	pub tags: HashMap<String, String>,
	pub fields: HashMap<String, i64>,
}

impl SummaryRecord {
	pub fn new(created: Timestamp) -> Self {
		Self { created, tags: HashMap::new(), fields: HashMap::new() }
	}

	pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
		self.tags.insert(key.to_string(), value.into());
		self
	}

	pub fn field(mut self, key: &str, value: i64) -> Self {
		self.fields.insert(key.to_string(), value);
		self
	}
}

/// Sink for summary records. Writes are fire-and-forget from the engine's
/// point of view; a failing sink must not disturb alarm evaluation.
pub trait ReportingWriter: Send + Sync + Debug {
	fn write(&self, table: &str, record: SummaryRecord);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_record_builder() {
		let rec = SummaryRecord::new(Timestamp(10))
			.tag("service", "demo")
			.field("numUsers", 3)
			.field("numRequests", 120);
		assert_eq!(rec.tags.get("service").map(String::as_str), Some("demo"));
		assert_eq!(rec.fields.get("numRequests"), Some(&120));
	}
}

// vim: ts=4
