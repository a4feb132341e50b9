//! Periodic per-service summaries for the reporting sink.

use guardpost_types::reporting_adapter::{ReportingWriter, SummaryRecord};

use crate::prelude::*;
use crate::registry::ServiceRegistry;

pub const SUMMARY_TABLE: &str = "alarms";

/// Emit one record per registered service: how many clients are tracked
/// and how many request timestamps they hold in total.
pub fn emit_summaries(registry: &ServiceRegistry, writer: &dyn ReportingWriter) {
	let at = now();
	registry.for_each(|entry| {
		let num_users = entry.clients.len();
		let num_requests = entry.clients.total_requests();
		debug!(service = %entry.service, num_users, num_requests, "Service summary");
		writer.write(
			SUMMARY_TABLE,
			SummaryRecord::new(at)
				.tag("service", entry.service.to_string())
				.field("numUsers", num_users as i64)
				.field("numRequests", num_requests as i64),
		);
	});
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::activity::ClientKey;
	use crate::registry::{Limit, ServiceAlarmConf};
	use crate::test_support::RecordingReporter;

	#[test]
	fn test_summary_per_service() {
		let registry = ServiceRegistry::new();
		registry.register(
			"demo",
			ServiceAlarmConf { recipients: vec![], cleanup_probability: 0.5 },
			&[Limit { threshold: 10, check_interval: CheckInterval(60) }],
		);
		let entry = registry.get("demo").unwrap();
		let key = ClientKey::new(UserId(7), "1.2.3.4".parse().unwrap());
		entry.clients.with_entry(key, 50, 10, |activity| {
			activity.requests.push(Timestamp(1000));
			activity.requests.push(Timestamp(1001));
		});

		let reporter = RecordingReporter::new();
		emit_summaries(&registry, &reporter);
		let records = reporter.records();
		assert_eq!(records.len(), 1);
		let (table, record) = &records[0];
		assert_eq!(table, SUMMARY_TABLE);
		assert_eq!(record.tags.get("service").map(String::as_str), Some("demo"));
		assert_eq!(record.fields.get("numUsers"), Some(&1));
		assert_eq!(record.fields.get("numRequests"), Some(&2));
	}
}

// vim: ts=4
