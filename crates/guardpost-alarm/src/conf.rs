//! Alarm core configuration.
//!
//! All tunables live in an explicit config struct handed to the engine at
//! construction and validated once at startup; unset values are replaced
//! by logged defaults, out-of-range values are rejected.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::prelude::*;

pub const DFLT_USER_REQ_COUNTER_BUFFER_SIZE: usize = 500;
pub const DFLT_EXCEEDINGS_BUFFER_SIZE: usize = 10;
pub const DFLT_EXCEEDING_THRESHOLD: f64 = 0.05;
pub const DFLT_REPORT_COOLDOWN_SECS: u32 = 120;
pub const DFLT_SUMMARY_INTERVAL_SECS: u64 = 30;
pub const DFLT_EVENT_QUEUE_CAPACITY: usize = 1000;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitingConf {
	/// Directory the engine state snapshot is written to
	pub status_data_dir: String,
	/// Capacity of each client's request timestamp ring
	pub user_req_counter_buffer_size: usize,
	/// Capacity of each per-interval exceedance sample ring
	pub exceedings_buffer_size: usize,
	/// Relative exceedance at or above which an alarm report is created
	pub exceeding_threshold: f64,
	/// Minimum seconds between two reports for the same client+service
	pub report_cooldown_secs: u32,
	/// Seconds between service summary records sent to the reporting sink
	pub summary_interval_secs: u64,
	/// Bounded capacity of the activity event queue; a faster producer
	/// blocks (async) rather than dropping abuse signal
	pub event_queue_capacity: usize,
}

impl Default for LimitingConf {
	fn default() -> Self {
		Self {
			status_data_dir: String::new(),
			user_req_counter_buffer_size: 0,
			exceedings_buffer_size: 0,
			exceeding_threshold: 0.0,
			report_cooldown_secs: 0,
			summary_interval_secs: 0,
			event_queue_capacity: 0,
		}
	}
}

impl LimitingConf {
	pub fn validate_and_defaults(&mut self) -> GpResult<()> {
		if self.user_req_counter_buffer_size == 0 {
			self.user_req_counter_buffer_size = DFLT_USER_REQ_COUNTER_BUFFER_SIZE;
			warn!(
				value = DFLT_USER_REQ_COUNTER_BUFFER_SIZE,
				"limiting.userReqCounterBufferSize not set, using default"
			);
		}
		if self.exceedings_buffer_size == 0 {
			self.exceedings_buffer_size = DFLT_EXCEEDINGS_BUFFER_SIZE;
			warn!(
				value = DFLT_EXCEEDINGS_BUFFER_SIZE,
				"limiting.exceedingsBufferSize not set, using default"
			);
		}
		if self.exceeding_threshold == 0.0 {
			self.exceeding_threshold = DFLT_EXCEEDING_THRESHOLD;
			warn!(
				value = DFLT_EXCEEDING_THRESHOLD,
				"limiting.exceedingThreshold not set, using default"
			);
		} else if self.exceeding_threshold < 0.0 || self.exceeding_threshold >= 1.0 {
			return Err(Error::ValidationError(
				"limiting.exceedingThreshold must be between 0 and 1 (excluding)".into(),
			));
		}
		if self.report_cooldown_secs == 0 {
			self.report_cooldown_secs = DFLT_REPORT_COOLDOWN_SECS;
			warn!(
				value = DFLT_REPORT_COOLDOWN_SECS,
				"limiting.reportCooldownSecs not set, using default"
			);
		}
		if self.summary_interval_secs == 0 {
			self.summary_interval_secs = DFLT_SUMMARY_INTERVAL_SECS;
			warn!(
				value = DFLT_SUMMARY_INTERVAL_SECS,
				"limiting.summaryIntervalSecs not set, using default"
			);
		}
		if self.event_queue_capacity == 0 {
			self.event_queue_capacity = DFLT_EVENT_QUEUE_CAPACITY;
			warn!(
				value = DFLT_EVENT_QUEUE_CAPACITY,
				"limiting.eventQueueCapacity not set, using default"
			);
		}
		if self.status_data_dir.is_empty() {
			warn!("limiting.statusDataDir not set, state snapshots disabled");
		} else if !Path::new(&self.status_data_dir).is_dir() {
			return Err(Error::ValidationError(format!(
				"invalid limiting.statusDataDir - not a directory: {}",
				self.status_data_dir
			)));
		}
		Ok(())
	}
}


// vim: ts=4
