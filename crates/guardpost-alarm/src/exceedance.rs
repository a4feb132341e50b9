//! Time-decayed tracking of "amount over limit" measurements.
//!
//! A single spike above a limit should not page anyone, and sustained
//! near-threshold traffic should not fly under the radar. The tracker
//! keeps a small ring of recent overflow samples per check interval and
//! collapses them into a weighted average where a sample's weight decays
//! with its age relative to the interval being evaluated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::prelude::*;

/// Measured overflow over a limit at one point in time. Only recorded when
/// the observed count was at or above the limit, so `overflow` may be zero
/// but sub-threshold traffic leaves no trace at all.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ExceedanceSample {
	pub overflow: u32,
	pub measured_at: Timestamp,
}

/// Bounded ring of exceedance samples for one check interval.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SampleRing {
	items: Vec<ExceedanceSample>,
	capacity: usize,
	head: usize,
}

impl SampleRing {
	fn new(capacity: usize) -> Self {
		Self { items: Vec::with_capacity(capacity.max(1)), capacity: capacity.max(1), head: 0 }
	}

	fn push(&mut self, sample: ExceedanceSample) {
		if self.items.len() < self.capacity {
			self.items.push(sample);
		} else {
			self.items[self.head] = sample;
			self.head = (self.head + 1) % self.capacity;
		}
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = ExceedanceSample> + '_ {
		let n = self.items.len();
		(0..n).map(move |i| self.items[(self.head + i) % n.max(1)])
	}
}

/// Per check-interval exceedance history with a time-decayed weighted
/// average over it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExceedanceTracker {
	entries: HashMap<CheckInterval, SampleRing>,
	pub last_measurement: Option<Timestamp>,
	buffer_size: usize,
}

impl ExceedanceTracker {
	pub fn new(buffer_size: usize) -> Self {
		Self { entries: HashMap::new(), last_measurement: None, buffer_size: buffer_size.max(1) }
	}

	pub fn samples(&self, interval: CheckInterval) -> Option<&SampleRing> {
		self.entries.get(&interval)
	}

	/// Compare an observed request count against a limit. Sub-threshold
	/// measurements store nothing; at-or-above-threshold ones append an
	/// overflow sample into the interval's ring (lazily created).
	pub fn register_measurement(
		&mut self,
		at: Timestamp,
		interval: CheckInterval,
		observed: usize,
		limit: u32,
	) {
		self.last_measurement = Some(at);
		if observed < limit as usize {
			return;
		}
		let buffer_size = self.buffer_size;
		let ring = self.entries.entry(interval).or_insert_with(|| SampleRing::new(buffer_size));
		ring.push(ExceedanceSample {
			overflow: (observed - limit as usize) as u32,
			measured_at: at,
		});
	}

	/// Decayed weighted sum of samples newer than `at - interval`.
	///
	/// The decay coefficient scales with `age / interval`: a two-minute-old
	/// sample means something different when the interval is five minutes
	/// versus a day, so "recency" is judged relative to the window.
	fn decayed_sum(&self, at: Timestamp, interval: CheckInterval) -> Option<(f64, usize)> {
		let ring = self.entries.get(&interval)?;
		if ring.is_empty() {
			return None;
		}
		let interval_secs = f64::from(interval.as_secs());
		let mut sum = 0.0;
		let mut qualifying = 0usize;
		for sample in ring.iter() {
			let age = at.secs_since(sample.measured_at);
			if age > i64::from(interval.as_secs()) {
				continue;
			}
			let age = (age.max(0)) as f64;
			let decr_ratio = 9.0 * (age / interval_secs).min(1.0);
			sum += f64::from(sample.overflow) / (1.0 + age * decr_ratio);
			qualifying += 1;
		}
		Some((sum, qualifying))
	}

	/// Limit exceedance normalized by the limit itself: a unitless ratio
	/// independent of absolute traffic volume, compared against the
	/// configured alarm threshold. Returns 0 when no sample qualifies.
	pub fn relative_exceedance(&self, at: Timestamp, interval: CheckInterval, limit: u32) -> f64 {
		match self.decayed_sum(at, interval) {
			Some((sum, n)) if n > 0 => sum / n as f64 / f64::from(limit.max(1)),
			_ => 0.0,
		}
	}

	/// Same weighted average without the limit normalization; meant for
	/// telemetry/JSON export rather than threshold comparison.
	pub fn absolute_exceedance(&self, at: Timestamp, interval: CheckInterval) -> f64 {
		match self.decayed_sum(at, interval) {
			Some((sum, n)) if n > 0 => sum / n as f64,
			_ => 0.0,
		}
	}

	/// Per-interval absolute exceedance as of the last measurement,
	/// keyed by interval — the shape exported to status endpoints.
	pub fn export(&self) -> HashMap<String, f64> {
		let at = self.last_measurement.unwrap_or_default();
		self.entries
			.keys()
			.map(|interval| (interval.to_string(), self.absolute_exceedance(at, *interval)))
			.collect()
	}
}


// vim: ts=4
