//! Admission-control / abuse-detection core of the Guardpost API gateway.
//!
//! The crate watches per-user, per-service request volume, decides when
//! usage is abnormal using a time-decayed moving measure, and drives a
//! human-reviewable alarm workflow that can culminate in a ban:
//!
//! - per-client activity rings and overflow ("exceedance") tracking
//! - a single-consumer decision engine fed by a bounded event channel
//! - alarm reports with opaque review codes and a confirmation protocol
//! - binary state snapshots surviving process restarts
//! - a thin axum HTTP surface for report listing, cleanup and confirmation

pub mod activity;
pub mod allow_list;
pub mod api;
pub mod conf;
pub mod engine;
pub mod exceedance;
pub mod monitoring;
pub mod page;
pub mod registry;
pub mod report;
pub mod ring;
pub mod state;

mod prelude;

#[cfg(test)]
pub(crate) mod test_support;

pub use conf::LimitingConf;
pub use engine::{ActivityEvent, AlarmEngine, Collaborators, EngineState, EventSender};
pub use registry::{Limit, ServiceAlarmConf};

// vim: ts=4
