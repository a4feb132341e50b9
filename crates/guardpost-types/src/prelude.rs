pub use crate::error::{Error, GpResult};
pub use crate::types::{now, CheckInterval, Timestamp, UserId};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
