pub use guardpost_types::prelude::*;

// vim: ts=4
