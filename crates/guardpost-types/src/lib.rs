//! Shared types, collaborator traits, and core utilities for Guardpost.
//!
//! This crate contains the foundational types that are shared between the
//! server crate and the alarm core. Extracting these into a separate crate
//! keeps the collaborator boundary (allow-list store, ban store, user
//! directory, notification transport, reporting sink) free of any concrete
//! backend dependency.

pub mod error;
pub mod guard_adapter;
pub mod notify_adapter;
pub mod prelude;
pub mod reporting_adapter;
pub mod types;
pub mod worker;

// vim: ts=4
