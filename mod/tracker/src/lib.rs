//! Tracker module — per-user habit entries and derived statistics.
//!
//! # Resources
//!
//! - **HabitEntry** — one observation that a named habit was performed
//! - **HabitSummary** — streaks, day counts and month buckets, derived on
//!   demand and never stored
//!
//! # Usage
//!
//! ```ignore
//! use tracker::{api, service::TrackerService};
//!
//! let svc = TrackerService::new(store);
//! let router = api::build_router(svc, auth_enabled);
//! ```

pub mod api;
pub mod model;
pub mod service;
