//! Markdown rendering of plan records for operators.
//!
//! Domain models implement [`std::fmt::Display`] directly (see [`models`]);
//! collections and status messages get small wrapper types so the same data
//! can be formatted differently in lists and in detail views.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │    Wrappers     │    │    Markdown     │
//! │  (PlanRecord,   │───▶│ (PlanRecords,   │───▶│ (terminal via   │
//! │   PlanRun)      │    │ PlanVerdict)   │    │   termimad)     │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`collections`]: [`PlanRecords`] list wrapper
//! - [`status`]: [`PlanVerdict`] and [`PruneReport`] confirmations
//! - [`datetime`]: [`LocalDateTime`] timestamp formatting
//! - [`models`]: Display implementations for domain models
//!
//! # Examples
//!
//! ```rust
//! use marshal_core::display::PruneReport;
//!
//! let report = PruneReport { removed: 3, limit: 1000 };
//! assert_eq!(
//!     report.to_string(),
//!     "Pruned 3 plan record(s); retention limit 1000\n"
//! );
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod status;

pub use collections::PlanRecords;
pub use datetime::LocalDateTime;
pub use status::{PlanVerdict, PruneReport};
