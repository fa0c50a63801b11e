//! Shared building blocks for the hot-reload workspace.
//!
//! Every error enum in the workspace carries an [`ErrorLocation`] so that log
//! output points at the line that produced the failure, not at the place it
//! was finally reported.

pub mod error_location;

pub use error_location::ErrorLocation;
