//! Shared plumbing for the portbridge crates.
//!
//! Every error type in the workspace records where it was raised through
//! [`ErrorLocation`], captured from `#[track_caller]` constructors.

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
