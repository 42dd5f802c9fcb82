//! Library target for the `feedwatch` package.
//!
//! The primary deliverable of this package is the `feedwatch` CLI binary
//! (`src/main.rs`). This library exists so CI can run
//! `cargo test -p feedwatch --doc` for feature validation.

#[doc(hidden)]
pub use notification_client;
