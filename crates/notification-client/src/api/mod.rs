//! HTTP access to the notification backend.

pub mod client;
pub mod notifications;

pub use client::{ApiClient, install_rustls_provider};
pub use notifications::{HttpNotificationsApi, NotificationsApi};
