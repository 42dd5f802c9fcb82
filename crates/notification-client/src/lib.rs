//! Notification-client: real-time notification feed for a signed-in user.
//!
//! The crate keeps a local cache of notification listings consistent with the
//! backend while updates arrive over a Server-Sent-Events channel, falling
//! back to periodic polling when that channel is unavailable.
//!
//! ## Components
//!
//! - [`NotificationStream`] - Owns the live channel, reconnects with
//!   exponential backoff and switches to polling when needed
//! - [`CacheReconciler`] - Merges events and optimistic edits into every
//!   cached listing
//! - [`ActionGateway`] - Mark read, mark all read, delete and create, with
//!   user-facing notices
//! - [`NotificationQueries`] - Cache-backed listing and statistics reads
//! - [`NotificationSession`] - Wires all of the above around one cache
//!
//! ## Transport
//!
//! - [`api::ApiClient`] - JSON envelope client over `reqwest`
//! - [`api::NotificationsApi`] - REST operations used by the components
//! - [`stream::EventTransport`] - Source of decoded SSE frames

pub mod actions;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod notice;
pub mod queries;
pub mod reconciler;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::ActionGateway;
pub use cache::{CacheEvent, ListingKey, NotificationCache, NotificationListing};
pub use config::{ClientConfig, QueryOptions};
pub use error::{NotifyError, Result};
pub use model::{Notification, NotificationFilters, NotificationType, StreamEvent};
pub use notice::{BroadcastNoticeSink, Notice, NoticeLevel, NoticeSink, TracingNoticeSink};
pub use queries::NotificationQueries;
pub use reconciler::CacheReconciler;
pub use session::NotificationSession;
pub use stream::{ConnectionState, ConnectionStatus, NotificationStream, StreamOptions};
