//! Wire model shared by the REST wrappers, the live channel and the cache.

pub mod api;
pub mod display;
pub mod event;
pub mod notification;

pub use api::{
    ActivityPoint, ApiEnvelope, CreateNotificationRequest, MarkAllReadResponse, NotificationFilters,
    NotificationPage, NotificationStats, Pagination, PollingParams, PollingResponse,
};
pub use display::{DayGroup, format_relative_time, group_by_day};
pub use event::StreamEvent;
pub use notification::{Notification, NotificationPriority, NotificationScope, NotificationType};
