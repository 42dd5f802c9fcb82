//! Request and response shapes of the notification REST surface.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::notification::{Notification, NotificationType};
use crate::error::{NotifyError, Result};

/// Upper bound the backend accepts for `limit` parameters.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Default number of notifications requested per polling tick.
pub const DEFAULT_POLLING_LIMIT: u32 = 50;

/// Envelope wrapping every backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Check the success flag and hand back the payload, if any.
    pub fn into_result(self) -> Result<Option<T>> {
        if !self.success {
            return Err(NotifyError::Api {
                message: self
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            });
        }
        Ok(self.data)
    }

    /// Like [`into_result`](Self::into_result) but requires a payload.
    pub fn into_data(self) -> Result<T> {
        self.into_result()?
            .ok_or_else(|| NotifyError::Api {
                message: "response carried no data".to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }
}

/// One page of the notification listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub pagination: Pagination,
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPoint {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total_notifications: u64,
    pub unread_count: u64,
    pub read_count: u64,
    #[serde(default)]
    pub type_breakdown: BTreeMap<NotificationType, u64>,
    #[serde(default)]
    pub recent_activity: Vec<ActivityPoint>,
}

/// Result of one polling tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingResponse {
    #[serde(default)]
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated_count: u64,
}

/// Filters accepted by the listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl NotificationFilters {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn kind(mut self, kind: NotificationType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn unread_only(mut self, unread_only: bool) -> Self {
        self.unread_only = Some(unread_only);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page == Some(0) {
            return Err(NotifyError::validation("page must be at least 1"));
        }
        if let Some(limit) = self.limit
            && !(1..=MAX_PAGE_LIMIT).contains(&limit)
        {
            return Err(NotifyError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Query parameters in the order the backend documents them.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(kind) = self.kind {
            params.push(("type", kind.to_string()));
        }
        if let Some(unread_only) = self.unread_only {
            params.push(("unreadOnly", unread_only.to_string()));
        }
        if let Some(since) = self.since {
            params.push(("since", iso_timestamp(since)));
        }
        params
    }
}

/// Parameters of a polling request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingParams {
    pub since: DateTime<Utc>,
    pub limit: u32,
}

impl PollingParams {
    pub fn new(since: DateTime<Utc>, limit: u32) -> Self {
        Self {
            since,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("since", iso_timestamp(self.since)),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Body of a create request, used by privileged roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Target a single user; organization-wide when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CreateNotificationRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: NotificationType) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            metadata: None,
            user_id: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(NotifyError::validation("title is required"));
        }
        if self.message.trim().is_empty() {
            return Err(NotifyError::validation("message is required"));
        }
        if let Some(user_id) = &self.user_id
            && user_id.trim().is_empty()
        {
            return Err(NotifyError::validation("userId must not be blank"));
        }
        Ok(())
    }
}

/// ISO-8601 with millisecond precision, matching `Date.toISOString()`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
