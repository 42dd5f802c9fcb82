//! REST wrappers for the `/notifications` resource.

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use super::client::ApiClient;
use crate::error::Result;
use crate::model::{
    CreateNotificationRequest, MarkAllReadResponse, Notification, NotificationFilters,
    NotificationPage, NotificationStats, PollingParams, PollingResponse,
};

/// Backend operations the stream manager, queries and action gateway rely on.
#[async_trait]
pub trait NotificationsApi: Send + Sync {
    async fn list(&self, filters: &NotificationFilters) -> Result<NotificationPage>;

    async fn create(&self, request: &CreateNotificationRequest) -> Result<Notification>;

    async fn mark_as_read(&self, id: &str) -> Result<()>;

    /// Returns how many notifications the server flipped to read.
    async fn mark_all_as_read(&self) -> Result<u64>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn stats(&self) -> Result<NotificationStats>;

    async fn poll(&self, params: &PollingParams) -> Result<PollingResponse>;
}

/// [`NotificationsApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNotificationsApi {
    client: ApiClient,
}

impl HttpNotificationsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn notification_path(id: &str) -> String {
    format!("notifications/{}", urlencode_segment(id))
}

/// Percent-encode an id for use as one path segment.
fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[async_trait]
impl NotificationsApi for HttpNotificationsApi {
    async fn list(&self, filters: &NotificationFilters) -> Result<NotificationPage> {
        filters.validate()?;
        let request = self
            .client
            .request(Method::GET, "notifications")?
            .query(&filters.to_query());
        self.client.send(request).await
    }

    async fn create(&self, request: &CreateNotificationRequest) -> Result<Notification> {
        request.validate()?;
        let builder = self
            .client
            .request(Method::POST, "notifications")?
            .json(request);
        let created: Notification = self.client.send(builder).await?;
        debug!(id = %created.id, kind = %created.kind, "notification created");
        Ok(created)
    }

    async fn mark_as_read(&self, id: &str) -> Result<()> {
        let path = format!("{}/read", notification_path(id));
        let request = self.client.request(Method::PUT, &path)?;
        self.client.send_unit(request).await
    }

    async fn mark_all_as_read(&self) -> Result<u64> {
        let request = self
            .client
            .request(Method::PUT, "notifications/mark-all-read")?;
        let response: MarkAllReadResponse = self.client.send(request).await?;
        Ok(response.updated_count)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = self.client.request(Method::DELETE, &notification_path(id))?;
        self.client.send_unit(request).await
    }

    async fn stats(&self) -> Result<NotificationStats> {
        let request = self.client.request(Method::GET, "notifications/stats")?;
        self.client.send(request).await
    }

    async fn poll(&self, params: &PollingParams) -> Result<PollingResponse> {
        let request = self
            .client
            .request(Method::GET, "notifications/polling")?
            .query(&params.to_query());
        self.client.send(request).await
    }
}
