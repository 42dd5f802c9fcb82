//! One authenticated user's notification context.

use std::sync::Arc;

use tracing::info;

use crate::actions::ActionGateway;
use crate::api::{ApiClient, HttpNotificationsApi, NotificationsApi};
use crate::cache::{ListingKey, NotificationCache};
use crate::config::{ClientConfig, QueryOptions};
use crate::error::Result;
use crate::model::NotificationFilters;
use crate::notice::NoticeSink;
use crate::queries::NotificationQueries;
use crate::reconciler::CacheReconciler;
use crate::stream::{EventTransport, HttpEventTransport, NotificationStream, StreamOptions};

/// Owns the cache, queries, action gateway and live stream of a session.
///
/// Everything shares one [`NotificationCache`], so an event delivered by the
/// stream is visible to the next query and vice versa.
pub struct NotificationSession {
    cache: NotificationCache,
    queries: NotificationQueries,
    actions: ActionGateway,
    stream: NotificationStream,
}

impl NotificationSession {
    /// Connect to the backend described by `config`.
    ///
    /// Must be called within a tokio runtime when the stream is enabled.
    pub fn connect(
        config: ClientConfig,
        stream_options: StreamOptions,
        query_options: QueryOptions,
        notices: Arc<dyn NoticeSink>,
    ) -> Result<Self> {
        let client = ApiClient::new(config)?;
        let api: Arc<dyn NotificationsApi> = Arc::new(HttpNotificationsApi::new(client.clone()));
        let transport: Arc<dyn EventTransport> = Arc::new(HttpEventTransport::new(client));
        info!("starting notification session");
        Ok(Self::from_parts(
            api,
            transport,
            notices,
            stream_options,
            query_options,
        ))
    }

    /// Assemble a session around an existing API and transport.
    pub fn from_parts(
        api: Arc<dyn NotificationsApi>,
        transport: Arc<dyn EventTransport>,
        notices: Arc<dyn NoticeSink>,
        stream_options: StreamOptions,
        query_options: QueryOptions,
    ) -> Self {
        let cache = NotificationCache::new();
        let reconciler = CacheReconciler::new(cache.clone(), notices);
        let queries = NotificationQueries::new(api.clone(), cache.clone(), query_options);
        let actions = ActionGateway::new(api.clone(), reconciler.clone(), queries.clone());
        let stream = NotificationStream::start(stream_options, transport, api, reconciler);

        Self {
            cache,
            queries,
            actions,
            stream,
        }
    }

    pub fn cache(&self) -> &NotificationCache {
        &self.cache
    }

    pub fn queries(&self) -> &NotificationQueries {
        &self.queries
    }

    pub fn actions(&self) -> &ActionGateway {
        &self.actions
    }

    pub fn stream(&self) -> &NotificationStream {
        &self.stream
    }

    /// Badge count for `filters`: the stream's value while connected, else
    /// the server count of the cached listing, else 0.
    pub fn unread_count(&self, filters: &NotificationFilters) -> u64 {
        let state = self.stream.state();
        if state.is_connected()
            && let Some(count) = state.unread_count
        {
            return count;
        }
        self.cache
            .unread_count(&ListingKey::paged(filters.clone()))
            .unwrap_or(0)
    }

    /// Stop the stream and drop every cached entry.
    pub async fn shutdown(&self) {
        self.stream.stop().await;
        self.cache.clear();
        info!("notification session closed");
    }
}
