//! Cache-backed reads of notification listings and statistics.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::NotificationsApi;
use crate::cache::{ListingKey, NotificationCache, NotificationListing};
use crate::config::QueryOptions;
use crate::error::Result;
use crate::model::{NotificationFilters, NotificationStats};

/// Fetches listings and stats through the API, serving fresh entries from
/// the cache.
#[derive(Clone)]
pub struct NotificationQueries {
    api: Arc<dyn NotificationsApi>,
    cache: NotificationCache,
    options: QueryOptions,
}

impl NotificationQueries {
    pub fn new(api: Arc<dyn NotificationsApi>, cache: NotificationCache, options: QueryOptions) -> Self {
        Self {
            api,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &NotificationCache {
        &self.cache
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// One page of notifications, cached under `filters`.
    pub async fn notifications(&self, filters: &NotificationFilters) -> Result<NotificationListing> {
        let key = ListingKey::paged(filters.clone());
        if let Some(cached) = self.cache.get(&key)
            && !cached.stale
            && cached.age < self.options.listing_stale_time()
        {
            return Ok(cached.listing);
        }
        self.fetch_paged(key).await
    }

    /// First page of an incrementally loaded listing.
    ///
    /// The page size comes from [`QueryOptions::infinite_page_size`]; any
    /// `page`/`limit` in `filters` is ignored.
    pub async fn infinite_notifications(
        &self,
        filters: &NotificationFilters,
    ) -> Result<NotificationListing> {
        let key = ListingKey::infinite(self.infinite_filters(filters));
        if let Some(cached) = self.cache.get(&key)
            && !cached.stale
            && cached.age < self.options.listing_stale_time()
        {
            return Ok(cached.listing);
        }
        self.fetch_infinite(key, 1).await
    }

    /// Load the next page of an infinite listing.
    ///
    /// Returns `Ok(None)` once the last page has been loaded.
    pub async fn next_page(&self, filters: &NotificationFilters) -> Result<Option<NotificationListing>> {
        let key = ListingKey::infinite(self.infinite_filters(filters));
        let Some(cached) = self.cache.get(&key) else {
            return self.fetch_infinite(key, 1).await.map(Some);
        };
        if !cached.listing.has_next_page() {
            return Ok(None);
        }

        let page = cached.listing.pagination.page + 1;
        let request = key.filters.clone().page(page);
        let fetched = self.api.list(&request).await?;
        self.cache.append_page(key.clone(), fetched);
        Ok(self.cache.get(&key).map(|c| c.listing))
    }

    pub async fn stats(&self) -> Result<NotificationStats> {
        if let Some(cached) = self.cache.stats()
            && !cached.stale
            && cached.age < self.options.stats_stale_time()
        {
            return Ok(cached.stats);
        }
        let stats = self.api.stats().await?;
        self.cache.set_stats(stats.clone());
        Ok(stats)
    }

    /// Refetch every invalidated listing (all loaded pages for infinite ones)
    /// and invalidated stats. Failures are logged and leave the entry stale.
    pub async fn refetch_stale(&self) {
        for (key, pages) in self.cache.stale_listing_keys() {
            let result = if key.infinite {
                self.fetch_infinite(key.clone(), pages).await.map(|_| ())
            } else {
                self.fetch_paged(key.clone()).await.map(|_| ())
            };
            if let Err(e) = result {
                warn!(filters = ?key.filters, error = %e, "failed to refetch notifications");
            }
        }

        if self.cache.stats().is_some_and(|s| s.stale)
            && let Err(e) = self.stats().await
        {
            warn!(error = %e, "failed to refetch notification stats");
        }
    }

    fn infinite_filters(&self, filters: &NotificationFilters) -> NotificationFilters {
        NotificationFilters {
            page: None,
            limit: Some(self.options.infinite_page_size),
            ..filters.clone()
        }
    }

    async fn fetch_paged(&self, key: ListingKey) -> Result<NotificationListing> {
        let page = self.api.list(&key.filters).await?;
        debug!(
            count = page.notifications.len(),
            unread = page.unread_count,
            "fetched notifications"
        );
        let listing = NotificationListing::from(page);
        self.cache.insert(key, listing.clone());
        Ok(listing)
    }

    /// Fetch pages `1..=pages` of an infinite listing and replace the entry.
    async fn fetch_infinite(&self, key: ListingKey, pages: u32) -> Result<NotificationListing> {
        let mut listing = NotificationListing::default();
        let mut loaded = 0;

        for page in 1..=pages.max(1) {
            let fetched = self.api.list(&key.filters.clone().page(page)).await?;
            listing.notifications.extend(fetched.notifications);
            listing.unread_count = fetched.unread_count;
            listing.pagination = fetched.pagination;
            loaded = page;
            if !listing.has_next_page() {
                break;
            }
        }

        self.cache.insert_pages(key, listing.clone(), loaded);
        Ok(listing)
    }
}
