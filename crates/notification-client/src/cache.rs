//! Client-held cache of notification listings and statistics.
//!
//! One cache exists per session. Every writer (live events, poll results,
//! user actions, fetches) goes through a single write lock, so an update is
//! always applied in full before the next one starts. Observers learn about
//! changes through [`NotificationCache::subscribe`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::trace;

use crate::model::{Notification, NotificationFilters, NotificationPage, NotificationStats, Pagination};

/// Capacity of the change-notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Identifies one cached listing: its filters and whether it is paged
/// incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub filters: NotificationFilters,
    pub infinite: bool,
}

impl ListingKey {
    pub fn paged(filters: NotificationFilters) -> Self {
        Self {
            filters,
            infinite: false,
        }
    }

    pub fn infinite(filters: NotificationFilters) -> Self {
        Self {
            filters,
            infinite: true,
        }
    }
}

/// A cached, most-recent-first notification listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListing {
    pub notifications: Vec<Notification>,
    /// Server-authoritative unread count. Never recomputed locally.
    pub unread_count: u64,
    pub pagination: Pagination,
}

impl From<NotificationPage> for NotificationListing {
    fn from(page: NotificationPage) -> Self {
        Self {
            notifications: page.notifications,
            unread_count: page.unread_count,
            pagination: page.pagination,
        }
    }
}

impl NotificationListing {
    pub fn position(&self, id: &str) -> Option<usize> {
        self.notifications.iter().position(|n| n.id == id)
    }

    pub fn has_next_page(&self) -> bool {
        self.pagination.has_next_page()
    }
}

/// Snapshot of a cached listing handed to readers.
#[derive(Debug, Clone)]
pub struct CachedListing {
    pub listing: NotificationListing,
    pub age: Duration,
    pub stale: bool,
    pub pages_loaded: u32,
}

#[derive(Debug, Clone)]
pub struct CachedStats {
    pub stats: NotificationStats,
    pub age: Duration,
    pub stale: bool,
}

/// Change notifications emitted by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A fetched listing was stored or extended.
    ListingStored(ListingKey),
    /// One or more listings were edited in place.
    ListingsUpdated,
    ListingsInvalidated,
    StatsStored,
    StatsInvalidated,
    Cleared,
}

#[derive(Debug)]
struct ListingEntry {
    listing: NotificationListing,
    fetched_at: Instant,
    stale: bool,
    pages_loaded: u32,
}

#[derive(Debug)]
struct StatsEntry {
    stats: NotificationStats,
    fetched_at: Instant,
    stale: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    listings: HashMap<ListingKey, ListingEntry>,
    stats: Option<StatsEntry>,
}

/// Shared notification store. Cloning yields another handle to the same data.
#[derive(Debug, Clone)]
pub struct NotificationCache {
    state: Arc<RwLock<CacheState>>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for NotificationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            events,
        }
    }

    /// Receive a [`CacheEvent`] after every change.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply `f` to every cached listing under one write lock.
    ///
    /// This is the only in-place mutation path; returns how many listings
    /// were visited.
    pub fn update_listings<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&ListingKey, &mut NotificationListing),
    {
        let visited = {
            let mut state = self.state.write();
            for (key, entry) in state.listings.iter_mut() {
                f(key, &mut entry.listing);
            }
            state.listings.len()
        };

        if visited > 0 {
            trace!(listings = visited, "cache listings updated");
            self.emit(CacheEvent::ListingsUpdated);
        }
        visited
    }

    pub fn get(&self, key: &ListingKey) -> Option<CachedListing> {
        let state = self.state.read();
        state.listings.get(key).map(|entry| CachedListing {
            listing: entry.listing.clone(),
            age: entry.fetched_at.elapsed(),
            stale: entry.stale,
            pages_loaded: entry.pages_loaded,
        })
    }

    pub fn unread_count(&self, key: &ListingKey) -> Option<u64> {
        self.state
            .read()
            .listings
            .get(key)
            .map(|entry| entry.listing.unread_count)
    }

    /// Store a freshly fetched single-page listing.
    pub fn insert(&self, key: ListingKey, listing: NotificationListing) {
        self.insert_pages(key, listing, 1);
    }

    /// Store a listing assembled from `pages_loaded` fetched pages.
    pub fn insert_pages(&self, key: ListingKey, listing: NotificationListing, pages_loaded: u32) {
        self.state.write().listings.insert(
            key.clone(),
            ListingEntry {
                listing,
                fetched_at: Instant::now(),
                stale: false,
                pages_loaded: pages_loaded.max(1),
            },
        );
        self.emit(CacheEvent::ListingStored(key));
    }

    /// Extend an infinite listing with the next fetched page.
    ///
    /// Starts the listing when nothing is cached under `key` yet.
    pub fn append_page(&self, key: ListingKey, page: NotificationPage) {
        {
            let mut state = self.state.write();
            match state.listings.get_mut(&key) {
                Some(entry) => {
                    entry.listing.notifications.extend(page.notifications);
                    entry.listing.unread_count = page.unread_count;
                    entry.listing.pagination = page.pagination;
                    entry.pages_loaded += 1;
                }
                None => {
                    state.listings.insert(
                        key.clone(),
                        ListingEntry {
                            listing: page.into(),
                            fetched_at: Instant::now(),
                            stale: false,
                            pages_loaded: 1,
                        },
                    );
                }
            }
        }
        self.emit(CacheEvent::ListingStored(key));
    }

    /// Mark every listing stale so the next read refetches it.
    pub fn invalidate_listings(&self) {
        {
            let mut state = self.state.write();
            for entry in state.listings.values_mut() {
                entry.stale = true;
            }
        }
        self.emit(CacheEvent::ListingsInvalidated);
    }

    /// Keys of invalidated listings with the number of pages each had loaded.
    pub fn stale_listing_keys(&self) -> Vec<(ListingKey, u32)> {
        self.state
            .read()
            .listings
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, entry)| (key.clone(), entry.pages_loaded))
            .collect()
    }

    pub fn listing_keys(&self) -> Vec<ListingKey> {
        self.state.read().listings.keys().cloned().collect()
    }

    pub fn stats(&self) -> Option<CachedStats> {
        self.state.read().stats.as_ref().map(|entry| CachedStats {
            stats: entry.stats.clone(),
            age: entry.fetched_at.elapsed(),
            stale: entry.stale,
        })
    }

    pub fn set_stats(&self, stats: NotificationStats) {
        self.state.write().stats = Some(StatsEntry {
            stats,
            fetched_at: Instant::now(),
            stale: false,
        });
        self.emit(CacheEvent::StatsStored);
    }

    pub fn invalidate_stats(&self) {
        if let Some(entry) = self.state.write().stats.as_mut() {
            entry.stale = true;
        }
        self.emit(CacheEvent::StatsInvalidated);
    }

    /// Drop everything. Used on logout.
    pub fn clear(&self) {
        {
            let mut state = self.state.write();
            state.listings.clear();
            state.stats = None;
        }
        self.emit(CacheEvent::Cleared);
    }

    pub fn len(&self) -> usize {
        self.state.read().listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().listings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationType;
    use crate::model::notification::fixtures;

    fn page(ids: &[&str], unread: u64, page: u32, total_pages: u32) -> NotificationPage {
        NotificationPage {
            notifications: ids
                .iter()
                .enumerate()
                .map(|(i, id)| fixtures::notification(id, NotificationType::Info, 50 - i as u32))
                .collect(),
            pagination: Pagination {
                page,
                limit: 20,
                total: 40,
                total_pages,
            },
            unread_count: unread,
        }
    }

    #[test]
    fn update_visits_every_listing() {
        let cache = NotificationCache::new();
        cache.insert(ListingKey::default(), page(&["a"], 1, 1, 1).into());
        cache.insert(
            ListingKey::paged(NotificationFilters::default().unread_only(true)),
            page(&["a", "b"], 2, 1, 1).into(),
        );

        let visited = cache.update_listings(|_, listing| listing.unread_count = 9);
        assert_eq!(visited, 2);
        for key in cache.listing_keys() {
            assert_eq!(cache.unread_count(&key), Some(9));
        }
    }

    #[test]
    fn append_page_extends_infinite_listing() {
        let cache = NotificationCache::new();
        let key = ListingKey::infinite(NotificationFilters::default());
        cache.append_page(key.clone(), page(&["a", "b"], 3, 1, 2));
        cache.append_page(key.clone(), page(&["c"], 2, 2, 2));

        let cached = cache.get(&key).unwrap();
        assert_eq!(cached.pages_loaded, 2);
        assert_eq!(cached.listing.notifications.len(), 3);
        assert_eq!(cached.listing.unread_count, 2);
        assert!(!cached.listing.has_next_page());
    }

    #[test]
    fn invalidation_marks_entries_stale() {
        let cache = NotificationCache::new();
        let key = ListingKey::default();
        cache.insert(key.clone(), page(&["a"], 1, 1, 1).into());
        assert!(cache.stale_listing_keys().is_empty());

        cache.invalidate_listings();
        assert_eq!(cache.stale_listing_keys(), vec![(key.clone(), 1)]);
        assert!(cache.get(&key).unwrap().stale);

        cache.insert(key.clone(), page(&["a"], 0, 1, 1).into());
        assert!(!cache.get(&key).unwrap().stale);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let cache = NotificationCache::new();
        let mut rx = cache.subscribe();

        cache.insert(ListingKey::default(), NotificationListing::default());
        cache.update_listings(|_, l| l.unread_count = 1);
        cache.clear();

        assert_eq!(rx.recv().await.unwrap(), CacheEvent::ListingStored(ListingKey::default()));
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::ListingsUpdated);
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Cleared);
        assert!(cache.is_empty());
        assert!(cache.stats().is_none());
    }

    #[test]
    fn update_on_empty_cache_is_silent() {
        let cache = NotificationCache::new();
        let mut rx = cache.subscribe();
        assert_eq!(cache.update_listings(|_, _| {}), 0);
        assert!(rx.try_recv().is_err());
    }
}
