//! Merges server events and optimistic edits into the notification cache.
//!
//! Every operation is a single [`NotificationCache::update_listings`] call,
//! so each one is applied to all listings before any other write starts.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::cache::NotificationCache;
use crate::model::Notification;
use crate::notice::{Notice, NoticeSink};

#[derive(Clone)]
pub struct CacheReconciler {
    cache: NotificationCache,
    notices: Arc<dyn NoticeSink>,
}

impl std::fmt::Debug for CacheReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReconciler")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CacheReconciler {
    pub fn new(cache: NotificationCache, notices: Arc<dyn NoticeSink>) -> Self {
        Self { cache, notices }
    }

    pub fn cache(&self) -> &NotificationCache {
        &self.cache
    }

    pub fn notices(&self) -> &Arc<dyn NoticeSink> {
        &self.notices
    }

    /// Prepend `notification` to every listing and bump unread counts if it
    /// is unread. Pagination totals are left for the next refetch.
    pub fn apply_new_notification(&self, notification: &Notification) {
        let unread = !notification.is_read();
        let listings = self.cache.update_listings(|_, listing| {
            listing.notifications.insert(0, notification.clone());
            if unread {
                listing.unread_count += 1;
            }
        });
        debug!(id = %notification.id, kind = %notification.kind, unread, listings, "applied new notification");

        if notification.kind.raises_alert() {
            self.notices.notify(Notice::alert(
                notification.title.clone(),
                notification.message.clone(),
            ));
        }
    }

    /// Overwrite every listing's unread count with the server's value.
    pub fn apply_unread_count_update(&self, count: u64) {
        self.cache.update_listings(|_, listing| {
            listing.unread_count = count;
        });
        debug!(count, "applied unread count");
    }

    /// Flip one notification to read wherever it is cached.
    pub fn apply_mark_as_read(&self, id: &str) {
        let now = Utc::now();
        self.cache.update_listings(|_, listing| {
            if let Some(n) = listing.notifications.iter_mut().find(|n| n.id == id)
                && !n.is_read()
            {
                n.mark_read(now);
                listing.unread_count = listing.unread_count.saturating_sub(1);
            }
        });
    }

    /// Mark everything read and zero the unread counts.
    pub fn apply_mark_all_as_read(&self) {
        let now = Utc::now();
        self.cache.update_listings(|_, listing| {
            for n in listing.notifications.iter_mut().filter(|n| !n.is_read()) {
                n.mark_read(now);
            }
            listing.unread_count = 0;
        });
    }

    /// Remove the first entry matching `id` from each listing that has one.
    pub fn apply_delete(&self, id: &str) {
        self.cache.update_listings(|_, listing| {
            if let Some(pos) = listing.position(id) {
                let removed = listing.notifications.remove(pos);
                if !removed.is_read() {
                    listing.unread_count = listing.unread_count.saturating_sub(1);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ListingKey, NotificationListing};
    use crate::model::notification::fixtures;
    use crate::model::{NotificationFilters, NotificationType};
    use crate::notice::NoticeLevel;
    use crate::notice::testing::RecordingSink;

    fn setup() -> (CacheReconciler, Arc<RecordingSink>) {
        let cache = NotificationCache::new();
        cache.insert(
            ListingKey::default(),
            NotificationListing {
                notifications: vec![
                    fixtures::notification("n2", NotificationType::Info, 20),
                    fixtures::read_notification("n1", 10),
                ],
                unread_count: 1,
                ..Default::default()
            },
        );
        cache.insert(
            ListingKey::paged(NotificationFilters::default().unread_only(true)),
            NotificationListing {
                notifications: vec![fixtures::notification("n2", NotificationType::Info, 20)],
                unread_count: 1,
                ..Default::default()
            },
        );
        let sink = Arc::new(RecordingSink::default());
        (CacheReconciler::new(cache, sink.clone()), sink)
    }

    fn listings(r: &CacheReconciler) -> Vec<NotificationListing> {
        r.cache()
            .listing_keys()
            .iter()
            .filter_map(|k| r.cache().get(k))
            .map(|c| c.listing)
            .collect()
    }

    #[test]
    fn new_notifications_are_prepended_in_every_listing() {
        let (r, sink) = setup();
        let before: Vec<usize> = listings(&r).iter().map(|l| l.notifications.len()).collect();

        r.apply_new_notification(&fixtures::notification("n3", NotificationType::Document, 30));
        r.apply_new_notification(&fixtures::notification("n4", NotificationType::Info, 40));

        for (listing, len) in listings(&r).iter().zip(before) {
            assert_eq!(listing.notifications.len(), len + 2);
            assert_eq!(listing.notifications[0].id, "n4");
            assert!(
                listing
                    .notifications
                    .windows(2)
                    .all(|w| w[0].created_at >= w[1].created_at)
            );
            assert_eq!(listing.unread_count, 3);
        }
        assert!(sink.take().is_empty());
    }

    #[test]
    fn read_notifications_do_not_bump_the_count() {
        let (r, _) = setup();
        r.apply_new_notification(&fixtures::read_notification("n3", 30));
        assert!(listings(&r).iter().all(|l| l.unread_count == 1));
    }

    #[test]
    fn alerts_and_reminders_raise_a_notice() {
        let (r, sink) = setup();
        r.apply_new_notification(&fixtures::notification("a", NotificationType::Alert, 30));
        r.apply_new_notification(&fixtures::notification("i", NotificationType::Invite, 31));
        r.apply_new_notification(&fixtures::notification("r", NotificationType::Reminder, 32));

        let notices = sink.take();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Alert));
        assert_eq!(notices[0].title, "title a");
        assert_eq!(notices[1].description.as_deref(), Some("message r"));
    }

    #[test]
    fn unread_count_update_overwrites() {
        let (r, _) = setup();
        r.apply_unread_count_update(42);
        assert!(listings(&r).iter().all(|l| l.unread_count == 42));
        r.apply_unread_count_update(0);
        assert!(listings(&r).iter().all(|l| l.unread_count == 0));
    }

    #[test]
    fn mark_as_read_decrements_once() {
        let (r, _) = setup();
        r.apply_mark_as_read("n2");
        r.apply_mark_as_read("n2");
        for listing in listings(&r) {
            assert_eq!(listing.unread_count, 0);
            assert!(listing.notifications.iter().all(Notification::is_read));
        }
    }

    #[test]
    fn mark_all_as_read_is_idempotent() {
        let (r, _) = setup();
        r.apply_mark_all_as_read();
        r.apply_mark_all_as_read();
        for listing in listings(&r) {
            assert_eq!(listing.unread_count, 0);
            assert!(listing.notifications.iter().all(Notification::is_read));
        }
    }

    #[test]
    fn delete_removes_one_match_per_listing() {
        let (r, _) = setup();
        r.apply_delete("n1");

        let all = r.cache().get(&ListingKey::default()).unwrap().listing;
        assert_eq!(all.notifications.len(), 1);
        assert_eq!(all.unread_count, 1, "n1 was read");

        let unread = r
            .cache()
            .get(&ListingKey::paged(NotificationFilters::default().unread_only(true)))
            .unwrap()
            .listing;
        assert_eq!(unread.notifications.len(), 1, "listing without n1 is untouched");

        r.apply_delete("n2");
        assert!(listings(&r).iter().all(|l| l.notifications.is_empty() && l.unread_count == 0));
    }

    #[test]
    fn delete_of_unknown_id_is_a_noop() {
        let (r, _) = setup();
        let before = listings(&r);
        r.apply_delete("missing");
        let mut after = listings(&r);
        let mut before = before;
        before.sort_by_key(|l| l.notifications.len());
        after.sort_by_key(|l| l.notifications.len());
        assert_eq!(before, after);
    }
}
