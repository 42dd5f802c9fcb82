//! User-triggered notification mutations.
//!
//! Failures are reported through the notice sink and returned to the
//! caller; nothing here retries on its own.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::NotificationsApi;
use crate::error::{NotifyError, Result};
use crate::model::{CreateNotificationRequest, Notification};
use crate::notice::Notice;
use crate::queries::NotificationQueries;
use crate::reconciler::CacheReconciler;

const MARK_READ_FAILED: &str = "Failed to mark notification as read";
const MARK_ALL_READ_FAILED: &str = "Failed to mark all notifications as read";
const DELETE_FAILED: &str = "Failed to delete notification";
const CREATE_FAILED: &str = "Failed to create notification";

#[derive(Clone)]
pub struct ActionGateway {
    api: Arc<dyn NotificationsApi>,
    reconciler: CacheReconciler,
    queries: NotificationQueries,
}

impl ActionGateway {
    pub fn new(
        api: Arc<dyn NotificationsApi>,
        reconciler: CacheReconciler,
        queries: NotificationQueries,
    ) -> Self {
        Self {
            api,
            reconciler,
            queries,
        }
    }

    /// Mark one notification read, then refetch listings and stats.
    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        match self.api.mark_as_read(id).await {
            Ok(()) => {
                self.reconciler.apply_mark_as_read(id);
                self.refresh().await;
                Ok(())
            }
            Err(e) => Err(self.report(e, MARK_READ_FAILED)),
        }
    }

    /// Optimistically mark everything read, then confirm with the server.
    ///
    /// A failed request does not undo the local change; the next refetch or
    /// poll brings the cache back in line. Returns the server's count.
    pub async fn mark_all_as_read(&self) -> Result<u64> {
        self.reconciler.apply_mark_all_as_read();

        match self.api.mark_all_as_read().await {
            Ok(updated) => {
                self.reconciler
                    .notices()
                    .notify(Notice::success(format!("Marked {updated} notifications as read")));
                self.refresh().await;
                Ok(updated)
            }
            Err(e) => Err(self.report(e, MARK_ALL_READ_FAILED)),
        }
    }

    /// Optimistically remove a notification, then delete it server-side.
    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        self.reconciler.apply_delete(id);

        match self.api.delete(id).await {
            Ok(()) => {
                self.reconciler
                    .notices()
                    .notify(Notice::success("Notification deleted"));
                self.refresh().await;
                Ok(())
            }
            Err(e) => {
                // The entry is gone locally but not on the server. Mark
                // listings stale so the next read brings it back.
                self.reconciler.cache().invalidate_listings();
                Err(self.report(e, DELETE_FAILED))
            }
        }
    }

    /// Create a notification. Nothing is applied locally until the server
    /// accepts it.
    pub async fn create_notification(
        &self,
        request: &CreateNotificationRequest,
    ) -> Result<Notification> {
        match self.api.create(request).await {
            Ok(created) => {
                self.reconciler
                    .notices()
                    .notify(Notice::success("Notification created successfully"));
                self.refresh().await;
                Ok(created)
            }
            Err(e) => Err(self.report(e, CREATE_FAILED)),
        }
    }

    async fn refresh(&self) {
        let cache = self.reconciler.cache();
        cache.invalidate_listings();
        cache.invalidate_stats();
        self.queries.refetch_stale().await;
    }

    fn report(&self, error: NotifyError, fallback: &str) -> NotifyError {
        warn!(error = %error, "{fallback}");
        if error.is_unauthorized() {
            debug!("session rejected by backend");
        }
        self.reconciler
            .notices()
            .notify(Notice::error(error.user_message(fallback)));
        error
    }
}
