use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notification_client::api::{ApiClient, HttpNotificationsApi, NotificationsApi};
use notification_client::model::CreateNotificationRequest;
use notification_client::stream::{EventTransport, HttpEventTransport, UnsupportedTransport};
use notification_client::{
    BroadcastNoticeSink, CacheEvent, ListingKey, Notice, NoticeLevel, NoticeSink,
    NotificationFilters, NotificationSession, NotificationType, StreamOptions,
};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::output::OutputManager;

/// Prints notices from one-shot commands to stderr.
///
/// Error notices are skipped; the failure reaches the user through the
/// command's exit path instead.
struct ConsoleNoticeSink {
    output: OutputManager,
}

impl NoticeSink for ConsoleNoticeSink {
    fn notify(&self, notice: Notice) {
        if notice.level != NoticeLevel::Error {
            eprintln!("{}", self.output.format_notice(&notice));
        }
    }
}

/// Overrides for `watch`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WatchOptions {
    pub no_polling: bool,
    pub polling_only: bool,
    pub polling_interval: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
}

impl WatchOptions {
    fn apply(&self, options: &mut StreamOptions) {
        options.enabled = true;
        if self.no_polling {
            options.fallback_to_polling = false;
        }
        if self.polling_only {
            options.fallback_to_polling = true;
        }
        if let Some(secs) = self.polling_interval {
            options.polling_interval_ms = secs.saturating_mul(1000);
        }
        if let Some(max) = self.max_reconnect_attempts {
            options.max_reconnect_attempts = max;
        }
    }
}

pub struct CommandExecutor {
    config: AppConfig,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, colored: bool) -> Self {
        Self {
            config,
            output: OutputManager::new(colored),
        }
    }

    /// A session for one-shot commands: the live stream stays off.
    fn session(&self) -> Result<NotificationSession> {
        let stream_options = StreamOptions {
            enabled: false,
            ..self.config.stream.clone()
        };
        Ok(NotificationSession::connect(
            self.config.client_config(),
            stream_options,
            self.config.queries,
            Arc::new(ConsoleNoticeSink {
                output: OutputManager::new(false),
            }),
        )?)
    }

    pub async fn list(
        &self,
        filters: NotificationFilters,
        grouped: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let session = self.session()?;
        let listing = session.queries().notifications(&filters).await?;
        print!(
            "{}",
            self.output.format_listing(&listing, grouped, Utc::now(), format)?
        );
        Ok(())
    }

    pub async fn stats(&self, format: OutputFormat) -> Result<()> {
        let session = self.session()?;
        let stats = session.queries().stats().await?;
        print!("{}", self.output.format_stats(&stats, format)?);
        Ok(())
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        let session = self.session()?;
        session.actions().mark_as_read(id).await?;
        println!("✓ Marked {id} as read");
        Ok(())
    }

    pub async fn mark_all_as_read(&self) -> Result<()> {
        self.session()?.actions().mark_all_as_read().await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.session()?.actions().delete_notification(id).await?;
        Ok(())
    }

    pub async fn create(
        &self,
        title: String,
        message: String,
        kind: NotificationType,
        user_id: Option<String>,
        metadata: Option<&str>,
    ) -> Result<()> {
        let mut request = CreateNotificationRequest::new(title, message, kind);
        if let Some(user_id) = user_id {
            request = request.for_user(user_id);
        }
        if let Some(raw) = metadata {
            request = request.with_metadata(parse_metadata(raw)?);
        }

        let created = self.session()?.actions().create_notification(&request).await?;
        println!("{}", created.id);
        Ok(())
    }

    /// Follow the feed until Ctrl-C.
    pub async fn watch(&self, overrides: WatchOptions) -> Result<()> {
        let mut stream_options = self.config.stream.clone();
        overrides.apply(&mut stream_options);

        let client = ApiClient::new(self.config.client_config())?;
        let api: Arc<dyn NotificationsApi> = Arc::new(HttpNotificationsApi::new(client.clone()));
        let transport: Arc<dyn EventTransport> = if overrides.polling_only {
            Arc::new(UnsupportedTransport)
        } else {
            Arc::new(HttpEventTransport::new(client))
        };
        let notices = Arc::new(BroadcastNoticeSink::default());
        let mut notice_rx = notices.subscribe();

        let session = NotificationSession::from_parts(
            api,
            transport,
            notices,
            stream_options,
            self.config.queries,
        );

        let filters = NotificationFilters::default();
        let mut seen = match session.queries().notifications(&filters).await {
            Ok(listing) => {
                info!(unread = listing.unread_count, "initial listing loaded");
                listing.notifications.first().map(|n| n.id.clone())
            }
            Err(e) => {
                warn!(error = %e, "could not load the initial listing");
                None
            }
        };

        let mut state_rx = session.stream().subscribe();
        let mut cache_rx = session.cache().subscribe();
        let mut last_shown = None;
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    if let Err(e) = result {
                        warn!(error = %e, "failed to listen for Ctrl-C");
                    }
                    break;
                }

                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    let shown = (state.status, state.delivery, state.reconnect_attempts);
                    if last_shown != Some(shown) {
                        last_shown = Some(shown);
                        println!("{}", self.output.format_state(&state));
                    }
                }

                notice = notice_rx.recv() => match notice {
                    Ok(notice) => println!("{}", self.output.format_notice(&notice)),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "notice receiver lagged"),
                    Err(RecvError::Closed) => break,
                },

                event = cache_rx.recv() => match event {
                    Ok(CacheEvent::ListingsUpdated) => {
                        seen = self.print_new(&session, &filters, seen);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "cache event receiver lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        println!("Shutting down...");
        if tokio::time::timeout(Duration::from_secs(5), session.shutdown())
            .await
            .is_err()
        {
            warn!("timed out stopping the notification stream");
        }
        Ok(())
    }

    /// Print listing entries newer than `seen` and return the new head.
    fn print_new(
        &self,
        session: &NotificationSession,
        filters: &NotificationFilters,
        seen: Option<String>,
    ) -> Option<String> {
        let Some(cached) = session.cache().get(&ListingKey::paged(filters.clone())) else {
            return seen;
        };
        let notifications = &cached.listing.notifications;
        let fresh = match &seen {
            Some(id) => notifications.iter().position(|n| &n.id == id).unwrap_or(0),
            None => notifications.len(),
        };

        let now = Utc::now();
        for notification in notifications[..fresh].iter().rev() {
            print!("{}", self.output.format_notification(notification, now));
        }
        println!("unread: {}", session.unread_count(filters));
        notifications.first().map(|n| n.id.clone()).or(seen)
    }
}

fn parse_metadata(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::InvalidInput("--metadata must be a JSON object".to_string())),
    }
}
