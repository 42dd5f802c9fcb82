//! Live notification delivery with polling fallback.
//!
//! A single runner task owns the active transport (live channel, reconnect
//! timer or polling interval). Only one of them exists at any instant.
//! Events are applied to the cache one at a time, in arrival order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::backoff::ReconnectPolicy;
use super::sse::SseFrame;
use super::state::{ConnectionState, ConnectionStatus, Delivery};
use super::transport::{EventTransport, FrameStream};
use crate::api::NotificationsApi;
use crate::error::{NotifyError, Result};
use crate::model::api::DEFAULT_POLLING_LIMIT;
use crate::model::{PollingParams, PollingResponse, StreamEvent};
use crate::reconciler::CacheReconciler;

const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Options for [`NotificationStream::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// When false no connection is attempted and status stays disconnected.
    pub enabled: bool,
    pub fallback_to_polling: bool,
    pub polling_interval_ms: u64,
    /// Consecutive live-channel failures tolerated before giving up on it.
    pub max_reconnect_attempts: u32,
    /// Notifications requested per poll, clamped to 1..=100.
    pub polling_limit: u32,
    /// How far back the very first poll looks.
    pub initial_poll_lookback_ms: u64,
    /// Treat a live channel silent for this long as dropped.
    pub idle_timeout_ms: Option<u64>,
    pub reconnect: ReconnectPolicy,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_to_polling: true,
            polling_interval_ms: 30_000,
            max_reconnect_attempts: 5,
            polling_limit: DEFAULT_POLLING_LIMIT,
            initial_poll_lookback_ms: 60_000,
            idle_timeout_ms: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl StreamOptions {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    fn initial_poll_lookback(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.initial_poll_lookback_ms.min(i64::MAX as u64) as i64)
    }
}

#[derive(Debug)]
enum StreamCommand {
    Reconnect,
}

/// Handle to a running notification stream.
///
/// Dropping the handle cancels the runner; call [`stop`](Self::stop) to also
/// wait for it to finish.
#[derive(Debug)]
pub struct NotificationStream {
    state: watch::Receiver<ConnectionState>,
    commands: mpsc::Sender<StreamCommand>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationStream {
    /// Start delivering events into `reconciler`.
    ///
    /// Must be called within a tokio runtime when `options.enabled` is set.
    pub fn start(
        options: StreamOptions,
        transport: Arc<dyn EventTransport>,
        api: Arc<dyn NotificationsApi>,
        reconciler: CacheReconciler,
    ) -> Self {
        let initial = ConnectionState {
            status: if options.enabled {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Disconnected
            },
            ..ConnectionState::default()
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = if options.enabled {
            let runner = StreamRunner {
                options,
                transport,
                api,
                reconciler,
                state: state_tx,
                commands: command_rx,
                cancel: cancel.clone(),
            };
            Some(tokio::spawn(runner.run()))
        } else {
            debug!("notification stream disabled");
            None
        };

        Self {
            state: state_rx,
            commands: command_tx,
            cancel,
            task: Mutex::new(task),
        }
    }

    /// Drop the active transport, reset the attempt counter and connect again.
    pub fn reconnect(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Err(e) = self.commands.try_send(StreamCommand::Reconnect) {
            debug!(error = %e, "reconnect request not delivered");
        }
    }

    /// Tear everything down and wait for the runner to exit. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "notification stream task failed");
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    /// Latest unread count seen by the stream, 0 before any arrived.
    pub fn unread_count(&self) -> u64 {
        self.state.borrow().unread_count.unwrap_or(0)
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.state.borrow().is_connecting()
    }

    /// Observe every connection state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

impl Drop for NotificationStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What the runner is doing next.
enum Mode {
    Connect,
    Live(FrameStream),
    Backoff(Instant),
    Polling,
    /// Nothing active; only a reconnect or teardown moves on from here.
    Idle,
    Stopped,
}

struct StreamRunner {
    options: StreamOptions,
    transport: Arc<dyn EventTransport>,
    api: Arc<dyn NotificationsApi>,
    reconciler: CacheReconciler,
    state: watch::Sender<ConnectionState>,
    commands: mpsc::Receiver<StreamCommand>,
    cancel: CancellationToken,
}

impl StreamRunner {
    async fn run(mut self) {
        let mut mode = self.fresh_start();

        loop {
            mode = match mode {
                Mode::Connect => self.connect().await,
                Mode::Live(frames) => self.run_live(frames).await,
                Mode::Backoff(deadline) => self.wait_backoff(deadline).await,
                Mode::Polling => self.run_polling().await,
                Mode::Idle => self.idle().await,
                Mode::Stopped => break,
            };
        }

        self.update(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.delivery = Delivery::None;
        });
        debug!("notification stream stopped");
    }

    fn update(&self, f: impl FnOnce(&mut ConnectionState)) {
        self.state.send_modify(f);
    }

    /// Initial transition, also used after a manual reconnect.
    fn fresh_start(&mut self) -> Mode {
        self.update(|s| s.reconnect_attempts = 0);

        if self.transport.is_supported() {
            return Mode::Connect;
        }
        if self.options.fallback_to_polling {
            info!("live channel unsupported, using polling");
            return self.enter_polling();
        }
        info!("live channel unsupported and polling disabled");
        self.update(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.delivery = Delivery::None;
        });
        Mode::Idle
    }

    fn handle_command(&mut self, command: Option<StreamCommand>) -> Mode {
        match command {
            Some(StreamCommand::Reconnect) => {
                info!("manual reconnect requested");
                self.fresh_start()
            }
            // Every handle is gone.
            None => Mode::Stopped,
        }
    }

    async fn connect(&mut self) -> Mode {
        self.update(|s| {
            s.status = ConnectionStatus::Connecting;
            s.delivery = Delivery::None;
        });
        let last_event_id = self.state.borrow().last_event_id.clone();
        let transport = self.transport.clone();

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Mode::Stopped,

            cmd = self.commands.recv() => self.handle_command(cmd),

            result = transport.open(last_event_id.as_deref()) => match result {
                Ok(frames) => {
                    info!("notification stream connected");
                    self.update(|s| {
                        s.status = ConnectionStatus::Connected;
                        s.reconnect_attempts = 0;
                        s.delivery = Delivery::Live;
                    });
                    Mode::Live(frames)
                }
                Err(e) => self.on_channel_error(e),
            },
        }
    }

    async fn run_live(&mut self, mut frames: FrameStream) -> Mode {
        let idle_timeout = self.options.idle_timeout();

        loop {
            let watchdog = async {
                match idle_timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Mode::Stopped,

                cmd = self.commands.recv() => return self.handle_command(cmd),

                frame = frames.next() => match frame {
                    Some(Ok(frame)) => self.handle_frame(frame),
                    Some(Err(e)) => return self.on_channel_error(e),
                    None => return self.on_channel_error(NotifyError::stream("event stream closed")),
                },

                _ = watchdog => {
                    return self.on_channel_error(NotifyError::stream("event stream idle timeout"));
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: SseFrame) {
        match StreamEvent::parse(&frame.data) {
            Ok(event) => self.handle_event(event),
            Err(e) => warn!(event = %frame.event, error = %e, "dropping malformed stream event"),
        }

        if let Some(id) = frame.last_event_id {
            self.update(|s| s.last_event_id = Some(id));
        }
    }

    fn handle_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Connected { message } => {
                debug!(message = message.as_deref().unwrap_or_default(), "stream ready");
            }
            StreamEvent::Notification(notification) => {
                self.reconciler.apply_new_notification(&notification);
                if !notification.is_read() {
                    self.update(|s| s.unread_count = Some(s.unread_count.unwrap_or(0) + 1));
                }
            }
            StreamEvent::UnreadCount(count) => {
                self.reconciler.apply_unread_count_update(count);
                self.update(|s| s.unread_count = Some(count));
            }
            StreamEvent::Ping => trace!("stream keep-alive"),
            StreamEvent::Unknown { kind } => debug!(kind = %kind, "ignoring unknown stream event"),
        }
    }

    /// Apply the failure policy after the live channel failed to open or dropped.
    fn on_channel_error(&mut self, error: NotifyError) -> Mode {
        let attempts = self.state.borrow().reconnect_attempts + 1;
        warn!(attempt = attempts, error = %error, "notification stream error");

        if attempts == 1 && self.options.fallback_to_polling {
            info!("falling back to polling after first stream error");
            return self.enter_polling();
        }

        if attempts < self.options.max_reconnect_attempts {
            let delay = self.options.reconnect.delay_for_attempt(attempts);
            debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            self.update(|s| {
                s.status = ConnectionStatus::Error;
                s.reconnect_attempts = attempts;
                s.delivery = Delivery::Backoff;
            });
            return Mode::Backoff(Instant::now() + delay);
        }

        if self.options.fallback_to_polling {
            info!(attempts, "reconnect attempts exhausted, falling back to polling");
            return self.enter_polling();
        }

        warn!(attempts, "reconnect attempts exhausted, notification stream disconnected");
        self.update(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.reconnect_attempts = attempts;
            s.delivery = Delivery::None;
        });
        Mode::Idle
    }

    fn enter_polling(&mut self) -> Mode {
        self.update(|s| {
            s.status = ConnectionStatus::Connected;
            s.reconnect_attempts = 0;
            s.delivery = Delivery::Polling;
        });
        Mode::Polling
    }

    async fn wait_backoff(&mut self, deadline: Instant) -> Mode {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Mode::Stopped,

            cmd = self.commands.recv() => self.handle_command(cmd),

            _ = tokio::time::sleep_until(deadline) => Mode::Connect,
        }
    }

    async fn idle(&mut self) -> Mode {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Mode::Stopped,

            cmd = self.commands.recv() => self.handle_command(cmd),
        }
    }

    async fn run_polling(&mut self) -> Mode {
        // First tick completes immediately.
        let mut ticker = tokio::time::interval(self.options.polling_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = self.api.clone();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Mode::Stopped,

                cmd = self.commands.recv() => return self.handle_command(cmd),

                _ = ticker.tick() => {}
            }

            let since = self.poll_since();
            let issued_at = Utc::now();
            let params = PollingParams::new(since, self.options.polling_limit);

            tokio::select! {
                biased;

                // An in-flight poll is abandoned here; its result is never applied.
                _ = self.cancel.cancelled() => return Mode::Stopped,

                cmd = self.commands.recv() => return self.handle_command(cmd),

                result = api.poll(&params) => self.apply_poll(since, issued_at, result),
            }
        }
    }

    fn poll_since(&self) -> DateTime<Utc> {
        self.state
            .borrow()
            .last_poll_at
            .unwrap_or_else(|| Utc::now() - self.options.initial_poll_lookback())
    }

    /// Apply one poll result that was requested at `issued_at` with `since`.
    fn apply_poll(
        &mut self,
        since: DateTime<Utc>,
        issued_at: DateTime<Utc>,
        result: Result<PollingResponse>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "polling tick failed");
                return;
            }
        };

        if let Some(last_poll_at) = self.state.borrow().last_poll_at
            && since < last_poll_at
        {
            debug!(%since, %last_poll_at, "discarding out-of-date poll response");
            return;
        }

        let mut notifications = response.notifications;
        // Oldest first, so prepending leaves listings newest-first.
        notifications.sort_by_key(|n| n.created_at);
        for notification in &notifications {
            self.reconciler.apply_new_notification(notification);
        }
        self.reconciler
            .apply_unread_count_update(response.unread_count);

        debug!(
            received = notifications.len(),
            unread = response.unread_count,
            "poll applied"
        );
        self.update(|s| {
            s.unread_count = Some(response.unread_count);
            s.last_poll_at = Some(issued_at.max(since));
            if response.last_event_id.is_some() {
                s.last_event_id = response.last_event_id;
            }
        });
    }
}
