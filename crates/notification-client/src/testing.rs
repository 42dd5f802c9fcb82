//! In-memory backend and scripted live channel used by unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::api::NotificationsApi;
use crate::error::{NotifyError, Result};
use crate::stream::{EventTransport, FrameStream, SseFrame};
use crate::model::{
    CreateNotificationRequest, Notification, NotificationFilters, NotificationPage,
    NotificationStats, Pagination, PollingParams, PollingResponse,
};

#[derive(Debug, Default)]
struct State {
    notifications: Vec<Notification>,
    polls: VecDeque<Result<PollingResponse>>,
    poll_requests: Vec<PollingParams>,
    poll_gate: Option<Arc<Notify>>,
    fail_next_list: bool,
    fail_mutations: Option<String>,
    list_calls: usize,
    stats_calls: usize,
    mutation_calls: usize,
}

/// A fake backend keeping notifications in memory, newest first.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        self.state.lock().notifications = notifications;
    }

    pub fn push_poll(&self, response: Result<PollingResponse>) {
        self.state.lock().polls.push_back(response);
    }

    /// Hold every later poll until the returned gate is notified once per poll.
    pub fn gate_polls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().poll_gate = Some(gate.clone());
        gate
    }

    pub fn poll_requests(&self) -> Vec<PollingParams> {
        self.state.lock().poll_requests.clone()
    }

    pub fn fail_next_list(&self) {
        self.state.lock().fail_next_list = true;
    }

    /// Make every mutation fail with a 400 carrying `message`.
    pub fn fail_mutations(&self, message: Option<&str>) {
        self.state.lock().fail_mutations = Some(message.unwrap_or_default().to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn stats_calls(&self) -> usize {
        self.state.lock().stats_calls
    }

    pub fn mutation_calls(&self) -> usize {
        self.state.lock().mutation_calls
    }

    fn check_mutation(state: &mut State) -> Result<()> {
        state.mutation_calls += 1;
        match &state.fail_mutations {
            Some(message) => Err(NotifyError::from_status(
                StatusCode::BAD_REQUEST,
                Some(message.clone()).filter(|m| !m.is_empty()),
            )),
            None => Ok(()),
        }
    }

    fn unread(state: &State) -> u64 {
        state.notifications.iter().filter(|n| !n.is_read()).count() as u64
    }
}

#[async_trait]
impl NotificationsApi for FakeApi {
    async fn list(&self, filters: &NotificationFilters) -> Result<NotificationPage> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if std::mem::take(&mut state.fail_next_list) {
            return Err(NotifyError::from_status(StatusCode::INTERNAL_SERVER_ERROR, None));
        }

        let matching: Vec<_> = state
            .notifications
            .iter()
            .filter(|n| filters.kind.is_none_or(|k| n.kind == k))
            .filter(|n| filters.unread_only != Some(true) || !n.is_read())
            .cloned()
            .collect();

        let page = filters.page.unwrap_or(1);
        let limit = filters.limit.unwrap_or(20);
        let total = matching.len() as u64;
        let notifications = matching
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(NotificationPage {
            notifications,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit as u64) as u32,
            },
            unread_count: Self::unread(&state),
        })
    }

    async fn create(&self, request: &CreateNotificationRequest) -> Result<Notification> {
        let mut state = self.state.lock();
        Self::check_mutation(&mut state)?;
        let mut n = crate::model::notification::fixtures::notification(
            &format!("created-{}", state.notifications.len()),
            request.kind,
            59,
        );
        n.title = request.title.clone();
        n.message = request.message.clone();
        state.notifications.insert(0, n.clone());
        Ok(n)
    }

    async fn mark_as_read(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_mutation(&mut state)?;
        let now = chrono::Utc::now();
        if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
            n.mark_read(now);
        }
        Ok(())
    }

    async fn mark_all_as_read(&self) -> Result<u64> {
        let mut state = self.state.lock();
        Self::check_mutation(&mut state)?;
        let now = chrono::Utc::now();
        let mut updated = 0;
        for n in state.notifications.iter_mut().filter(|n| !n.is_read()) {
            n.mark_read(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_mutation(&mut state)?;
        state.notifications.retain(|n| n.id != id);
        Ok(())
    }

    async fn stats(&self) -> Result<NotificationStats> {
        let mut state = self.state.lock();
        state.stats_calls += 1;
        let unread = Self::unread(&state);
        let total = state.notifications.len() as u64;
        let mut type_breakdown = BTreeMap::new();
        for n in &state.notifications {
            *type_breakdown.entry(n.kind).or_insert(0) += 1;
        }
        Ok(NotificationStats {
            total_notifications: total,
            unread_count: unread,
            read_count: total - unread,
            type_breakdown,
            recent_activity: Vec::new(),
        })
    }

    async fn poll(&self, params: &PollingParams) -> Result<PollingResponse> {
        let gate = {
            let mut state = self.state.lock();
            state.poll_requests.push(*params);
            state.poll_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        match state.polls.pop_front() {
            Some(response) => response,
            None => Ok(PollingResponse {
                notifications: Vec::new(),
                unread_count: Self::unread(&state),
                last_event_id: None,
            }),
        }
    }
}

/// What the next [`ScriptedTransport::open`] call does.
pub enum Script {
    /// Fail to open.
    Fail,
    /// Open, deliver the frames, then stay silent.
    Hold(Vec<Result<SseFrame>>),
    /// Open, deliver the frames, then close.
    Close(Vec<Result<SseFrame>>),
    /// Open and deliver whatever the test sends.
    Live(mpsc::UnboundedReceiver<Result<SseFrame>>),
}

/// A live-channel transport replaying scripted outcomes. Fails once the
/// script runs out.
#[derive(Default)]
pub struct ScriptedTransport {
    unsupported: bool,
    scripts: Mutex<VecDeque<Script>>,
    opens: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    /// `Last-Event-ID` sent with each open, in order.
    pub fn resumed_from(&self) -> Vec<Option<String>> {
        self.opens.lock().clone()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn open(&self, last_event_id: Option<&str>) -> Result<FrameStream> {
        self.opens.lock().push(last_event_id.map(str::to_string));
        match self.scripts.lock().pop_front() {
            None | Some(Script::Fail) => Err(NotifyError::stream("connection refused")),
            Some(Script::Hold(frames)) => Ok(stream::iter(frames).chain(stream::pending()).boxed()),
            Some(Script::Close(frames)) => Ok(stream::iter(frames).boxed()),
            Some(Script::Live(rx)) => Ok(rx.boxed()),
        }
    }
}

/// A default-named frame carrying `data`.
pub fn frame(data: serde_json::Value) -> Result<SseFrame> {
    Ok(SseFrame {
        event: "message".to_string(),
        data: data.to_string(),
        last_event_id: None,
        retry_ms: None,
    })
}

pub fn frame_with_id(data: serde_json::Value, id: &str) -> Result<SseFrame> {
    Ok(SseFrame {
        event: "message".to_string(),
        data: data.to_string(),
        last_event_id: Some(id.to_string()),
        retry_ms: None,
    })
}
