//! Incremental Server-Sent-Events decoder.
//!
//! Bytes may arrive split at arbitrary points, including in the middle of a
//! CRLF pair or a multi-byte character. Complete events come out of
//! [`SseDecoder::feed`] as [`SseFrame`]s.

use bytes::{Buf, BytesMut};

/// Event name used when a frame carries no `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream so far, carried across frames.
    pub last_event_id: Option<String>,
    /// Reconnection time requested by the server with this frame.
    pub retry_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// A CR ended the previous chunk; a leading LF in the next one belongs to it.
    pending_cr: bool,
    started: bool,

    event: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume with the id a previous connection ended on.
    pub fn with_last_event_id(last_event_id: Option<String>) -> Self {
        Self {
            last_event_id,
            ..Self::default()
        }
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Push a chunk of bytes and collect every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut chunk = chunk;
        if self.pending_cr {
            self.pending_cr = false;
            if let Some(rest) = chunk.strip_prefix(b"\n") {
                chunk = rest;
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line = self.buffer.split_to(pos);
            let terminator = self.buffer[0];
            self.buffer.advance(1);
            if terminator == b'\r' {
                match self.buffer.first().copied() {
                    Some(b'\n') => self.buffer.advance(1),
                    Some(_) => {}
                    None => self.pending_cr = true,
                }
            }

            let line = String::from_utf8_lossy(&line);
            let line = if self.started {
                line.as_ref()
            } else {
                self.started = true;
                line.strip_prefix('\u{feff}').unwrap_or(line.as_ref())
            };

            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            last_event_id: self.last_event_id.clone(),
            retry_ms: self.retry_ms.take(),
        })
    }
}
