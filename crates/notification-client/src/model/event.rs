//! Events carried on the live notification channel.

use serde::Deserialize;
use serde_json::Value;

use super::notification::Notification;
use crate::error::{NotifyError, Result};

/// A decoded live-channel event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Channel is ready. Informational only.
    Connected { message: Option<String> },
    /// A newly delivered notification.
    Notification(Box<Notification>),
    /// Authoritative unread count pushed by the server.
    UnreadCount(u64),
    /// Keep-alive.
    Ping,
    /// An event kind this client does not understand.
    Unknown { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl StreamEvent {
    /// Parse the JSON text of one SSE `data` field.
    pub fn parse(data: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(data)
            .map_err(|e| NotifyError::malformed(format!("invalid event JSON: {e}")))?;

        match raw.kind.as_str() {
            "connected" => Ok(Self::Connected {
                message: raw.message,
            }),
            "notification" => {
                let data = raw
                    .data
                    .filter(Value::is_object)
                    .ok_or_else(|| NotifyError::malformed("notification event without an object payload"))?;
                let notification: Notification = serde_json::from_value(data)
                    .map_err(|e| NotifyError::malformed(format!("invalid notification payload: {e}")))?;
                Ok(Self::Notification(Box::new(notification)))
            }
            "unread_count" => raw
                .data
                .as_ref()
                .and_then(Value::as_u64)
                .map(Self::UnreadCount)
                .ok_or_else(|| {
                    NotifyError::malformed("unread_count event without a non-negative integer")
                }),
            "ping" => Ok(Self::Ping),
            other => Ok(Self::Unknown {
                kind: other.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Notification(_) => "notification",
            Self::UnreadCount(_) => "unread_count",
            Self::Ping => "ping",
            Self::Unknown { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_unread_count() {
        let event =
            StreamEvent::parse(r#"{"type":"unread_count","data":5,"timestamp":"2025-03-14T12:00:00Z"}"#)
                .unwrap();
        assert_eq!(event, StreamEvent::UnreadCount(5));
    }

    #[test]
    fn parses_notification() {
        let event = StreamEvent::parse(
            r#"{"type":"notification","data":{"id":"n1","title":"t","message":"m","type":"ALERT","createdAt":"2025-03-14T12:00:00Z","isRead":false}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::Notification(n) => {
                assert_eq!(n.id, "n1");
                assert!(!n.is_read());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn notification_with_null_targets_is_not_dropped() {
        let event = StreamEvent::parse(
            r#"{"type":"notification","data":{"id":"n2","title":"t","message":"m","type":"REMINDER","createdAt":"2025-03-14T12:00:00Z","scope":"ROLE","targetRoles":["admin"],"targetUserIds":null,"targetDepartmentIds":null}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::Notification(n) => assert_eq!(n.targets(), ["admin".to_string()]),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn connected_and_ping() {
        assert_eq!(
            StreamEvent::parse(r#"{"type":"connected","message":"hello"}"#).unwrap(),
            StreamEvent::Connected {
                message: Some("hello".to_string())
            }
        );
        assert_eq!(StreamEvent::parse(r#"{"type":"ping"}"#).unwrap(), StreamEvent::Ping);
    }

    #[test]
    fn unknown_kinds_are_not_errors() {
        let event = StreamEvent::parse(r#"{"type":"presence","data":{}}"#).unwrap();
        assert_eq!(event.kind(), "presence");
    }

    #[rstest]
    #[case::not_json("not json")]
    #[case::missing_type(r#"{"data":1}"#)]
    #[case::negative_count(r#"{"type":"unread_count","data":-1}"#)]
    #[case::string_count(r#"{"type":"unread_count","data":"5"}"#)]
    #[case::notification_without_data(r#"{"type":"notification"}"#)]
    #[case::notification_not_object(r#"{"type":"notification","data":[1]}"#)]
    #[case::notification_missing_fields(r#"{"type":"notification","data":{"id":"n1"}}"#)]
    fn malformed_payloads(#[case] input: &str) {
        assert!(matches!(
            StreamEvent::parse(input),
            Err(NotifyError::MalformedEvent(_))
        ));
    }
}
