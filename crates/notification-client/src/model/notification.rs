//! The notification entity as delivered by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Fixed set of notification kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum NotificationType {
    Invite,
    Document,
    Alert,
    Reminder,
    Info,
}

/// How urgent a notification type is for the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

impl NotificationType {
    pub fn priority(self) -> NotificationPriority {
        match self {
            Self::Alert => NotificationPriority::High,
            Self::Reminder | Self::Invite => NotificationPriority::Medium,
            Self::Document | Self::Info => NotificationPriority::Low,
        }
    }

    /// Whether arrival of this type surfaces a transient alert to the user.
    /// Other types land in the list silently.
    pub fn raises_alert(self) -> bool {
        matches!(self, Self::Alert | Self::Reminder)
    }
}

/// Targeting mode of a notification.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum NotificationScope {
    #[default]
    User,
    Organization,
    Department,
    Role,
}

/// One message delivered to a user or a scope of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub organization_id: String,

    #[serde(default)]
    pub scope: NotificationScope,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub target_user_ids: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub target_department_ids: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub target_roles: Vec<String>,

    /// Read state as seen by the current viewer. Authoritative when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read_by_current_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,

    /// Aggregate read statistics, only meaningful for non-USER scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_recipients: Option<u64>,

    /// Legacy single-recipient field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Legacy read flag. Only consulted when `is_read_by_current_user` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

/// Treat an explicit `null` like a missing field. Only the target list
/// matching `scope` is populated; the backend may send `null` for the rest.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Notification {
    /// Read state for the current viewer.
    pub fn is_read(&self) -> bool {
        self.is_read_by_current_user
            .or(self.is_read)
            .unwrap_or(false)
    }

    /// Flip the cached copy to read.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.is_read_by_current_user = Some(true);
        if self.is_read.is_some() {
            self.is_read = Some(true);
        }
        if self.read_at.is_none() {
            self.read_at = Some(at);
        }
    }

    /// The target ids matching `scope`; the other target fields are ignored.
    pub fn targets(&self) -> &[String] {
        match self.scope {
            NotificationScope::User => &self.target_user_ids,
            NotificationScope::Department => &self.target_department_ids,
            NotificationScope::Role => &self.target_roles,
            NotificationScope::Organization => &[],
        }
    }

    /// `(readers, recipients)` for scope-wide notifications.
    pub fn read_progress(&self) -> Option<(u64, u64)> {
        if self.scope == NotificationScope::User {
            return None;
        }
        Some((self.read_count?, self.total_recipients?))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Build an unread USER-scoped notification created at `minute` past noon.
    pub fn notification(id: &str, kind: NotificationType, minute: u32) -> Notification {
        Notification {
            id: id.to_string(),
            title: format!("title {id}"),
            message: format!("message {id}"),
            kind,
            metadata: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 12, minute, 0).unwrap(),
            organization_id: "org-1".to_string(),
            scope: NotificationScope::User,
            target_user_ids: vec!["u-1".to_string()],
            target_department_ids: Vec::new(),
            target_roles: Vec::new(),
            is_read_by_current_user: Some(false),
            read_at: None,
            read_count: None,
            total_recipients: None,
            user_id: None,
            is_read: None,
        }
    }

    pub fn read_notification(id: &str, minute: u32) -> Notification {
        let mut n = notification(id, NotificationType::Info, minute);
        n.is_read_by_current_user = Some(true);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn deserializes_backend_shape() {
        let n: Notification = serde_json::from_value(json!({
            "id": "n1",
            "title": "Policy update",
            "message": "Please review the new handbook",
            "type": "DOCUMENT",
            "createdAt": "2025-03-14T12:00:00.000Z",
            "organizationId": "org-1",
            "scope": "DEPARTMENT",
            "targetDepartmentIds": ["d-7"],
            "targetUserIds": ["ignored"],
            "isReadByCurrentUser": false,
            "readCount": 3,
            "totalRecipients": 12
        }))
        .unwrap();

        assert_eq!(n.kind, NotificationType::Document);
        assert_eq!(n.scope, NotificationScope::Department);
        assert_eq!(n.targets(), ["d-7".to_string()]);
        assert_eq!(n.read_progress(), Some((3, 12)));
        assert!(!n.is_read());
    }

    #[test]
    fn current_user_flag_wins_over_legacy_flag() {
        let mut n = fixtures::notification("n1", NotificationType::Info, 0);
        n.is_read_by_current_user = Some(false);
        n.is_read = Some(true);
        assert!(!n.is_read());

        n.is_read_by_current_user = None;
        assert!(n.is_read());

        n.is_read = None;
        assert!(!n.is_read());
    }

    #[test]
    fn mark_read_sets_both_flags_and_timestamp() {
        let mut n = fixtures::notification("n1", NotificationType::Info, 0);
        n.is_read = Some(false);
        let at = Utc::now();
        n.mark_read(at);
        assert_eq!(n.is_read_by_current_user, Some(true));
        assert_eq!(n.is_read, Some(true));
        assert_eq!(n.read_at, Some(at));
    }

    #[test]
    fn scope_defaults_to_user_and_missing_fields_are_tolerated() {
        let n: Notification = serde_json::from_value(json!({
            "id": "n2",
            "title": "t",
            "message": "m",
            "type": "ALERT",
            "createdAt": "2025-03-14T12:00:00Z",
            "isRead": false
        }))
        .unwrap();
        assert_eq!(n.scope, NotificationScope::User);
        assert!(n.read_progress().is_none());
        assert!(!n.is_read());
    }

    #[test]
    fn null_targets_and_organization_are_tolerated() {
        let n: Notification = serde_json::from_value(json!({
            "id": "n3",
            "title": "All hands",
            "message": "Friday 16:00",
            "type": "INFO",
            "createdAt": "2025-03-14T12:00:00Z",
            "organizationId": null,
            "scope": "ORGANIZATION",
            "targetUserIds": null,
            "targetDepartmentIds": null,
            "targetRoles": null,
            "readCount": 40,
            "totalRecipients": 120
        }))
        .unwrap();

        assert!(n.organization_id.is_empty());
        assert!(n.target_user_ids.is_empty());
        assert!(n.target_department_ids.is_empty());
        assert!(n.target_roles.is_empty());
        assert!(n.targets().is_empty());
        assert_eq!(n.read_progress(), Some((40, 120)));
    }

    #[test]
    fn type_priorities_and_alerts() {
        assert_eq!(NotificationType::Alert.priority(), NotificationPriority::High);
        assert_eq!(NotificationType::Invite.priority(), NotificationPriority::Medium);
        assert_eq!(NotificationType::Info.priority(), NotificationPriority::Low);
        assert!(NotificationType::Reminder.raises_alert());
        assert!(!NotificationType::Invite.raises_alert());
    }

    #[test]
    fn type_parses_case_insensitively() {
        assert_eq!(
            NotificationType::from_str("reminder").unwrap(),
            NotificationType::Reminder
        );
        assert_eq!(NotificationType::Alert.to_string(), "ALERT");
        assert!(NotificationType::from_str("urgent").is_err());
    }
}
