//! Human-facing formatting of notification timestamps.

use chrono::{DateTime, Datelike, Utc, Weekday};

use super::notification::Notification;

/// Short relative age such as `"5m ago"`. Falls back to the calendar date
/// after a week.
pub fn format_relative_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else {
        created_at.format("%Y-%m-%d").to_string()
    }
}

/// Notifications sharing a day label, in listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup<'a> {
    pub label: String,
    pub notifications: Vec<&'a Notification>,
}

/// Group a most-recent-first listing into labelled days.
///
/// Groups appear in the order their first member appears in `notifications`.
pub fn group_by_day(notifications: &[Notification], now: DateTime<Utc>) -> Vec<DayGroup<'_>> {
    let mut groups: Vec<DayGroup<'_>> = Vec::new();

    for notification in notifications {
        let label = day_label(notification.created_at, now);
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.notifications.push(notification),
            None => groups.push(DayGroup {
                label,
                notifications: vec![notification],
            }),
        }
    }

    groups
}

fn day_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let day = at.date_naive();
    let today = now.date_naive();
    let days_ago = (today - day).num_days();

    match days_ago {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=7 => weekday_name(day.weekday()).to_string(),
        _ if day.year() == today.year() => day.format("%b %-d").to_string(),
        _ => day.format("%b %-d, %Y").to_string(),
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
