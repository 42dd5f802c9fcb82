use chrono::{DateTime, Utc};
#[cfg(feature = "colored-output")]
use colored::*;
use notification_client::model::{NotificationStats, format_relative_time, group_by_day};
use notification_client::{
    ConnectionState, ConnectionStatus, Notice, NoticeLevel, Notification, NotificationListing,
};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::Result;

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_listing(
        &self,
        listing: &NotificationListing,
        grouped: bool,
        now: DateTime<Utc>,
        format: OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => self.format_json(listing),
            OutputFormat::Pretty => Ok(self.format_listing_pretty(listing, grouped, now)),
        }
    }

    fn format_listing_pretty(
        &self,
        listing: &NotificationListing,
        grouped: bool,
        now: DateTime<Utc>,
    ) -> String {
        let mut output = String::new();
        let pagination = &listing.pagination;
        output.push_str(&format!(
            "{} ({} unread, page {} of {}, {} total)\n",
            self.colorize("Notifications", &Color::Green, true),
            listing.unread_count,
            pagination.page,
            pagination.total_pages.max(1),
            pagination.total
        ));

        if listing.notifications.is_empty() {
            output.push_str("  No notifications\n");
            return output;
        }

        if grouped {
            for group in group_by_day(&listing.notifications, now) {
                output.push('\n');
                output.push_str(&self.colorize(&group.label, &Color::Yellow, true));
                output.push('\n');
                for notification in group.notifications {
                    output.push_str(&self.format_notification(notification, now));
                }
            }
        } else {
            for notification in &listing.notifications {
                output.push_str(&self.format_notification(notification, now));
            }
        }
        output
    }

    /// One notification as a two-line entry.
    pub fn format_notification(&self, notification: &Notification, now: DateTime<Utc>) -> String {
        let marker = if notification.is_read() { " " } else { "●" };
        let mut line = format!(
            "  {} {} {} {}\n",
            self.colorize(marker, &Color::Blue, true),
            self.colorize(&format!("[{}]", notification.kind), &Color::Cyan, false),
            notification.title,
            self.colorize(
                &format!("({})", format_relative_time(notification.created_at, now)),
                &Color::Yellow,
                false
            ),
        );
        line.push_str(&format!("      {}\n", notification.message));
        if let Some((read, total)) = notification.read_progress() {
            line.push_str(&format!("      read by {read}/{total}\n"));
        }
        line.push_str(&format!("      id: {}\n", notification.id));
        line
    }

    pub fn format_stats(&self, stats: &NotificationStats, format: OutputFormat) -> Result<String> {
        if format == OutputFormat::Json {
            return self.format_json(stats);
        }

        let mut output = String::new();
        output.push_str(&self.colorize("Notification Statistics", &Color::Green, true));
        output.push('\n');
        for (label, value) in [
            ("Total", stats.total_notifications),
            ("Unread", stats.unread_count),
            ("Read", stats.read_count),
        ] {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize(label, &Color::Yellow, false),
                value
            ));
        }

        if !stats.type_breakdown.is_empty() {
            output.push_str(&format!("  {}:\n", self.colorize("By type", &Color::Yellow, false)));
            for (kind, count) in &stats.type_breakdown {
                output.push_str(&format!(
                    "    {}: {}\n",
                    self.colorize(kind.as_ref(), &Color::Cyan, false),
                    count
                ));
            }
        }
        if !stats.recent_activity.is_empty() {
            output.push_str(&format!(
                "  {}:\n",
                self.colorize("Recent activity", &Color::Yellow, false)
            ));
            for point in &stats.recent_activity {
                output.push_str(&format!("    {}: {}\n", point.date, point.count));
            }
        }
        Ok(output)
    }

    pub fn format_state(&self, state: &ConnectionState) -> String {
        let color = match state.status {
            ConnectionStatus::Connected => Color::Green,
            ConnectionStatus::Connecting | ConnectionStatus::Error => Color::Yellow,
            ConnectionStatus::Disconnected => Color::Blue,
        };
        let mut line = format!(
            "{} {} via {}",
            self.colorize("stream", &Color::Cyan, true),
            self.colorize(&state.status.to_string(), &color, true),
            state.delivery
        );
        if state.reconnect_attempts > 0 {
            line.push_str(&format!(" (attempt {})", state.reconnect_attempts));
        }
        line
    }

    pub fn format_notice(&self, notice: &Notice) -> String {
        let (icon, color) = match notice.level {
            NoticeLevel::Alert => ("!", Color::Yellow),
            NoticeLevel::Success => ("✓", Color::Green),
            NoticeLevel::Error => ("✗", Color::Yellow),
            NoticeLevel::Info => ("i", Color::Blue),
        };
        let mut line = format!("{} {}", self.colorize(icon, &color, true), notice.title);
        if let Some(description) = &notice.description {
            line.push_str(&format!(": {description}"));
        }
        line
    }

    fn format_json<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (self.colored, color, bold);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
}
