//! CLI commands

pub mod check;
pub mod query;
pub mod refresh;
pub mod show;
pub mod track;

use console::style;
use verwatch_core::{Announcement, AnnouncementKind, StatusReceivers};

/// Print the announcements queued so far
pub(crate) fn print_announcements(receivers: &mut StatusReceivers) {
    while let Ok(announcement) = receivers.announce.try_recv() {
        print_announcement(&announcement);
    }
    while let Ok(message) = receivers.database.try_recv() {
        tracing::debug!(
            service = %message.service_id,
            columns = ?message.cells.iter().map(|c| c.column.as_str()).collect::<Vec<_>>(),
            "database update"
        );
    }
}

pub(crate) fn print_announcement(announcement: &Announcement) {
    let label = match announcement.kind {
        AnnouncementKind::NewVersion => style("new version").green().bold(),
        AnnouncementKind::Updated => style("updated").cyan().bold(),
    };
    println!(
        "{} {}: deployed {} (latest {})",
        label,
        announcement.service_id,
        style(&announcement.versions.deployed_version).bold(),
        announcement.versions.latest_version
    );
}
