//! Shared version state of a service
//!
//! A [`Status`] is owned by its service and shared (`Arc`) with the lookup
//! tracking it. It may be updated concurrently by the polling loop, by manual
//! version sets and by refreshes, so the version record lives behind a single
//! lock: a version and its timestamp always change together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Deployed and latest versions with the time each last changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deployed_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_version_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version_timestamp: Option<DateTime<Utc>>,
}

/// What an announcement reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    /// The deployed version changed
    Updated,
    /// The deployed version changed and is the newest version seen
    NewVersion,
}

/// Message for websocket/dashboard listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub service_id: String,
    pub kind: AnnouncementKind,
    pub versions: VersionRecord,
}

/// A column/value pair to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseCell {
    pub column: String,
    pub value: String,
}

impl DatabaseCell {
    fn new(column: &str, value: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }
}

/// Message for the database writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMessage {
    pub service_id: String,
    pub cells: Vec<DatabaseCell>,
}

/// A change to apply to the version record
#[derive(Debug, Clone, PartialEq)]
pub struct VersionUpdate {
    /// New deployed version
    pub deployed_version: String,
    /// When it was released/deployed
    pub date: DateTime<Utc>,
    /// Also make it the latest version
    pub promote_latest: bool,
}

/// Receiving ends of a status's channels
#[derive(Debug)]
pub struct StatusReceivers {
    pub announce: UnboundedReceiver<Announcement>,
    pub database: UnboundedReceiver<DatabaseMessage>,
}

/// Version state of one service
#[derive(Debug)]
pub struct Status {
    service_id: String,
    versions: RwLock<VersionRecord>,
    deleting: AtomicBool,
    announce: Option<UnboundedSender<Announcement>>,
    database: Option<UnboundedSender<DatabaseMessage>>,
}

impl Default for Status {
    fn default() -> Self {
        Self::detached("")
    }
}

impl Status {
    /// Create a status with announce and database channels
    pub fn new(service_id: impl Into<String>) -> (Self, StatusReceivers) {
        let (announce_tx, announce_rx) = unbounded_channel();
        let (database_tx, database_rx) = unbounded_channel();

        let status = Self {
            service_id: service_id.into(),
            versions: RwLock::new(VersionRecord::default()),
            deleting: AtomicBool::new(false),
            announce: Some(announce_tx),
            database: Some(database_tx),
        };

        (
            status,
            StatusReceivers {
                announce: announce_rx,
                database: database_rx,
            },
        )
    }

    /// Create a status nobody listens to
    pub fn detached(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            versions: RwLock::new(VersionRecord::default()),
            deleting: AtomicBool::new(false),
            announce: None,
            database: None,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    fn read(&self) -> RwLockReadGuard<'_, VersionRecord> {
        self.versions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VersionRecord> {
        self.versions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the version record
    pub fn versions(&self) -> VersionRecord {
        self.read().clone()
    }

    pub fn deployed_version(&self) -> String {
        self.read().deployed_version.clone()
    }

    pub fn deployed_version_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read().deployed_version_timestamp
    }

    pub fn latest_version(&self) -> String {
        self.read().latest_version.clone()
    }

    pub fn latest_version_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read().latest_version_timestamp
    }

    /// Load a record kept from a previous run, timestamps included.
    ///
    /// Nothing is announced or written to the database.
    pub fn seed(&self, record: VersionRecord) {
        *self.write() = record;
    }

    /// Set the deployed version (timestamped `date`, or now)
    pub fn set_deployed_version(
        &self,
        version: &str,
        date: Option<DateTime<Utc>>,
        write_to_db: bool,
    ) {
        let date = date.unwrap_or_else(Utc::now);
        {
            let mut record = self.write();
            record.deployed_version = version.to_string();
            record.deployed_version_timestamp = Some(date);
        }

        if write_to_db {
            self.send_database(vec![
                DatabaseCell::new("deployed_version", version),
                DatabaseCell::new("deployed_version_timestamp", date.to_rfc3339()),
            ]);
        }
    }

    /// Set the latest version (timestamped `date`, or now)
    pub fn set_latest_version(&self, version: &str, date: Option<DateTime<Utc>>, write_to_db: bool) {
        let date = date.unwrap_or_else(Utc::now);
        {
            let mut record = self.write();
            record.latest_version = version.to_string();
            record.latest_version_timestamp = Some(date);
        }

        if write_to_db {
            self.send_database(vec![
                DatabaseCell::new("latest_version", version),
                DatabaseCell::new("latest_version_timestamp", date.to_rfc3339()),
            ]);
        }
    }

    /// Decide and apply a version change as one unit.
    ///
    /// `decide` sees the current record under the write lock; the update it
    /// returns is applied before the lock is released. With `write_to_db`, a
    /// single database message carries every changed column.
    pub fn update_versions<F>(&self, write_to_db: bool, decide: F) -> Option<VersionUpdate>
    where
        F: FnOnce(&VersionRecord) -> Option<VersionUpdate>,
    {
        let update = {
            let mut record = self.write();
            let update = decide(&record)?;

            record.deployed_version = update.deployed_version.clone();
            record.deployed_version_timestamp = Some(update.date);
            if update.promote_latest {
                record.latest_version = update.deployed_version.clone();
                record.latest_version_timestamp = Some(update.date);
            }
            update
        };

        if write_to_db {
            let date = update.date.to_rfc3339();
            let mut cells = vec![
                DatabaseCell::new("deployed_version", update.deployed_version.as_str()),
                DatabaseCell::new("deployed_version_timestamp", date.as_str()),
            ];
            if update.promote_latest {
                cells.push(DatabaseCell::new(
                    "latest_version",
                    update.deployed_version.as_str(),
                ));
                cells.push(DatabaseCell::new("latest_version_timestamp", date));
            }
            self.send_database(cells);
        }

        Some(update)
    }

    /// Tell listeners the deployed version changed
    pub fn announce_update(&self) {
        self.announce(AnnouncementKind::Updated);
    }

    /// Tell listeners a new latest version was found
    pub fn announce_query_new_version(&self) {
        self.announce(AnnouncementKind::NewVersion);
    }

    fn announce(&self, kind: AnnouncementKind) {
        let Some(tx) = &self.announce else {
            return;
        };
        let message = Announcement {
            service_id: self.service_id.clone(),
            kind,
            versions: self.versions(),
        };
        if tx.send(message).is_err() {
            tracing::debug!(service = %self.service_id, "announce channel closed");
        }
    }

    fn send_database(&self, cells: Vec<DatabaseCell>) {
        let Some(tx) = &self.database else {
            return;
        };
        let message = DatabaseMessage {
            service_id: self.service_id.clone(),
            cells,
        };
        if tx.send(message).is_err() {
            tracing::debug!(service = %self.service_id, "database channel closed");
        }
    }

    /// Whether the service is being deleted
    pub fn deleting(&self) -> bool {
        self.deleting.load(Ordering::Acquire)
    }

    /// Mark the service as being deleted (stops tracking)
    pub fn set_deleting(&self) {
        self.deleting.store(true, Ordering::Release);
    }
}
