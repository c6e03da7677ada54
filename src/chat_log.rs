// src/chat_log.rs

//! Per-day conversation files.
//!
//! A logical day runs from 05:00 local time to 05:00 the next day, so a late
//! night session stays in the file of the day it started. Each day is stored
//! as `<data>/<YYYY-MM-DD>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use tracing::{debug, warn};

use crate::atomic_write::write_atomic;
use crate::error::ChatLogError;
use crate::types::{ChatEntry, ChatLog};

/// Local hour at which a new logical day begins.
pub const DAY_START_HOUR: u32 = 5;

pub struct ChatLogRepository<Tz: TimeZone = Local> {
    data_directory: PathBuf,
    zone: Tz,
}

impl ChatLogRepository<Local> {
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self::with_zone(data_directory, Local)
    }
}

impl<Tz: TimeZone> ChatLogRepository<Tz> {
    pub fn with_zone(data_directory: impl Into<PathBuf>, zone: Tz) -> Self {
        Self {
            data_directory: data_directory.into(),
            zone,
        }
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// The logical day an instant belongs to.
    pub fn logical_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let local = at.with_timezone(&self.zone);
        let date = local.date_naive();
        if local.hour() < DAY_START_HOUR {
            date.checked_sub_days(Days::new(1)).unwrap_or(date)
        } else {
            date
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.logical_date(Utc::now())
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.data_directory.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// `[start, end)` of a logical day in UTC.
    fn day_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
        (self.day_start(date), self.day_start(next))
    }

    fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive: NaiveDateTime = date.and_time(
            chrono::NaiveTime::from_hms_opt(DAY_START_HOUR, 0, 0).unwrap_or_default(),
        );
        self.zone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            // 05:00 skipped by a DST jump; treat the wall time as UTC.
            .unwrap_or_else(|| naive.and_utc())
    }

    pub fn save_conversations(&self, logs: &[ChatEntry]) -> Result<(), ChatLogError> {
        self.save_conversations_at(logs, Utc::now())
    }

    /// Write the entries of the logical day containing `at`.
    ///
    /// Entries outside that day are dropped. The write is skipped with
    /// [`ChatLogError::SizeAnomaly`] when it would shrink the existing file.
    pub fn save_conversations_at(
        &self,
        logs: &[ChatEntry],
        at: DateTime<Utc>,
    ) -> Result<(), ChatLogError> {
        let date = self.logical_date(at);
        let (start, end) = self.day_window(date);
        let path = self.path_for(date);

        let log = ChatLog {
            logs: logs
                .iter()
                .filter(|e| start <= e.timestamp && e.timestamp < end)
                .cloned()
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&log)?;

        if let Ok(meta) = fs::metadata(&path) {
            let existing = meta.len();
            let new = json.len() as u64;
            if existing > new {
                warn!(
                    path = %path.display(),
                    existing,
                    new,
                    "Chat log would shrink; skipping save"
                );
                return Err(ChatLogError::SizeAnomaly { existing, new });
            }
        }

        write_atomic(&path, &json)?;
        debug!(path = %path.display(), entries = log.logs.len(), "Saved chat log");
        Ok(())
    }

    /// Load one logical day. Missing or unreadable files yield an empty log.
    pub fn load_conversations(&self, date: NaiveDate) -> ChatLog {
        let path = self.path_for(date);
        if !path.exists() {
            return ChatLog::default();
        }

        match fs::read(&path)
            .map_err(ChatLogError::from)
            .and_then(|bytes| serde_json::from_slice::<ChatLog>(&bytes).map_err(ChatLogError::from))
        {
            Ok(log) => log,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error reading the conversations");
                ChatLog::default()
            }
        }
    }

    pub fn load_today(&self) -> ChatLog {
        self.load_conversations(self.today())
    }
}
