// src/recorder/retention_fs.rs
use std::fs;
use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use log::{debug, info};

use super::RetentionPolicy;
use crate::core::error::{RecorderError, RecorderResult};
use crate::core::timestamp::{date_dir_name, parse_date_dir};

/// Deletes whole `YYYYMMDD` directories that fell out of the retention window.
pub struct FsRetention {
    base_dir: PathBuf,
    retention_days: u32,
    last_boundary: Option<NaiveDate>,
}

impl FsRetention {
    pub fn new(base_dir: PathBuf, retention_days: u32) -> Self {
        Self {
            base_dir,
            retention_days,
            last_boundary: None,
        }
    }

    /// Oldest day that is still kept.
    pub fn boundary(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Removes every date directory older than the boundary, oldest first,
    /// and returns the removed paths. The sorted listing is scanned only up
    /// to the first directory inside the window.
    pub fn prune(&self, today: NaiveDate) -> RecorderResult<Vec<PathBuf>> {
        let boundary = date_dir_name(self.boundary(today));

        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            RecorderError::io(format!("listing {}", self.base_dir.display()), e)
        })?;

        let mut dated: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                parse_date_dir(&name)?;
                Some((name, entry.path()))
            })
            .collect();
        dated.sort();

        let mut removed = Vec::new();
        for (name, path) in dated {
            if name >= boundary {
                break;
            }
            if !path.is_dir() {
                debug!("[retention] skipping non-directory {}", path.display());
                continue;
            }
            fs::remove_dir_all(&path)
                .map_err(|e| RecorderError::io(format!("removing {}", path.display()), e))?;
            info!("[retention] removed {}", path.display());
            removed.push(path);
        }

        Ok(removed)
    }
}

impl RetentionPolicy for FsRetention {
    fn run(&mut self, today: NaiveDate) -> RecorderResult<()> {
        let boundary = self.boundary(today);
        if self.last_boundary == Some(boundary) {
            return Ok(());
        }

        self.prune(today)?;
        self.last_boundary = Some(boundary);
        Ok(())
    }
}
