// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Session record, clock and the JSON session store

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GarminError, Result};

/// One authenticated identity's credential set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub oauth1_token: String,
    pub oauth1_secret: String,
    pub oauth2_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// True iff `now >= expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// All credential strings are present
    pub fn is_complete(&self) -> bool {
        !self.oauth1_token.is_empty()
            && !self.oauth1_secret.is_empty()
            && !self.oauth2_token.is_empty()
    }

    /// Complete and not yet expired
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_complete() && !self.is_expired_at(now)
    }

    /// Swap in a refreshed bearer token
    pub fn refreshed(&self, oauth2_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            oauth2_token,
            expires_at,
            ..self.clone()
        }
    }
}

/// Expiry instant for a token issued at `now`
pub(crate) fn expiry_after(now: DateTime<Utc>, lifetime: TimeDelta) -> Result<DateTime<Utc>> {
    now.checked_add_signed(lifetime).ok_or_else(|| {
        GarminError::InvalidInput(format!("token lifetime {lifetime} is out of range"))
    })
}

/// Time source, injectable for expiry tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Session persisted as a JSON file readable only by its owner
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session.
    ///
    /// A missing file and a record with empty credential strings both yield
    /// `None`; an unreadable or malformed file is an error.
    pub fn load(&self) -> Result<Option<Session>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.persistence_error(e)),
        };

        let session: Session = serde_json::from_str(&data)?;
        if !session.is_complete() {
            warn!(path = %self.path.display(), "Ignoring incomplete stored session");
            return Ok(None);
        }

        debug!(path = %self.path.display(), expires_at = %session.expires_at, "Session loaded");
        Ok(Some(session))
    }

    /// Write the session through a temp file and rename, so readers never see
    /// a half-written record
    pub fn save(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_vec_pretty(session)?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        create_private_dir(parent).map_err(|e| self.persistence_error(e))?;

        let tmp_path = self.path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let written = write_private_file(&tmp_path, &data)
            .and_then(|()| fs::rename(&tmp_path, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.persistence_error(e));
        }

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    /// Remove the stored session; a missing file is not an error
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.persistence_error(e)),
        }
    }

    fn persistence_error(&self, source: io::Error) -> GarminError {
        GarminError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.exists() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
