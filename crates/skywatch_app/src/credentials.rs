use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skywatch_logging::{sky_debug, sky_info};
use tempfile::NamedTempFile;
use thiserror::Error;

const STATE_DIR: &str = ".skywatch";
const STATE_FILENAME: &str = "state.ron";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no home directory to keep credentials in")]
    NoHome,
    #[error("credential file {path:?} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("could not serialize credentials: {0}")]
    Serialize(#[from] ron::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// What `login` remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// RFC 3339 timestamp of the last save.
    #[serde(default)]
    pub saved_utc: Option<String>,
}

impl StoredCredentials {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url,
            saved_utc: Some(Utc::now().to_rfc3339()),
        }
    }
}

pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `~/.skywatch`
    pub fn in_home() -> Result<Self, CredentialError> {
        dirs::home_dir()
            .map(|home| Self::new(home.join(STATE_DIR)))
            .ok_or(CredentialError::NoHome)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILENAME)
    }

    /// A missing file means anonymous access, not an error.
    pub fn load(&self) -> Result<StoredCredentials, CredentialError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                sky_debug!("no stored credentials at {:?}", path);
                return Ok(StoredCredentials::default());
            }
            Err(err) => return Err(err.into()),
        };
        ron::from_str(&content).map_err(|source| CredentialError::Malformed { path, source })
    }

    pub fn save(&self, credentials: &StoredCredentials) -> Result<PathBuf, CredentialError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(credentials, pretty)?;
        let target = write_atomically(&self.dir, &self.path(), &content)?;
        sky_info!("saved credentials to {:?}", target);
        Ok(target)
    }

    /// Returns false when there was nothing to remove.
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

fn write_atomically(dir: &Path, target: &Path, content: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|err| err.error)?;
    Ok(target.to_path_buf())
}
