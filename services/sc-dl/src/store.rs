//!
//! src/store.rs  Andrew Belles  Oct 16th, 2026
//!
//! Persists the last known good client id to a single plain text file
//!

use std::{fs, io::{self, Write}, path::{Path, PathBuf}};

use crate::errors::ScdlError;
use crate::types::Credential;

#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Ok(None) when nothing usable is cached
    fn load(&self) -> Result<Option<Credential>, ScdlError>;
    fn save(&self, credential: &Credential) -> Result<(), ScdlError>;
}

pub struct FileTokenStore {
    path: PathBuf
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credential>, ScdlError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Ok( Some(Credential::new(raw)) )
    }

    fn save(&self, credential: &Credential) -> Result<(), ScdlError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        temp.write_all(credential.as_str().as_bytes())?;
        temp.persist(&self.path)
            .map_err(|e| ScdlError::Io(e.error))?;
        Ok(())
    }
}
