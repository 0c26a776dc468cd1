//! Plain-text bearer token cache on disk

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{BridgeError, Result};

/// Token file holding a single bearer token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached token, if any.
    ///
    /// A missing file, a directory at the path, or a blank file all mean
    /// "no token".
    pub fn load(&self) -> Result<Option<String>> {
        match std::fs::metadata(&self.path) {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cached token");
                return Ok(None);
            }
            Err(e) => return Err(BridgeError::token_file_error(self.path.clone(), e)),
            Ok(meta) if meta.is_dir() => {
                debug!(path = %self.path.display(), "Token path is a directory, ignoring");
                return Ok(None);
            }
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| BridgeError::token_file_error(self.path.clone(), e))?;
        let token = content.trim();

        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    /// Write `token`, replacing whatever the file held.
    pub fn save(&self, token: &str) -> Result<()> {
        std::fs::write(&self.path, token)
            .map_err(|e| BridgeError::token_file_error(self.path.clone(), e))?;
        debug!(path = %self.path.display(), "Token cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_returns_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.jwt"));

        store.save("abc123").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc123"));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "abc123");
    }

    #[test]
    fn save_overwrites_previous_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.jwt"));

        store.save("a-much-longer-previous-token").unwrap();
        store.save("abc123").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.jwt"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn directory_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.jwt");
        std::fs::create_dir(&path).unwrap();

        assert_eq!(TokenStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn blank_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.jwt");
        std::fs::write(&path, "\n").unwrap();

        assert_eq!(TokenStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn unwritable_path_is_token_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("missing").join("token.jwt"));

        let err = store.save("abc123").unwrap_err();
        assert!(matches!(err, BridgeError::TokenFile { .. }));
    }
}
