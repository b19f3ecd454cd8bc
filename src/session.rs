//! Session storage for the unlocked flag.
//!
//! One small file per key in the platform runtime directory, so the flag
//! survives between commands of one login session and is gone after a
//! reboot.

use ondoku_core::SessionStore;
use std::path::PathBuf;

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_RUNTIME_DIR/ondoku`, or the temp directory where there is none.
    pub fn default_dir() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ondoku")
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.dir.join(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        let result =
            std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(self.dir.join(key), value));
        if let Err(e) = result {
            tracing::warn!("Could not store session key {}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.dir.join(key));
    }
}
