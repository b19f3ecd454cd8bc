//! Local sign-in.
//!
//! The signed-in identity is kept in `<data_dir>/identity.json`. Its id is
//! derived from the email so that signing in again with the same address
//! lands in the same partition.

use async_trait::async_trait;
use ondoku_core::{AuthError, Credentials, Identity, IdentityProvider};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

const IDENTITY_FILE: &str = "identity.json";

/// Stable identity id: hex of the first 16 bytes of sha256(email),
/// case-insensitive on the email.
pub fn derive_identity_id(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let hash = hasher.finalize();
    hash[..16].iter().map(|byte| format!("{:02x}", byte)).collect()
}

pub struct LocalIdentityProvider {
    path: PathBuf,
    sender: watch::Sender<Option<Identity>>,
}

impl LocalIdentityProvider {
    pub fn new(data_dir: &Path) -> Self {
        let path = data_dir.join(IDENTITY_FILE);
        let current = match load(&path) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
                None
            }
        };
        let (sender, _) = watch::channel(current);
        Self { path, sender }
    }

    pub fn current(&self) -> Option<Identity> {
        self.sender.borrow().clone()
    }
}

fn load(path: &Path) -> Result<Option<Identity>, Box<dyn std::error::Error>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, credentials: Credentials) -> Result<Identity, AuthError> {
        let email = credentials.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::SignIn(format!("'{}' is not an email address", email)));
        }

        let mut identity = Identity::new(derive_identity_id(email), email);
        if let Some(name) = credentials.display_name.filter(|n| !n.trim().is_empty()) {
            identity = identity.with_display_name(name);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuthError::SignIn(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(&identity).map_err(|e| AuthError::SignIn(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| AuthError::SignIn(e.to_string()))?;

        tracing::info!("Signed in as {}", identity.email);
        self.sender.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AuthError::SignOut(e.to_string())),
        }
        self.sender.send_replace(None);
        Ok(())
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.sender.subscribe()
    }
}
