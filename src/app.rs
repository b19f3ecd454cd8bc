//! Wiring of the local store, the gate, the identity provider and the sync
//! engine for one command invocation.

use ondoku_core::{AccessGate, AuthError, FileStore, SyncEngine, SyncError};
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::identity::LocalIdentityProvider;
use crate::prompt::TerminalPrompt;
use crate::session::FileSessionStore;

pub struct App {
    pub config: Config,
    pub gate: AccessGate<FileSessionStore>,
    pub identity: LocalIdentityProvider,
    pub engine: SyncEngine,
}

impl App {
    pub fn open(config: Config, assume_yes: bool) -> Self {
        let data_dir = config.data_dir.value.clone();
        tracing::debug!("Using data directory {}", data_dir.display());

        let gate = AccessGate::new(
            config.passcode.value.clone().unwrap_or_default(),
            config.admin_email.value.clone(),
            FileSessionStore::new(FileSessionStore::default_dir()),
        );
        let identity = LocalIdentityProvider::new(&data_dir);
        let engine = SyncEngine::new(
            Arc::new(FileStore::new(data_dir)),
            Arc::new(TerminalPrompt::new(assume_yes)),
        );

        Self {
            config,
            gate,
            identity,
            engine,
        }
    }

    /// Checks the gate, starts the session for the signed-in identity and
    /// waits until its columns and entries are mirrored.
    pub async fn activate(&mut self) -> Result<(), AppError> {
        let grant = self.gate.grant()?;
        let identity = self.identity.current().ok_or(AppError::NotSignedIn)?;
        self.engine.on_identity_change(&grant, Some(identity)).await?;
        self.engine.settle().await;
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        self.gate.is_admin(self.identity.current().as_ref())
    }
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Auth(AuthError),
    Sync(SyncError),
    NoPasscode,
    NotSignedIn,
    Invalid(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Sync(e) => write!(f, "{}", e),
            AppError::NoPasscode => write!(
                f,
                "No passcode configured. Set 'passcode' in the config file or ONDOKU_PASSCODE."
            ),
            AppError::NotSignedIn => {
                write!(f, "Not signed in. Run 'ondoku login --email <address>' first.")
            }
            AppError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Auth(e) => Some(e),
            AppError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        AppError::Sync(e)
    }
}
