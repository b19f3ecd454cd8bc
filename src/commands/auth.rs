//! Passcode and sign-in commands.

use clap::Args;
use ondoku_core::{Credentials, IdentityProvider};

use crate::app::{App, AppError};

const TITLE: &str = "デジタル音読・計算カード";
const ADMIN_TITLE: &str = "デジタル音読・計算カード（管理者）";

#[derive(Args)]
pub struct LoginArgs {
    /// Email address to sign in with
    #[arg(long, short)]
    pub email: String,

    /// Name to show instead of the email
    #[arg(long, short)]
    pub name: Option<String>,
}

pub fn unlock(app: &App, passcode: &str) -> Result<(), AppError> {
    if app.config.passcode.value.is_none() {
        return Err(AppError::NoPasscode);
    }
    app.gate.submit(passcode)?;
    println!("Unlocked for this session.");
    Ok(())
}

pub fn lock(app: &App) {
    app.gate.lock();
    println!("Locked.");
}

/// Signs in and lets the engine pick up the new identity, which writes the
/// default columns on a first visit.
pub async fn login(app: &mut App, args: &LoginArgs) -> Result<(), AppError> {
    let grant = app.gate.grant()?;
    let mut changes = app.identity.identity_changes();

    let identity = app
        .identity
        .sign_in(Credentials {
            email: args.email.clone(),
            display_name: args.name.clone(),
        })
        .await?;

    app.engine.follow_identity(&grant, &mut changes).await?;
    app.engine.settle().await;

    println!("Signed in as {}", identity);
    if app.is_admin() {
        println!("Admin mode.");
    }
    println!(
        "{} entries, {} evaluation columns",
        app.engine.entries().len(),
        app.engine.schema().len()
    );
    Ok(())
}

pub async fn logout(app: &mut App) -> Result<(), AppError> {
    let Some(identity) = app.identity.current() else {
        println!("Not signed in.");
        return Ok(());
    };

    if let Ok(grant) = app.gate.grant() {
        app.engine
            .on_identity_change(&grant, Some(identity.clone()))
            .await?;
    }

    let mut changes = app.identity.identity_changes();
    app.identity.sign_out().await?;

    if let Ok(grant) = app.gate.grant() {
        app.engine.follow_identity(&grant, &mut changes).await?;
    }

    println!("Signed out {}", identity.email);
    Ok(())
}

pub fn whoami(app: &App) {
    let identity = app.identity.current();
    let state = app.gate.access_state(identity.as_ref());

    println!("{}", if state.is_admin { ADMIN_TITLE } else { TITLE });
    println!("{}", "=".repeat(30));
    println!(
        "Access: {}",
        if state.is_authenticated {
            "unlocked"
        } else {
            "locked"
        }
    );
    match identity {
        Some(identity) => {
            println!("Signed in: {}", identity);
            println!("Identity: {}", identity.id);
        }
        None => println!("Signed in: no"),
    }
}
