//! Sign-in commands.

use std::io::BufRead;

use secrecy::SecretString;
use url::Url;

use cafe_loyalty_client::{AppState, AuthError};
use cafe_loyalty_client::session::{OAuthProvider, SignUpOutcome, validate_password};
use cafe_loyalty_core::Email;

use super::{CliError, out};

/// Read one line from stdin as the password.
fn read_password() -> Result<SecretString, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::InvalidArgument(
            "expected the password on stdin".to_string(),
        ));
    }
    Ok(SecretString::from(password.to_string()))
}

fn parse_email(email: &str) -> Result<Email, CliError> {
    Email::parse(email).map_err(|e| CliError::from(AuthError::from(e)))
}

pub async fn login(state: &AppState, email: &str) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let password = read_password()?;

    let session = state
        .session()
        .provider()
        .sign_in_with_password(&email, &password)
        .await?;
    let name = session
        .user
        .display_name()
        .unwrap_or(email.as_str())
        .to_string();
    out(format!("Signed in as {name}"))
}

pub async fn signup(state: &AppState, email: &str) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let password = read_password()?;
    validate_password(&password)?;

    match state
        .session()
        .provider()
        .sign_up(&email, &password)
        .await?
    {
        SignUpOutcome::SignedIn(_) => out(format!("Account created; signed in as {email}")),
        SignUpOutcome::ConfirmationRequired(_) => out(format!(
            "Account created; check {email} for a confirmation link"
        )),
    }
}

pub async fn logout(state: &AppState) -> Result<(), CliError> {
    if !state.session().wait_until_resolved().await.is_signed_in() {
        return out("Not signed in");
    }
    state.session().sign_out().await?;
    out("Signed out")
}

pub async fn whoami(state: &AppState) -> Result<(), CliError> {
    let mut current = state.session().wait_until_resolved().await;
    if let Some(error) = &current.error {
        tracing::warn!(%error, "Session query failed; retrying");
        current = state.session().refresh().await;
    }

    match &current.user {
        Some(user) => {
            out(format!(
                "{} ({})",
                user.display_name().unwrap_or("(no name)"),
                user.id
            ))?;
            if let Some(expires_at) = current.session.as_ref().and_then(|s| s.expires_at) {
                out(format!("Session expires {}", expires_at.format("%Y-%m-%d %H:%M UTC")))?;
            }
            Ok(())
        }
        None => match current.error {
            Some(error) => out(format!("Not signed in (session check failed: {error})")),
            None => out("Not signed in"),
        },
    }
}

pub fn oauth_url(
    state: &AppState,
    provider: OAuthProvider,
    redirect_to: &Url,
) -> Result<(), CliError> {
    let url = state
        .session()
        .provider()
        .oauth_authorize_url(provider, redirect_to)?;
    out(url)
}
