//! Identity provider abstraction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

use cafe_loyalty_core::{Email, EmailError};

use super::types::{Session, User};
use crate::storage::StorageError;

/// Shortest password the sign-in and sign-up flows accept.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Kind of auth-state change reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One auth-state change: what happened and the session that resulted.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Arc<Session>>,
}

impl AuthChange {
    #[must_use]
    pub const fn new(event: AuthEvent, session: Option<Arc<Session>>) -> Self {
        Self { event, session }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }
}

/// Result of a sign-up request.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// Account created and signed in.
    SignedIn(Arc<Session>),
    /// Account created; the user must confirm their email first.
    ConfirmationRequired(User),
}

/// Third-party sign-in providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Apple,
    Github,
}

impl OAuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            "github" => Ok(Self::Github),
            other => Err(format!("unsupported sign-in provider '{other}'")),
        }
    }
}

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password too short.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Provider rejected the request. `message` is the provider's own text,
    /// suitable for showing to the user as-is.
    #[error("{message}")]
    Provider { status: u16, message: String },

    /// Request never got a usable response.
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider response could not be decoded.
    #[error("unexpected auth response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Persisted session could not be read or written.
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),

    /// No identity provider is configured.
    #[error("sign-in is not available")]
    NotConfigured,
}

impl AuthError {
    /// HTTP status of a provider rejection.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Check a password against the minimum length.
///
/// # Errors
///
/// Returns [`AuthError::WeakPassword`] if it is too short.
pub fn validate_password(password: &SecretString) -> Result<(), AuthError> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// External identity/session provider.
///
/// Implementations own the authoritative session and announce every change
/// through [`IdentityProvider::subscribe`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, if any.
    async fn current_session(&self) -> Result<Option<Arc<Session>>, AuthError>;

    /// Receive every auth-state change from now on.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Arc<Session>, AuthError>;

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, AuthError>;

    /// End the current session. A `SignedOut` change follows on success.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// URL that starts a third-party sign-in and returns to `redirect_to`.
    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, AuthError>;
}

/// Provider for builds without sign-in: always signed out.
#[derive(Debug)]
pub struct AnonymousProvider {
    events: broadcast::Sender<AuthChange>,
}

impl AnonymousProvider {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl Default for AnonymousProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for AnonymousProvider {
    async fn current_session(&self) -> Result<Option<Arc<Session>>, AuthError> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        _email: &Email,
        _password: &SecretString,
    ) -> Result<Arc<Session>, AuthError> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_up(
        &self,
        _email: &Email,
        _password: &SecretString,
    ) -> Result<SignUpOutcome, AuthError> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let _ = self.events.send(AuthChange::signed_out());
        Ok(())
    }

    fn oauth_authorize_url(
        &self,
        _provider: OAuthProvider,
        _redirect_to: &Url,
    ) -> Result<Url, AuthError> {
        Err(AuthError::NotConfigured)
    }
}
