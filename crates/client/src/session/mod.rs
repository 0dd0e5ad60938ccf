//! Session state container.
//!
//! [`SessionContainer`] mirrors an [`IdentityProvider`]'s session into a
//! `watch` channel the UI can observe. It is the only writer of
//! [`SessionState`]; everything else reads.
//!
//! Lifecycle:
//! 1. Starts with `loading = true`.
//! 2. Subscribes to provider events, then asks for the current session.
//!    Subscribing first means no change between the two is lost.
//! 3. Applies the initial answer, then every event in arrival order. Events
//!    that arrived during the initial query are newer, so they win.
//!
//! A failed initial query resolves to signed-out with
//! [`SessionState::error`] set; [`SessionContainer::refresh`] retries.

pub mod gotrue;
mod profile;
mod provider;
mod types;

pub use gotrue::GoTrueProvider;
pub use profile::ProfileClient;
pub use provider::{
    AnonymousProvider, AuthChange, AuthError, AuthEvent, IdentityProvider, MIN_PASSWORD_LENGTH,
    OAuthProvider, SignUpOutcome, validate_password,
};
pub use types::{Session, User};

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use cafe_loyalty_core::UserId;

/// Snapshot of the authentication state.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session: Option<Arc<Session>>,
    pub user: Option<User>,
    /// True until the first session query has resolved.
    pub loading: bool,
    /// Why the last session query failed, if it did.
    pub error: Option<String>,
}

impl SessionState {
    const fn loading() -> Self {
        Self {
            session: None,
            user: None,
            loading: true,
            error: None,
        }
    }

    fn resolved(session: Option<Arc<Session>>) -> Self {
        Self {
            user: session.as_ref().map(|s| s.user.clone()),
            session,
            loading: false,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            session: None,
            user: None,
            loading: false,
            error: Some(error),
        }
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// Session state container. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionContainer {
    inner: Arc<SessionContainerInner>,
}

struct SessionContainerInner {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<SessionState>>,
    listener: AbortHandle,
}

impl Drop for SessionContainerInner {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl SessionContainer {
    /// Start following `provider`. Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        let state = Arc::new(state);

        // Before the initial query, so nothing in between is missed.
        let events = provider.subscribe();
        let listener = tokio::spawn(listen(
            Arc::clone(&provider),
            Arc::clone(&state),
            events,
        ))
        .abort_handle();

        Self {
            inner: Arc::new(SessionContainerInner {
                provider,
                state,
                listener,
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<Arc<Session>> {
        self.inner.state.borrow().session.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Receive the state every time it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The provider, for sign-in and sign-up flows.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.provider
    }

    /// Wait for the initial session query to resolve.
    pub async fn wait_until_resolved(&self) -> SessionState {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Ask the provider for the current session again.
    ///
    /// Used to retry after a failed initial query. Marks the state as
    /// loading until the answer arrives.
    pub async fn refresh(&self) -> SessionState {
        self.inner.state.send_modify(|s| s.loading = true);
        resolve(self.inner.provider.as_ref(), &self.inner.state).await;
        self.state()
    }

    /// Sign out through the provider.
    ///
    /// Local state is left alone; it follows the provider's `SignedOut`
    /// event.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.provider.sign_out().await
    }
}

impl std::fmt::Debug for SessionContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContainer")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn listen(
    provider: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<SessionState>>,
    mut events: broadcast::Receiver<AuthChange>,
) {
    resolve(provider.as_ref(), &state).await;

    loop {
        match events.recv().await {
            Ok(change) => {
                debug!(event = ?change.event, signed_in = change.session.is_some(), "auth state changed");
                state.send_replace(SessionState::resolved(change.session));
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "missed auth events; re-querying session");
                resolve(provider.as_ref(), &state).await;
            }
            Err(RecvError::Closed) => {
                debug!("identity provider closed its event stream");
                break;
            }
        }
    }
}

async fn resolve(provider: &dyn IdentityProvider, state: &watch::Sender<SessionState>) {
    match provider.current_session().await {
        Ok(session) => {
            info!(signed_in = session.is_some(), "session resolved");
            state.send_replace(SessionState::resolved(session));
        }
        Err(e) => {
            warn!(error = %e, "failed to fetch current session");
            state.send_replace(SessionState::failed(e.to_string()));
        }
    }
}
