//! Application state owned by the front end.
//!
//! [`AppState`] is the composition root: it wires the durable store, the
//! identity provider, the session and cart containers and the backend
//! client together. Front ends create one and pass it down; nothing here is
//! a global.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use cafe_loyalty_core::UserId;

use crate::api::BackendClient;
use crate::cart::{CartScope, CartStore};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{
    AnonymousProvider, GoTrueProvider, IdentityProvider, ProfileClient, Session,
    SessionContainer, SessionState,
};
use crate::storage::{FileStore, KeyValueStore};

/// Application state shared across the front end.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    session: SessionContainer,
    cart: CartStore,
    backend: Option<BackendClient>,
    profiles: Option<ProfileClient>,
    /// Keeps the cart on the signed-in user's key; only with
    /// [`CartScope::PerUser`].
    cart_follower: Option<AbortHandle>,
}

impl Drop for AppStateInner {
    fn drop(&mut self) {
        if let Some(follower) = &self.cart_follower {
            follower.abort();
        }
    }
}

impl AppState {
    /// Build the state from configuration: a [`FileStore`] in the data
    /// directory, a [`GoTrueProvider`] if auth is configured (otherwise
    /// always signed out), and a backend client if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be opened.
    pub async fn start(config: ClientConfig) -> Result<Self, ClientError> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_dir.clone()));
        let provider: Arc<dyn IdentityProvider> = match &config.auth {
            Some(auth) => Arc::new(GoTrueProvider::new(auth, Arc::clone(&store))),
            None => Arc::new(AnonymousProvider::new()),
        };
        Self::with_parts(config, store, provider).await
    }

    /// Build the state around an existing store and provider.
    ///
    /// With [`CartScope::PerUser`] this waits for the initial session query
    /// so the right user's cart is opened first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be opened.
    pub async fn with_parts(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ClientError> {
        let scope = config.cart_scope;
        let session = SessionContainer::start(provider);

        let user = match scope {
            CartScope::Device => None,
            CartScope::PerUser => session.wait_until_resolved().await.user_id(),
        };
        let cart = CartStore::open(Arc::clone(&store), scope.key_for(user)).await?;

        let cart_follower = (scope == CartScope::PerUser).then(|| {
            tokio::spawn(follow_session(session.subscribe(), cart.clone(), scope)).abort_handle()
        });

        let backend = config.backend.as_ref().map(BackendClient::new);
        let profiles = config.auth.as_ref().map(ProfileClient::new);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                session,
                cart,
                backend,
                profiles,
                cart_follower,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The durable key-value store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn session(&self) -> &SessionContainer {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// The backend client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BackendNotConfigured`] if no backend URL is set.
    pub fn backend(&self) -> Result<&BackendClient, ClientError> {
        self.inner
            .backend
            .as_ref()
            .ok_or(ClientError::BackendNotConfigured)
    }

    /// The profile client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthNotConfigured`] if no auth URL is set.
    pub fn profiles(&self) -> Result<&ProfileClient, ClientError> {
        self.inner
            .profiles
            .as_ref()
            .ok_or(ClientError::AuthNotConfigured)
    }

    /// The signed-in user's session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotSignedIn`] for guests.
    pub fn require_session(&self) -> Result<Arc<Session>, ClientError> {
        self.inner
            .session
            .session()
            .ok_or(ClientError::NotSignedIn)
    }

    /// Id of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotSignedIn`] for guests.
    pub fn require_user(&self) -> Result<UserId, ClientError> {
        self.inner
            .session
            .state()
            .user_id()
            .ok_or(ClientError::NotSignedIn)
    }

    /// Wait for queued cart writes before the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart writer has already stopped.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.inner.cart.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("session", &self.inner.session)
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}

/// Move the cart to the current user's key every time the session changes.
async fn follow_session(
    mut sessions: watch::Receiver<SessionState>,
    cart: CartStore,
    scope: CartScope,
) {
    loop {
        let user = sessions.borrow_and_update().user_id();
        let key = scope.key_for(user);
        debug!(%key, "session changed; selecting cart");
        if let Err(e) = cart.switch_key(&key).await {
            warn!(error = %e, %key, "could not switch cart");
        }
        if sessions.changed().await.is_err() {
            break;
        }
    }
}
