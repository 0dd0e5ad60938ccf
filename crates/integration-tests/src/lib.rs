//! Integration tests for Cafe Loyalty.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cafe-loyalty-integration-tests
//! ```
//!
//! No services are needed: HTTP backends are mocked with `wiremock` and the
//! durable store lives in a temporary directory.
//!
//! # Test Categories
//!
//! - `cart_persistence` - Cart snapshots surviving a restart
//! - `session_flow` - Sign-in, sign-out and per-user carts
//! - `backend_flow` - Menu options to cart, voucher redemption, profile edits

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

use cafe_loyalty_client::config::ClientConfig;
use cafe_loyalty_client::session::{
    AuthChange, AuthError, AuthEvent, IdentityProvider, OAuthProvider, Session, SignUpOutcome,
    User,
};
use cafe_loyalty_client::CartScope;
use cafe_loyalty_core::{CartLineItem, Email, ProductId, UserId};

/// Configuration for a state rooted at `data_dir` with no remote services.
#[must_use]
pub fn offline_config(data_dir: &Path, cart_scope: CartScope) -> ClientConfig {
    ClientConfig {
        data_dir: data_dir.to_path_buf(),
        cart_scope,
        backend: None,
        auth: None,
        sentry_dsn: None,
    }
}

/// Poll `condition` until it holds or two seconds pass. Returns whether it
/// held.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// A plain line item with no customizations.
#[must_use]
pub fn item(product_id: i32, name: &str, price: i64, quantity: u32) -> CartLineItem {
    CartLineItem::new(ProductId::new(product_id), name, Decimal::new(price, 0), quantity)
}

/// A fresh user id.
#[must_use]
pub fn new_user_id() -> UserId {
    UserId::new(Uuid::new_v4())
}

/// A session for `user_id` that never expires.
#[must_use]
pub fn session_for(user_id: UserId, email: &str) -> Arc<Session> {
    Arc::new(Session {
        access_token: SecretString::from(format!("access-{user_id}")),
        refresh_token: SecretString::from(format!("refresh-{user_id}")),
        token_type: "bearer".to_string(),
        expires_at: None,
        user: User {
            id: user_id,
            email: Email::parse(email).ok(),
            created_at: None,
            metadata: serde_json::Map::new(),
        },
    })
}

/// In-memory identity provider that accepts any password and lets tests
/// push auth events directly.
#[derive(Debug)]
pub struct FakeProvider {
    session: Mutex<Option<Arc<Session>>>,
    events: broadcast::Sender<AuthChange>,
}

impl FakeProvider {
    /// Start with `session` as the persisted session.
    #[must_use]
    pub fn new(session: Option<Arc<Session>>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(session),
            events,
        }
    }

    /// Replace the session and announce it, as a provider does after a
    /// sign-in completed elsewhere (e.g. an OAuth redirect).
    pub fn push(&self, event: AuthEvent, session: Option<Arc<Session>>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        let _ = self.events.send(AuthChange::new(event, session));
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn current_session(&self) -> Result<Option<Arc<Session>>, AuthError> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        _password: &SecretString,
    ) -> Result<Arc<Session>, AuthError> {
        let session = session_for(new_user_id(), email.as_str());
        self.push(AuthEvent::SignedIn, Some(Arc::clone(&session)));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, AuthError> {
        self.sign_in_with_password(email, password)
            .await
            .map(SignUpOutcome::SignedIn)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.push(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, AuthError> {
        let mut url = Url::parse("https://auth.invalid/authorize").map_err(|e| AuthError::Provider {
            status: 0,
            message: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to.as_str());
        Ok(url)
    }
}
