//! GoTrue-compatible HTTP identity provider.
//!
//! Talks to the auth REST API (`/auth/v1/...`) with `reqwest` and keeps the
//! current session in the durable store so it survives restarts. Every
//! request carries the public `apikey` header.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, instrument, warn};
use url::Url;

use cafe_loyalty_core::Email;

use super::provider::{
    AuthChange, AuthError, AuthEvent, IdentityProvider, OAuthProvider, SignUpOutcome,
    validate_password,
};
use super::types::{Session, User};
use crate::config::AuthConfig;
use crate::storage::KeyValueStore;

/// Storage key of the persisted session.
pub const SESSION_KEY: &str = "auth.session";

/// Sessions this close to expiry are refreshed before use.
const EXPIRY_LEEWAY_SECS: i64 = 10;

const EVENT_CAPACITY: usize = 16;

/// Identity provider backed by a GoTrue auth server.
pub struct GoTrueProvider {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    store: Arc<dyn KeyValueStore>,
    /// `None` until the persisted session has been loaded.
    current: Mutex<Option<Option<Arc<Session>>>>,
    events: broadcast::Sender<AuthChange>,
}

impl GoTrueProvider {
    /// Create a provider for the auth server in `config`, persisting the
    /// session in `store`.
    #[must_use]
    pub fn new(config: &AuthConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            store,
            current: Mutex::new(None),
            events,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url.join(path).map_err(|e| AuthError::Provider {
            status: 0,
            message: format!("invalid auth endpoint '{path}': {e}"),
        })
    }

    /// Send a request and turn non-success statuses into
    /// [`AuthError::Provider`] with the server's message.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, AuthError> {
        let response = request
            .header("apikey", self.anon_key.expose_secret())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("authentication failed")
                        .to_string()
                });
            debug!(status = %status, %message, "auth server rejected request");
            return Err(AuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = self.endpoint(path)?;
        let text = self.send(self.client.post(url).json(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn load_persisted(&self) -> Result<Option<Arc<Session>>, AuthError> {
        let Some(bytes) = self.store.get(SESSION_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Ok(Some(Arc::new(session))),
            Err(e) => {
                warn!(error = %e, "discarding unreadable stored session");
                self.store.remove(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn persist(&self, session: &Session) -> Result<(), AuthError> {
        let bytes = serde_json::to_vec(session)?;
        self.store.set(SESSION_KEY, &bytes).await?;
        Ok(())
    }

    /// Store `session` as current and announce it.
    async fn install(
        &self,
        current: &mut Option<Option<Arc<Session>>>,
        session: Session,
        event: AuthEvent,
    ) -> Result<Arc<Session>, AuthError> {
        self.persist(&session).await?;
        let session = Arc::new(session);
        *current = Some(Some(Arc::clone(&session)));
        self.emit(event, Some(Arc::clone(&session)));
        Ok(session)
    }

    /// Forget the current session and announce the sign-out.
    async fn clear(&self, current: &mut Option<Option<Arc<Session>>>) -> Result<(), AuthError> {
        self.store.remove(SESSION_KEY).await?;
        *current = Some(None);
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn emit(&self, event: AuthEvent, session: Option<Arc<Session>>) {
        // No subscribers is fine.
        let _ = self.events.send(AuthChange::new(event, session));
    }

    async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let token: TokenResponse = self
            .post_json(
                "auth/v1/token?grant_type=refresh_token",
                &serde_json::json!({ "refresh_token": session.refresh_token.expose_secret() }),
            )
            .await?;
        Ok(token.into_session(Utc::now()))
    }
}

impl std::fmt::Debug for GoTrueProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueProvider")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    #[instrument(skip(self))]
    async fn current_session(&self) -> Result<Option<Arc<Session>>, AuthError> {
        let mut current = self.current.lock().await;
        let session = match current.as_ref() {
            Some(session) => session.clone(),
            None => self.load_persisted().await?,
        };

        let Some(session) = session else {
            *current = Some(None);
            return Ok(None);
        };

        if !session.expires_within(Duration::seconds(EXPIRY_LEEWAY_SECS), Utc::now()) {
            *current = Some(Some(Arc::clone(&session)));
            return Ok(Some(session));
        }

        debug!("session near expiry; refreshing");
        match self.refresh(&session).await {
            Ok(refreshed) => {
                let session = self
                    .install(&mut current, refreshed, AuthEvent::TokenRefreshed)
                    .await?;
                info!(user_id = %session.user.id, "session refreshed");
                Ok(Some(session))
            }
            Err(AuthError::Provider { status, message }) => {
                warn!(status, %message, "refresh rejected; signing out");
                self.clear(&mut current).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Arc<Session>, AuthError> {
        validate_password(password)?;
        let token: TokenResponse = self
            .post_json(
                "auth/v1/token?grant_type=password",
                &serde_json::json!({
                    "email": email.as_str(),
                    "password": password.expose_secret(),
                }),
            )
            .await?;

        let mut current = self.current.lock().await;
        let session = self
            .install(&mut current, token.into_session(Utc::now()), AuthEvent::SignedIn)
            .await?;
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, AuthError> {
        validate_password(password)?;
        let response: SignUpResponse = self
            .post_json(
                "auth/v1/signup",
                &serde_json::json!({
                    "email": email.as_str(),
                    "password": password.expose_secret(),
                }),
            )
            .await?;

        match response {
            SignUpResponse::Session(token) => {
                let mut current = self.current.lock().await;
                let session = self
                    .install(&mut current, token.into_session(Utc::now()), AuthEvent::SignedIn)
                    .await?;
                info!(user_id = %session.user.id, "signed up and signed in");
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "signed up; email confirmation pending");
                Ok(SignUpOutcome::ConfirmationRequired(user))
            }
        }
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut current = self.current.lock().await;
        let session = match current.as_ref() {
            Some(session) => session.clone(),
            None => self.load_persisted().await?,
        };

        if let Some(session) = session {
            let url = self.endpoint("auth/v1/logout")?;
            let request = self
                .client
                .post(url)
                .bearer_auth(session.access_token.expose_secret());
            match self.send(request).await {
                Ok(_) => {}
                // Token already revoked or expired: nothing left to end remotely.
                Err(AuthError::Provider {
                    status: 401 | 403 | 404,
                    ..
                }) => debug!("session already invalid on server"),
                Err(e) => return Err(e),
            }
        }

        self.clear(&mut current).await?;
        info!("signed out");
        Ok(())
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, AuthError> {
        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to.as_str());
        Ok(url)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            token_type: self.token_type,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session when no confirmation is needed, or with
/// the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

#[derive(Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::storage::MemoryStore;

    const USER_ID: &str = "5b0d7f7e-6d0c-4a52-9a55-2f4f2d7f1c11";

    fn token_body(access: &str, expires_in: i64) -> serde_json::Value {
        json!({
            "access_token": access,
            "refresh_token": format!("{access}-refresh"),
            "token_type": "bearer",
            "expires_in": expires_in,
            "user": { "id": USER_ID, "email": "ana@cafe.mx" }
        })
    }

    fn provider(server: &MockServer, store: Arc<MemoryStore>) -> GoTrueProvider {
        let config = AuthConfig {
            url: Url::parse(&format!("{}/", server.uri())).unwrap(),
            anon_key: SecretString::from("anon".to_string()),
        };
        GoTrueProvider::new(&config, store)
    }

    fn ana() -> Email {
        Email::parse("ana@cafe.mx").unwrap()
    }

    fn password() -> SecretString {
        SecretString::from("secret123".to_string())
    }

    #[tokio::test]
    async fn test_sign_in_persists_and_announces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({ "email": "ana@cafe.mx", "password": "secret123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let auth = provider(&server, store.clone());
        let mut events = auth.subscribe();

        let session = auth.sign_in_with_password(&ana(), &password()).await.unwrap();
        assert_eq!(session.access_token.expose_secret(), "tok-1");
        assert_eq!(session.user.id.to_string(), USER_ID);

        let change = events.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedIn);
        assert!(store.get(SESSION_KEY).await.unwrap().is_some());

        // A fresh provider over the same store picks the session up.
        let restarted = provider(&server, store);
        let restored = restarted.current_session().await.unwrap().unwrap();
        assert_eq!(restored.access_token.expose_secret(), "tok-1");
    }

    #[tokio::test]
    async fn test_rejected_credentials_keep_raw_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryStore::new()));
        let err = auth
            .sign_in_with_password(&ana(), &password())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(err.status(), Some(400));
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_password_never_reaches_server() {
        let server = MockServer::start().await;
        let auth = provider(&server, Arc::new(MemoryStore::new()));
        let err = auth
            .sign_up(&ana(), &SecretString::from("123".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_requiring_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": USER_ID,
                "email": "ana@cafe.mx",
                "created_at": "2024-03-01T10:00:00Z"
            })))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryStore::new()));
        let outcome = auth.sign_up(&ana(), &password()).await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(user) if user.id.to_string() == USER_ID));
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("old", 5)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "old-refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryStore::new()));
        auth.sign_in_with_password(&ana(), &password()).await.unwrap();
        let mut events = auth.subscribe();

        let session = auth.current_session().await.unwrap().unwrap();
        assert_eq!(session.access_token.expose_secret(), "new");
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::TokenRefreshed);

        // Fresh token is served from memory without another refresh.
        auth.current_session().await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "msg": "Invalid Refresh Token" })),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let expired = json!({
            "access_token": "old",
            "refresh_token": "old-refresh",
            "token_type": "bearer",
            "expires_at": 1_000,
            "user": { "id": USER_ID }
        });
        store
            .set(SESSION_KEY, &serde_json::to_vec(&expired).unwrap())
            .await
            .unwrap();

        let auth = provider(&server, store.clone());
        let mut events = auth.subscribe();
        assert!(auth.current_session().await.unwrap().is_none());
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedOut);
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_and_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let auth = provider(&server, store.clone());
        auth.sign_in_with_password(&ana(), &password()).await.unwrap();
        let mut events = auth.subscribe();

        auth.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedOut);
        assert!(auth.current_session().await.unwrap().is_none());
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryStore::new()));
        auth.sign_in_with_password(&ana(), &password()).await.unwrap();

        let err = auth.sign_out().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(auth.current_session().await.unwrap().is_some());
    }

    #[test]
    fn test_oauth_url() {
        let config = AuthConfig {
            url: Url::parse("https://auth.cafe.mx/").unwrap(),
            anon_key: SecretString::from("anon".to_string()),
        };
        let auth = GoTrueProvider::new(&config, Arc::new(MemoryStore::new()));
        let url = auth
            .oauth_authorize_url(
                OAuthProvider::Google,
                &Url::parse("cafe://auth/callback").unwrap(),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.cafe.mx/auth/v1/authorize?provider=google&redirect_to=cafe%3A%2F%2Fauth%2Fcallback"
        );
    }
}
