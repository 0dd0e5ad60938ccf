//! Integration tests for sign-in state and the carts that follow it.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;

use cafe_loyalty_client::session::{AuthEvent, IdentityProvider};
use cafe_loyalty_client::{AppState, CartScope, ClientError, FileStore};
use cafe_loyalty_core::Email;
use cafe_loyalty_integration_tests::{
    FakeProvider, eventually, item, new_user_id, offline_config, session_for,
};

async fn open(
    dir: &tempfile::TempDir,
    scope: CartScope,
    provider: Arc<FakeProvider>,
) -> AppState {
    AppState::with_parts(
        offline_config(dir.path(), scope),
        Arc::new(FileStore::new(dir.path())),
        provider,
    )
    .await
    .unwrap()
}

// =============================================================================
// Session State Tests
// =============================================================================

#[tokio::test]
async fn test_persisted_session_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let user = new_user_id();
    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open(&dir, CartScope::Device, provider).await;

    let current = state.session().wait_until_resolved().await;
    assert!(!current.loading);
    assert!(current.is_signed_in());
    assert_eq!(current.user_id(), Some(user));
    assert_eq!(state.require_user().unwrap(), user);
}

#[tokio::test]
async fn test_sign_in_and_out_update_state() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(FakeProvider::new(None));
    let state = open(&dir, CartScope::Device, Arc::clone(&provider)).await;

    state.session().wait_until_resolved().await;
    assert!(matches!(state.require_user(), Err(ClientError::NotSignedIn)));

    let email = Email::parse("ana@cafe.mx").unwrap();
    let session = provider
        .sign_in_with_password(&email, &SecretString::from("secret123".to_string()))
        .await
        .unwrap();
    assert!(eventually(|| state.session().user().is_some()).await);
    assert_eq!(state.require_user().unwrap(), session.user.id);

    state.session().sign_out().await.unwrap();
    assert!(eventually(|| state.session().user().is_none()).await);
    assert!(state.session().session().is_none());
}

// =============================================================================
// Cart Scope Tests
// =============================================================================

#[tokio::test]
async fn test_device_cart_ignores_sign_in() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(FakeProvider::new(None));
    let state = open(&dir, CartScope::Device, Arc::clone(&provider)).await;

    state.cart().add_to_cart(item(1, "Latte", 55, 1)).unwrap();
    provider.push(
        AuthEvent::SignedIn,
        Some(session_for(new_user_id(), "ana@cafe.mx")),
    );
    assert!(eventually(|| state.session().user().is_some()).await);

    assert_eq!(state.cart().key(), "cart");
    assert_eq!(state.cart().item_count(), 1);
}

#[tokio::test]
async fn test_per_user_cart_follows_session() {
    let dir = tempfile::tempdir().unwrap();
    let user = new_user_id();
    let user_key = format!("cart.{user}");
    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open(&dir, CartScope::PerUser, Arc::clone(&provider)).await;

    // Opened directly on the signed-in user's cart
    assert_eq!(state.cart().key(), user_key);
    state.cart().add_to_cart(item(1, "Latte", 55, 2)).unwrap();

    // Signing out moves to the device cart, which starts empty
    state.session().sign_out().await.unwrap();
    assert!(eventually(|| state.cart().key() == "cart").await);
    assert!(state.cart().is_empty());
    state.cart().add_to_cart(item(2, "Muffin", 35, 1)).unwrap();

    // Signing back in restores the user's own cart
    provider.push(AuthEvent::SignedIn, Some(session_for(user, "ana@cafe.mx")));
    assert!(eventually(|| state.cart().key() == user_key).await);
    let items = state.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, "Latte");
    assert_eq!(items[0].quantity, 2);

    state.shutdown().await.unwrap();
    assert!(dir.path().join("cart").exists());
    assert!(dir.path().join(&user_key).exists());
}

#[tokio::test]
async fn test_token_refresh_keeps_the_same_cart() {
    let dir = tempfile::tempdir().unwrap();
    let user = new_user_id();
    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open(&dir, CartScope::PerUser, Arc::clone(&provider)).await;
    state.cart().add_to_cart(item(1, "Latte", 55, 1)).unwrap();

    let mut changes = state.session().subscribe();
    changes.mark_unchanged();
    provider.push(
        AuthEvent::TokenRefreshed,
        Some(session_for(user, "ana@cafe.mx")),
    );
    changes.changed().await.unwrap();

    state.shutdown().await.unwrap();
    assert_eq!(state.cart().key(), format!("cart.{user}"));
    assert_eq!(state.cart().item_count(), 1);
}
