//! Integration tests for backend-driven flows: customizing a product from the
//! menu into the cart, redeeming a points voucher, and editing the profile.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cafe_loyalty_client::config::{AuthConfig, BackendConfig, ClientConfig};
use cafe_loyalty_client::{ApiError, AppState, CartScope, ClientError, MemoryStore};
use cafe_loyalty_core::{
    CustomizationId, Gender, PointsVoucher, ProductId, Profile, ProfileError,
};
use cafe_loyalty_integration_tests::{FakeProvider, new_user_id, offline_config, session_for};

async fn open(server: &MockServer, provider: Arc<FakeProvider>) -> AppState {
    let dir = std::env::temp_dir();
    let config = ClientConfig {
        backend: Some(BackendConfig {
            base_url: Url::parse(&format!("{}/", server.uri())).unwrap(),
            cache_ttl: Duration::from_secs(60),
        }),
        ..offline_config(&dir, CartScope::Device)
    };
    AppState::with_parts(config, Arc::new(MemoryStore::new()), provider)
        .await
        .unwrap()
}

async fn open_with_auth(server: &MockServer, provider: Arc<FakeProvider>) -> AppState {
    let dir = std::env::temp_dir();
    let config = ClientConfig {
        auth: Some(AuthConfig {
            url: Url::parse(&format!("{}/", server.uri())).unwrap(),
            anon_key: SecretString::from("anon".to_string()),
        }),
        ..offline_config(&dir, CartScope::Device)
    };
    AppState::with_parts(config, Arc::new(MemoryStore::new()), provider)
        .await
        .unwrap()
}

/// Kinds listed out of alphabetical order; the menu keeps the backend's order.
const INGREDIENTS: &str = r#"{
    "success": true,
    "data": {
        "leche": [
            {"id": 9, "nombre": "Avena", "tipo": "leche", "activo": true,
             "id_categoria": 2, "categorias": {"id": 2, "nombre": "Bebidas"}},
            {"id": 10, "nombre": "Entera", "tipo": "leche", "activo": true,
             "id_categoria": 2, "categorias": {"id": 2, "nombre": "Bebidas"}}
        ],
        "jarabe": [
            {"id": 20, "nombre": "Vainilla", "tipo": "jarabe", "activo": true,
             "id_categoria": 2, "categorias": {"id": 2, "nombre": "Bebidas"}}
        ],
        "topping": [
            {"id": 30, "nombre": "Canela", "tipo": "topping", "activo": false,
             "id_categoria": 4, "categorias": {"id": 4, "nombre": "Extras"}}
        ]
    }
}"#;

// =============================================================================
// Menu To Cart Tests
// =============================================================================

#[tokio::test]
async fn test_customized_product_goes_into_cart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ingredientes/producto/3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(INGREDIENTS, "application/json"))
        .mount(&server)
        .await;

    let state = open(&server, Arc::new(FakeProvider::new(None))).await;
    let options = state
        .backend()
        .unwrap()
        .ingredients_for_product(ProductId::new(3))
        .await
        .unwrap();

    // Inactive-only kinds are not offered
    assert_eq!(options.kinds().collect::<Vec<_>>(), vec!["leche", "jarabe"]);

    let mut customizer = options.customizer(ProductId::new(3), "Latte", Decimal::new(55, 0));
    let oat = options.find("leche", CustomizationId::new(9)).unwrap();
    let vanilla = options.find("jarabe", CustomizationId::new(20)).unwrap();
    customizer.select("leche", oat.to_customization()).unwrap();
    customizer.select("jarabe", vanilla.to_customization()).unwrap();
    customizer.increment();

    state.cart().add_to_cart(customizer.build()).unwrap();
    state.cart().add_to_cart(customizer.build()).unwrap();

    let items = state.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 4);
    assert_eq!(items[0].customizations.len(), 2);
    assert_eq!(state.cart().total(), Decimal::new(220, 0));
}

// =============================================================================
// Points Tests
// =============================================================================

#[tokio::test]
async fn test_voucher_is_credited_to_signed_in_user() {
    let server = MockServer::start().await;
    let user = new_user_id();
    Mock::given(method("POST"))
        .and(path("/api/puntos/registrar"))
        .and(body_json(json!({ "idUsuario": user.to_string(), "puntos": 50 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open(&server, provider).await;
    state.session().wait_until_resolved().await;

    let voucher = PointsVoucher::parse(r#"{"puntos": 50}"#).unwrap();
    state
        .backend()
        .unwrap()
        .register_points(state.require_user().unwrap(), &voucher)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_voucher_reports_backend_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/puntos/registrar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Código ya utilizado"
        })))
        .mount(&server)
        .await;

    let user = new_user_id();
    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open(&server, provider).await;

    let voucher = PointsVoucher::parse(r#"{"puntos": 10}"#).unwrap();
    let err = state
        .backend()
        .unwrap()
        .register_points(user, &voucher)
        .await
        .unwrap_err();
    assert!(matches!(&err, ApiError::Rejected(msg) if msg == "Código ya utilizado"));
    assert!(!ClientError::from(err).is_reportable());
}

#[tokio::test]
async fn test_guest_cannot_redeem() {
    let server = MockServer::start().await;
    let state = open(&server, Arc::new(FakeProvider::new(None))).await;
    state.session().wait_until_resolved().await;

    assert!(matches!(state.require_user(), Err(ClientError::NotSignedIn)));
}

// =============================================================================
// Profile Tests
// =============================================================================

#[tokio::test]
async fn test_profile_edit_round_trip() {
    let server = MockServer::start().await;
    let user = new_user_id();
    let row = format!("eq.{user}");
    Mock::given(method("GET"))
        .and(path("/rest/v1/usuarios"))
        .and(query_param("id", row.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nombre": "Ana", "apellidos": "López", "telefono": null,
            "genero": "", "fecha_nacimiento": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/usuarios"))
        .and(query_param("id", row.as_str()))
        .and(body_json(json!({
            "nombre": "Ana", "apellidos": "López", "telefono": "4771234567",
            "genero": "femenino", "fecha_nacimiento": null
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open_with_auth(&server, provider).await;
    state.session().wait_until_resolved().await;
    let session = state.require_session().unwrap();
    let profiles = state.profiles().unwrap();

    let saved = profiles.profile(&session).await.unwrap().unwrap();
    assert_eq!(saved.gender, None);

    let update = Profile {
        phone: "4771234567".to_string(),
        gender: Some(Gender::Female),
        ..saved
    }
    .validate()
    .unwrap();
    profiles.update_profile(&session, &update).await.unwrap();
}

#[tokio::test]
async fn test_blank_name_never_reaches_the_database() {
    let server = MockServer::start().await;
    let user = new_user_id();
    let provider = Arc::new(FakeProvider::new(Some(session_for(user, "ana@cafe.mx"))));
    let state = open_with_auth(&server, provider).await;

    let err = ClientError::from(
        Profile {
            first_name: "   ".to_string(),
            ..Profile::default()
        }
        .validate()
        .unwrap_err(),
    );
    assert!(matches!(err, ClientError::Profile(ProfileError::EmptyName)));
    assert!(!err.is_reportable());
    assert!(state.profiles().is_ok());
    assert!(server.received_requests().await.unwrap().is_empty());
}
