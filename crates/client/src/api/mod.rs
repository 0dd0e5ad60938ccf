//! Cafeteria backend API client.
//!
//! Plain JSON over HTTP with `reqwest`. Catalog reads (ingredients,
//! branches, events) are cached in memory with `moka`; per-user data
//! (orders, points) always goes to the backend.
//!
//! # Example
//!
//! ```rust,ignore
//! let api = BackendClient::new(&config.backend);
//!
//! let options = api.ingredients_for_product(ProductId::new(3)).await?;
//! let mut customizer = options.customizer(ProductId::new(3), "Latte", price);
//! ```

mod types;

pub use types::{
    Branch, BranchSummary, CategoryRef, Event, Ingredient, OptionGroup, Order, OrderItem,
    OrderPage, Pagination, ProductOptions,
};

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

use cafe_loyalty_core::{Coordinates, PointsVoucher, ProductId, UserId, geo};

use crate::config::BackendConfig;
use types::{Envelope, OrdersResponse, RegisterPoints, RegisterPointsResponse};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend answered `success: false`.
    #[error("backend rejected the request: {0}")]
    Rejected(String),

    /// Endpoint URL could not be built.
    #[error("invalid endpoint: {0}")]
    InvalidUrl(String),
}

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Ingredients(ProductId),
    Branches,
    Events,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Ingredients(Arc<ProductOptions>),
    Branches(Arc<Vec<Branch>>),
    Events(Arc<Vec<Event>>),
}

/// Client for the cafeteria backend.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a client for the backend in `config`.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_cache_ttl(config.base_url.clone(), config.cache_ttl)
    }

    /// Create a client for `base_url` with a custom catalog cache TTL.
    #[must_use]
    pub fn with_cache_ttl(base_url: Url, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(BackendClientInner {
                client: reqwest::Client::new(),
                base_url,
                cache,
            }),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Execute a request and decode the JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "backend returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// GET an enveloped endpoint and unwrap `data`.
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let envelope: Envelope<T> = self.execute(self.inner.client.get(url)).await?;
        if !envelope.success {
            return Err(ApiError::Rejected(envelope.reason()));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::Rejected("response has no data".to_string()))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Customization options for a product, grouped by kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn ingredients_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Arc<ProductOptions>, ApiError> {
        let cache_key = CacheKey::Ingredients(product_id);
        if let Some(CacheValue::Ingredients(options)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for ingredients");
            return Ok(options);
        }

        let options: ProductOptions = self
            .get_data(&format!("api/ingredientes/producto/{product_id}"))
            .await?;
        let options = Arc::new(options);
        self.inner
            .cache
            .insert(cache_key, CacheValue::Ingredients(Arc::clone(&options)))
            .await;
        Ok(options)
    }

    /// Active branches.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip(self))]
    pub async fn branches(&self) -> Result<Arc<Vec<Branch>>, ApiError> {
        if let Some(CacheValue::Branches(branches)) =
            self.inner.cache.get(&CacheKey::Branches).await
        {
            debug!("Cache hit for branches");
            return Ok(branches);
        }

        let all: Vec<Branch> = self.get_data("api/sucursales").await?;
        let branches: Arc<Vec<Branch>> = Arc::new(all.into_iter().filter(|b| b.active).collect());
        self.inner
            .cache
            .insert(CacheKey::Branches, CacheValue::Branches(Arc::clone(&branches)))
            .await;
        Ok(branches)
    }

    /// Active branches with their distance from `origin` in km, nearest
    /// first.
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::branches`].
    pub async fn branches_near(&self, origin: Coordinates) -> Result<Vec<(Branch, f64)>, ApiError> {
        let mut near: Vec<(Branch, f64)> = self
            .branches()
            .await?
            .iter()
            .map(|b| (b.clone(), geo::distance_km(origin, b.coordinates())))
            .collect();
        near.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(near)
    }

    /// Active events, earliest start first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip(self))]
    pub async fn events(&self) -> Result<Arc<Vec<Event>>, ApiError> {
        if let Some(CacheValue::Events(events)) = self.inner.cache.get(&CacheKey::Events).await {
            debug!("Cache hit for events");
            return Ok(events);
        }

        let mut events: Vec<Event> = self.get_data("api/eventos").await?;
        events.retain(|e| e.active);
        events.sort_by_key(|e| e.starts_at);
        let events = Arc::new(events);
        self.inner
            .cache
            .insert(CacheKey::Events, CacheValue::Events(Arc::clone(&events)))
            .await;
        Ok(events)
    }

    /// Drop every cached catalog response.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // User data
    // =========================================================================

    /// Credit the points from a scanned voucher to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend answers
    /// `success: false`, or another error if the request fails.
    #[instrument(skip(self, voucher), fields(user_id = %user_id, points = voucher.points()))]
    pub async fn register_points(
        &self,
        user_id: UserId,
        voucher: &PointsVoucher,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("api/puntos/registrar")?;
        let body = RegisterPoints {
            user_id,
            points: voucher.points(),
        };
        let response: RegisterPointsResponse =
            self.execute(self.inner.client.post(url).json(&body)).await?;
        if !response.success {
            return Err(ApiError::Rejected(
                response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "points could not be registered".to_string()),
            ));
        }
        Ok(())
    }

    /// Orders placed by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<OrderPage, ApiError> {
        let url = self.endpoint(&format!("api/pedidos/usuario/{user_id}"))?;
        let response: OrdersResponse = self.execute(self.inner.client.get(url)).await?;
        if response.success == Some(false) {
            return Err(ApiError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "orders could not be loaded".to_string()),
            ));
        }
        Ok(OrderPage {
            orders: response.orders,
            pagination: response.pagination,
        })
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use cafe_loyalty_core::OrderStatus;

    const USER_ID: &str = "5b0d7f7e-6d0c-4a52-9a55-2f4f2d7f1c11";

    fn client(server: &MockServer) -> BackendClient {
        BackendClient::with_cache_ttl(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            Duration::from_secs(300),
        )
    }

    fn branch(id: i32, name: &str, lat: f64, lon: f64, active: bool) -> serde_json::Value {
        json!({
            "id": id,
            "nombre": name,
            "direccion": "Centro",
            "latitud": lat,
            "longitud": lon,
            "telefono": null,
            "horario_apertura": "07:00-21:00",
            "activa": active
        })
    }

    #[tokio::test]
    async fn test_ingredients_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ingredientes/producto/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "leche": [{
                        "id": 9, "nombre": "Avena", "tipo": "leche", "activo": true,
                        "id_categoria": 2, "categorias": { "id": 2, "nombre": "Bebidas" }
                    }]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        let first = api.ingredients_for_product(ProductId::new(3)).await.unwrap();
        let second = api.ingredients_for_product(ProductId::new(3)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.kinds().collect::<Vec<_>>(), vec!["leche"]);
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ingredientes/producto/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "Producto no encontrado"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .ingredients_for_product(ProductId::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(msg) if msg == "Producto no encontrado"));
    }

    #[tokio::test]
    async fn test_branches_filter_inactive_and_sort_by_distance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sucursales"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [
                    branch(1, "Lejana", 20.6597, -103.3496, true),
                    branch(2, "Cerrada", 21.1161, -101.6826, false),
                    branch(3, "Cercana", 21.1250, -101.6860, true)
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        assert_eq!(api.branches().await.unwrap().len(), 2);

        let near = api
            .branches_near(Coordinates::new(21.1161, -101.6826))
            .await
            .unwrap();
        assert_eq!(near[0].0.name, "Cercana");
        assert_eq!(near[1].0.name, "Lejana");
        assert!(near[0].1 < 2.0);
        assert!(near[1].1 > 150.0);
    }

    #[tokio::test]
    async fn test_events_active_sorted_by_start() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/eventos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [
                    {
                        "id": 1, "titulo": "Cata de café", "inicia_en": "2024-06-10T18:00:00Z",
                        "termina_en": "2024-06-10T20:00:00Z", "capacidad": 20, "activo": true,
                        "sucursales": { "id": 1, "nombre": "Centro", "direccion": "Av. Juárez 10" }
                    },
                    {
                        "id": 2, "titulo": "Cancelado", "inicia_en": "2024-06-01T18:00:00Z",
                        "termina_en": "2024-06-01T20:00:00Z", "activo": false
                    },
                    {
                        "id": 3, "titulo": "Latte art", "inicia_en": "2024-06-02T10:00:00Z",
                        "termina_en": "2024-06-02T12:00:00Z", "activo": true
                    }
                ]
            })))
            .mount(&server)
            .await;

        let events = client(&server).events().await.unwrap();
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Latte art", "Cata de café"]);
        assert_eq!(events[1].branch.as_ref().unwrap().name, "Centro");
    }

    #[tokio::test]
    async fn test_register_points() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/puntos/registrar"))
            .and(body_json(json!({ "idUsuario": USER_ID, "puntos": 25 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let voucher = PointsVoucher::parse(r#"{"puntos": 25}"#).unwrap();
        client(&server)
            .register_points(USER_ID.parse().unwrap(), &voucher)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_points_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/puntos/registrar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
            .mount(&server)
            .await;

        let voucher = PointsVoucher::parse(r#"{"puntos": 25}"#).unwrap();
        let err = client(&server)
            .register_points(USER_ID.parse().unwrap(), &voucher)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_orders_for_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/pedidos/usuario/{USER_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pedidos": [{
                    "id": 7,
                    "numero_pedido": "A-1042",
                    "estado": "listo",
                    "creado_en": "2024-05-01T14:30:00Z",
                    "total": "110.00",
                    "items_pedido": [{
                        "id": 1, "cantidad": 2, "nombre_item": "Latte",
                        "producto_id": 3, "precio_unitario": 55
                    }]
                }],
                "paginacion": { "pagina": 1, "por_pagina": 10, "total": 1 }
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .orders_for_user(USER_ID.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].status, OrderStatus::Ready);
        assert_eq!(page.pagination.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/eventos"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server).events().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 502, .. }));
    }
}
