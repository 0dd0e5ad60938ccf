//! Backend API types.
//!
//! The backend speaks Spanish field names (`nombre`, `latitud`, ...); the
//! Rust side uses English names with serde renames. Numbers that the
//! backend sometimes sends as strings are accepted either way.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use cafe_loyalty_core::{
    BranchId, CategoryId, Coordinates, Customization, CustomizationId, EventId, OrderId,
    OrderItemId, OrderStatus, ProductCustomizer, ProductId, UserId,
};

// =============================================================================
// Envelope
// =============================================================================

/// `{ success, data }` wrapper used by most endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Backend's explanation for an unsuccessful response.
    pub fn reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "request was not successful".to_string())
    }
}

// =============================================================================
// Ingredients
// =============================================================================

/// Category an ingredient belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    #[serde(rename = "nombre")]
    pub name: String,
}

/// One selectable customization option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: CustomizationId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    /// Option kind ("leche", "jarabe", ...); one selection per kind.
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
    #[serde(rename = "id_categoria")]
    pub category_id: CategoryId,
    #[serde(rename = "categorias")]
    pub category: CategoryRef,
}

impl Ingredient {
    /// The cart-side description of this option.
    #[must_use]
    pub fn to_customization(&self) -> Customization {
        Customization {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind.clone(),
            category_id: self.category_id,
            category_name: self.category.name.clone(),
        }
    }
}

/// Options of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionGroup {
    pub kind: String,
    pub options: Vec<Ingredient>,
}

/// Customization options offered for a product, grouped by kind in the
/// order the backend listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductOptions {
    pub groups: Vec<OptionGroup>,
}

impl ProductOptions {
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.kind.as_str())
    }

    /// Look up an option by id within `kind`.
    #[must_use]
    pub fn find(&self, kind: &str, id: CustomizationId) -> Option<&Ingredient> {
        self.groups
            .iter()
            .find(|g| g.kind == kind)
            .and_then(|g| g.options.iter().find(|o| o.id == id))
    }

    /// Look up an option by id in any kind.
    #[must_use]
    pub fn find_any(&self, id: CustomizationId) -> Option<&Ingredient> {
        self.groups
            .iter()
            .flat_map(|g| g.options.iter())
            .find(|o| o.id == id)
    }

    /// Start customizing the product with these option kinds.
    #[must_use]
    pub fn customizer(
        &self,
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Decimal,
    ) -> ProductCustomizer {
        ProductCustomizer::new(
            product_id,
            product_name,
            unit_price,
            self.kinds().map(str::to_string),
        )
    }
}

impl<'de> Deserialize<'de> for ProductOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupsVisitor;

        impl<'de> Visitor<'de> for GroupsVisitor {
            type Value = ProductOptions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from option kind to options")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut groups = Vec::new();
                while let Some((kind, options)) = map.next_entry::<String, Vec<Ingredient>>()? {
                    let options: Vec<Ingredient> = options.into_iter().filter(|o| o.active).collect();
                    if !options.is_empty() {
                        groups.push(OptionGroup { kind, options });
                    }
                }
                Ok(ProductOptions { groups })
            }
        }

        deserializer.deserialize_map(GroupsVisitor)
    }
}

// =============================================================================
// Branches
// =============================================================================

/// A cafeteria location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion", default)]
    pub address: Option<String>,
    #[serde(rename = "latitud", deserialize_with = "number_or_string")]
    pub latitude: f64,
    #[serde(rename = "longitud", deserialize_with = "number_or_string")]
    pub longitude: f64,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "horario_apertura", default)]
    pub opening_hours: Option<String>,
    #[serde(rename = "activa", default = "default_true")]
    pub active: bool,
}

impl Branch {
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Branch reference embedded in events and orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSummary {
    #[serde(default)]
    pub id: Option<BranchId>,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion", default)]
    pub address: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// A scheduled event at a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "inicia_en", deserialize_with = "timestamp")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "termina_en", deserialize_with = "timestamp")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "capacidad", default)]
    pub capacity: Option<u32>,
    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
    #[serde(rename = "sucursales", default)]
    pub branch: Option<BranchSummary>,
}

// =============================================================================
// Orders
// =============================================================================

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    #[serde(rename = "nombre_item")]
    pub name: String,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "precio_unitario")]
    pub unit_price: Decimal,
    #[serde(rename = "producto_id", default)]
    pub product_id: Option<ProductId>,
    /// Free-text customization notes.
    #[serde(rename = "personalizacion_item", default)]
    pub customization: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "numero_pedido", deserialize_with = "string_or_number")]
    pub number: String,
    #[serde(rename = "estado")]
    pub status: OrderStatus,
    #[serde(rename = "creado_en", deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(rename = "descuentos", default)]
    pub discounts: Decimal,
    #[serde(rename = "impuestos", default)]
    pub taxes: Decimal,
    pub total: Decimal,
    #[serde(rename = "sucursales", default)]
    pub branch: Option<BranchSummary>,
    #[serde(rename = "items_pedido", default)]
    pub items: Vec<OrderItem>,
}

/// Page position returned with an order listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(rename = "pagina")]
    pub page: u32,
    #[serde(rename = "por_pagina")]
    pub per_page: u32,
    pub total: u32,
}

/// A user's orders, newest first as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Option<Pagination>,
}

/// Raw order listing. Has no `{success, data}` envelope, but may carry
/// `success: false` on failure.
#[derive(Debug, Deserialize)]
pub(crate) struct OrdersResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(rename = "pedidos", default)]
    pub orders: Vec<Order>,
    #[serde(rename = "paginacion", default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Points
// =============================================================================

/// Body of a points registration.
#[derive(Debug, Serialize)]
pub(crate) struct RegisterPoints {
    #[serde(rename = "idUsuario")]
    pub user_id: UserId,
    #[serde(rename = "puntos")]
    pub points: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterPointsResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Lenient field decoding
// =============================================================================

const fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrInteger {
    String(String),
    Integer(i64),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match StringOrInteger::deserialize(deserializer)? {
        StringOrInteger::String(s) => s,
        StringOrInteger::Integer(n) => n.to_string(),
    })
}

/// RFC 3339 timestamps, or naive `YYYY-MM-DDTHH:MM:SS` read as UTC.
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ingredient(id: i32, name: &str, kind: &str, active: bool) -> serde_json::Value {
        json!({
            "id": id,
            "nombre": name,
            "descripcion": null,
            "tipo": kind,
            "activo": active,
            "id_categoria": 3,
            "categorias": { "id": 3, "nombre": "Bebidas calientes" }
        })
    }

    #[test]
    fn test_product_options_keep_backend_order() {
        let raw = r#"{
            "tamano": [{"id":1,"nombre":"Grande","tipo":"tamano","activo":true,"id_categoria":3,"categorias":{"id":3,"nombre":"Bebidas"}}],
            "leche": [{"id":2,"nombre":"Avena","tipo":"leche","activo":true,"id_categoria":3,"categorias":{"id":3,"nombre":"Bebidas"}}],
            "azucar": []
        }"#;
        let options: ProductOptions = serde_json::from_str(raw).unwrap();
        assert_eq!(options.kinds().collect::<Vec<_>>(), vec!["tamano", "leche"]);
    }

    #[test]
    fn test_inactive_options_are_hidden() {
        let options: ProductOptions = serde_json::from_value(json!({
            "leche": [ingredient(1, "Entera", "leche", true), ingredient(2, "Soya", "leche", false)]
        }))
        .unwrap();
        assert_eq!(options.groups[0].options.len(), 1);
        assert!(options.find("leche", CustomizationId::new(2)).is_none());
    }

    #[test]
    fn test_ingredient_to_customization() {
        let ing: Ingredient = serde_json::from_value(ingredient(9, "Avena", "leche", true)).unwrap();
        let c = ing.to_customization();
        assert_eq!(c.id, CustomizationId::new(9));
        assert_eq!(c.kind, "leche");
        assert_eq!(c.category_id, CategoryId::new(3));
        assert_eq!(c.category_name, "Bebidas calientes");
    }

    #[test]
    fn test_branch_accepts_string_coordinates() {
        let branch: Branch = serde_json::from_value(json!({
            "id": 1,
            "nombre": "Centro",
            "direccion": "Av. Juárez 10",
            "latitud": "21.1161",
            "longitud": -101.6826,
            "telefono": "477 000 0000",
            "horario_apertura": "07:00-21:00",
            "activa": true
        }))
        .unwrap();
        assert!((branch.latitude - 21.1161).abs() < f64::EPSILON);
        assert!((branch.coordinates().longitude + 101.6826).abs() < f64::EPSILON);
    }

    #[test]
    fn test_order_decoding() {
        let order: Order = serde_json::from_value(json!({
            "id": 7,
            "numero_pedido": 1042,
            "estado": "preparando",
            "creado_en": "2024-05-01T14:30:00",
            "subtotal": "110.00",
            "descuentos": 0,
            "impuestos": "17.60",
            "total": 127.6,
            "sucursales": { "id": 1, "nombre": "Centro", "direccion": "Av. Juárez 10" },
            "items_pedido": [{
                "id": 1,
                "cantidad": 2,
                "pedido_id": 7,
                "receta_id": null,
                "nombre_item": "Latte",
                "producto_id": 3,
                "precio_unitario": "55.00",
                "personalizacion_item": null
            }],
            "pagos": []
        }))
        .unwrap();

        assert_eq!(order.number, "1042");
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.created_at.to_rfc3339(), "2024-05-01T14:30:00+00:00");
        assert_eq!(order.items[0].line_total(), Decimal::new(110, 0));
        assert_eq!(order.taxes, Decimal::new(1760, 2));
        assert_eq!(order.branch.unwrap().name, "Centro");
    }

    #[test]
    fn test_register_points_body() {
        let body = RegisterPoints {
            user_id: "5b0d7f7e-6d0c-4a52-9a55-2f4f2d7f1c11".parse().unwrap(),
            points: 50,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "idUsuario": "5b0d7f7e-6d0c-4a52-9a55-2f4f2d7f1c11", "puntos": 50 })
        );
    }
}
