//! Shopping cart line items and the in-memory cart reducer.
//!
//! [`Cart`] is a plain value: every operation is synchronous and
//! deterministic, and nothing here touches storage. The client crate wraps
//! it with persistence and change notification.
//!
//! # Identity
//!
//! Two line items are the same logical item when their product ids are equal
//! and their customization lists are equal element by element, in order.
//! Adding a line item that matches an existing one folds the quantities
//! together in the existing position; anything else is appended.
//!
//! # Limits
//!
//! Quantities are capped at [`MAX_QUANTITY`] and unit prices at
//! [`MAX_UNIT_PRICE`], so `unit_price * quantity` summed over any cart that
//! fits in memory stays well inside `Decimal`'s range.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CategoryId, CustomizationId, Price, ProductId};

/// Largest quantity a single line item can carry.
pub const MAX_QUANTITY: u32 = 10_000;

/// Largest unit price a line item can capture, in whole currency units.
pub const MAX_UNIT_PRICE: i64 = 1_000_000;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Line items must carry at least one unit.
    #[error("quantity must be at least 1 (product {product_id})")]
    ZeroQuantity { product_id: ProductId },

    /// Captured unit prices cannot be negative.
    #[error("unit price cannot be negative (product {product_id}: {unit_price})")]
    NegativePrice {
        product_id: ProductId,
        unit_price: Decimal,
    },

    /// Captured unit prices are capped at [`MAX_UNIT_PRICE`].
    #[error("unit price too high (product {product_id}: {unit_price})")]
    PriceTooHigh {
        product_id: ProductId,
        unit_price: Decimal,
    },

    /// The quantity, alone or merged, would exceed [`MAX_QUANTITY`].
    #[error("quantity above {MAX_QUANTITY} for product {product_id}")]
    QuantityOverflow { product_id: ProductId },
}

/// One selected ingredient or option attached to a line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Customization {
    pub id: CustomizationId,
    pub name: String,
    /// Free-form option category label, e.g. "milk" or "syrup".
    pub kind: String,
    pub category_id: CategoryId,
    pub category_name: String,
}

/// A product plus its selected customizations and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Base product. Not unique within a cart.
    pub product_id: ProductId,
    /// Display name captured when the item was added.
    pub product_name: String,
    /// Base product price captured when the item was added.
    pub unit_price: Decimal,
    pub customizations: Vec<Customization>,
    pub quantity: u32,
}

impl CartLineItem {
    /// Create a line item without customizations.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            customizations: Vec::new(),
            quantity,
        }
    }

    /// Attach customizations, replacing any already present.
    #[must_use]
    pub fn with_customizations(mut self, customizations: Vec<Customization>) -> Self {
        self.customizations = customizations;
        self
    }

    /// Whether `other` is the same logical item (merge key).
    #[must_use]
    pub fn is_same_item(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.customizations == other.customizations
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Captured unit price in the default currency.
    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_amount(self.unit_price)
    }

    fn validate(&self) -> Result<(), CartError> {
        if self.quantity == 0 {
            return Err(CartError::ZeroQuantity {
                product_id: self.product_id,
            });
        }
        if self.quantity > MAX_QUANTITY {
            return Err(CartError::QuantityOverflow {
                product_id: self.product_id,
            });
        }
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(CartError::NegativePrice {
                product_id: self.product_id,
                unit_price: self.unit_price,
            });
        }
        if self.unit_price > Decimal::from(MAX_UNIT_PRICE) {
            return Err(CartError::PriceTooHigh {
                product_id: self.product_id,
                unit_price: self.unit_price,
            });
        }
        Ok(())
    }
}

/// Ordered list of distinct line items.
///
/// Invariants held by every operation:
/// - no entry has quantity 0
/// - no two entries are the same logical item
/// - new logical items are appended, merges keep their position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Rebuild a cart from an untrusted snapshot.
    ///
    /// Entries are replayed through [`Cart::add`], so duplicates fold
    /// together and invalid entries are skipped. Returns the cart and the
    /// number of entries that were dropped.
    #[must_use]
    pub fn restore(items: impl IntoIterator<Item = CartLineItem>) -> (Self, usize) {
        let mut cart = Self::new();
        let mut dropped = 0;
        for item in items {
            if cart.add(item).is_err() {
                dropped += 1;
            }
        }
        (cart, dropped)
    }

    /// Add a line item, merging into an existing matching entry.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the item has zero quantity, a unit price
    /// outside `0..=MAX_UNIT_PRICE`, or the merged quantity would exceed
    /// [`MAX_QUANTITY`]. The cart is unchanged on error.
    pub fn add(&mut self, item: CartLineItem) -> Result<(), CartError> {
        item.validate()?;

        if let Some(existing) = self.items.iter_mut().find(|e| e.is_same_item(&item)) {
            existing.quantity = existing
                .quantity
                .checked_add(item.quantity)
                .filter(|q| *q <= MAX_QUANTITY)
                .ok_or(CartError::QuantityOverflow {
                    product_id: item.product_id,
                })?;
        } else {
            self.items.push(item);
        }
        Ok(())
    }

    /// Remove every entry for `product_id`, whatever its customizations.
    ///
    /// Returns the number of entries removed.
    pub fn remove_product(&mut self, product_id: ProductId) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        before - self.items.len()
    }

    /// Set the quantity of every entry for `product_id`.
    ///
    /// A quantity of zero or less removes the entries. Quantities above
    /// [`MAX_QUANTITY`] are clamped to it. Returns the number of entries
    /// removed or changed; entries already at `quantity` do not count.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64) -> usize {
        if quantity <= 0 {
            return self.remove_product(product_id);
        }
        let quantity = u32::try_from(quantity)
            .unwrap_or(MAX_QUANTITY)
            .min(MAX_QUANTITY);

        let mut changed = 0;
        for item in self
            .items
            .iter_mut()
            .filter(|i| i.product_id == product_id && i.quantity != quantity)
        {
            item.quantity = quantity;
            changed += 1;
        }
        changed
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of `unit_price * quantity` over all entries.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Sum of quantities over all entries.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Current entries in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
