//! Turning a product plus option selections into a cart line item.
//!
//! Each product offers options grouped by kind ("milk", "syrup", ...). At most
//! one option per kind can be selected. The kinds keep the order the catalog
//! returned them in, and the built line item lists its customizations in that
//! same order, so two identical selections always produce equal line items.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::cart::{CartLineItem, Customization, MAX_QUANTITY};
use crate::types::ProductId;

/// Errors raised while selecting options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomizeError {
    /// The product does not offer this kind of option.
    #[error("product does not offer options of kind '{0}'")]
    UnknownKind(String),

    /// The option's own kind does not match the slot it was selected for.
    #[error("option '{option}' is a '{actual}' option, not '{expected}'")]
    KindMismatch {
        option: String,
        expected: String,
        actual: String,
    },
}

/// Builder for a customized line item.
#[derive(Debug, Clone)]
pub struct ProductCustomizer {
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    slots: Vec<(String, Option<Customization>)>,
    quantity: u32,
}

impl ProductCustomizer {
    /// Start customizing a product. Quantity starts at 1 with nothing selected.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Decimal,
        kinds: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut slots: Vec<(String, Option<Customization>)> = Vec::new();
        for kind in kinds {
            if !slots.iter().any(|(k, _)| *k == kind) {
                slots.push((kind, None));
            }
        }
        Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            slots,
            quantity: 1,
        }
    }

    /// Option kinds offered, in catalog order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(kind, _)| kind.as_str())
    }

    /// Select `option` for `kind`, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns [`CustomizeError::UnknownKind`] if the product has no such
    /// kind, or [`CustomizeError::KindMismatch`] if the option belongs to a
    /// different kind.
    pub fn select(&mut self, kind: &str, option: Customization) -> Result<(), CustomizeError> {
        if option.kind != kind {
            return Err(CustomizeError::KindMismatch {
                option: option.name,
                expected: kind.to_string(),
                actual: option.kind,
            });
        }
        let slot = self.slot_mut(kind)?;
        *slot = Some(option);
        Ok(())
    }

    /// Clear the selection for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CustomizeError::UnknownKind`] if the product has no such kind.
    pub fn deselect(&mut self, kind: &str) -> Result<(), CustomizeError> {
        *self.slot_mut(kind)? = None;
        Ok(())
    }

    /// Currently selected option for `kind`.
    #[must_use]
    pub fn selected(&self, kind: &str) -> Option<&Customization> {
        self.slots
            .iter()
            .find(|(k, _)| k == kind)
            .and_then(|(_, sel)| sel.as_ref())
    }

    /// Increase quantity, never above [`MAX_QUANTITY`].
    pub fn increment(&mut self) {
        self.quantity = self.quantity.saturating_add(1).min(MAX_QUANTITY);
    }

    /// Decrease quantity, never below 1.
    pub fn decrement(&mut self) {
        self.quantity = self.quantity.saturating_sub(1).max(1);
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Produce the line item for the current selections.
    #[must_use]
    pub fn build(&self) -> CartLineItem {
        let customizations = self
            .slots
            .iter()
            .filter_map(|(_, sel)| sel.clone())
            .collect();
        CartLineItem::new(
            self.product_id,
            self.product_name.clone(),
            self.unit_price,
            self.quantity,
        )
        .with_customizations(customizations)
    }

    fn slot_mut(&mut self, kind: &str) -> Result<&mut Option<Customization>, CustomizeError> {
        self.slots
            .iter_mut()
            .find(|(k, _)| k == kind)
            .map(|(_, sel)| sel)
            .ok_or_else(|| CustomizeError::UnknownKind(kind.to_string()))
    }
}
