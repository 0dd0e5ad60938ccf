//! Cafe Loyalty Core - Shared domain types library.
//!
//! This crate provides the types and pure state logic used by every Cafe
//! Loyalty component:
//! - `client` - State containers, storage adapters and API clients
//! - `cli` - Terminal front end driving the client core
//!
//! # Architecture
//!
//! The core crate contains only types, reducers and validation - no I/O, no
//! storage, no HTTP clients. Persistence and notification are layered on top
//! in the client crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails and order statuses
//! - [`cart`] - Line items and the in-memory cart reducer
//! - [`customize`] - Building customized line items from option selections
//! - [`geo`] - Distance between branch coordinates
//! - [`points`] - Loyalty point vouchers scanned from QR codes
//! - [`profile`] - Profile details and their validation
//! - [`rewards`] - Rewards catalog priced in points

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod customize;
pub mod geo;
pub mod points;
pub mod profile;
pub mod rewards;
pub mod types;

pub use cart::{Cart, CartError, CartLineItem, Customization, MAX_QUANTITY, MAX_UNIT_PRICE};
pub use customize::{CustomizeError, ProductCustomizer};
pub use geo::Coordinates;
pub use points::{PointsVoucher, VoucherError};
pub use profile::{Gender, Profile, ProfileError, ProfileUpdate};
pub use rewards::{Reward, RewardCatalog, RewardError, RewardKind, can_redeem};
pub use types::*;
