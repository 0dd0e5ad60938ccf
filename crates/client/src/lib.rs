//! Cafe Loyalty Client - state containers and service adapters.
//!
//! This crate owns everything with I/O or shared state:
//! - [`cart`] - Cart container: in-memory cart, change notifications and
//!   background snapshot persistence
//! - [`session`] - Session container over an identity provider, plus the
//!   HTTP provider implementation
//! - [`storage`] - Durable key-value stores backing both containers
//! - [`api`] - Cafeteria backend API client (catalog, points, orders)
//! - [`state`] - [`AppState`], the composition root front ends hold
//!
//! Pure domain logic (cart reducer, customization, vouchers) lives in
//! `cafe-loyalty-core`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;

pub use api::{ApiError, BackendClient};
pub use cart::{CartScope, CartStore, PendingWrite, PersistError};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use session::{
    AuthError, IdentityProvider, ProfileClient, Session, SessionContainer, SessionState, User,
};
pub use state::AppState;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
