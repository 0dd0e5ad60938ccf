//! Unified error type for callers of the client crate.
//!
//! Each module has its own error enum; [`ClientError`] wraps them so
//! front ends can use `?` across module boundaries and decide in one place
//! what is worth reporting.

use thiserror::Error;

use cafe_loyalty_core::{CartError, CustomizeError, ProfileError, RewardError, VoucherError};

use crate::api::ApiError;
use crate::cart::PersistError;
use crate::config::ConfigError;
use crate::session::AuthError;
use crate::storage::StorageError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Cart persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Customization error: {0}")]
    Customize(#[from] CustomizeError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Backend API operation failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Invalid voucher: {0}")]
    Voucher(#[from] VoucherError),

    #[error("Invalid profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Reward error: {0}")]
    Reward(#[from] RewardError),

    /// Operation needs a signed-in user.
    #[error("You must be signed in to do that")]
    NotSignedIn,

    /// Operation needs a backend and none is configured.
    #[error("No backend configured (set CAFE_BACKEND_URL)")]
    BackendNotConfigured,

    /// Operation needs the auth provider and none is configured.
    #[error("No auth provider configured (set CAFE_AUTH_URL)")]
    AuthNotConfigured,
}

impl ClientError {
    /// Whether this error points at a fault worth sending to error tracking,
    /// as opposed to a user mistake or an expected rejection.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Persist(_)
                | Self::Api(ApiError::Status { .. } | ApiError::Parse(_))
                | Self::Auth(AuthError::Decode(_) | AuthError::Storage(_))
        )
    }
}
