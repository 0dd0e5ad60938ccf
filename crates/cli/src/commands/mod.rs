//! CLI command implementations.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod points;
pub mod profile;
pub mod rewards;

use std::io::Write;

use thiserror::Error;
use tracing::warn;

use cafe_loyalty_client::{ApiError, AuthError, ClientError, PendingWrite, StorageError};
use cafe_loyalty_core::{CartError, CustomizeError, ProfileError, RewardError, VoucherError};

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Could not read or write the terminal: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Whether the error should go to error tracking.
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::Client(e) => e.is_reportable(),
            Self::Io(_) | Self::InvalidArgument(_) => false,
        }
    }
}

macro_rules! via_client_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CliError {
                fn from(e: $ty) -> Self {
                    Self::Client(ClientError::from(e))
                }
            }
        )*
    };
}

via_client_error!(
    ApiError,
    AuthError,
    CartError,
    CustomizeError,
    ProfileError,
    RewardError,
    StorageError,
    VoucherError,
);

/// Write one line of command output to stdout.
pub fn out(line: impl std::fmt::Display) -> Result<(), CliError> {
    writeln!(std::io::stdout().lock(), "{line}")?;
    Ok(())
}

/// Wait for a cart snapshot write. Failures are logged; the in-memory change
/// already happened.
pub async fn settle(pending: PendingWrite) {
    if let Err(e) = pending.wait().await {
        warn!(error = %e, "Cart change was not saved");
    }
}
