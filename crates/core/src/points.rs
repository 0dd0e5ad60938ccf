//! Loyalty point vouchers.
//!
//! Counters display a QR code whose text is a small JSON object carrying the
//! number of points the purchase earned, e.g. `{"puntos": 25}`. Other fields
//! may be present and are ignored.

use serde::Deserialize;
use thiserror::Error;

/// Errors decoding a scanned voucher.
#[derive(Debug, Error)]
pub enum VoucherError {
    /// The QR text is not the expected JSON object.
    #[error("QR code is not a points voucher: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The voucher carries zero or negative points.
    #[error("voucher must award a positive number of points (got {0})")]
    NonPositive(i64),

    /// The voucher carries more points than a single scan may award.
    #[error("voucher awards too many points ({0})")]
    TooLarge(i64),
}

/// Points awarded by one scanned QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsVoucher {
    points: u32,
}

#[derive(Deserialize)]
struct RawVoucher {
    #[serde(rename = "puntos")]
    points: i64,
}

impl PointsVoucher {
    /// Decode the text of a scanned QR code.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError`] if the text is not a JSON object with an
    /// integer `puntos` field, or the amount is not a positive `u32`.
    pub fn parse(qr_text: &str) -> Result<Self, VoucherError> {
        let raw: RawVoucher = serde_json::from_str(qr_text.trim())?;
        if raw.points <= 0 {
            return Err(VoucherError::NonPositive(raw.points));
        }
        let points = u32::try_from(raw.points).map_err(|_| VoucherError::TooLarge(raw.points))?;
        Ok(Self { points })
    }

    #[must_use]
    pub const fn points(&self) -> u32 {
        self.points
    }
}
