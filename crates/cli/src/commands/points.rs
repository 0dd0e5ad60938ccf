//! Loyalty point commands.

use cafe_loyalty_client::AppState;
use cafe_loyalty_core::PointsVoucher;

use super::{CliError, out};

/// Credit a scanned voucher to the signed-in user.
pub async fn redeem(state: &AppState, qr: &str) -> Result<(), CliError> {
    let voucher = PointsVoucher::parse(qr)?;

    state.session().wait_until_resolved().await;
    let user_id = state.require_user()?;

    state.backend()?.register_points(user_id, &voucher).await?;
    tracing::info!(points = voucher.points(), "Voucher redeemed");
    out(format!("Added {} points to your account", voucher.points()))
}
