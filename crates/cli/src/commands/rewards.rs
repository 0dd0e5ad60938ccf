//! Rewards catalog commands.

use cafe_loyalty_client::AppState;
use cafe_loyalty_core::{Reward, RewardCatalog, RewardId, RewardKind};

use super::{CliError, out};

/// Show the catalog; with a balance, mark what it can pay for.
pub async fn list(state: &AppState, balance: Option<u32>) -> Result<(), CliError> {
    state.session().wait_until_resolved().await;
    state.require_user()?;

    let catalog = RewardCatalog::standard();
    out("Products:")?;
    for reward in catalog.products() {
        out(describe(reward, balance))?;
    }
    out("Discounts:")?;
    for reward in catalog.discounts() {
        out(describe(reward, balance))?;
    }
    Ok(())
}

/// Check whether `balance` can pay for one reward.
pub async fn check(state: &AppState, id: i32, balance: u32) -> Result<(), CliError> {
    state.session().wait_until_resolved().await;
    state.require_user()?;

    let catalog = RewardCatalog::standard();
    let reward = catalog.find(RewardId::new(id))?;
    let left = reward.redeem(balance)?;
    out(format!(
        "{} can be redeemed for {} points, leaving {left}",
        reward.name, reward.cost
    ))
}

fn describe(reward: &Reward, balance: Option<u32>) -> String {
    let detail = match reward.kind {
        RewardKind::Product => String::new(),
        RewardKind::Discount { valid_days, .. } => format!("  (valid {valid_days} days)"),
    };
    let status = match balance {
        None => String::new(),
        Some(balance) if reward.is_affordable(balance) => "  [redeemable]".to_string(),
        Some(balance) => format!("  [{} more points]", reward.shortfall(balance)),
    };
    format!(
        "  {:>3}  {:>4} pts  {}{detail}{status}",
        reward.id, reward.cost, reward.name
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_marks_affordability() {
        let catalog = RewardCatalog::standard();
        let americano = catalog.products().next().unwrap();
        assert!(describe(americano, Some(250)).ends_with("[redeemable]"));
        assert!(describe(americano, Some(20)).ends_with("[30 more points]"));
        assert!(describe(americano, None).ends_with("Café Americano"));
    }

    #[test]
    fn test_describe_discount_validity() {
        let catalog = RewardCatalog::standard();
        let coupon = catalog.discounts().next().unwrap();
        assert!(describe(coupon, None).ends_with("(valid 30 days)"));
    }
}
