//! Rewards that can be bought with loyalty points.
//!
//! The catalog has two sections: free products and discount coupons. A
//! reward is redeemable only when the balance covers its whole cost.

use thiserror::Error;

use crate::types::RewardId;

/// Errors redeeming a reward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("no reward with id {0}")]
    NotFound(RewardId),

    /// The balance does not cover the cost.
    #[error("not enough points: {name} costs {cost}, you have {balance}")]
    InsufficientPoints {
        name: String,
        cost: u32,
        balance: u32,
    },
}

/// Whether a balance covers a cost.
#[must_use]
pub const fn can_redeem(balance: u32, cost: u32) -> bool {
    balance >= cost
}

/// What a reward gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardKind {
    /// A free product.
    Product,
    /// A percentage off, valid for some days after redemption.
    Discount { percent: u8, valid_days: u16 },
}

/// One entry of the rewards catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    /// Price in points.
    pub cost: u32,
    pub kind: RewardKind,
}

impl Reward {
    fn product(id: i32, name: &str, cost: u32) -> Self {
        Self {
            id: RewardId::new(id),
            name: name.to_string(),
            cost,
            kind: RewardKind::Product,
        }
    }

    fn discount(id: i32, name: &str, cost: u32, percent: u8, valid_days: u16) -> Self {
        Self {
            id: RewardId::new(id),
            name: name.to_string(),
            cost,
            kind: RewardKind::Discount {
                percent,
                valid_days,
            },
        }
    }

    #[must_use]
    pub const fn is_affordable(&self, balance: u32) -> bool {
        can_redeem(balance, self.cost)
    }

    /// Points still missing to afford this reward; 0 if affordable.
    #[must_use]
    pub const fn shortfall(&self, balance: u32) -> u32 {
        self.cost.saturating_sub(balance)
    }

    /// Balance left after redeeming this reward.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InsufficientPoints`] if `balance` is below the
    /// cost.
    pub fn redeem(&self, balance: u32) -> Result<u32, RewardError> {
        balance
            .checked_sub(self.cost)
            .ok_or_else(|| RewardError::InsufficientPoints {
                name: self.name.clone(),
                cost: self.cost,
                balance,
            })
    }
}

/// The rewards on offer, products first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardCatalog {
    rewards: Vec<Reward>,
}

impl RewardCatalog {
    #[must_use]
    pub const fn new(rewards: Vec<Reward>) -> Self {
        Self { rewards }
    }

    /// The catalog every branch offers.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Reward::product(1, "Café Americano", 50),
            Reward::product(2, "Cappuccino", 75),
            Reward::product(3, "Croissant", 60),
            Reward::product(4, "Muffin", 45),
            Reward::product(5, "Sandwich", 120),
            Reward::product(6, "Jugo Natural", 80),
            Reward::discount(7, "10% en tu próxima compra", 100, 10, 30),
            Reward::discount(8, "15% en bebidas", 150, 15, 15),
            Reward::discount(9, "20% en alimentos", 200, 20, 15),
            Reward::discount(10, "25% en total", 300, 25, 7),
        ])
    }

    pub fn all(&self) -> impl Iterator<Item = &Reward> {
        self.rewards.iter()
    }

    pub fn products(&self) -> impl Iterator<Item = &Reward> {
        self.all().filter(|r| r.kind == RewardKind::Product)
    }

    pub fn discounts(&self) -> impl Iterator<Item = &Reward> {
        self.all()
            .filter(|r| matches!(r.kind, RewardKind::Discount { .. }))
    }

    /// Rewards `balance` can pay for, in catalog order.
    pub fn affordable(&self, balance: u32) -> impl Iterator<Item = &Reward> {
        self.all().filter(move |r| r.is_affordable(balance))
    }

    /// # Errors
    ///
    /// Returns [`RewardError::NotFound`] if no reward has this id.
    pub fn find(&self, id: RewardId) -> Result<&Reward, RewardError> {
        self.all()
            .find(|r| r.id == id)
            .ok_or(RewardError::NotFound(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_can_redeem_needs_full_cost() {
        assert!(can_redeem(250, 250));
        assert!(can_redeem(251, 250));
        assert!(!can_redeem(249, 250));
        assert!(can_redeem(0, 0));
    }

    #[test]
    fn test_standard_catalog_sections() {
        let catalog = RewardCatalog::standard();
        assert_eq!(catalog.products().count(), 6);
        assert_eq!(catalog.discounts().count(), 4);
        assert!(catalog.products().all(|r| r.kind == RewardKind::Product));
    }

    #[test]
    fn test_affordable_with_balance() {
        let catalog = RewardCatalog::standard();
        let names: Vec<_> = catalog.affordable(75).map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Café Americano", "Cappuccino", "Croissant", "Muffin"]);
        assert_eq!(catalog.affordable(300).count(), 10);
        assert_eq!(catalog.affordable(10).count(), 0);
    }

    #[test]
    fn test_redeem_deducts_cost() {
        let catalog = RewardCatalog::standard();
        let sandwich = catalog.find(RewardId::new(5)).unwrap();
        assert_eq!(sandwich.redeem(250), Ok(130));
        assert_eq!(sandwich.shortfall(250), 0);
    }

    #[test]
    fn test_redeem_rejects_short_balance() {
        let catalog = RewardCatalog::standard();
        let coupon = catalog.find(RewardId::new(10)).unwrap();
        assert_eq!(coupon.shortfall(250), 50);
        assert!(matches!(
            coupon.redeem(250),
            Err(RewardError::InsufficientPoints { cost: 300, balance: 250, .. })
        ));
    }

    #[test]
    fn test_unknown_reward() {
        assert_eq!(
            RewardCatalog::standard().find(RewardId::new(99)),
            Err(RewardError::NotFound(RewardId::new(99)))
        );
    }
}
