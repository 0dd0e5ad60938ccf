//! Cart commands.

use rust_decimal::Decimal;

use cafe_loyalty_client::AppState;
use cafe_loyalty_core::{
    CartLineItem, CategoryId, Customization, CustomizationId, Price, ProductId,
};

use super::{CliError, out, settle};

/// Arguments of `cart add`.
pub struct AddItem {
    pub product_id: i32,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    /// Spelled-out customizations.
    pub options: Vec<String>,
    /// `kind=option_id` picks resolved against the menu.
    pub picks: Vec<String>,
}

/// Print every line, its customizations and the totals.
pub fn list(state: &AppState) -> Result<(), CliError> {
    let cart = state.cart().snapshot();
    if cart.is_empty() {
        return out("Your cart is empty");
    }

    for (n, item) in cart.items().iter().enumerate() {
        out(format!(
            "{:>2}. {} x{}  {}  = {}  [product {}]",
            n + 1,
            item.product_name,
            item.quantity,
            item.price().display(),
            Price::from_amount(item.line_total()).display(),
            item.product_id,
        ))?;
        for c in &item.customizations {
            out(format!("      {}: {}", c.kind, c.name))?;
        }
    }
    out(format!(
        "Items: {}   Total: {}",
        cart.item_count(),
        Price::from_amount(cart.total()).display()
    ))
}

pub async fn add(state: &AppState, args: AddItem) -> Result<(), CliError> {
    let product_id = ProductId::new(args.product_id);

    let item = if args.picks.is_empty() {
        let customizations = args
            .options
            .iter()
            .map(|o| parse_customization(o))
            .collect::<Result<Vec<_>, _>>()?;
        CartLineItem::new(product_id, args.name, args.price, args.quantity)
            .with_customizations(customizations)
    } else {
        let options = state
            .backend()?
            .ingredients_for_product(product_id)
            .await?;
        let mut customizer = options.customizer(product_id, args.name, args.price);
        for pick in &args.picks {
            let (kind, id) = parse_pick(pick)?;
            let option = options.find(kind, id).ok_or_else(|| {
                CliError::InvalidArgument(format!("no active '{kind}' option with id {id}"))
            })?;
            customizer.select(kind, option.to_customization())?;
        }
        let mut item = customizer.build();
        item.quantity = args.quantity;
        item
    };

    let summary = format!("Added {} x{}", item.product_name, item.quantity);
    settle(state.cart().add_to_cart(item)?).await;
    out(summary)?;
    list(state)
}

pub async fn remove(state: &AppState, product_id: i32) -> Result<(), CliError> {
    settle(state.cart().remove_from_cart(ProductId::new(product_id))).await;
    list(state)
}

pub async fn update(state: &AppState, product_id: i32, quantity: i64) -> Result<(), CliError> {
    settle(
        state
            .cart()
            .update_quantity(ProductId::new(product_id), quantity),
    )
    .await;
    list(state)
}

pub async fn clear(state: &AppState) -> Result<(), CliError> {
    settle(state.cart().clear_cart()).await;
    out("Cart cleared")
}

/// Parse `id:name:kind:category_id:category_name`.
fn parse_customization(s: &str) -> Result<Customization, CliError> {
    let invalid = || {
        CliError::InvalidArgument(format!(
            "'{s}' is not id:name:kind:category_id:category_name"
        ))
    };

    let mut parts = s.splitn(5, ':');
    let mut next = || parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid);

    let id: i32 = next()?.parse().map_err(|_| invalid())?;
    let name = next()?.to_string();
    let kind = next()?.to_string();
    let category_id: i32 = next()?.parse().map_err(|_| invalid())?;
    let category_name = next()?.to_string();

    Ok(Customization {
        id: CustomizationId::new(id),
        name,
        kind,
        category_id: CategoryId::new(category_id),
        category_name,
    })
}

/// Parse `kind=option_id`.
fn parse_pick(s: &str) -> Result<(&str, CustomizationId), CliError> {
    let invalid = || CliError::InvalidArgument(format!("'{s}' is not kind=option_id"));
    let (kind, id) = s.split_once('=').ok_or_else(invalid)?;
    let id: i32 = id.trim().parse().map_err(|_| invalid())?;
    Ok((kind.trim(), CustomizationId::new(id)))
}
