//! Menu, branch, event and order listings.

use cafe_loyalty_client::AppState;
use cafe_loyalty_core::{Coordinates, Price, ProductId};

use super::{CliError, out};

pub async fn options(state: &AppState, product_id: i32) -> Result<(), CliError> {
    let options = state
        .backend()?
        .ingredients_for_product(ProductId::new(product_id))
        .await?;

    if options.groups.is_empty() {
        return out("This product has no options");
    }
    for group in &options.groups {
        out(format!("{}:", group.kind))?;
        for option in &group.options {
            match &option.description {
                Some(description) => out(format!("  {:>4}  {} - {description}", option.id, option.name))?,
                None => out(format!("  {:>4}  {}", option.id, option.name))?,
            }
        }
    }
    Ok(())
}

pub async fn branches(state: &AppState, near: Option<&str>) -> Result<(), CliError> {
    let backend = state.backend()?;

    if let Some(near) = near {
        let origin = parse_coordinates(near)?;
        for (branch, km) in backend.branches_near(origin).await? {
            out(format!("{km:>6.1} km  {}  {}", branch.name, branch.address.unwrap_or_default()))?;
        }
        return Ok(());
    }

    for branch in backend.branches().await?.iter() {
        out(format!(
            "{:>4}  {}  {}",
            branch.id,
            branch.name,
            branch.address.as_deref().unwrap_or_default()
        ))?;
        if let Some(hours) = &branch.opening_hours {
            out(format!("      {hours}"))?;
        }
    }
    Ok(())
}

pub async fn events(state: &AppState) -> Result<(), CliError> {
    let events = state.backend()?.events().await?;
    if events.is_empty() {
        return out("No upcoming events");
    }
    for event in events.iter() {
        let place = event
            .branch
            .as_ref()
            .map(|b| format!(" @ {}", b.name))
            .unwrap_or_default();
        out(format!(
            "{}  {}{place}",
            event.starts_at.format("%Y-%m-%d %H:%M"),
            event.title
        ))?;
    }
    Ok(())
}

pub async fn orders(state: &AppState) -> Result<(), CliError> {
    state.session().wait_until_resolved().await;
    let user_id = state.require_user()?;
    let page = state.backend()?.orders_for_user(user_id).await?;

    if page.orders.is_empty() {
        return out("No orders yet");
    }
    for order in &page.orders {
        out(format!(
            "#{}  {}  {}  {}",
            order.number,
            order.created_at.format("%Y-%m-%d"),
            order.status.label(),
            Price::from_amount(order.total).display()
        ))?;
        for item in &order.items {
            out(format!(
                "      {} x{}  {}",
                item.name,
                item.quantity,
                Price::from_amount(item.line_total()).display()
            ))?;
        }
    }
    if let Some(p) = page.pagination {
        out(format!("Page {} ({} orders)", p.page, p.total))?;
    }
    Ok(())
}

/// Parse `latitude,longitude`.
fn parse_coordinates(s: &str) -> Result<Coordinates, CliError> {
    let invalid = || CliError::InvalidArgument(format!("'{s}' is not latitude,longitude"));
    let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(Coordinates::new(latitude, longitude))
}
