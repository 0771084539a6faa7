//! Delivery commands.

use rust_decimal::Decimal;

use tradepost_core::{AccountType, DeliveryInfo};
use tradepost_storefront::delivery::{DeliveryError, TownMatch};

use super::Local;

/// Print every region with its towns and fees.
#[allow(clippy::print_stdout)]
pub fn regions(ctx: &Local) {
    for region in ctx.delivery.table().regions() {
        println!("{}", region.name);
        for town in &region.towns {
            println!("  {:<24} {}", town.town, town.delivery_fee.display());
        }
    }
}

/// Print towns matching `query`.
#[allow(clippy::print_stdout)]
pub fn search(ctx: &Local, query: &str) {
    let matches = ctx.delivery.search(query);
    if matches.is_empty() {
        println!("No towns match \"{query}\"");
        return;
    }
    for TownMatch { region, town, fee } in matches {
        println!("{town:<24} {region:<20} {}", fee.display());
    }
}

/// Deliver to a town from the fee table.
///
/// # Errors
///
/// Returns `DeliveryError` if the region or town is unknown.
pub fn select(ctx: &Local, region: &str, town: &str) -> Result<(), DeliveryError> {
    let info = ctx.delivery.select_by_region_town(region, town)?;
    print_selection(&info);
    Ok(())
}

/// Deliver to a free-text address. The fee only sticks for agent profiles.
///
/// # Errors
///
/// Returns `DeliveryError::EmptyAddress` for blank text.
pub fn manual(ctx: &Local, address: &str, fee: Option<Decimal>) -> Result<(), DeliveryError> {
    let account_type = ctx
        .profile()
        .map_or(AccountType::Customer, |p| p.account_type);
    if fee.is_some() && !account_type.is_agent() {
        tracing::warn!("Only agents can set a delivery fee; ignoring --fee");
    }

    let info = ctx.delivery.select_manual(address, fee, account_type)?;
    print_selection(&info);
    Ok(())
}

/// Print the current selection.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Local) {
    match ctx.delivery.current(ctx.profile().as_ref()) {
        Some(info) => print_selection(&info),
        None => println!("No delivery address selected"),
    }
}

#[allow(clippy::print_stdout)]
fn print_selection(info: &DeliveryInfo) {
    println!("Deliver to: {}", info.address());
    println!("Fee:        {}", info.fee_display());
}
