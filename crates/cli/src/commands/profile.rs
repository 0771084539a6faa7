//! Customer profile commands.

use tradepost_core::{AccountType, CustomerId, CustomerProfile};
use tradepost_storefront::storage::{StorageError, keys};

use super::Local;

/// Save the profile used to fill in checkout defaults.
///
/// # Errors
///
/// Returns `StorageError` if the store cannot be written.
pub fn set(
    ctx: &Local,
    customer_id: String,
    full_name: Option<String>,
    contact_number: Option<String>,
    address: Option<String>,
    agent: bool,
) -> Result<(), StorageError> {
    let profile = CustomerProfile {
        customer_id: CustomerId::new(customer_id),
        full_name,
        contact_number,
        address,
        account_type: if agent {
            AccountType::Agent
        } else {
            AccountType::Customer
        },
    };
    ctx.store.insert(keys::CUSTOMER_PROFILE, &profile)?;
    tracing::info!(customer_id = %profile.customer_id, account_type = %profile.account_type, "Profile saved");
    Ok(())
}

/// Print the saved profile.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Local) {
    let Some(profile) = ctx.profile() else {
        println!("No profile saved");
        return;
    };

    println!("Customer ID:  {}", profile.customer_id);
    println!("Account type: {}", profile.account_type);
    println!("Name:         {}", profile.full_name.as_deref().unwrap_or("-"));
    println!("Phone:        {}", profile.contact_number.as_deref().unwrap_or("-"));
    println!("Address:      {}", profile.address.as_deref().unwrap_or("-"));
}
