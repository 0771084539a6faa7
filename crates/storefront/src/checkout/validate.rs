//! Checkout form validation.

use rand::Rng;

use tradepost_core::{CustomerProfile, DeliveryInfo, PaymentMethod};

use super::{Field, ValidationError};

/// Contact number used when neither the form nor the profile has one.
pub const FALLBACK_CONTACT_NUMBER: &str = "0000000000";

/// What the customer filled in on the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub recipient_name: Option<String>,
    pub recipient_contact_number: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    /// Mobile money number or card reference, if any.
    pub payment_account_number: Option<String>,
    pub order_note: Option<String>,
    pub geo_location: Option<String>,
}

/// Who receives the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub contact_number: String,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    pub recipient: Recipient,
    pub delivery: DeliveryInfo,
    pub payment_method: PaymentMethod,
}

/// Fill recipient name and number from the form, then the profile, then
/// placeholders. Never fails.
#[must_use]
pub fn resolve_recipient(
    request: &CheckoutRequest,
    profile: Option<&CustomerProfile>,
) -> Recipient {
    let name = non_blank(request.recipient_name.as_deref())
        .or_else(|| non_blank(profile.and_then(|p| p.full_name.as_deref())))
        .map_or_else(guest_name, str::to_string);

    let contact_number = non_blank(request.recipient_contact_number.as_deref())
        .or_else(|| non_blank(profile.and_then(|p| p.contact_number.as_deref())))
        .unwrap_or(FALLBACK_CONTACT_NUMBER)
        .to_string();

    Recipient {
        name,
        contact_number,
    }
}

/// Validate a checkout request.
///
/// Recipient fields are filled in first, so only the delivery address and the
/// payment method can be reported missing.
///
/// # Errors
///
/// Returns `ValidationError` listing every missing field.
pub fn validate(
    request: &CheckoutRequest,
    profile: Option<&CustomerProfile>,
    delivery: Option<&DeliveryInfo>,
) -> Result<ValidatedCheckout, ValidationError> {
    let recipient = resolve_recipient(request, profile);

    let delivery = delivery.filter(|d| !d.address().trim().is_empty());

    let mut missing = Vec::new();
    if delivery.is_none() {
        missing.push(Field::Address);
    }
    if request.payment_method.is_none() {
        missing.push(Field::PaymentMethod);
    }

    match (delivery, request.payment_method) {
        (Some(delivery), Some(payment_method)) => Ok(ValidatedCheckout {
            recipient,
            delivery: delivery.clone(),
            payment_method,
        }),
        _ => Err(ValidationError { missing }),
    }
}

fn guest_name() -> String {
    let suffix: u16 = rand::rng().random_range(1000..=9999);
    format!("Guest {suffix}")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
