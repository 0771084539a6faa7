//! Order totals, order codes and the records sent to the order API.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;

use tradepost_core::{
    AccountType, AddressDetails, CartId, CartItem, CheckoutDetails, CustomerId, OrderCode,
};

use super::validate::{CheckoutRequest, ValidatedCheckout};

const ORDER_CODE_PREFIX: &str = "ORD";

/// Sum of line totals plus the numeric delivery fee.
#[must_use]
pub fn calculate_total(items: &[CartItem], delivery_fee: Decimal) -> Decimal {
    items.iter().map(CartItem::line_total).sum::<Decimal>() + delivery_fee
}

/// A new order code: prefix, the low eight digits of the millisecond clock and
/// a three-digit random suffix.
///
/// Codes are not guaranteed unique; two orders in the same millisecond have a
/// one in a thousand chance of colliding.
#[must_use]
pub fn generate_order_code() -> OrderCode {
    let millis = Utc::now().timestamp_millis().rem_euclid(100_000_000);
    let suffix: u16 = rand::rng().random_range(0..1000);
    OrderCode::new(format!("{ORDER_CODE_PREFIX}{millis:08}{suffix:03}"))
}

/// Everything needed to build the order records.
pub struct OrderDraft<'a> {
    pub cart_id: CartId,
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub items: &'a [CartItem],
    pub request: &'a CheckoutRequest,
    pub validated: &'a ValidatedCheckout,
}

impl OrderDraft<'_> {
    /// Build the checkout and address records under a fresh order code.
    #[must_use]
    pub fn build(&self) -> (CheckoutDetails, AddressDetails) {
        let order_code = generate_order_code();
        let total_amount = calculate_total(self.items, self.validated.delivery.fee());
        let order_note = self.request.order_note.clone().unwrap_or_default();
        let recipient = &self.validated.recipient;

        let checkout = CheckoutDetails {
            cart_id: self.cart_id.clone(),
            customer_id: self.customer_id.clone(),
            order_code: order_code.clone(),
            payment_mode: self.validated.payment_method,
            payment_account_number: self.request.payment_account_number.clone(),
            customer_account_type: self.account_type,
            total_amount,
            recipient_name: recipient.name.clone(),
            recipient_contact_number: recipient.contact_number.clone(),
            order_note: order_note.clone(),
            order_date: Utc::now(),
        };

        let address = AddressDetails {
            order_code,
            address: self.validated.delivery.address(),
            customer_id: self.customer_id.clone(),
            recipient_name: recipient.name.clone(),
            recipient_contact_number: recipient.contact_number.clone(),
            order_note,
            geo_location: self.request.geo_location.clone(),
        };

        (checkout, address)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tradepost_core::{DeliveryInfo, PaymentMethod, TableFee};

    use super::super::validate::Recipient;
    use super::*;

    fn items() -> Vec<CartItem> {
        vec![
            CartItem::new("A", "Kente Cloth", Decimal::from(100), 2),
            CartItem::new("B", "Beads", Decimal::from(50), 1),
        ]
    }

    #[test]
    fn test_total_with_free_delivery() {
        assert_eq!(
            calculate_total(&items(), TableFee::Free.amount()),
            Decimal::from(250)
        );
    }

    #[test]
    fn test_total_with_fee() {
        assert_eq!(
            calculate_total(&items(), Decimal::new(255, 1)),
            Decimal::new(2755, 1)
        );
        assert_eq!(calculate_total(&[], Decimal::from(20)), Decimal::from(20));
    }

    #[test]
    fn test_order_code_shape() {
        let code = generate_order_code();
        let code = code.as_str();
        assert!(code.starts_with("ORD"));
        assert_eq!(code.len(), 3 + 8 + 3);
        assert!(code[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_records_share_order_code() {
        let items = items();
        let request = CheckoutRequest {
            order_note: Some("Call on arrival".to_string()),
            geo_location: Some("5.6037,-0.1870".to_string()),
            ..Default::default()
        };
        let validated = ValidatedCheckout {
            recipient: Recipient {
                name: "Ama Mensah".to_string(),
                contact_number: "0241234567".to_string(),
            },
            delivery: DeliveryInfo::RegionTown {
                region: "Greater Accra".to_string(),
                town: "Tema".to_string(),
                fee: TableFee::Amount(Decimal::from(20)),
            },
            payment_method: PaymentMethod::CashOnDelivery,
        };

        let (checkout, address) = OrderDraft {
            cart_id: CartId::new("cart-1"),
            customer_id: CustomerId::new("c-1"),
            account_type: AccountType::Customer,
            items: &items,
            request: &request,
            validated: &validated,
        }
        .build();

        assert_eq!(checkout.order_code, address.order_code);
        assert_eq!(checkout.total_amount, Decimal::from(270));
        assert_eq!(address.address, "Tema (Greater Accra)");
        assert_eq!(address.order_note, "Call on arrival");
        assert_eq!(checkout.order_note, "Call on arrival");
    }
}
