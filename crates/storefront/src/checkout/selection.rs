//! In-progress checkout selection and the choices it is made of.
//!
//! HTML forms encode "new address" and "no invoice" as reserved negative ids.
//! Those sentinels are decoded here, once, into tagged choices; nothing past
//! the form boundary sees a magic number.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shop_core::{AddressId, InvoiceAddressId, PaymentMethodId, ShippingCarrierId};

use crate::models::{AddressFields, InvoiceAddressFields};

/// Form value selecting the inline "new address" form.
pub const NEW_ADDRESS_SENTINEL: i32 = -1;
/// Form value selecting "use the shipping address for the invoice".
pub const NO_INVOICE_SENTINEL: i32 = -1;
/// Form value selecting the inline "new invoice address" form.
pub const NEW_INVOICE_SENTINEL: i32 = -2;

/// Which shipping address the order ships to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AddressChoice {
    /// A stored address owned by the user.
    Existing(AddressId),
    /// A new address typed into the inline form, saved on submit.
    New,
    /// The user's favorite address, or a new one if the user has none.
    UseFavorite,
}

impl AddressChoice {
    /// Decode the `address_id` form value.
    ///
    /// Returns `None` when the value is absent or `0`, meaning "keep the
    /// current choice".
    #[must_use]
    pub fn from_form_value(value: Option<i32>) -> Option<Self> {
        match value? {
            NEW_ADDRESS_SENTINEL => Some(Self::New),
            id if id > 0 => Some(Self::Existing(AddressId::new(id))),
            _ => None,
        }
    }

    /// Encode back into the form value used by the address `<select>`.
    #[must_use]
    pub const fn form_value(&self) -> Option<i32> {
        match self {
            Self::Existing(id) => Some(id.as_i32()),
            Self::New => Some(NEW_ADDRESS_SENTINEL),
            Self::UseFavorite => None,
        }
    }
}

/// Which invoice address, if any, the order is billed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InvoiceChoice {
    /// No separate invoice address; the shipping address is used.
    #[default]
    None,
    /// A new invoice address typed into the inline form, saved on submit.
    New,
    /// A stored invoice address owned by the user.
    Existing(InvoiceAddressId),
}

impl InvoiceChoice {
    /// Decode the `invoice_address_id` form value.
    ///
    /// `-1` means no invoice, any other negative value means a new invoice
    /// address. Absent or `0` returns `None` ("keep the current choice").
    #[must_use]
    pub fn from_form_value(value: Option<i32>) -> Option<Self> {
        match value? {
            NO_INVOICE_SENTINEL => Some(Self::None),
            id if id < 0 => Some(Self::New),
            0 => None,
            id => Some(Self::Existing(InvoiceAddressId::new(id))),
        }
    }

    /// Encode back into the form value used by the invoice `<select>`.
    #[must_use]
    pub const fn form_value(&self) -> i32 {
        match self {
            Self::None => NO_INVOICE_SENTINEL,
            Self::New => NEW_INVOICE_SENTINEL,
            Self::Existing(id) => id.as_i32(),
        }
    }

    /// Whether the invoice form is shown (and its fields required).
    #[must_use]
    pub const fn shows_form(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Running totals of the checkout, tax included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub price: Decimal,
    pub taxes: Decimal,
}

/// Everything the shopper has picked or typed so far.
///
/// Serializable so the HTTP layer can keep it in the session between
/// requests. `totals` is a cache for rendering only and is recomputed
/// whenever a flow is resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub address_choice: AddressChoice,
    pub address: AddressFields,
    pub invoice_choice: InvoiceChoice,
    pub invoice_address: InvoiceAddressFields,
    pub shipping_carrier_id: Option<ShippingCarrierId>,
    pub payment_method_id: Option<PaymentMethodId>,
    #[serde(default)]
    pub totals: Totals,
}

impl Default for CheckoutSelection {
    fn default() -> Self {
        Self {
            address_choice: AddressChoice::UseFavorite,
            address: AddressFields::default(),
            invoice_choice: InvoiceChoice::None,
            invoice_address: InvoiceAddressFields::default(),
            shipping_carrier_id: None,
            payment_method_id: None,
            totals: Totals::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_choice_from_form_value() {
        assert_eq!(
            AddressChoice::from_form_value(Some(-1)),
            Some(AddressChoice::New)
        );
        assert_eq!(
            AddressChoice::from_form_value(Some(12)),
            Some(AddressChoice::Existing(AddressId::new(12)))
        );
        assert_eq!(AddressChoice::from_form_value(None), None);
        assert_eq!(AddressChoice::from_form_value(Some(0)), None);
        assert_eq!(AddressChoice::from_form_value(Some(-7)), None);
    }

    #[test]
    fn test_invoice_choice_from_form_value() {
        assert_eq!(
            InvoiceChoice::from_form_value(Some(-1)),
            Some(InvoiceChoice::None)
        );
        assert_eq!(
            InvoiceChoice::from_form_value(Some(-2)),
            Some(InvoiceChoice::New)
        );
        assert_eq!(
            InvoiceChoice::from_form_value(Some(5)),
            Some(InvoiceChoice::Existing(InvoiceAddressId::new(5)))
        );
        assert_eq!(InvoiceChoice::from_form_value(Some(0)), None);
        assert_eq!(InvoiceChoice::from_form_value(None), None);
    }

    #[test]
    fn test_form_values_round_trip() {
        for choice in [
            InvoiceChoice::None,
            InvoiceChoice::New,
            InvoiceChoice::Existing(InvoiceAddressId::new(3)),
        ] {
            assert_eq!(
                InvoiceChoice::from_form_value(Some(choice.form_value())),
                Some(choice)
            );
        }
        assert_eq!(AddressChoice::UseFavorite.form_value(), None);
    }

    #[test]
    fn test_shows_form() {
        assert!(!InvoiceChoice::None.shows_form());
        assert!(InvoiceChoice::New.shows_form());
        assert!(InvoiceChoice::Existing(InvoiceAddressId::new(1)).shows_form());
    }

    #[test]
    fn test_selection_survives_session_serialization() {
        let selection = CheckoutSelection {
            address_choice: AddressChoice::Existing(AddressId::new(4)),
            invoice_choice: InvoiceChoice::New,
            shipping_carrier_id: Some(ShippingCarrierId::new(2)),
            ..CheckoutSelection::default()
        };
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["address_choice"]["kind"], "existing");
        assert_eq!(json["address_choice"]["id"], 4);
        let back: CheckoutSelection = serde_json::from_value(json).unwrap();
        assert_eq!(back, selection);
    }
}
