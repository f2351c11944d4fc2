//! Checkout form rules.
//!
//! Every rule is checked and every failure reported; validation never stops
//! at the first bad field.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::selection::{AddressChoice, CheckoutSelection};
use crate::models::{PaymentMethod, ShippingCarrier};

/// The rule a field broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Field is missing or blank.
    Required,
    /// Field references a record that does not exist.
    Exists,
}

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted field path, e.g. `address.zip` or `shipping_carrier_id`.
    pub field: String,
    pub rule: Rule,
}

impl FieldError {
    fn new(field: impl Into<String>, rule: Rule) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            Rule::Required => write!(f, "{} is required", self.field),
            Rule::Exists => write!(f, "selected {} does not exist", self.field),
        }
    }
}

/// The checkout form failed one or more rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("checkout form has {} invalid field(s)", .fields.len())]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Names of all failing fields, in rule order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|error| error.field.as_str()).collect()
    }

    /// Whether `field` is among the failures.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|error| error.field == field)
    }
}

/// Carrier and payment method that passed validation.
#[derive(Debug, Clone, Copy)]
pub struct Validated<'a> {
    pub shipping_carrier: &'a ShippingCarrier,
    pub payment_method: &'a PaymentMethod,
}

/// Check the selection against the rule table.
///
/// `shipping_carrier` and `payment_method` are the records found for the
/// selected ids (enabled or not); `None` means the lookup missed.
///
/// # Errors
///
/// Returns `ValidationError` listing every failing field.
pub fn validate_selection<'a>(
    selection: &CheckoutSelection,
    shipping_carrier: Option<&'a ShippingCarrier>,
    payment_method: Option<&'a PaymentMethod>,
) -> Result<Validated<'a>, ValidationError> {
    let mut errors = Vec::new();

    if selection.address_choice == AddressChoice::UseFavorite {
        errors.push(FieldError::new("address_id", Rule::Required));
    }
    require_all("address", &selection.address.named_values(), &mut errors);

    if selection.invoice_choice.shows_form() {
        require_all(
            "invoice_address",
            &selection.invoice_address.named_values(),
            &mut errors,
        );
    }

    let shipping_carrier = check_reference(
        "shipping_carrier_id",
        selection.shipping_carrier_id.is_some(),
        shipping_carrier,
        &mut errors,
    );
    let payment_method = check_reference(
        "payment_method_id",
        selection.payment_method_id.is_some(),
        payment_method,
        &mut errors,
    );

    match (shipping_carrier, payment_method) {
        (Some(shipping_carrier), Some(payment_method)) if errors.is_empty() => Ok(Validated {
            shipping_carrier,
            payment_method,
        }),
        _ => Err(ValidationError { fields: errors }),
    }
}

fn require_all(prefix: &str, values: &[(&'static str, &str)], errors: &mut Vec<FieldError>) {
    errors.extend(
        values
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| FieldError::new(format!("{prefix}.{name}"), Rule::Required)),
    );
}

fn check_reference<'a, T>(
    field: &str,
    selected: bool,
    record: Option<&'a T>,
    errors: &mut Vec<FieldError>,
) -> Option<&'a T> {
    if !selected {
        errors.push(FieldError::new(field, Rule::Required));
        return None;
    }
    if record.is_none() {
        errors.push(FieldError::new(field, Rule::Exists));
    }
    record
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shop_core::{AddressId, PaymentMethodId, ShippingCarrierId};

    use super::*;
    use crate::checkout::selection::InvoiceChoice;
    use crate::models::{AddressFields, InvoiceAddressFields};

    fn filled_address() -> AddressFields {
        AddressFields {
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            country: "GB".to_string(),
            region: "London".to_string(),
            city: "London".to_string(),
            address: "12 St James's Square".to_string(),
            zip: "SW1Y 4JH".to_string(),
            phone: "+44 20 7946 0000".to_string(),
        }
    }

    fn filled_invoice() -> InvoiceAddressFields {
        InvoiceAddressFields {
            vat: "GB123456789".to_string(),
            name: "Analytical Engines Ltd".to_string(),
            phone: "+44 20 7946 0001".to_string(),
            country: "GB".to_string(),
            address: "1 Engine Row".to_string(),
            region: "London".to_string(),
            city: "London".to_string(),
            zip: "EC1A 1BB".to_string(),
        }
    }

    fn carrier() -> ShippingCarrier {
        ShippingCarrier {
            id: ShippingCarrierId::new(1),
            name: "Courier".to_string(),
            price: Decimal::from(5),
            enabled: false,
        }
    }

    fn payment() -> PaymentMethod {
        PaymentMethod {
            id: PaymentMethodId::new(1),
            name: "Card".to_string(),
            price: Decimal::from(2),
            enabled: true,
        }
    }

    fn complete_selection() -> CheckoutSelection {
        CheckoutSelection {
            address_choice: AddressChoice::Existing(AddressId::new(1)),
            address: filled_address(),
            shipping_carrier_id: Some(ShippingCarrierId::new(1)),
            payment_method_id: Some(PaymentMethodId::new(1)),
            ..CheckoutSelection::default()
        }
    }

    #[test]
    fn test_complete_selection_passes() {
        let (carrier, payment) = (carrier(), payment());
        let validated =
            validate_selection(&complete_selection(), Some(&carrier), Some(&payment)).unwrap();
        // Existence only: a disabled carrier still validates.
        assert_eq!(validated.shipping_carrier.id, carrier.id);
        assert_eq!(validated.payment_method.id, payment.id);
    }

    #[test]
    fn test_reports_every_failing_field() {
        let selection = CheckoutSelection {
            address_choice: AddressChoice::New,
            ..CheckoutSelection::default()
        };
        let err = validate_selection(&selection, None, None).unwrap_err();
        assert_eq!(
            err.field_names(),
            vec![
                "address.firstname",
                "address.lastname",
                "address.country",
                "address.region",
                "address.city",
                "address.address",
                "address.zip",
                "address.phone",
                "shipping_carrier_id",
                "payment_method_id",
            ]
        );
        assert!(err.fields.iter().all(|field| field.rule == Rule::Required));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let mut selection = complete_selection();
        selection.address.zip = "   ".to_string();
        let (carrier, payment) = (carrier(), payment());
        let err = validate_selection(&selection, Some(&carrier), Some(&payment)).unwrap_err();
        assert_eq!(err.field_names(), vec!["address.zip"]);
    }

    #[test]
    fn test_invoice_fields_relaxed_without_invoice() {
        let selection = CheckoutSelection {
            invoice_choice: InvoiceChoice::None,
            ..complete_selection()
        };
        let (carrier, payment) = (carrier(), payment());
        assert!(validate_selection(&selection, Some(&carrier), Some(&payment)).is_ok());
    }

    #[test]
    fn test_invoice_fields_required_with_invoice_form() {
        let mut selection = CheckoutSelection {
            invoice_choice: InvoiceChoice::New,
            ..complete_selection()
        };
        selection.invoice_address = InvoiceAddressFields {
            vat: String::new(),
            ..filled_invoice()
        };
        let (carrier, payment) = (carrier(), payment());
        let err = validate_selection(&selection, Some(&carrier), Some(&payment)).unwrap_err();
        assert_eq!(err.field_names(), vec!["invoice_address.vat"]);

        selection.invoice_address = filled_invoice();
        assert!(validate_selection(&selection, Some(&carrier), Some(&payment)).is_ok());
    }

    #[test]
    fn test_unknown_references_fail_exists_rule() {
        let err = validate_selection(&complete_selection(), None, None).unwrap_err();
        assert_eq!(
            err.fields,
            vec![
                FieldError::new("shipping_carrier_id", Rule::Exists),
                FieldError::new("payment_method_id", Rule::Exists),
            ]
        );
        assert!(err.has("shipping_carrier_id"));
        assert_eq!(err.to_string(), "checkout form has 2 invalid field(s)");
    }

    #[test]
    fn test_unresolved_favorite_is_flagged() {
        let selection = CheckoutSelection {
            address_choice: AddressChoice::UseFavorite,
            ..complete_selection()
        };
        let (carrier, payment) = (carrier(), payment());
        let err = validate_selection(&selection, Some(&carrier), Some(&payment)).unwrap_err();
        assert_eq!(err.field_names(), vec!["address_id"]);
    }

    #[test]
    fn test_field_error_display() {
        assert_eq!(
            FieldError::new("address.city", Rule::Required).to_string(),
            "address.city is required"
        );
        assert_eq!(
            FieldError::new("payment_method_id", Rule::Exists).to_string(),
            "selected payment_method_id does not exist"
        );
    }
}
