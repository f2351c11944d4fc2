//! Shipping and invoice address domain types.

use serde::{Deserialize, Serialize};

use shop_core::{AddressId, InvoiceAddressId, UserId};

/// Editable fields of a shipping address.
///
/// Also used as the form payload, so every field defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressFields {
    pub firstname: String,
    pub lastname: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub region: String,
    pub city: String,
    /// Street and house number.
    pub address: String,
    pub zip: String,
    pub phone: String,
}

impl AddressFields {
    /// Field names paired with their current values, in form order.
    #[must_use]
    pub fn named_values(&self) -> [(&'static str, &str); 8] {
        [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("country", &self.country),
            ("region", &self.region),
            ("city", &self.city),
            ("address", &self.address),
            ("zip", &self.zip),
            ("phone", &self.phone),
        ]
    }
}

/// A user's stored shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub fields: AddressFields,
    /// Favorite addresses are preselected when a checkout starts.
    pub favorite: bool,
}

/// Editable fields of an invoice (billing) address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceAddressFields {
    /// VAT / tax identification number.
    pub vat: String,
    /// Company or person the invoice is addressed to.
    pub name: String,
    pub phone: String,
    pub country: String,
    pub address: String,
    pub region: String,
    pub city: String,
    pub zip: String,
}

impl InvoiceAddressFields {
    /// Field names paired with their current values, in form order.
    #[must_use]
    pub fn named_values(&self) -> [(&'static str, &str); 8] {
        [
            ("vat", &self.vat),
            ("name", &self.name),
            ("phone", &self.phone),
            ("country", &self.country),
            ("address", &self.address),
            ("region", &self.region),
            ("city", &self.city),
            ("zip", &self.zip),
        ]
    }
}

/// A user's stored invoice address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAddress {
    pub id: InvoiceAddressId,
    pub user_id: UserId,
    pub fields: InvoiceAddressFields,
}
