//! Customer records and the address value stored encrypted alongside them.
//!
//! The address is persisted as an opaque text column (`addressRaw`); its
//! identity is the owning customer's id and is never part of the serialised
//! form.

use serde::{Deserialize, Serialize};

/// A value whose identity is carried separately from its serialised content.
///
/// Implemented by every type that is stored inside an encrypted envelope: the
/// envelope holds only the content, and the identity is re-attached after
/// decryption.
pub trait Identified {
    /// Attach `id` to this value.
    fn set_id(&mut self, id: i64);
}

/// Postal address of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAddress {
    /// Identity of the owning customer. Never serialised.
    #[serde(skip)]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Identified for CustomerAddress {
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

/// A customer row as persisted.
///
/// `address_raw` is the stored column holding the encrypted address envelope;
/// `address` is the materialised value, populated on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub telephone: Option<String>,

    /// Hex-encoded address envelope, or `None` when no address is stored.
    #[serde(default)]
    pub address_raw: Option<String>,

    /// Decrypted address. Not persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<CustomerAddress>,
}

impl Customer {
    /// Create an empty customer with the given id.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}
