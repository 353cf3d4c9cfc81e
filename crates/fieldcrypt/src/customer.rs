//! Transparent encryption of a customer's address column.
//!
//! The address is written to [`Customer::address_raw`] as an envelope and
//! read back on demand into [`Customer::address`].

use std::sync::Arc;

use common::{Customer, CustomerAddress};

use crate::codec::{CodecError, FieldCodec};
use crate::secret::SecretProvider;

/// Accessor pair for the encrypted `addressRaw` column of [`Customer`].
#[derive(Debug)]
pub struct AddressField {
    codec: FieldCodec<CustomerAddress>,
}

impl AddressField {
    pub fn new(provider: Arc<dyn SecretProvider>) -> Self {
        Self {
            codec: FieldCodec::new(provider),
        }
    }

    /// Set the customer's address, replacing the stored envelope.
    ///
    /// `None` clears both the envelope and the materialised value.
    ///
    /// # Errors
    ///
    /// Returns the codec error if the address cannot be encrypted; the
    /// customer is left unchanged.
    pub fn write(
        &self,
        customer: &mut Customer,
        address: Option<CustomerAddress>,
    ) -> Result<(), CodecError> {
        customer.address_raw = self.codec.encrypt_object(address.as_ref())?;
        customer.address = address;
        Ok(())
    }

    /// Return the customer's address, decrypting the stored envelope if it has
    /// not been materialised yet.
    ///
    /// A corrupt envelope reads as no address (see
    /// [`FieldCodec::decrypt_object`]).
    pub fn read<'a>(&self, customer: &'a mut Customer) -> Option<&'a CustomerAddress> {
        let existing = customer.address.take();
        customer.address = self
            .codec
            .decrypt_object(customer.id, existing, customer.address_raw.as_deref());
        customer.address.as_ref()
    }
}
