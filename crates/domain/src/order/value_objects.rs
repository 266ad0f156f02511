//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// A postal address, snapshotted onto the order at creation.
///
/// Orders keep their own copy so that later edits to a user's address
/// book never rewrite where an existing order was shipped or billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Recipient name.
    pub full_name: String,

    /// Street address.
    pub line1: String,

    /// Apartment, suite, unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,

    /// City or locality.
    pub city: String,

    /// State, province or region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Postal or ZIP code.
    pub postal_code: String,

    /// ISO country code.
    pub country: String,
}
