use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a UUID-backed identifier newtype.
///
/// Each generated type is `Copy`, hashes and serializes as the bare UUID,
/// and cannot be confused with any of the other identifier types.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an order.
    OrderId
}

define_id! {
    /// Unique identifier for a single line item within an order.
    OrderItemId
}

define_id! {
    /// Unique identifier for a store.
    StoreId
}

define_id! {
    /// Unique identifier for a user (the customer placing orders).
    UserId
}

define_id! {
    /// Unique identifier for a product.
    ProductId
}

define_id! {
    /// Unique identifier for a product variant.
    ///
    /// Inventory is tracked per variant, not per product.
    VariantId
}

define_id! {
    /// Unique identifier for an inventory record.
    InventoryId
}
