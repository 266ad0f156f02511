//! Shared types for the commerce platform.
//!
//! Identifier newtypes keep the many UUID-keyed entities (orders, items,
//! stores, users, products, variants, inventory records) from being mixed
//! up at compile time. [`Money`] carries all amounts as integer cents.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{InventoryId, OrderId, OrderItemId, ProductId, StoreId, UserId, VariantId};
