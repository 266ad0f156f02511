//! Domain layer for the commerce platform's order and inventory core.
//!
//! This crate provides:
//! - the [`Order`] entity with its status state machine and creation input
//! - inventory levels, thresholds and stock-change evaluation
//! - the domain events published after state changes commit
//! - the repository ports storage adapters implement
//! - the [`OrdersService`] and [`InventoryService`] that orchestrate it all
//!
//! No persistence technology appears here; adapters live in the
//! `repository` crate and plug in through the ports.

pub mod error;
pub mod event;
pub mod inventory;
pub mod order;
pub mod repository;

pub use error::{DomainError, Result};
pub use event::{DomainEvent, EventSink, RecordingSink};
pub use inventory::{
    InventoryError, InventoryLevel, InventoryService, StockChange, StockThresholds,
};
pub use order::{
    Address, InventoryImpact, ItemImpact, NewOrder, NewOrderItem, Order, OrderError, OrderItem,
    OrderStatus, OrdersService, StockShortfall,
};
pub use repository::{InventoryRepository, OrderRepository, RepositoryError, RepositoryResult};
