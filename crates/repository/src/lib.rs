//! Storage adapters for the commerce core.
//!
//! Two implementations of the domain's repository ports:
//! - [`InMemoryRepository`]: lock-guarded maps, used by tests and by the
//!   server when no database is configured
//! - [`PostgresRepository`]: sqlx-backed, with row locking for inventory
//!   adjustments and a single transaction around order creation

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
