// Notification pipeline
//
// Delivery: three-tier fallback (backend endpoint → RPC → direct insert)
// Push: external gateway, best effort
// Persistence: PostgreSQL, or in-memory when no database is configured

pub mod dispatcher;
pub mod memory;
pub mod models;
pub mod push;
pub mod repository;
pub mod store;
pub mod tiers;

pub use dispatcher::{DeliveryStrategy, NotificationDispatcher};
pub use store::NotificationStore;
