// Split ledger
//
// Allocation: equal or specified shares, exact to the cent
// Settlement: wallet debit, transaction record and status change in one unit
// Persistence: PostgreSQL, or in-memory when no database is configured

pub mod memory;
pub mod models;
pub mod repository;
pub mod service;
pub mod split;
pub mod store;

pub use service::Ledger;
pub use store::LedgerStore;
