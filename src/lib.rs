//! Lifecycle-and-ledger coordination core for a farmer/buyer marketplace.
//!
//! Four entities — harvests, loans, tokens and transactions — each owned by
//! one lifecycle service that enforces its status machine. Transitions that
//! represent a value movement append a ledger entry through the
//! [`ledger::Ledger`] seam; those secondary writes are best-effort and never
//! roll back the primary transition. The HTTP layer, auth and input-shape
//! validation live outside this crate.

pub mod error;
pub mod harvest;
pub mod harvest_service;
pub mod ledger;
pub mod loan;
pub mod loan_service;
pub mod market;
pub mod minting;
pub mod store;
pub mod token;
pub mod token_service;
pub mod transaction;
pub mod types;
pub mod utils;
