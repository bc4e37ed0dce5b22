//! # Balance Admin Shared Library
//!
//! Data layer and domain logic behind the balance admin console.
//!
//! ## Module Organization
//!
//! - `db`: connection pool, error classification, resilient executor, migrations
//! - `models`: users and transactions
//! - `ledger`: atomic credit/debit adjustments with an audit record
//! - `query`: paginated, sortable user listing

pub mod db;
pub mod ledger;
pub mod models;
pub mod query;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
