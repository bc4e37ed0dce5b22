/// Database models
///
/// - `user`: user accounts and their balances
/// - `transaction`: append-only audit log of balance adjustments

pub mod transaction;
pub mod user;
