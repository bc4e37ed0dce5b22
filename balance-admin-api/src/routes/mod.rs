/// API route handlers
///
/// - `health`: liveness and health checks
/// - `users`: paginated user listing
/// - `balance`: credit and debit

pub mod balance;
pub mod health;
pub mod users;
