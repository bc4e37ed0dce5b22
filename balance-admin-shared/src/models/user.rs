/// User model and database operations
///
/// Users are created outside the admin console (sign-up flow, seeding) and are
/// only read and balance-adjusted here. The `balance` column is never written
/// directly; it changes exclusively through [`crate::ledger`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(255) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password VARCHAR(255),
///     balance NUMERIC(15, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// All operations take a `&mut PgConnection` so they can run either on a
/// pooled connection or inside a transaction opened by
/// [`crate::db::executor::Executor`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User account with its current balance
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    pub username: String,

    pub email: String,

    /// Opaque credential owned by the sign-up flow
    ///
    /// Never serialized into API responses.
    #[serde(skip_serializing, default)]
    pub password: Option<String>,

    /// Current balance, always >= 0
    pub balance: Decimal,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a user (seeding and tests)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub balance: Decimal,
}

/// Columns the user listing may be ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Username,
    Email,
    Balance,
    #[default]
    CreatedAt,
}

impl SortColumn {
    /// SQL column identifier; the only way a sort column reaches a query
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::Username => "username",
            SortColumn::Email => "email",
            SortColumn::Balance => "balance",
            SortColumn::CreatedAt => "created_at",
        }
    }

    pub const ALL: [SortColumn; 4] = [
        SortColumn::Username,
        SortColumn::Email,
        SortColumn::Balance,
        SortColumn::CreatedAt,
    ];
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortColumn::ALL
            .into_iter()
            .find(|column| column.as_sql() == s)
            .ok_or_else(|| {
                format!("Invalid enum value. Expected 'username' | 'email' | 'balance' | 'created_at', received '{}'", s)
            })
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,

    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!(
                "Invalid enum value. Expected 'asc' | 'desc', received '{}'",
                other
            )),
        }
    }
}

/// Builds the listing query from allow-listed identifiers only
///
/// `id` is appended as a tie-breaker so pages stay stable when many rows share
/// the same sort value (e.g. identical balances).
pub(crate) fn list_query_sql(sort_by: SortColumn, sort_order: SortOrder) -> String {
    format!(
        "SELECT id, username, email, password, balance, created_at \
         FROM users \
         ORDER BY {} {}, id ASC \
         LIMIT $1 OFFSET $2",
        sort_by.as_sql(),
        sort_order.as_sql()
    )
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the username or email is taken.
    pub async fn create(conn: &mut PgConnection, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, balance)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password, balance, created_at
            "#,
        )
        .bind(data.username)
        .bind(data.email)
        .bind(data.password)
        .bind(data.balance)
        .fetch_one(conn)
        .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, balance, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Checks whether a user row exists
    pub async fn exists(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(conn)
            .await
    }

    /// Adds `amount` to the balance in one statement
    ///
    /// Returns the new balance, or `None` if the user does not exist.
    pub async fn credit(
        conn: &mut PgConnection,
        id: Uuid,
        amount: Decimal,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE users
            SET balance = balance + $1
            WHERE id = $2
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Subtracts `amount` from the balance only if the balance covers it
    ///
    /// The sufficiency check and the write are one statement, so concurrent
    /// debits cannot both pass the check against the same funds. Returns the
    /// new balance, or `None` if no row matched (missing user or
    /// insufficient funds).
    pub async fn debit_if_sufficient(
        conn: &mut PgConnection,
        id: Uuid,
        amount: Decimal,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE users
            SET balance = balance - $1
            WHERE id = $2
              AND balance >= $1
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Lists one page of users ordered by an allow-listed column
    ///
    /// `limit` and `offset` are row counts; see
    /// [`crate::query::ListUsersQuery`] for the page-based form.
    pub async fn list(
        conn: &mut PgConnection,
        sort_by: SortColumn,
        sort_order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = list_query_sql(sort_by, sort_order);

        sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(conn)
            .await
    }

    /// Counts all users
    pub async fn count(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_column_parsing() {
        assert_eq!("username".parse::<SortColumn>().unwrap(), SortColumn::Username);
        assert_eq!("created_at".parse::<SortColumn>().unwrap(), SortColumn::CreatedAt);
        assert!("password".parse::<SortColumn>().is_err());
        assert!("balance; DROP TABLE users".parse::<SortColumn>().is_err());
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("DESC; --".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_sort_defaults() {
        assert_eq!(SortColumn::default(), SortColumn::CreatedAt);
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }

    #[test]
    fn test_list_query_uses_allow_listed_identifiers() {
        let sql = list_query_sql(SortColumn::Balance, SortOrder::Desc);
        assert!(sql.contains("ORDER BY balance DESC, id ASC"));
        assert!(sql.contains("LIMIT $1 OFFSET $2"));

        let sql = list_query_sql(SortColumn::Username, SortOrder::Asc);
        assert!(sql.contains("ORDER BY username ASC, id ASC"));
    }

    #[test]
    fn test_password_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: Some("secret".to_string()),
            balance: Decimal::new(1250, 2),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["balance"], "12.50");
        assert_eq!(json["username"], "alice");
    }
}
