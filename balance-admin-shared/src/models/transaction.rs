/// Transaction model: the audit trail of balance adjustments
///
/// One row is written per committed adjustment, in the same database
/// transaction as the balance change. Rows are never updated or deleted by
/// the application (they go away only with their user, via cascade).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE transaction_type AS ENUM ('credit', 'debit');
///
/// CREATE TABLE transactions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     type transaction_type NOT NULL,
///     amount NUMERIC(15, 2) NOT NULL CHECK (amount > 0),
///     description TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::fmt;
use uuid::Uuid;

/// Direction of a balance adjustment
///
/// The amount is always positive; the direction alone decides whether it is
/// added or subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Adds to the balance
    Credit,

    /// Subtracts from the balance, never below zero
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one committed balance adjustment
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,

    pub user_id: Uuid,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// Strictly positive
    pub amount: Decimal,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Input for recording an adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub user_id: Uuid,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl Transaction {
    /// Appends a transaction row
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if the user does not exist.
    pub async fn create(
        conn: &mut PgConnection,
        data: CreateTransaction,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, type, amount, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, type, amount, description, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.kind)
        .bind(data.amount)
        .bind(data.description)
        .fetch_one(conn)
        .await
    }

    /// Lists a user's transactions, newest first
    pub async fn list_by_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, type, amount, description, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
    }

    /// Counts a user's transactions
    pub async fn count_by_user(conn: &mut PgConnection, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(conn)
            .await?;

        Ok(count)
    }
}
