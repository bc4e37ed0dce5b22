/// Development data seeding
///
/// Fills an empty database with random users and a history of transactions
/// so the admin table has something to page through. Everything is inserted
/// in one transaction run through the executor; a failure leaves no partial
/// data behind.
///
/// Seeded transactions are history only: they do not move balances, the same
/// way imported records would not.

use crate::db::error::StoreError;
use crate::db::executor::{Executor, UnitOfWork};
use crate::models::transaction::{CreateTransaction, Transaction, TransactionType};
use crate::models::user::{CreateUser, User};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

const DESCRIPTIONS: &[&str] = &[
    "Deposit via bank transfer",
    "Withdrawal to card",
    "Promotional bonus",
    "Manual correction",
    "Refund for order",
    "Monthly fee",
];

const NAME_PARTS: &[&str] = &[
    "river", "stone", "maple", "ember", "frost", "cedar", "lumen", "orbit", "pixel", "quill",
];

/// How much data to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPlan {
    pub users: usize,
    pub transactions: usize,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            users: 50,
            transactions: 200,
        }
    }
}

/// Row counts written by a seeding run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub transactions: usize,
}

/// Random amount in cents between `min_cents` and `max_cents`, inclusive
fn random_amount(rng: &mut impl Rng, min_cents: i64, max_cents: i64) -> Decimal {
    Decimal::new(rng.gen_range(min_cents..=max_cents), 2)
}

fn random_user(rng: &mut impl Rng) -> CreateUser {
    let first = NAME_PARTS.choose(rng).copied().unwrap_or("user");
    let second = NAME_PARTS.choose(rng).copied().unwrap_or("account");
    // Suffix keeps usernames and emails unique across runs
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    let username = format!("{}_{}_{}", first, second, suffix);

    CreateUser {
        email: format!("{}@example.com", username),
        username,
        password: None,
        balance: random_amount(rng, 0, 1_000_000),
    }
}

#[async_trait]
impl UnitOfWork for SeedPlan {
    type Output = SeedReport;
    type Error = StoreError;

    fn name(&self) -> &'static str {
        "db.seed"
    }

    async fn execute(&self, conn: &mut PgConnection) -> Result<SeedReport, StoreError> {
        // Generate up front: ThreadRng must not be held across an await
        let (users, picks) = {
            let mut rng = rand::thread_rng();
            let users: Vec<CreateUser> = (0..self.users).map(|_| random_user(&mut rng)).collect();
            let picks: Vec<(usize, TransactionType, Decimal, String)> = if users.is_empty() {
                Vec::new()
            } else {
                (0..self.transactions)
                    .map(|_| {
                        let kind = if rng.gen_bool(0.5) {
                            TransactionType::Credit
                        } else {
                            TransactionType::Debit
                        };
                        let description = DESCRIPTIONS.choose(&mut rng).copied().unwrap_or("Adjustment");
                        (
                            rng.gen_range(0..users.len()),
                            kind,
                            random_amount(&mut rng, 100, 100_000),
                            description.to_string(),
                        )
                    })
                    .collect()
            };
            (users, picks)
        };

        let mut user_ids = Vec::with_capacity(users.len());
        for user in users {
            let created = User::create(&mut *conn, user).await?;
            user_ids.push(created.id);
        }

        for (index, kind, amount, description) in &picks {
            Transaction::create(
                &mut *conn,
                CreateTransaction {
                    user_id: user_ids[*index],
                    kind: *kind,
                    amount: *amount,
                    description: Some(description.clone()),
                },
            )
            .await?;
        }

        Ok(SeedReport {
            users: user_ids.len(),
            transactions: picks.len(),
        })
    }
}

/// Inserts random users and transactions in a single transaction
pub async fn seed_database(executor: &Executor, plan: SeedPlan) -> Result<SeedReport, StoreError> {
    let report = executor.run_in_transaction(&plan).await?;
    info!(users = report.users, transactions = report.transactions, "Database seeded");
    Ok(report)
}
