/// User query service
///
/// Paginated, sortable read access to the user collection. Pagination is
/// offset based: page `p` with `limit` rows skips `(p - 1) * limit` rows.
/// Sorting is restricted to [`SortColumn`] and [`SortOrder`], which are
/// closed enums rendered into SQL by the model, never client strings.
///
/// Reads go through the [`Executor`] without a transaction, so transient
/// failures are retried like any other unit of work.

use crate::db::error::StoreError;
use crate::db::executor::{Executor, UnitOfWork};
use crate::models::user::{SortColumn, SortOrder, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// Default page size when the caller does not specify one
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// One page request against the user listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersQuery {
    /// 1-based page number
    pub page: u32,

    /// Rows per page, at least 1
    pub limit: u32,

    pub sort_by: SortColumn,

    pub sort_order: SortOrder,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort_by: SortColumn::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl ListUsersQuery {
    /// Rows to skip before this page
    ///
    /// `page` and `limit` are clamped to 1 so a zero never produces a
    /// negative offset.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page.max(1)) - 1).saturating_mul(self.limit())
    }

    /// Rows to return
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.max(1))
    }
}

/// Number of pages needed to show `total` rows at `limit` per page
pub fn total_pages(total: i64, limit: u32) -> i64 {
    let limit = i64::from(limit.max(1));
    if total <= 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

#[async_trait]
impl UnitOfWork for ListUsersQuery {
    type Output = Vec<User>;
    type Error = StoreError;

    fn name(&self) -> &'static str {
        "users.list"
    }

    async fn execute(&self, conn: &mut PgConnection) -> Result<Vec<User>, StoreError> {
        let users = User::list(conn, self.sort_by, self.sort_order, self.limit(), self.offset()).await?;
        Ok(users)
    }
}

/// Counts every user row
#[derive(Debug, Clone, Copy, Default)]
pub struct CountUsers;

#[async_trait]
impl UnitOfWork for CountUsers {
    type Output = i64;
    type Error = StoreError;

    fn name(&self) -> &'static str {
        "users.count"
    }

    async fn execute(&self, conn: &mut PgConnection) -> Result<i64, StoreError> {
        Ok(User::count(conn).await?)
    }
}

/// Read-side entry point for the user listing
#[derive(Debug, Clone)]
pub struct UserQueryService {
    executor: Executor,
}

impl UserQueryService {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Returns one ordered page of users
    pub async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<User>, StoreError> {
        self.executor.run(&query).await
    }

    /// Returns the total number of users, independent of pagination
    pub async fn count_users(&self) -> Result<i64, StoreError> {
        self.executor.run(&CountUsers).await
    }
}
