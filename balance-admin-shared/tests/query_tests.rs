/// Integration tests for the user query service
///
/// These tests require a running PostgreSQL database.
/// Run with: cargo test -p balance-admin-shared --test query_tests

mod common;

use balance_admin_shared::models::user::{SortColumn, SortOrder};
use balance_admin_shared::query::{total_pages, ListUsersQuery, UserQueryService};
use common::{cents, TestDb};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_second_page_by_balance_desc() {
    let db = TestDb::new().await.expect("Failed to set up database");
    let service = UserQueryService::new(db.executor.clone());

    // 25 users with distinct balances 1.00 .. 25.00
    for i in 1..=25 {
        db.create_user(i * 100).await.unwrap();
    }

    let page = service
        .list_users(ListUsersQuery {
            page: 2,
            limit: 10,
            sort_by: SortColumn::Balance,
            sort_order: SortOrder::Desc,
        })
        .await
        .unwrap();

    // Rows 11-20 by descending balance: 15.00 down to 6.00
    let balances: Vec<Decimal> = page.iter().map(|u| u.balance).collect();
    let expected: Vec<Decimal> = (6..=15).rev().map(|i| cents(i * 100)).collect();
    assert_eq!(balances, expected);

    let total = service.count_users().await.unwrap();
    assert_eq!(total, 25);
    assert_eq!(total_pages(total, 10), 3);

    drop(service);
    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_last_page_is_partial_and_beyond_is_empty() {
    let db = TestDb::new().await.expect("Failed to set up database");
    let service = UserQueryService::new(db.executor.clone());

    for i in 0..12 {
        db.create_user(i).await.unwrap();
    }

    let base = ListUsersQuery {
        limit: 5,
        ..Default::default()
    };

    let third = service.list_users(ListUsersQuery { page: 3, ..base }).await.unwrap();
    assert_eq!(third.len(), 2);

    let fourth = service.list_users(ListUsersQuery { page: 4, ..base }).await.unwrap();
    assert!(fourth.is_empty());

    assert_eq!(service.count_users().await.unwrap(), 12);

    drop(service);
    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_sort_by_username_ascending() {
    let db = TestDb::new().await.expect("Failed to set up database");
    let service = UserQueryService::new(db.executor.clone());

    for _ in 0..8 {
        db.create_user(0).await.unwrap();
    }

    let users = service
        .list_users(ListUsersQuery {
            page: 1,
            limit: 100,
            sort_by: SortColumn::Username,
            sort_order: SortOrder::Asc,
        })
        .await
        .unwrap();

    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names.len(), 8);

    drop(service);
    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_pages_partition_rows_with_tied_sort_values() {
    let db = TestDb::new().await.expect("Failed to set up database");
    let service = UserQueryService::new(db.executor.clone());

    // Every user has the same balance; the id tie-breaker keeps pages disjoint
    let mut ids = Vec::new();
    for _ in 0..9 {
        ids.push(db.create_user(500).await.unwrap().id);
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let users = service
            .list_users(ListUsersQuery {
                page,
                limit: 3,
                sort_by: SortColumn::Balance,
                sort_order: SortOrder::Asc,
            })
            .await
            .unwrap();
        seen.extend(users.into_iter().map(|u| u.id));
    }

    seen.sort();
    ids.sort();
    assert_eq!(seen, ids);

    drop(service);
    db.cleanup().await.unwrap();
}

/// Usernames, emails and ages deliberately disagree on order
async fn seed_mixed_order(db: &TestDb) {
    for (username, email, age_days) in [
        ("dora", "bert@example.com", 2),
        ("abel", "dina@example.com", 3),
        ("carl", "abby@example.com", 1),
        ("bess", "cody@example.com", 4),
    ] {
        db.create_named_user(username, email, age_days).await.unwrap();
    }
}

async fn usernames_sorted(service: &UserQueryService, sort_by: SortColumn, sort_order: SortOrder) -> Vec<String> {
    service
        .list_users(ListUsersQuery {
            page: 1,
            limit: 10,
            sort_by,
            sort_order,
        })
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect()
}

#[tokio::test]
async fn test_sort_by_email() {
    let db = TestDb::new().await.expect("Failed to set up database");
    let service = UserQueryService::new(db.executor.clone());
    seed_mixed_order(&db).await;

    assert_eq!(
        usernames_sorted(&service, SortColumn::Email, SortOrder::Asc).await,
        vec!["carl", "dora", "bess", "abel"]
    );
    assert_eq!(
        usernames_sorted(&service, SortColumn::Email, SortOrder::Desc).await,
        vec!["abel", "bess", "dora", "carl"]
    );

    drop(service);
    db.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_sort_by_created_at() {
    let db = TestDb::new().await.expect("Failed to set up database");
    let service = UserQueryService::new(db.executor.clone());
    seed_mixed_order(&db).await;

    // Oldest first
    assert_eq!(
        usernames_sorted(&service, SortColumn::CreatedAt, SortOrder::Asc).await,
        vec!["bess", "abel", "dora", "carl"]
    );
    assert_eq!(
        usernames_sorted(&service, SortColumn::CreatedAt, SortOrder::Desc).await,
        vec!["carl", "dora", "abel", "bess"]
    );

    // The default sort is newest first
    let newest = service.list_users(ListUsersQuery::default()).await.unwrap();
    assert_eq!(newest[0].username, "carl");

    drop(service);
    db.cleanup().await.unwrap();
}
