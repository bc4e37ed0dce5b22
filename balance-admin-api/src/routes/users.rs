/// User listing endpoint
///
/// # Endpoint
///
/// ```text
/// GET /api/users?page=2&limit=10&sortBy=balance&sortOrder=desc
/// ```
///
/// # Response
///
/// ```json
/// {
///   "users": [{ "id": "…", "username": "…", "email": "…", "balance": "15.00", "created_at": "…" }],
///   "totalUsers": 25
/// }
/// ```

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use balance_admin_shared::{
    models::user::{SortColumn, SortOrder, User},
    query::{ListUsersQuery, DEFAULT_PAGE_LIMIT},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Raw query string; every value arrives as text and is coerced below
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    pub page: Option<String>,

    pub limit: Option<String>,

    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,

    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
}

/// Coerced paging values
#[derive(Debug, Validate)]
struct Paging {
    #[validate(range(min = 1, message = "Number must be a positive integer"))]
    page: i64,

    #[validate(range(min = 1, message = "Number must be a positive integer"))]
    limit: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<User>,

    #[serde(rename = "totalUsers")]
    pub total_users: i64,
}

fn coerce_integer(
    raw: Option<&str>,
    default: i64,
    path: &str,
    errors: &mut Vec<ValidationErrorDetail>,
) -> i64 {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(value) => value.parse::<i64>().unwrap_or_else(|_| {
            errors.push(ValidationErrorDetail::new(
                path,
                format!("Expected an integer, received '{}'", value),
            ));
            default
        }),
    }
}

fn coerce_enum<T: std::str::FromStr<Err = String> + Default>(
    raw: Option<&str>,
    path: &str,
    errors: &mut Vec<ValidationErrorDetail>,
) -> T {
    match raw {
        None | Some("") => T::default(),
        Some(value) => value.parse::<T>().unwrap_or_else(|message| {
            errors.push(ValidationErrorDetail::new(path, message));
            T::default()
        }),
    }
}

/// Values beyond `u32` are reported; non-positive ones were already reported
fn narrow(value: i64, path: &str, errors: &mut Vec<ValidationErrorDetail>) -> u32 {
    match u32::try_from(value) {
        Ok(n) => n,
        Err(_) if value > 0 => {
            errors.push(ValidationErrorDetail::new(path, "Number is too large"));
            1
        }
        Err(_) => 1,
    }
}

impl ListUsersParams {
    /// Applies defaults and validates, collecting every failure
    pub fn into_query(self) -> Result<ListUsersQuery, Vec<ValidationErrorDetail>> {
        let mut errors = Vec::new();

        let paging = Paging {
            page: coerce_integer(self.page.as_deref(), 1, "query.page", &mut errors),
            limit: coerce_integer(
                self.limit.as_deref(),
                i64::from(DEFAULT_PAGE_LIMIT),
                "query.limit",
                &mut errors,
            ),
        };
        if let Err(e) = paging.validate() {
            errors.extend(validation_details("query", &e));
        }

        let page = narrow(paging.page, "query.page", &mut errors);
        let limit = narrow(paging.limit, "query.limit", &mut errors);

        let sort_by: SortColumn = coerce_enum(self.sort_by.as_deref(), "query.sortBy", &mut errors);
        let sort_order: SortOrder =
            coerce_enum(self.sort_order.as_deref(), "query.sortOrder", &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ListUsersQuery {
            page,
            limit,
            sort_by,
            sort_order,
        })
    }
}

/// List users handler
///
/// The page and the total count are read concurrently; the count ignores
/// pagination.
///
/// # Errors
///
/// - `400 Bad Request`: invalid `page`, `limit`, `sortBy` or `sortOrder`
/// - `500 Internal Server Error`: database failure after retries
pub async fn list_users(
    State(state): State<AppState>,
    params: Result<Query<ListUsersParams>, QueryRejection>,
) -> ApiResult<Json<ListUsersResponse>> {
    let Query(params) = params.map_err(|e| {
        ApiError::Validation(vec![ValidationErrorDetail::new("query", e.body_text())])
    })?;

    let query = params.into_query().map_err(ApiError::Validation)?;

    tracing::debug!(
        page = query.page,
        limit = query.limit,
        sort_by = %query.sort_by,
        sort_order = ?query.sort_order,
        "Listing users"
    );

    let (users, total_users) = tokio::try_join!(
        state.users.list_users(query),
        state.users.count_users()
    )?;

    Ok(Json(ListUsersResponse { users, total_users }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>, sort_by: Option<&str>, sort_order: Option<&str>) -> ListUsersParams {
        ListUsersParams {
            page: page.map(String::from),
            limit: limit.map(String::from),
            sort_by: sort_by.map(String::from),
            sort_order: sort_order.map(String::from),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let query = ListUsersParams::default().into_query().unwrap();
        assert_eq!(query, ListUsersQuery::default());
    }

    #[test]
    fn test_values_coerced() {
        let query = params(Some("2"), Some("10"), Some("balance"), Some("asc"))
            .into_query()
            .unwrap();

        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort_by, SortColumn::Balance);
        assert_eq!(query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_non_positive_paging_rejected() {
        let errors = params(Some("0"), Some("-5"), None, None)
            .into_query()
            .unwrap_err();

        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["query.limit", "query.page"]);
    }

    #[test]
    fn test_non_numeric_page_rejected() {
        let errors = params(Some("abc"), None, None, None).into_query().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "query.page");
    }

    #[test]
    fn test_unknown_sort_column_rejected() {
        let errors = params(None, None, Some("password"), Some("sideways"))
            .into_query()
            .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "query.sortBy");
        assert!(errors[0].message.contains("received 'password'"));
        assert_eq!(errors[1].path, "query.sortOrder");
    }
}
