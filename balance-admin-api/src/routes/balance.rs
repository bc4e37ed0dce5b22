/// Balance adjustment endpoints
///
/// # Endpoints
///
/// - `POST /api/:userId/credit` - Add funds
/// - `POST /api/:userId/debit` - Remove funds, refused if the balance is short
///
/// # Request
///
/// ```json
/// { "amount": "12.50", "description": "Refund for order 1182" }
/// ```
///
/// `amount` may be a JSON number or a numeric string. Both are parsed as an
/// exact decimal, never through a float.

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use balance_admin_shared::models::transaction::TransactionType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Largest amount a `NUMERIC(15,2)` column holds, exclusive
const AMOUNT_LIMIT: i64 = 10_000_000_000_000;

/// Raw request body
#[derive(Debug, Default, Deserialize)]
pub struct AdjustBalanceRequest {
    #[serde(default)]
    pub amount: Option<Value>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Body after coercion
#[derive(Debug, Validate)]
struct AdjustBalanceInput {
    amount: Decimal,

    #[validate(length(min = 5, message = "Description is required"))]
    description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Coerces `amount` into a positive decimal with at most two places
fn coerce_amount(raw: Option<&Value>) -> Result<Decimal, String> {
    let amount = match raw {
        None | Some(Value::Null) => return Err("Amount is required".to_string()),
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) if s.trim().is_empty() => Some(Decimal::ZERO),
        Some(Value::String(s)) => parse_decimal(s),
        Some(_) => None,
    }
    .ok_or_else(|| "Expected a number".to_string())?;

    if amount <= Decimal::ZERO {
        return Err("Amount must be a positive number.".to_string());
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount must have at most 2 decimal places".to_string());
    }
    if amount >= Decimal::from(AMOUNT_LIMIT) {
        return Err("Amount is too large".to_string());
    }

    Ok(amount)
}

impl AdjustBalanceRequest {
    fn into_input(self) -> Result<AdjustBalanceInput, Vec<ValidationErrorDetail>> {
        let mut errors = Vec::new();

        let amount = coerce_amount(self.amount.as_ref()).unwrap_or_else(|message| {
            errors.push(ValidationErrorDetail::new("body.amount", message));
            Decimal::ZERO
        });

        let input = AdjustBalanceInput {
            amount,
            description: self.description,
        };
        if let Err(e) = input.validate() {
            errors.extend(validation_details("body", &e));
        }

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors)
        }
    }
}

/// Validates path and body together so one response lists every problem
fn parse_request(
    user_id: Result<Path<String>, PathRejection>,
    body: Result<Json<AdjustBalanceRequest>, JsonRejection>,
) -> ApiResult<(Uuid, AdjustBalanceInput)> {
    let mut errors = Vec::new();

    let user_id = match user_id {
        Ok(Path(raw)) => Uuid::parse_str(raw.trim()).map_err(|_| {
            errors.push(ValidationErrorDetail::new("params.userId", "Invalid uuid"));
        }),
        Err(e) => {
            errors.push(ValidationErrorDetail::new("params.userId", e.body_text()));
            Err(())
        }
    };

    let input = match body {
        Ok(Json(request)) => request.into_input().map_err(|details| errors.extend(details)),
        Err(e) => {
            errors.push(ValidationErrorDetail::new("body", e.body_text()));
            Err(())
        }
    };

    match (user_id, input) {
        (Ok(user_id), Ok(input)) => Ok((user_id, input)),
        _ => Err(ApiError::Validation(errors)),
    }
}

async fn adjust(
    state: AppState,
    user_id: Result<Path<String>, PathRejection>,
    body: Result<Json<AdjustBalanceRequest>, JsonRejection>,
    kind: TransactionType,
) -> ApiResult<Json<MessageResponse>> {
    let (user_id, input) = parse_request(user_id, body)?;

    state
        .ledger
        .adjust_balance(user_id, input.amount, kind, input.description)
        .await?;

    let message = match kind {
        TransactionType::Credit => "User credited successfully",
        TransactionType::Debit => "User debited successfully",
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// Credit handler
///
/// # Errors
///
/// - `400 Bad Request`: invalid `userId`, `amount` or `description`
/// - `404 Not Found`: no such user
/// - `500 Internal Server Error`: database failure after retries
pub async fn credit_user(
    State(state): State<AppState>,
    user_id: Result<Path<String>, PathRejection>,
    body: Result<Json<AdjustBalanceRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    adjust(state, user_id, body, TransactionType::Credit).await
}

/// Debit handler
///
/// # Errors
///
/// - `400 Bad Request`: validation failure, or `Insufficient balance`
/// - `404 Not Found`: no such user
/// - `500 Internal Server Error`: database failure after retries
pub async fn debit_user(
    State(state): State<AppState>,
    user_id: Result<Path<String>, PathRejection>,
    body: Result<Json<AdjustBalanceRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    adjust(state, user_id, body, TransactionType::Debit).await
}
