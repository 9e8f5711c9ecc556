use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::money::serialize_micros;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "amount", serialize_with = "serialize_micros")]
    pub amount_micros: i64,
    pub payment_method: String,
    pub payment_email: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub amount: Option<f64>,
}
