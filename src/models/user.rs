use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::money::serialize_micros;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub payment_email: Option<String>,
    pub payment_method: Option<String>,
    pub password_hash: Option<String>,
    pub balance_micros: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Paypal,
    Bank,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Crypto => "crypto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "paypal" => Some(PaymentMethod::Paypal),
            "bank" => Some(PaymentMethod::Bank),
            "crypto" => Some(PaymentMethod::Crypto),
            _ => None,
        }
    }
}

/// Public view of a user record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub username: Option<String>,
    #[serde(rename = "balance", serialize_with = "serialize_micros")]
    pub balance_micros: i64,
    pub payment_email: Option<String>,
    pub payment_method: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
}

/// Which profile fields still block a withdrawal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingFields {
    pub name: bool,
    pub address: bool,
    pub city: bool,
    pub country: bool,
    pub zip_code: bool,
    pub payment_email: bool,
}

impl MissingFields {
    pub fn any(&self) -> bool {
        self.name
            || self.address
            || self.city
            || self.country
            || self.zip_code
            || self.payment_email
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            balance_micros: self.balance_micros,
            payment_email: self.payment_email.clone(),
            payment_method: self.payment_method.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
            zip_code: self.zip_code.clone(),
        }
    }

    pub fn missing_withdrawal_fields(&self) -> MissingFields {
        MissingFields {
            name: is_blank(&self.name),
            address: is_blank(&self.address),
            city: is_blank(&self.city),
            country: is_blank(&self.country),
            zip_code: is_blank(&self.zip_code),
            payment_email: is_blank(&self.payment_email),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub payment_email: Option<String>,
    pub payment_method: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
}

/// Profile columns to overwrite; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub payment_email: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
}

impl UpdateProfileRequest {
    /// Identity and payout fields are only applied when non-empty, address
    /// fields are applied as sent. Fails with the offending payment method.
    pub fn into_update(self) -> Result<ProfileUpdate, String> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let payment_method = match non_empty(self.payment_method) {
            Some(method) => Some(PaymentMethod::parse(&method).ok_or(method)?),
            None => None,
        };

        Ok(ProfileUpdate {
            name: non_empty(self.name),
            username: non_empty(self.username),
            payment_email: non_empty(self.payment_email),
            payment_method,
            address: self.address,
            city: self.city,
            country: self.country,
            zip_code: self.zip_code,
        })
    }
}
