//! Account handlers: profile, settings, password, API key and withdrawals

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password, ChangePasswordRequest};
use crate::auth::{generate_api_key, hash_api_key, AuthenticatedUser};
use crate::models::{
    amount_to_micros, CreateWithdrawalRequest, PaymentMethod, SettingsPatch,
    UpdateProfileRequest, User, UserProfile, UserSettings, Withdrawal,
};
use crate::storage::StorageError;

use super::error::{
    bad_request, internal, json_body, not_found, ApiError, ApiResult, ErrorResponse,
    SuccessResponse,
};
use super::AppState;

async fn load_user(state: &AppState, user_id: i64) -> ApiResult<User> {
    match state.storage.get_user(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(not_found("User not found")),
        Err(e) => Err(internal("Failed to fetch user", e)),
    }
}

fn bad_request_with_details(message: &str, details: Vec<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message).with_details(details)),
    )
}

// Profile

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<UserProfile>> {
    load_user(&state, user.id).await.map(|u| Json(u.profile()))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let update = json_body(payload)?
        .into_update()
        .map_err(|_| bad_request("Invalid payment method"))?;

    match state.storage.update_profile(user.id, &update).await {
        Ok(updated) => Ok(Json(updated.profile())),
        Err(StorageError::Conflict) => Err(bad_request("Username is already taken")),
        Err(StorageError::NotFound) => Err(not_found("User not found")),
        Err(e) => Err(internal("Failed to update profile", e)),
    }
}

// Settings

async fn load_settings(state: &AppState, user_id: i64) -> ApiResult<UserSettings> {
    match state.storage.get_settings(user_id).await {
        Ok(Some(settings)) => Ok(settings),
        Ok(None) => Err(not_found("User not found")),
        Err(e) => Err(internal("Failed to fetch settings", e)),
    }
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<UserSettings>> {
    load_settings(&state, user.id).await.map(Json)
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<UserSettings>> {
    let raw = json_body(payload)?;
    let patch: SettingsPatch = serde_json::from_value(raw)
        .map_err(|e| bad_request_with_details("Invalid settings format", vec![e.to_string()]))?;

    let current = load_settings(&state, user.id).await?;
    let merged = patch
        .apply(&current)
        .map_err(|details| bad_request_with_details("Invalid settings format", details))?;

    state
        .storage
        .save_settings(user.id, &merged)
        .await
        .map_err(|e| internal("Failed to update settings", e))?;

    Ok(Json(merged))
}

// Password

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let request = json_body(payload)?;

    let errors = request.validation_errors();
    if !errors.is_empty() {
        return Err(bad_request_with_details("Invalid input", errors));
    }
    if !request.confirmation_matches() {
        return Err(bad_request("New passwords do not match"));
    }

    let account = load_user(&state, user.id).await?;
    let Some(current_hash) = account.password_hash.as_deref() else {
        return Err(not_found("User not found or no password set"));
    };

    let valid = verify_password(&request.current_password, current_hash)
        .map_err(|e| internal("Failed to update password", e))?;
    if !valid {
        warn!("Rejected password change for user {}: wrong current password", user.id);
        return Err(bad_request("Current password is incorrect"));
    }

    let new_hash =
        hash_password(&request.new_password).map_err(|e| internal("Failed to update password", e))?;

    match state.storage.set_password_hash(user.id, &new_hash).await {
        Ok(true) => {
            info!("Password updated for user {}", user.id);
            Ok(SuccessResponse::new("Password updated successfully"))
        }
        Ok(false) => Err(not_found("User not found")),
        Err(e) => Err(internal("Failed to update password", e)),
    }
}

// API key

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyStatus {
    pub enabled: bool,
    pub last_generated: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedApiKey {
    pub api_key: String,
    pub last_generated: String,
    pub message: String,
}

pub async fn get_api_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<ApiKeyStatus>> {
    let settings = load_settings(&state, user.id).await?;
    Ok(Json(ApiKeyStatus {
        enabled: settings.api.api_key_enabled,
        last_generated: settings.api.last_generated,
    }))
}

pub async fn generate_api_key_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<GeneratedApiKey>> {
    load_user(&state, user.id).await?;

    let api_key = generate_api_key();
    let now = Utc::now();

    state
        .storage
        .rotate_api_key(user.id, &hash_api_key(&api_key), now.timestamp())
        .await
        .map_err(|e| internal("Failed to generate API key", e))?;

    info!("API key rotated for user {}", user.id);

    Ok(Json(GeneratedApiKey {
        api_key,
        last_generated: now.to_rfc3339_opts(SecondsFormat::Secs, false),
        message: "API key generated successfully".to_string(),
    }))
}

pub async fn revoke_api_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<SuccessResponse>> {
    load_user(&state, user.id).await?;

    state
        .storage
        .revoke_api_key(user.id)
        .await
        .map_err(|e| internal("Failed to revoke API key", e))?;

    info!("API key revoked for user {}", user.id);
    Ok(SuccessResponse::new("API key revoked successfully"))
}

// Withdrawals

pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<Withdrawal>>> {
    state
        .storage
        .list_withdrawals(user.id)
        .await
        .map(Json)
        .map_err(|e| internal("Failed to fetch withdrawals", e))
}

pub async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateWithdrawalRequest>, JsonRejection>,
) -> ApiResult<Json<Withdrawal>> {
    let request = json_body(payload)?;

    let amount_micros = request
        .amount
        .and_then(amount_to_micros)
        .filter(|micros| *micros > 0)
        .ok_or_else(|| bad_request("Invalid withdrawal amount"))?;

    let account = load_user(&state, user.id).await?;

    let missing = account.missing_withdrawal_fields();
    if missing.any() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Incomplete profile").with_missing_fields(missing)),
        ));
    }

    // Checked above, the payout address is present
    let payment_email = account.payment_email.unwrap_or_default();
    let payment_method = account
        .payment_method
        .as_deref()
        .and_then(PaymentMethod::parse)
        .unwrap_or(PaymentMethod::Paypal);

    match state
        .storage
        .create_withdrawal(user.id, amount_micros, payment_method, &payment_email)
        .await
    {
        Ok(withdrawal) => {
            info!(
                "User {} requested withdrawal {} of {} micros",
                user.id, withdrawal.id, amount_micros
            );
            Ok(Json(withdrawal))
        }
        Err(StorageError::InsufficientBalance) => Err(bad_request("Insufficient balance")),
        Err(StorageError::NotFound) => Err(not_found("User not found")),
        Err(e) => Err(internal("Failed to create withdrawal", e)),
    }
}
