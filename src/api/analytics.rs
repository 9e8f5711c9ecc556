//! Analytics API handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::analytics::{
    clamp_limit, load_audience, load_overview, load_top_links, AnalyticsQuery, Audience,
    Overview, RankMetric, TopLink,
};
use crate::auth::AuthenticatedUser;

use super::error::{internal, query_params, ApiResult};
use super::AppState;

pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> ApiResult<Json<Overview>> {
    let query = query_params(query)?;
    load_overview(state.storage.as_ref(), user.id, query.range(), Utc::now())
        .await
        .map(Json)
        .map_err(|e| internal("Failed to fetch analytics overview", e))
}

pub async fn get_top_urls(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<TopLink>>> {
    let query = query_params(query)?;
    let metric = RankMetric::parse(query.metric.as_deref());
    let limit = clamp_limit(query.limit);

    load_top_links(
        state.storage.as_ref(),
        user.id,
        query.range(),
        metric,
        limit,
        Utc::now(),
    )
    .await
    .map(Json)
    .map_err(|e| internal("Failed to fetch top URLs", e))
}

pub async fn get_audience(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> ApiResult<Json<Audience>> {
    let query = query_params(query)?;
    load_audience(state.storage.as_ref(), user.id, query.range(), Utc::now())
        .await
        .map(Json)
        .map_err(|e| internal("Failed to fetch audience data", e))
}
