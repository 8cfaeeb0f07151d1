use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use mindping_types::api::Claims;
use mindping_types::models::User;

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Exact, case-insensitive lookup. Looking yourself up is a 404.
pub async fn find_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let row = state
        .db
        .call(move |db| db.get_user_by_username(&username))
        .await?
        .filter(|row| row.id != claims.sub)
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(row.into_user()))
}

/// Substring search over usernames, excluding the caller.
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .db
        .call(move |db| db.find_users(query.q.trim()))
        .await?
        .into_iter()
        .filter(|row| row.id != claims.sub)
        .map(|row| row.into_user())
        .collect();

    Ok(Json(users))
}
