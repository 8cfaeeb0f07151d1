use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use mindping_db::Database;
use mindping_gateway::registry::Registry;
use mindping_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use mindping_types::models::User;

use crate::error::ApiError;
use crate::run_blocking;

/// Avatars are picked from `/avatars/avatar-1.png` ..= `avatar-N.png`.
const AVATAR_COUNT: u32 = 10;

pub type AppState = Arc<AppStateInner>;

/// Services shared by every HTTP handler and WebSocket session.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub registry: Registry,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, registry: Registry) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            registry,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username_len = req.username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::BadRequest(
            "Username must be between 3 and 32 characters".into(),
        ));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let username = req.username;
    let taken = {
        let username = username.clone();
        state
            .db
            .call(move |db| db.get_user_by_username(&username))
            .await?
            .is_some()
    };
    if taken {
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    // Hash password with Argon2id
    let password = req.password;
    let password_hash = run_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
    })
    .await?;

    let avatar = format!("/avatars/avatar-{}.png", rand::random_range(1..=AVATAR_COUNT));
    // A concurrent registration can still win the name between the check
    // above and this insert; the UNIQUE constraint decides.
    let user = state
        .db
        .call(move |db| db.create_user(&username, &password_hash, &avatar))
        .await
        .map_err(|e| {
            if mindping_db::is_constraint_violation(&e) {
                ApiError::Conflict("Username already exists".into())
            } else {
                ApiError::Internal(e)
            }
        })?;
    info!("registered user {} ({})", user.username, user.id);

    let token = create_token(&state.jwt_secret, &user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username;
    let row = state
        .db
        .call(move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let stored_hash = row.password.clone();
    let password = req.password;
    let verified = run_blocking(move || {
        let parsed_hash = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    })
    .await?;

    if !verified {
        return Err(ApiError::InvalidCredentials);
    }

    let user = row.into_user();
    let token = create_token(&state.jwt_secret, &user)?;

    Ok(Json(AuthResponse { user, token }))
}

/// The user the bearer token belongs to.
pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let row = state
        .db
        .call(move |db| db.get_user(claims.sub))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(row.into_user()))
}

pub fn create_token(secret: &str, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
