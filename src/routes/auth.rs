//! `/auth` routes — staff session login/logout.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_cookies::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Cookie, Cookies,
};
use uuid::Uuid;

use crate::{
    auth::{generate_token, verify_password},
    errors::{AppError, AppResult},
    middleware::auth_guard::AuthStaff,
    state::AppState,
};

// ── Session cookie constants ──────────────────────────────────

const SESSION_COOKIE: &str = "session";
const SESSION_DAYS:   i64  = 30;

/// Public routes: login + logout.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login",  post(login))
        .route("/auth/logout", post(logout))
}

/// Routes behind the staff session guard.
pub fn session_router() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

// ── Request / response types ──────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct StaffResponse {
    id:       String,
    username: String,
}

#[derive(sqlx::FromRow)]
struct StaffRow {
    id:            String,
    username:      String,
    password_hash: String,
}

// ── Handlers ─────────────────────────────────────────────────

async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<StaffResponse>> {
    let pool = &state.pool;

    let staff: StaffRow = sqlx::query_as::<_, StaffRow>(
        "SELECT id, username, password_hash
         FROM staff_users
         WHERE username = ? AND is_active = 1
         LIMIT 1",
    )
    .bind(&body.username)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    verify_password(&body.password, &staff.password_hash)?;

    let token = generate_token();
    sqlx::query(
        "INSERT INTO staff_sessions (id, staff_id, token, expires_at, created_at)
         VALUES (?, ?, ?, DATE_ADD(UTC_TIMESTAMP(), INTERVAL ? DAY), UTC_TIMESTAMP())",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&staff.id)
    .bind(&token)
    .bind(SESSION_DAYS)
    .execute(pool)
    .await?;

    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(CookieDuration::days(SESSION_DAYS));
    cookies.add(cookie);

    Ok(Json(StaffResponse {
        id:       staff.id,
        username: staff.username,
    }))
}

async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<StatusCode> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        sqlx::query("DELETE FROM staff_sessions WHERE token = ?")
            .bind(cookie.value())
            .execute(&state.pool)
            .await?;

        let mut removal = Cookie::new(SESSION_COOKIE, "");
        removal.set_path("/");
        cookies.remove(removal);
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn me(Extension(staff): Extension<AuthStaff>) -> AppResult<Json<StaffResponse>> {
    Ok(Json(StaffResponse {
        id:       staff.staff_id,
        username: staff.username,
    }))
}
