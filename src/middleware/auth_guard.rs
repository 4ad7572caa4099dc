//! Staff authentication guard middleware.
//!
//! Reads the `session` cookie, validates it against `staff_sessions` in the
//! DB, and injects an `AuthStaff` extension into the request for downstream
//! handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{errors::AppError, state::AppState};

const SESSION_COOKIE: &str = "session";

/// Authenticated staff member extracted from a valid session. Injected into
/// request extensions by `require_staff`; downstream handlers use
/// `Extension<AuthStaff>`.
#[derive(Debug, Clone)]
pub struct AuthStaff {
    pub staff_id: String,
    pub username: String,
}

/// Middleware: require a valid staff session cookie.
/// On success, inserts `AuthStaff` into request extensions.
pub async fn require_staff(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    #[derive(sqlx::FromRow)]
    struct SessionRow {
        id:       String,
        username: String,
    }

    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT u.id, u.username
         FROM staff_sessions s
         JOIN staff_users u ON u.id = s.staff_id
         WHERE s.token = ?
           AND s.expires_at > UTC_TIMESTAMP()
           AND u.is_active = 1
         LIMIT 1",
    )
    .bind(&token)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
    .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(AuthStaff {
        staff_id: row.id,
        username: row.username,
    });

    Ok(next.run(req).await)
}
