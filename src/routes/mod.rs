use axum::{middleware, Router};
use crate::{
    middleware::auth_guard::require_staff,
    state::AppState,
};

mod auth;
mod bookings;
mod cinemas;
mod movies;
mod showtimes;

/// Build the full `/api/v1` router.
///
/// Catalog reads, booking creation and the payment webhook are public;
/// every mutating catalog route and the admin views are wrapped in the
/// session-based [`require_staff`] middleware.
pub fn all_routes(state: AppState) -> Router<AppState> {
    let staff_mw = middleware::from_fn_with_state(state, require_staff);
    Router::new()
        .merge(auth::router())
        .merge(movies::public_router())
        .merge(cinemas::public_router())
        .merge(showtimes::public_router())
        .merge(bookings::public_router())
        .merge(
            Router::new()
                .merge(auth::session_router())
                .merge(movies::staff_router())
                .merge(cinemas::staff_router())
                .merge(showtimes::staff_router())
                .merge(bookings::staff_router())
                .route_layer(staff_mw),
        )
}
