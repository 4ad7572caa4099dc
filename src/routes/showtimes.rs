//! `/showtimes` routes — CRUD with room-occupancy validation.
//!
//! Creation and updates run the overlap check inside the same transaction
//! as the write, so two staff members cannot race the same room slot past
//! validation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    services::{ledger, scheduler, seatmap, seatmap::SeatMap},
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/showtimes",      get(list_showtimes))
        .route("/showtimes/{id}", get(get_showtime))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/showtimes",      post(create_showtime))
        .route("/showtimes/{id}", put(update_showtime).delete(delete_showtime))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct ShowtimeRow {
    id:           String,
    movie_id:     String,
    movie_title:  String,
    room_id:      Option<String>,
    room_name:    Option<String>,
    show_date:    NaiveDate,
    show_time:    NaiveTime,
    ticket_price: Decimal,
    is_active:    bool,
}

#[derive(sqlx::FromRow)]
struct ShowtimeDetailRow {
    id:           String,
    movie_id:     String,
    movie_title:  String,
    room_id:      Option<String>,
    room_name:    Option<String>,
    show_date:    NaiveDate,
    show_time:    NaiveTime,
    ticket_price: Decimal,
    is_active:    bool,
    seats_data:   String,
}

#[derive(Serialize)]
struct ShowtimeDetail {
    id:              String,
    movie_id:        String,
    movie_title:     String,
    room_id:         Option<String>,
    room_name:       Option<String>,
    show_date:       NaiveDate,
    show_time:       NaiveTime,
    ticket_price:    Decimal,
    is_active:       bool,
    seats_data:      SeatMap,
    available_count: usize,
    is_full:         bool,
}

const SHOWTIME_SELECT: &str =
    "SELECT s.id, s.movie_id, m.title AS movie_title, s.room_id, r.name AS room_name,
            s.show_date, s.show_time, s.ticket_price, s.is_active
     FROM showtimes s
     JOIN movies m ON m.id = s.movie_id
     LEFT JOIN screening_rooms r ON r.id = s.room_id";

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct CreateShowtimeBody {
    movie_id:     String,
    room_id:      Option<String>,
    show_date:    NaiveDate,
    show_time:    String, // "HH:MM" or "HH:MM:SS"
    ticket_price: Decimal,
}

#[derive(Deserialize)]
struct UpdateShowtimeBody {
    movie_id:     Option<String>,
    room_id:      Option<String>,
    show_date:    Option<NaiveDate>,
    show_time:    Option<String>,
    ticket_price: Option<Decimal>,
    is_active:    Option<bool>,
}

#[derive(Deserialize)]
struct ShowtimeFilter {
    movie: Option<String>,
}

fn parse_show_time(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| AppError::BadRequest(format!("Invalid show_time: {raw}")))
}

fn check_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::BadRequest("ticket_price cannot be negative".into()));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct MovieRefRow {
    duration_minutes: i32,
}

#[derive(sqlx::FromRow)]
struct RoomRefRow {
    capacity:      i32,
    seats_per_row: i32,
}

// ── Handlers ─────────────────────────────────────────────────

async fn list_showtimes(
    State(state): State<AppState>,
    Query(filter): Query<ShowtimeFilter>,
) -> AppResult<Json<Vec<ShowtimeRow>>> {
    let pool = &state.pool;
    let rows: Vec<ShowtimeRow> = if let Some(movie) = &filter.movie {
        sqlx::query_as::<_, ShowtimeRow>(&format!(
            "{SHOWTIME_SELECT} WHERE s.is_active = 1 AND s.movie_id = ?
             ORDER BY s.show_date, s.show_time"
        ))
        .bind(movie)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, ShowtimeRow>(&format!(
            "{SHOWTIME_SELECT} WHERE s.is_active = 1 ORDER BY s.show_date, s.show_time"
        ))
        .fetch_all(pool)
        .await?
    };
    Ok(Json(rows))
}

async fn get_showtime(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ShowtimeDetail>> {
    let row: ShowtimeDetailRow = sqlx::query_as::<_, ShowtimeDetailRow>(
        "SELECT s.id, s.movie_id, m.title AS movie_title, s.room_id, r.name AS room_name,
                s.show_date, s.show_time, s.ticket_price, s.is_active, s.seats_data
         FROM showtimes s
         JOIN movies m ON m.id = s.movie_id
         LEFT JOIN screening_rooms r ON r.id = s.room_id
         WHERE s.id = ?",
    )
    .bind(&id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    let seats_data = ledger::parse_seat_map(&row.seats_data)?;
    let available_count = ledger::available_count(&seats_data);
    let is_full = ledger::is_full(&seats_data);

    Ok(Json(ShowtimeDetail {
        id:           row.id,
        movie_id:     row.movie_id,
        movie_title:  row.movie_title,
        room_id:      row.room_id,
        room_name:    row.room_name,
        show_date:    row.show_date,
        show_time:    row.show_time,
        ticket_price: row.ticket_price,
        is_active:    row.is_active,
        seats_data,
        available_count,
        is_full,
    }))
}

async fn create_showtime(
    State(state): State<AppState>,
    Json(body): Json<CreateShowtimeBody>,
) -> AppResult<(StatusCode, Json<ShowtimeRow>)> {
    let show_time = parse_show_time(&body.show_time)?;
    check_price(body.ticket_price)?;

    let pool = &state.pool;
    let mut tx = pool.begin().await?;

    let movie: MovieRefRow =
        sqlx::query_as::<_, MovieRefRow>("SELECT duration_minutes FROM movies WHERE id = ?")
            .bind(&body.movie_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::BadRequest("Unknown movie".into()))?;

    // Seat map comes from the room layout; without a room the map stays empty
    // until one is assigned.
    let seats_data = if let Some(room_id) = &body.room_id {
        let room: RoomRefRow = sqlx::query_as::<_, RoomRefRow>(
            "SELECT capacity, seats_per_row FROM screening_rooms WHERE id = ?",
        )
        .bind(room_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::BadRequest("Unknown screening room".into()))?;

        scheduler::validate_no_overlap(
            &mut tx,
            room_id,
            body.show_date,
            show_time,
            movie.duration_minutes as i64,
            None,
        )
        .await?;

        seatmap::generate(room.capacity as u32, room.seats_per_row as u32)
    } else {
        SeatMap::new()
    };

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO showtimes
            (id, movie_id, room_id, show_date, show_time, seats_data, ticket_price, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&id)
    .bind(&body.movie_id)
    .bind(&body.room_id)
    .bind(body.show_date)
    .bind(show_time)
    .bind(ledger::serialize_seat_map(&seats_data)?)
    .bind(body.ticket_price)
    .execute(&mut *tx)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Conflict(
            "A showtime for this movie, room, date and time already exists".into(),
        ),
        _ => e.into(),
    })?;

    tx.commit().await?;

    let row: ShowtimeRow = sqlx::query_as::<_, ShowtimeRow>(&format!("{SHOWTIME_SELECT} WHERE s.id = ?"))
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(sqlx::FromRow)]
struct ExistingShowtimeRow {
    movie_id:  String,
    room_id:   Option<String>,
    show_date: NaiveDate,
    show_time: NaiveTime,
    is_active: bool,
}

async fn update_showtime(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateShowtimeBody>,
) -> AppResult<Json<ShowtimeRow>> {
    if let Some(price) = body.ticket_price {
        check_price(price)?;
    }

    let pool = &state.pool;
    let mut tx = pool.begin().await?;

    let existing: ExistingShowtimeRow = sqlx::query_as::<_, ExistingShowtimeRow>(
        "SELECT movie_id, room_id, show_date, show_time, is_active
         FROM showtimes WHERE id = ? FOR UPDATE",
    )
    .bind(&id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound)?;

    let movie_id = body.movie_id.clone().unwrap_or(existing.movie_id);
    let room_id = body.room_id.clone().or(existing.room_id);
    let show_date = body.show_date.unwrap_or(existing.show_date);
    let show_time = match &body.show_time {
        Some(raw) => parse_show_time(raw)?,
        None => existing.show_time,
    };
    let is_active = body.is_active.unwrap_or(existing.is_active);

    let movie: MovieRefRow =
        sqlx::query_as::<_, MovieRefRow>("SELECT duration_minutes FROM movies WHERE id = ?")
            .bind(&movie_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::BadRequest("Unknown movie".into()))?;

    if is_active {
        if let Some(room_id) = &room_id {
            scheduler::validate_no_overlap(
                &mut tx,
                room_id,
                show_date,
                show_time,
                movie.duration_minutes as i64,
                Some(&id),
            )
            .await?;
        }
    }

    sqlx::query(
        "UPDATE showtimes
         SET movie_id = ?, room_id = ?, show_date = ?, show_time = ?,
             ticket_price = COALESCE(?, ticket_price), is_active = ?,
             updated_at = UTC_TIMESTAMP()
         WHERE id = ?",
    )
    .bind(&movie_id)
    .bind(&room_id)
    .bind(show_date)
    .bind(show_time)
    .bind(body.ticket_price)
    .bind(is_active)
    .bind(&id)
    .execute(&mut *tx)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Conflict(
            "A showtime for this movie, room, date and time already exists".into(),
        ),
        _ => e.into(),
    })?;

    tx.commit().await?;

    let row: ShowtimeRow = sqlx::query_as::<_, ShowtimeRow>(&format!("{SHOWTIME_SELECT} WHERE s.id = ?"))
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(Json(row))
}

async fn delete_showtime(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM showtimes WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
