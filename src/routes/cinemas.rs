//! `/cinemas` routes — cinema and screening-room CRUD.
//!
//! Changing a room's layout regenerates the seat maps of all its showtimes,
//! which is only allowed while no seat under the room has been sold.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    services::{ledger, seatmap},
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/cinemas",      get(list_cinemas))
        .route("/cinemas/{id}", get(get_cinema))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/cinemas",                        post(create_cinema))
        .route("/cinemas/{id}",                   put(update_cinema).delete(delete_cinema))
        .route("/cinemas/{id}/rooms",             post(create_room))
        .route("/cinemas/{id}/rooms/{room_id}",   put(update_room).delete(delete_room))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct CinemaRow {
    id:       String,
    name:     String,
    location: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Clone)]
struct RoomRow {
    id:            String,
    cinema_id:     String,
    name:          String,
    capacity:      i32,
    seats_per_row: i32,
}

#[derive(Serialize)]
struct CinemaWithRooms {
    #[serde(flatten)]
    cinema: CinemaRow,
    rooms:  Vec<RoomRow>,
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct CinemaBody {
    name:     String,
    location: Option<String>,
}

#[derive(Deserialize)]
struct CreateRoomBody {
    name:          String,
    capacity:      i32,
    seats_per_row: i32,
}

#[derive(Deserialize)]
struct UpdateRoomBody {
    name:          Option<String>,
    capacity:      Option<i32>,
    seats_per_row: Option<i32>,
}

// ── Validation ───────────────────────────────────────────────

fn check_layout(capacity: i32, seats_per_row: i32) -> AppResult<()> {
    if capacity <= 0 {
        return Err(AppError::BadRequest("capacity must be positive".into()));
    }
    if seats_per_row <= 0 {
        return Err(AppError::BadRequest("seats_per_row must be positive".into()));
    }
    if seats_per_row > capacity {
        return Err(AppError::BadRequest(
            "seats_per_row cannot exceed capacity".into(),
        ));
    }
    Ok(())
}

// ── Cinema handlers ──────────────────────────────────────────

async fn list_cinemas(State(state): State<AppState>) -> AppResult<Json<Vec<CinemaWithRooms>>> {
    let pool = &state.pool;
    let cinemas: Vec<CinemaRow> =
        sqlx::query_as::<_, CinemaRow>("SELECT id, name, location FROM cinemas ORDER BY name")
            .fetch_all(pool)
            .await?;

    let rooms: Vec<RoomRow> = sqlx::query_as::<_, RoomRow>(
        "SELECT id, cinema_id, name, capacity, seats_per_row
         FROM screening_rooms ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let items = cinemas
        .into_iter()
        .map(|cinema| {
            let rooms = rooms
                .iter()
                .filter(|r| r.cinema_id == cinema.id)
                .cloned()
                .collect();
            CinemaWithRooms { cinema, rooms }
        })
        .collect();
    Ok(Json(items))
}

async fn get_cinema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CinemaWithRooms>> {
    let pool = &state.pool;
    let cinema: CinemaRow =
        sqlx::query_as::<_, CinemaRow>("SELECT id, name, location FROM cinemas WHERE id = ?")
            .bind(&id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound)?;

    let rooms: Vec<RoomRow> = sqlx::query_as::<_, RoomRow>(
        "SELECT id, cinema_id, name, capacity, seats_per_row
         FROM screening_rooms WHERE cinema_id = ? ORDER BY name",
    )
    .bind(&id)
    .fetch_all(pool)
    .await?;

    Ok(Json(CinemaWithRooms { cinema, rooms }))
}

async fn create_cinema(
    State(state): State<AppState>,
    Json(body): Json<CinemaBody>,
) -> AppResult<(StatusCode, Json<CinemaRow>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Cinema name cannot be empty".into()));
    }

    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO cinemas (id, name, location) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(body.name.trim())
        .bind(&body.location)
        .execute(pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Cinema \"{}\" already exists", body.name.trim()))
            }
            _ => e.into(),
        })?;

    let row: CinemaRow =
        sqlx::query_as::<_, CinemaRow>("SELECT id, name, location FROM cinemas WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_cinema(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CinemaBody>,
) -> AppResult<Json<CinemaRow>> {
    let pool = &state.pool;
    let result = sqlx::query("UPDATE cinemas SET name = ?, location = ? WHERE id = ?")
        .bind(body.name.trim())
        .bind(&body.location)
        .bind(&id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    let row: CinemaRow =
        sqlx::query_as::<_, CinemaRow>("SELECT id, name, location FROM cinemas WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
    Ok(Json(row))
}

async fn delete_cinema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    // Rooms cascade via the FK.
    let result = sqlx::query("DELETE FROM cinemas WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Room handlers ────────────────────────────────────────────

async fn create_room(
    State(state): State<AppState>,
    Path(cinema_id): Path<String>,
    Json(body): Json<CreateRoomBody>,
) -> AppResult<(StatusCode, Json<RoomRow>)> {
    check_layout(body.capacity, body.seats_per_row)?;

    let pool = &state.pool;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cinemas WHERE id = ?)")
        .bind(&cinema_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound);
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO screening_rooms (id, cinema_id, name, capacity, seats_per_row)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&cinema_id)
    .bind(body.name.trim())
    .bind(body.capacity)
    .bind(body.seats_per_row)
    .execute(pool)
    .await?;

    let row: RoomRow = sqlx::query_as::<_, RoomRow>(
        "SELECT id, cinema_id, name, capacity, seats_per_row FROM screening_rooms WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(sqlx::FromRow)]
struct RoomShowtimeRow {
    id:            String,
    movie_title:   String,
    show_date:     NaiveDate,
    show_time:     NaiveTime,
    seats_data:    String,
    seats_version: i64,
}

async fn update_room(
    State(state): State<AppState>,
    Path((cinema_id, room_id)): Path<(String, String)>,
    Json(body): Json<UpdateRoomBody>,
) -> AppResult<Json<RoomRow>> {
    let pool = &state.pool;
    let room: RoomRow = sqlx::query_as::<_, RoomRow>(
        "SELECT id, cinema_id, name, capacity, seats_per_row
         FROM screening_rooms WHERE id = ? AND cinema_id = ?",
    )
    .bind(&room_id)
    .bind(&cinema_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    let capacity = body.capacity.unwrap_or(room.capacity);
    let seats_per_row = body.seats_per_row.unwrap_or(room.seats_per_row);
    check_layout(capacity, seats_per_row)?;

    let layout_changed = capacity != room.capacity || seats_per_row != room.seats_per_row;

    let mut tx = pool.begin().await?;

    if layout_changed {
        // Lock every showtime under this room; any sold seat blocks the change.
        let showtimes: Vec<RoomShowtimeRow> = sqlx::query_as::<_, RoomShowtimeRow>(
            "SELECT s.id, m.title AS movie_title, s.show_date, s.show_time,
                    s.seats_data, s.seats_version
             FROM showtimes s
             JOIN movies m ON m.id = s.movie_id
             WHERE s.room_id = ?
             FOR UPDATE",
        )
        .bind(&room_id)
        .fetch_all(&mut *tx)
        .await?;

        for showtime in &showtimes {
            let map = ledger::parse_seat_map(&showtime.seats_data)?;
            if map.values().any(|s| !s.available) {
                return Err(AppError::Conflict(format!(
                    "Cannot change room layout: showtime \"{}\" on {} {} has sold seats",
                    showtime.movie_title,
                    showtime.show_date.format("%Y-%m-%d"),
                    showtime.show_time.format("%H:%M"),
                )));
            }
        }

        let fresh = seatmap::generate(capacity as u32, seats_per_row as u32);
        for showtime in &showtimes {
            ledger::store_seat_map(&mut tx, &showtime.id, &fresh, showtime.seats_version).await?;
        }
    }

    sqlx::query(
        "UPDATE screening_rooms SET name = ?, capacity = ?, seats_per_row = ? WHERE id = ?",
    )
    .bind(body.name.as_deref().unwrap_or(&room.name))
    .bind(capacity)
    .bind(seats_per_row)
    .bind(&room_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row: RoomRow = sqlx::query_as::<_, RoomRow>(
        "SELECT id, cinema_id, name, capacity, seats_per_row FROM screening_rooms WHERE id = ?",
    )
    .bind(&room_id)
    .fetch_one(pool)
    .await?;
    Ok(Json(row))
}

async fn delete_room(
    State(state): State<AppState>,
    Path((cinema_id, room_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM screening_rooms WHERE id = ? AND cinema_id = ?")
        .bind(&room_id)
        .bind(&cinema_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
