//! `/movies` and `/genres` routes — thin catalog CRUD.
//!
//! The catalog has no business logic of its own; showtime scheduling reads
//! `duration_minutes` from here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/genres",       get(list_genres))
        .route("/movies",       get(list_movies))
        .route("/movies/{id}",  get(get_movie))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/genres",       post(create_genre))
        .route("/genres/{id}",  put(update_genre).delete(delete_genre))
        .route("/movies",       post(create_movie))
        .route("/movies/{id}",  put(update_movie).delete(delete_movie))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct GenreRow {
    id:          String,
    name:        String,
    description: Option<String>,
}

#[derive(sqlx::FromRow, Serialize)]
struct MovieRow {
    id:               String,
    title:            String,
    description:      Option<String>,
    genre_id:         Option<String>,
    genre_name:       Option<String>,
    duration_minutes: i32,
    age_rating:       String,
    poster_url:       Option<String>,
    is_active:        bool,
}

const MOVIE_SELECT: &str =
    "SELECT m.id, m.title, m.description, m.genre_id, g.name AS genre_name,
            m.duration_minutes, m.age_rating, m.poster_url, m.is_active
     FROM movies m
     LEFT JOIN genres g ON g.id = m.genre_id";

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct GenreBody {
    name:        String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct CreateMovieBody {
    title:            String,
    description:      Option<String>,
    genre_id:         Option<String>,
    duration_minutes: i32,
    age_rating:       Option<String>,
    poster_url:       Option<String>,
}

#[derive(Deserialize)]
struct UpdateMovieBody {
    title:            Option<String>,
    description:      Option<String>,
    genre_id:         Option<String>,
    duration_minutes: Option<i32>,
    age_rating:       Option<String>,
    poster_url:       Option<String>,
    is_active:        Option<bool>,
}

#[derive(Deserialize)]
struct MovieFilter {
    genre: Option<String>,
}

// ── Validation helpers ───────────────────────────────────────

fn check_duration(minutes: i32) -> AppResult<()> {
    if minutes <= 0 {
        return Err(AppError::BadRequest("duration_minutes must be positive".into()));
    }
    Ok(())
}

fn check_age_rating(rating: &str) -> AppResult<()> {
    if !matches!(rating, "G" | "PG" | "R13" | "R18") {
        return Err(AppError::BadRequest("age_rating must be one of G, PG, R13, R18".into()));
    }
    Ok(())
}

// ── Genre handlers ───────────────────────────────────────────

async fn list_genres(State(state): State<AppState>) -> AppResult<Json<Vec<GenreRow>>> {
    let rows: Vec<GenreRow> = sqlx::query_as::<_, GenreRow>(
        "SELECT id, name, description FROM genres ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn create_genre(
    State(state): State<AppState>,
    Json(body): Json<GenreBody>,
) -> AppResult<(StatusCode, Json<GenreRow>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Genre name cannot be empty".into()));
    }

    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO genres (id, name, description) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(body.name.trim())
        .bind(&body.description)
        .execute(pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Genre \"{}\" already exists", body.name.trim()))
            }
            _ => e.into(),
        })?;

    let row: GenreRow =
        sqlx::query_as::<_, GenreRow>("SELECT id, name, description FROM genres WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_genre(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GenreBody>,
) -> AppResult<Json<GenreRow>> {
    let pool = &state.pool;
    let result = sqlx::query("UPDATE genres SET name = ?, description = ? WHERE id = ?")
        .bind(body.name.trim())
        .bind(&body.description)
        .bind(&id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    let row: GenreRow =
        sqlx::query_as::<_, GenreRow>("SELECT id, name, description FROM genres WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
    Ok(Json(row))
}

async fn delete_genre(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM genres WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Movie handlers ───────────────────────────────────────────

async fn list_movies(
    State(state): State<AppState>,
    Query(filter): Query<MovieFilter>,
) -> AppResult<Json<Vec<MovieRow>>> {
    let pool = &state.pool;
    let rows: Vec<MovieRow> = if let Some(genre) = &filter.genre {
        sqlx::query_as::<_, MovieRow>(&format!(
            "{MOVIE_SELECT} WHERE m.is_active = 1 AND m.genre_id = ? ORDER BY m.title"
        ))
        .bind(genre)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, MovieRow>(&format!(
            "{MOVIE_SELECT} WHERE m.is_active = 1 ORDER BY m.title"
        ))
        .fetch_all(pool)
        .await?
    };
    Ok(Json(rows))
}

async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MovieRow>> {
    let row: MovieRow = sqlx::query_as::<_, MovieRow>(&format!("{MOVIE_SELECT} WHERE m.id = ?"))
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(row))
}

async fn create_movie(
    State(state): State<AppState>,
    Json(body): Json<CreateMovieBody>,
) -> AppResult<(StatusCode, Json<MovieRow>)> {
    if body.title.trim().is_empty() {
        return Err(AppError::BadRequest("Movie title cannot be empty".into()));
    }
    check_duration(body.duration_minutes)?;
    let age_rating = body.age_rating.as_deref().unwrap_or("PG");
    check_age_rating(age_rating)?;

    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO movies
            (id, title, description, genre_id, duration_minutes, age_rating, poster_url, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(&body.genre_id)
    .bind(body.duration_minutes)
    .bind(age_rating)
    .bind(&body.poster_url)
    .execute(pool)
    .await?;

    let row: MovieRow = sqlx::query_as::<_, MovieRow>(&format!("{MOVIE_SELECT} WHERE m.id = ?"))
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateMovieBody>,
) -> AppResult<Json<MovieRow>> {
    let pool = &state.pool;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = ?)")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound);
    }

    if let Some(minutes) = body.duration_minutes {
        check_duration(minutes)?;
    }
    if let Some(rating) = &body.age_rating {
        check_age_rating(rating)?;
    }

    if let Some(v) = &body.title            { sqlx::query("UPDATE movies SET title = ? WHERE id = ?").bind(v.trim()).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.description      { sqlx::query("UPDATE movies SET description = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.genre_id         { sqlx::query("UPDATE movies SET genre_id = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.duration_minutes  { sqlx::query("UPDATE movies SET duration_minutes = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.age_rating       { sqlx::query("UPDATE movies SET age_rating = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.poster_url       { sqlx::query("UPDATE movies SET poster_url = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.is_active         { sqlx::query("UPDATE movies SET is_active = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }

    let row: MovieRow = sqlx::query_as::<_, MovieRow>(&format!("{MOVIE_SELECT} WHERE m.id = ?"))
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(Json(row))
}

async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM movies WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
