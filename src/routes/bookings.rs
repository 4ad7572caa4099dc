//! `/bookings` routes — booking creation and payment flow.
//!
//! Booking creation, the gateway webhook and ticket download are public
//! (customers are not authenticated); listing, cancellation and the revenue
//! stats are staff-only.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::PaymentMode,
    errors::{AppError, AppResult},
    models::{PaymentMethod, PaymentStatus},
    services::{gateway, lifecycle, tickets},
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/bookings",                      post(create_booking))
        .route("/bookings/{reference}",          get(get_booking))
        .route("/bookings/{reference}/invoice",  post(create_invoice))
        .route("/bookings/{reference}/ticket",   get(download_ticket))
        .route("/payments/webhook",              post(payment_webhook))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/bookings",                      get(list_bookings))
        .route("/bookings/{reference}/cancel",   post(cancel_booking))
        .route("/bookings/stats/overview",       get(stats_overview))
        .route("/bookings/stats/summary",        get(stats_summary))
}

// ── Row / response types ─────────────────────────────────────

#[derive(sqlx::FromRow)]
struct BookingRow {
    booking_reference: String,
    showtime_id:       String,
    movie_title:       String,
    show_date:         NaiveDate,
    show_time:         NaiveTime,
    cinema_name:       Option<String>,
    room_name:         Option<String>,
    customer_name:     String,
    customer_email:    String,
    customer_phone:    Option<String>,
    customer_comments: Option<String>,
    seats:             String,
    number_of_tickets: i32,
    total_amount:      Decimal,
    payment_status:    PaymentStatus,
    payment_reference: Option<String>,
    payment_gateway:   String,
    payment_method:    PaymentMethod,
    payment_date:      Option<NaiveDateTime>,
    expires_at:        Option<NaiveDateTime>,
    qr_code_path:      Option<String>,
    created_at:        NaiveDateTime,
}

#[derive(Serialize)]
struct BookingResponse {
    booking_reference: String,
    showtime_id:       String,
    movie_title:       String,
    show_date:         NaiveDate,
    show_time:         NaiveTime,
    cinema_name:       Option<String>,
    room_name:         Option<String>,
    customer_name:     String,
    customer_email:    String,
    customer_phone:    Option<String>,
    customer_comments: Option<String>,
    seats:             Vec<String>,
    number_of_tickets: i32,
    total_amount:      Decimal,
    payment_status:    PaymentStatus,
    payment_reference: Option<String>,
    payment_gateway:   String,
    payment_method:    PaymentMethod,
    payment_date:      Option<NaiveDateTime>,
    expires_at:        Option<NaiveDateTime>,
    qr_code_path:      Option<String>,
    created_at:        NaiveDateTime,
}

impl BookingRow {
    fn into_response(self) -> AppResult<BookingResponse> {
        let seats: Vec<String> = serde_json::from_str(&self.seats)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking seats: {e}")))?;
        Ok(BookingResponse {
            booking_reference: self.booking_reference,
            showtime_id:       self.showtime_id,
            movie_title:       self.movie_title,
            show_date:         self.show_date,
            show_time:         self.show_time,
            cinema_name:       self.cinema_name,
            room_name:         self.room_name,
            customer_name:     self.customer_name,
            customer_email:    self.customer_email,
            customer_phone:    self.customer_phone,
            customer_comments: self.customer_comments,
            seats,
            number_of_tickets: self.number_of_tickets,
            total_amount:      self.total_amount,
            payment_status:    self.payment_status,
            payment_reference: self.payment_reference,
            payment_gateway:   self.payment_gateway,
            payment_method:    self.payment_method,
            payment_date:      self.payment_date,
            expires_at:        self.expires_at,
            qr_code_path:      self.qr_code_path,
            created_at:        self.created_at,
        })
    }
}

const BOOKING_SELECT: &str =
    "SELECT b.booking_reference, b.showtime_id, m.title AS movie_title,
            s.show_date, s.show_time, c.name AS cinema_name, r.name AS room_name,
            b.customer_name, b.customer_email, b.customer_phone, b.customer_comments,
            b.seats, b.number_of_tickets, b.total_amount,
            b.payment_status, b.payment_reference, b.payment_gateway, b.payment_method,
            b.payment_date, b.expires_at, b.qr_code_path, b.created_at
     FROM bookings b
     JOIN showtimes s ON s.id = b.showtime_id
     JOIN movies m ON m.id = s.movie_id
     LEFT JOIN screening_rooms r ON r.id = s.room_id
     LEFT JOIN cinemas c ON c.id = r.cinema_id";

async fn fetch_booking(pool: &crate::db::Db, reference: &str) -> AppResult<BookingResponse> {
    let row: BookingRow = sqlx::query_as::<_, BookingRow>(&format!(
        "{BOOKING_SELECT} WHERE b.booking_reference = ?"
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;
    row.into_response()
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CreateBookingBody {
    showtime_id:       String,
    seats:             Vec<String>,
    customer_name:     String,
    #[validate(email)]
    customer_email:    String,
    customer_phone:    Option<String>,
    customer_comments: Option<String>,
    payment_method:    Option<PaymentMethod>,
}

#[derive(Serialize)]
struct CreateBookingResponse {
    #[serde(flatten)]
    booking:        BookingResponse,
    payment_result: Option<lifecycle::PaymentResult>,
    message:        String,
}

#[derive(Deserialize)]
struct BookingFilter {
    status: Option<String>,
}

// ── Booking handlers ─────────────────────────────────────────

async fn create_booking(
    State(state): State<AppState>,
    Json(body): Json<CreateBookingBody>,
) -> AppResult<(StatusCode, Json<CreateBookingResponse>)> {
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid booking request: {e}")))?;
    if body.customer_name.trim().is_empty() {
        return Err(AppError::BadRequest("customer_name cannot be empty".into()));
    }

    let (reference, payment_result) = lifecycle::create_booking(
        &state,
        lifecycle::NewBooking {
            showtime_id:       body.showtime_id,
            seats:             body.seats,
            customer_name:     body.customer_name.trim().to_owned(),
            customer_email:    body.customer_email,
            customer_phone:    body.customer_phone,
            customer_comments: body.customer_comments,
            payment_method:    body.payment_method.unwrap_or(PaymentMethod::CreditCard),
        },
    )
    .await?;

    let booking = fetch_booking(&state.pool, &reference.to_string()).await?;
    let message = match payment_result {
        Some(_) => "Booking created and payment processed successfully".to_string(),
        None => "Booking created, awaiting payment".to_string(),
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse { booking, payment_result, message }),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<BookingResponse>> {
    Ok(Json(fetch_booking(&state.pool, &reference).await?))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let pool = &state.pool;
    let rows: Vec<BookingRow> = if let Some(status) = &filter.status {
        let valid = matches!(
            status.as_str(),
            "pending" | "paid" | "failed" | "cancelled" | "refunded"
        );
        if !valid {
            return Err(AppError::BadRequest("Invalid status filter".into()));
        }
        sqlx::query_as::<_, BookingRow>(&format!(
            "{BOOKING_SELECT} WHERE b.payment_status = ? ORDER BY b.created_at DESC"
        ))
        .bind(status)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, BookingRow>(&format!(
            "{BOOKING_SELECT} ORDER BY b.created_at DESC"
        ))
        .fetch_all(pool)
        .await?
    };

    let items = rows
        .into_iter()
        .map(BookingRow::into_response)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<BookingResponse>> {
    lifecycle::cancel_booking(&state, &reference).await?;
    Ok(Json(fetch_booking(&state.pool, &reference).await?))
}

// ── Invoice creation (gateway mode) ──────────────────────────

#[derive(sqlx::FromRow)]
struct InvoiceBookingRow {
    booking_reference: String,
    customer_name:     String,
    customer_email:    String,
    customer_phone:    Option<String>,
    total_amount:      Decimal,
    payment_status:    PaymentStatus,
    expires_at:        Option<NaiveDateTime>,
    movie_title:       String,
}

async fn create_invoice(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<gateway::Invoice>> {
    if state.config.payment_mode != PaymentMode::Gateway {
        return Err(AppError::BadRequest(
            "Invoice creation is only available in gateway mode".into(),
        ));
    }

    let row: InvoiceBookingRow = sqlx::query_as::<_, InvoiceBookingRow>(
        "SELECT b.booking_reference, b.customer_name, b.customer_email, b.customer_phone,
                b.total_amount, b.payment_status, b.expires_at, m.title AS movie_title
         FROM bookings b
         JOIN showtimes s ON s.id = b.showtime_id
         JOIN movies m ON m.id = s.movie_id
         WHERE b.booking_reference = ?",
    )
    .bind(&reference)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    if row.payment_status != PaymentStatus::Pending {
        return Err(AppError::BadRequest("Booking is not awaiting payment".into()));
    }

    let booking_reference = Uuid::parse_str(&row.booking_reference)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking reference: {e}")))?;

    let invoice = gateway::create_invoice(
        &state.config,
        gateway::InvoiceParams {
            booking_reference: &booking_reference,
            amount:            row.total_amount,
            movie_title:       &row.movie_title,
            customer_name:     &row.customer_name,
            customer_email:    &row.customer_email,
            customer_phone:    row.customer_phone.as_deref(),
            expires_at:        row.expires_at,
        },
    )
    .await?;

    Ok(Json(invoice))
}

// ── Ticket download ──────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct TicketRow {
    booking_reference: String,
    customer_name:     String,
    seats:             String,
    total_amount:      Decimal,
    payment_status:    PaymentStatus,
    payment_reference: Option<String>,
    movie_title:       String,
    show_date:         NaiveDate,
    show_time:         NaiveTime,
    cinema_name:       Option<String>,
    room_name:         Option<String>,
}

async fn download_ticket(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Response> {
    let row: TicketRow = sqlx::query_as::<_, TicketRow>(
        "SELECT b.booking_reference, b.customer_name, b.seats, b.total_amount,
                b.payment_status, b.payment_reference,
                m.title AS movie_title, s.show_date, s.show_time,
                c.name AS cinema_name, r.name AS room_name
         FROM bookings b
         JOIN showtimes s ON s.id = b.showtime_id
         JOIN movies m ON m.id = s.movie_id
         LEFT JOIN screening_rooms r ON r.id = s.room_id
         LEFT JOIN cinemas c ON c.id = r.cinema_id
         WHERE b.booking_reference = ?",
    )
    .bind(&reference)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    if row.payment_status != PaymentStatus::Paid {
        return Err(AppError::BadRequest(
            "Ticket not available for unpaid bookings.".into(),
        ));
    }

    let booking_reference = Uuid::parse_str(&row.booking_reference)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking reference: {e}")))?;
    let seats: Vec<String> = serde_json::from_str(&row.seats)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking seats: {e}")))?;

    let ctx = tickets::TicketContext {
        booking_reference,
        customer_name:     row.customer_name,
        movie_title:       row.movie_title,
        show_date:         row.show_date.format("%Y-%m-%d").to_string(),
        show_time:         row.show_time.format("%H:%M").to_string(),
        cinema_name:       row.cinema_name.unwrap_or_default(),
        room_name:         row.room_name.unwrap_or_default(),
        seats,
        total_amount:      format!("{:.2}", row.total_amount),
        payment_reference: row.payment_reference.unwrap_or_default(),
    };

    let pdf = tickets::render_ticket_pdf(&ctx)?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"ticket_{reference}.pdf\""),
        ),
    ];
    Ok((headers, pdf).into_response())
}

// ── Payment webhook ──────────────────────────────────────────

const SIGNATURE_HEADER: &str = "x-callback-signature";

/// Gateway callback. Every failure is reported as a 400 with details — a
/// 5xx would put the gateway into an endless retry loop against a payload
/// we will never accept.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match lifecycle::handle_webhook(&state, &body, signature).await {
        Ok(ack) => {
            let result = match ack {
                lifecycle::WebhookAck::Paid => "paid",
                lifecycle::WebhookAck::Expired => "expired",
                lifecycle::WebhookAck::Ignored => "ignored",
            };
            (StatusCode::OK, Json(json!({ "status": "ok", "result": result }))).into_response()
        }
        Err(err) => {
            tracing::warn!(error = ?err, "Webhook processing failed");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

// ── Stats ────────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct DailyTrendRow {
    day:             NaiveDate,
    daily_bookings:  i64,
    daily_revenue:   Decimal,
}

#[derive(Serialize)]
struct OverviewResponse {
    total_bookings: i64,
    total_revenue:  Decimal,
    today_bookings: i64,
    today_revenue:  Decimal,
    monthly_trends: Vec<DailyTrendRow>,
}

async fn stats_overview(State(state): State<AppState>) -> AppResult<Json<OverviewResponse>> {
    let pool = &state.pool;

    let total_bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(pool)
        .await?;
    let total_revenue: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_amount), 0) FROM bookings WHERE payment_status = 'paid'",
    )
    .fetch_one(pool)
    .await?;

    let today_bookings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE DATE(created_at) = UTC_DATE()")
            .fetch_one(pool)
            .await?;
    let today_revenue: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_amount), 0) FROM bookings
         WHERE DATE(created_at) = UTC_DATE() AND payment_status = 'paid'",
    )
    .fetch_one(pool)
    .await?;

    let monthly_trends: Vec<DailyTrendRow> = sqlx::query_as::<_, DailyTrendRow>(
        "SELECT DATE(created_at) AS day,
                COUNT(*) AS daily_bookings,
                COALESCE(SUM(total_amount), 0) AS daily_revenue
         FROM bookings
         WHERE YEAR(created_at) = YEAR(UTC_TIMESTAMP())
           AND MONTH(created_at) = MONTH(UTC_TIMESTAMP())
         GROUP BY DATE(created_at)
         ORDER BY day",
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(OverviewResponse {
        total_bookings,
        total_revenue,
        today_bookings,
        today_revenue,
        monthly_trends,
    }))
}

#[derive(sqlx::FromRow, Serialize)]
struct PaymentStatRow {
    payment_status: String,
    booking_count:  i64,
    revenue:        Decimal,
}

#[derive(sqlx::FromRow, Serialize)]
struct PopularMovieRow {
    title:         String,
    booking_count: i64,
    revenue:       Decimal,
}

#[derive(Serialize)]
struct SummaryResponse {
    payment_stats:  Vec<PaymentStatRow>,
    popular_movies: Vec<PopularMovieRow>,
}

async fn stats_summary(State(state): State<AppState>) -> AppResult<Json<SummaryResponse>> {
    let pool = &state.pool;

    let payment_stats: Vec<PaymentStatRow> = sqlx::query_as::<_, PaymentStatRow>(
        "SELECT payment_status,
                COUNT(*) AS booking_count,
                COALESCE(SUM(total_amount), 0) AS revenue
         FROM bookings
         GROUP BY payment_status
         ORDER BY payment_status",
    )
    .fetch_all(pool)
    .await?;

    let popular_movies: Vec<PopularMovieRow> = sqlx::query_as::<_, PopularMovieRow>(
        "SELECT m.title,
                COUNT(*) AS booking_count,
                COALESCE(SUM(b.total_amount), 0) AS revenue
         FROM bookings b
         JOIN showtimes s ON s.id = b.showtime_id
         JOIN movies m ON m.id = s.movie_id
         WHERE b.payment_status = 'paid'
         GROUP BY m.id, m.title
         ORDER BY booking_count DESC
         LIMIT 5",
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(SummaryResponse { payment_stats, popular_movies }))
}
