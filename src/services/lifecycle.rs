//! Booking payment lifecycle.
//!
//! A booking's `payment_status` only moves along the explicit transition
//! table below, and every status write is guarded by the current status in
//! its `WHERE` clause, so replayed webhooks and concurrent requests cannot
//! push a booking into an inconsistent state. Seats are marked sold only on
//! the paid transition; pending bookings never hold seats, which is why the
//! expiry sweep and the pending cancel path do not touch the ledger.

use chrono::{Duration, Utc};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::{MySql, Transaction};
use uuid::Uuid;

use crate::config::PaymentMode;
use crate::errors::{AppError, AppResult};
use crate::models::{PaymentMethod, PaymentStatus};
use crate::services::seatmap::SeatMap;
use crate::services::{email, gateway, ledger, tickets};
use crate::state::AppState;

pub const MOCK_GATEWAY: &str = "mock_payment_gateway";

// ── Transition table ──────────────────────────────────────────

/// The only allowed payment status moves. Everything else is rejected,
/// including self-transitions — callers handle replays explicitly.
pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Paid)
            | (Pending, Failed)
            | (Pending, Cancelled)
            | (Paid, Cancelled)
            | (Paid, Refunded)
    )
}

/// Guarded status write: the `WHERE payment_status = from` clause makes the
/// transition atomic against concurrent writers.
async fn transition_status(
    tx: &mut Transaction<'_, MySql>,
    booking_id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
) -> AppResult<()> {
    if !can_transition(from, to) {
        return Err(AppError::Conflict(format!(
            "Invalid payment transition {from} -> {to}"
        )));
    }

    let result = sqlx::query(
        "UPDATE bookings SET payment_status = ?, updated_at = UTC_TIMESTAMP()
         WHERE id = ? AND payment_status = ?",
    )
    .bind(to)
    .bind(booking_id)
    .bind(from)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(AppError::Conflict(
            "Booking status changed concurrently, please retry".into(),
        ));
    }
    Ok(())
}

/// Transition pending -> paid and stamp the payment fields in one guarded write.
async fn mark_paid(
    tx: &mut Transaction<'_, MySql>,
    booking_id: &str,
    payment_reference: &str,
    gateway_name: &str,
) -> AppResult<()> {
    if !can_transition(PaymentStatus::Pending, PaymentStatus::Paid) {
        return Err(AppError::Conflict("Invalid payment transition".into()));
    }

    let result = sqlx::query(
        "UPDATE bookings
         SET payment_status = 'paid',
             payment_reference = ?,
             payment_gateway = ?,
             payment_date = UTC_TIMESTAMP(),
             updated_at = UTC_TIMESTAMP()
         WHERE id = ? AND payment_status = 'pending'",
    )
    .bind(payment_reference)
    .bind(gateway_name)
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(AppError::Conflict(
            "Booking status changed concurrently, please retry".into(),
        ));
    }
    Ok(())
}

// ── References ────────────────────────────────────────────────

/// Stable mock payment reference, derived from the booking reference so
/// reprocessing a booking always produces the same value.
pub fn payment_reference_for(booking_reference: &Uuid) -> String {
    let hex = booking_reference.simple().to_string();
    format!("MOCK_{}", hex[..16].to_uppercase())
}

/// Requested seats that are absent from the map or already sold.
pub fn find_unavailable(map: &SeatMap, requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|code| map.get(*code).map_or(true, |s| !s.available))
        .cloned()
        .collect()
}

// ── Booking creation ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub showtime_id:       String,
    pub seats:             Vec<String>,
    pub customer_name:     String,
    pub customer_email:    String,
    pub customer_phone:    Option<String>,
    pub customer_comments: Option<String>,
    pub payment_method:    PaymentMethod,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentResult {
    pub success:           bool,
    pub payment_reference: String,
    pub status:            String,
    pub gateway:           String,
    pub paid_at:           String,
    pub message:           String,
    pub booking_reference: String,
}

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id:           String,
    ticket_price: Decimal,
    is_active:    bool,
}

/// Create a booking against currently-available seats.
///
/// The availability check, the insert and (in instant mode) the paid
/// transition plus seat flip all commit in one transaction holding the
/// showtime row lock, so two concurrent requests cannot both claim a seat.
pub async fn create_booking(
    state: &AppState,
    input: NewBooking,
) -> AppResult<(Uuid, Option<PaymentResult>)> {
    if input.seats.is_empty() {
        return Err(AppError::BadRequest("At least one seat must be selected".into()));
    }
    let mut deduped = input.seats.clone();
    deduped.sort();
    deduped.dedup();
    if deduped.len() != input.seats.len() {
        return Err(AppError::BadRequest("Duplicate seat codes in request".into()));
    }

    let mut tx = state.pool.begin().await?;

    let showtime: ShowtimeRow = sqlx::query_as::<_, ShowtimeRow>(
        "SELECT id, ticket_price, is_active FROM showtimes WHERE id = ?",
    )
    .bind(&input.showtime_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound)?;

    if !showtime.is_active {
        return Err(AppError::BadRequest("Showtime is no longer active".into()));
    }

    let (mut map, version) = ledger::lock_seat_map(&mut tx, &showtime.id).await?;

    let unavailable = find_unavailable(&map, &input.seats);
    if !unavailable.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Seats {} are not available",
            unavailable.join(", ")
        )));
    }

    let total_amount = showtime.ticket_price * Decimal::from(input.seats.len() as u64);
    let booking_id = Uuid::new_v4().to_string();
    let booking_reference = Uuid::new_v4();
    let expires_at = match state.config.payment_mode {
        PaymentMode::Gateway => {
            Some(Utc::now().naive_utc() + Duration::minutes(state.config.booking_hold_minutes))
        }
        PaymentMode::Instant => None,
    };

    sqlx::query(
        "INSERT INTO bookings
            (id, booking_reference, showtime_id, customer_name, customer_email,
             customer_phone, customer_comments, seats, number_of_tickets,
             total_amount, payment_status, payment_gateway, payment_method, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(&booking_id)
    .bind(booking_reference.to_string())
    .bind(&showtime.id)
    .bind(&input.customer_name)
    .bind(&input.customer_email)
    .bind(&input.customer_phone)
    .bind(&input.customer_comments)
    .bind(serde_json::to_string(&input.seats).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?)
    .bind(input.seats.len() as i32)
    .bind(total_amount)
    .bind(MOCK_GATEWAY)
    .bind(input.payment_method)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    let payment_result = match state.config.payment_mode {
        PaymentMode::Instant => {
            let payment_reference = payment_reference_for(&booking_reference);
            mark_paid(&mut tx, &booking_id, &payment_reference, MOCK_GATEWAY).await?;

            ledger::flip_seats(&mut map, &input.seats, false);
            ledger::store_seat_map(&mut tx, &showtime.id, &map, version).await?;

            Some(PaymentResult {
                success: true,
                payment_reference,
                status: "PAID".into(),
                gateway: MOCK_GATEWAY.into(),
                paid_at: Utc::now().to_rfc3339(),
                message: "Payment processed successfully".into(),
                booking_reference: booking_reference.to_string(),
            })
        }
        PaymentMode::Gateway => None,
    };

    tx.commit().await?;

    if payment_result.is_some() {
        spawn_confirmation_delivery(state.clone(), booking_id);
    }

    Ok((booking_reference, payment_result))
}

// ── Payment confirmation ──────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyPaid,
}

#[derive(sqlx::FromRow)]
struct BookingStateRow {
    id:                String,
    booking_reference: String,
    showtime_id:       String,
    seats:             String,
    payment_status:    PaymentStatus,
}

async fn lock_booking_by_reference(
    tx: &mut Transaction<'_, MySql>,
    booking_reference: &str,
) -> AppResult<BookingStateRow> {
    sqlx::query_as::<_, BookingStateRow>(
        "SELECT id, booking_reference, showtime_id, seats, payment_status
         FROM bookings WHERE booking_reference = ? FOR UPDATE",
    )
    .bind(booking_reference)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::NotFound)
}

fn booked_seats(raw: &str) -> AppResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking seats: {e}")))
}

/// Idempotently settle a pending booking.
///
/// Already-paid bookings are acknowledged without a second ledger mutation;
/// terminal bookings are rejected via the transition table.
pub async fn confirm_payment(
    state: &AppState,
    booking_reference: &str,
    payment_reference: Option<String>,
    gateway_name: &str,
) -> AppResult<ConfirmOutcome> {
    let mut tx = state.pool.begin().await?;
    let booking = lock_booking_by_reference(&mut tx, booking_reference).await?;

    match booking.payment_status {
        PaymentStatus::Paid => {
            tx.commit().await?;
            Ok(ConfirmOutcome::AlreadyPaid)
        }
        PaymentStatus::Pending => {
            let reference = Uuid::parse_str(&booking.booking_reference)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking reference: {e}")))?;
            let payment_reference =
                payment_reference.unwrap_or_else(|| payment_reference_for(&reference));

            mark_paid(&mut tx, &booking.id, &payment_reference, gateway_name).await?;

            let seats = booked_seats(&booking.seats)?;
            let (mut map, version) = ledger::lock_seat_map(&mut tx, &booking.showtime_id).await?;
            ledger::flip_seats(&mut map, &seats, false);
            ledger::store_seat_map(&mut tx, &booking.showtime_id, &map, version).await?;

            tx.commit().await?;
            spawn_confirmation_delivery(state.clone(), booking.id);
            Ok(ConfirmOutcome::Confirmed)
        }
        other => Err(AppError::Conflict(format!(
            "Cannot mark a {other} booking as paid"
        ))),
    }
}

// ── Cancellation ──────────────────────────────────────────────

/// Cancel a booking. Paid bookings release their seats first; pending
/// bookings never held any.
pub async fn cancel_booking(state: &AppState, booking_reference: &str) -> AppResult<()> {
    let mut tx = state.pool.begin().await?;
    let booking = lock_booking_by_reference(&mut tx, booking_reference).await?;

    match booking.payment_status {
        PaymentStatus::Paid => {
            let seats = booked_seats(&booking.seats)?;
            let (mut map, version) = ledger::lock_seat_map(&mut tx, &booking.showtime_id).await?;
            ledger::flip_seats(&mut map, &seats, true);
            ledger::store_seat_map(&mut tx, &booking.showtime_id, &map, version).await?;

            transition_status(&mut tx, &booking.id, PaymentStatus::Paid, PaymentStatus::Cancelled)
                .await?;
        }
        PaymentStatus::Pending => {
            transition_status(&mut tx, &booking.id, PaymentStatus::Pending, PaymentStatus::Cancelled)
                .await?;
        }
        other => {
            return Err(AppError::Conflict(format!("Cannot cancel a {other} booking")));
        }
    }

    tx.commit().await?;
    Ok(())
}

// ── Webhook processing ────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookAck {
    Paid,
    Expired,
    Ignored,
}

/// Process a gateway callback. The signature is verified before anything
/// else; a mismatch takes no state action.
pub async fn handle_webhook(
    state: &AppState,
    raw_body: &[u8],
    signature: Option<&str>,
) -> AppResult<WebhookAck> {
    if !gateway::verify_signature(
        &state.config.payment_callback_token,
        raw_body,
        signature.unwrap_or(""),
    ) {
        return Err(AppError::Unauthorized);
    }

    let payload: gateway::WebhookPayload = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    let reference = gateway::booking_reference_from_external_id(&payload.external_id)
        .ok_or_else(|| {
            AppError::BadRequest(format!("Unrecognized external id: {}", payload.external_id))
        })?;

    match payload.status.as_str() {
        "PAID" => {
            confirm_payment(state, reference, payload.id.clone(), "xendit").await?;
            Ok(WebhookAck::Paid)
        }
        "EXPIRED" => {
            let mut tx = state.pool.begin().await?;
            let booking = lock_booking_by_reference(&mut tx, reference).await?;
            // Pending bookings hold no seats, so there is nothing to release.
            if booking.payment_status == PaymentStatus::Pending {
                transition_status(&mut tx, &booking.id, PaymentStatus::Pending, PaymentStatus::Failed)
                    .await?;
            }
            tx.commit().await?;
            Ok(WebhookAck::Expired)
        }
        other => {
            tracing::info!(status = other, external_id = %payload.external_id, "Ignoring webhook status");
            Ok(WebhookAck::Ignored)
        }
    }
}

// ── Confirmation side effects ─────────────────────────────────

#[derive(sqlx::FromRow)]
struct ConfirmationRow {
    booking_reference: String,
    customer_name:     String,
    customer_email:    String,
    seats:             String,
    total_amount:      Decimal,
    payment_reference: Option<String>,
    movie_title:       String,
    show_date:         NaiveDate,
    show_time:         NaiveTime,
    cinema_name:       Option<String>,
    room_name:         Option<String>,
}

/// Fire-and-forget delivery of the QR artifact and the confirmation email.
/// The payment state is already committed; failures are logged, never raised.
pub fn spawn_confirmation_delivery(state: AppState, booking_id: String) {
    tokio::spawn(async move {
        if let Err(err) = deliver_confirmation(&state, &booking_id).await {
            tracing::warn!(
                error = ?err,
                booking_id = %booking_id,
                "Booking confirmation delivery failed"
            );
        }
    });
}

async fn deliver_confirmation(state: &AppState, booking_id: &str) -> AppResult<()> {
    let row: ConfirmationRow = sqlx::query_as::<_, ConfirmationRow>(
        "SELECT b.booking_reference, b.customer_name, b.customer_email, b.seats,
                b.total_amount, b.payment_reference,
                m.title AS movie_title, s.show_date, s.show_time,
                c.name AS cinema_name, r.name AS room_name
         FROM bookings b
         JOIN showtimes s ON s.id = b.showtime_id
         JOIN movies m ON m.id = s.movie_id
         LEFT JOIN screening_rooms r ON r.id = s.room_id
         LEFT JOIN cinemas c ON c.id = r.cinema_id
         WHERE b.id = ?",
    )
    .bind(booking_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    let reference = Uuid::parse_str(&row.booking_reference)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt booking reference: {e}")))?;

    let customer_email = row.customer_email.clone();
    let ctx = tickets::TicketContext {
        booking_reference: reference,
        customer_name:     row.customer_name,
        movie_title:       row.movie_title,
        show_date:         row.show_date.format("%Y-%m-%d").to_string(),
        show_time:         row.show_time.format("%H:%M").to_string(),
        cinema_name:       row.cinema_name.unwrap_or_default(),
        room_name:         row.room_name.unwrap_or_default(),
        seats:             booked_seats(&row.seats)?,
        total_amount:      format!("{:.2}", row.total_amount),
        payment_reference: row.payment_reference.unwrap_or_default(),
    };

    match tickets::generate_qr_code(&ctx).await {
        Ok(path) => {
            sqlx::query("UPDATE bookings SET qr_code_path = ? WHERE id = ?")
                .bind(&path)
                .bind(booking_id)
                .execute(&state.pool)
                .await?;
        }
        Err(err) => {
            tracing::warn!(error = ?err, booking_id, "QR code generation failed");
        }
    }

    let pdf = tickets::render_ticket_pdf(&ctx)?;
    email::send_booking_confirmation(&state.config, &customer_email, &ctx, pdf).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::seatmap;

    #[test]
    fn transition_table_allows_lifecycle_moves() {
        use PaymentStatus::*;
        assert!(can_transition(Pending, Paid));
        assert!(can_transition(Pending, Failed));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Paid, Cancelled));
        assert!(can_transition(Paid, Refunded));
    }

    #[test]
    fn transition_table_rejects_everything_else() {
        use PaymentStatus::*;
        // Replaying paid is handled above the table, never as a transition.
        assert!(!can_transition(Paid, Paid));
        assert!(!can_transition(Pending, Refunded));
        assert!(!can_transition(Paid, Failed));
        for terminal in [Failed, Cancelled, Refunded] {
            for to in [Pending, Paid, Failed, Cancelled, Refunded] {
                assert!(!can_transition(terminal, to), "{terminal} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn payment_reference_is_stable_and_formatted() {
        let reference = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
        let first = payment_reference_for(&reference);
        let second = payment_reference_for(&reference);

        assert_eq!(first, second);
        assert_eq!(first, "MOCK_6BA7B8109DAD11D1");
        assert!(first.strip_prefix("MOCK_").unwrap().len() == 16);
    }

    #[test]
    fn different_bookings_get_different_references() {
        assert_ne!(
            payment_reference_for(&Uuid::new_v4()),
            payment_reference_for(&Uuid::new_v4())
        );
    }

    #[test]
    fn find_unavailable_lists_sold_and_unknown_codes() {
        let mut map = seatmap::generate(12, 4);
        ledger::flip_seats(&mut map, &["B2".to_string()], false);

        let requested = vec!["A1".to_string(), "B2".to_string(), "Z9".to_string()];
        assert_eq!(find_unavailable(&map, &requested), vec!["B2", "Z9"]);
    }

    #[test]
    fn find_unavailable_empty_when_all_free() {
        let map = seatmap::generate(6, 3);
        let requested = vec!["A1".to_string(), "B3".to_string()];
        assert!(find_unavailable(&map, &requested).is_empty());
    }
}
