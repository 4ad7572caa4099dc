#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Catalog ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub id:          Uuid,
    pub name:        String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id:               Uuid,
    pub title:            String,
    pub description:      Option<String>,
    pub genre_id:         Option<Uuid>,
    pub duration_minutes: i32,
    pub age_rating:       AgeRating,
    pub poster_url:       Option<String>,
    pub is_active:        bool,
    pub created_at:       NaiveDateTime,
    pub updated_at:       NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AgeRating {
    G,
    Pg,
    R13,
    R18,
}

// ── Venues ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cinema {
    pub id:       Uuid,
    pub name:     String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScreeningRoom {
    pub id:            Uuid,
    pub cinema_id:     Uuid,
    pub name:          String,
    pub capacity:      i32,
    pub seats_per_row: i32,
}

// ── Showtimes ────────────────────────────────────────────────

/// `seats_data` holds the seat map as a JSON document
/// (`{"A1": {"available": true}, ...}`); it is only ever read and written
/// through the seat ledger. `seats_version` is the ledger's optimistic-lock
/// counter, bumped on every seat mutation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Showtime {
    pub id:            Uuid,
    pub movie_id:      Uuid,
    pub room_id:       Option<Uuid>,
    pub show_date:     NaiveDate,
    pub show_time:     NaiveTime,
    pub seats_data:    String,
    pub seats_version: i64,
    pub ticket_price:  Decimal,
    pub is_active:     bool,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
}

// ── Bookings ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id:                Uuid,
    pub booking_reference: Uuid,
    pub showtime_id:       Uuid,
    pub customer_name:     String,
    pub customer_email:    String,
    pub customer_phone:    Option<String>,
    pub customer_comments: Option<String>,
    pub seats:             String, // JSON array of seat codes: ["A1","A2"]
    pub number_of_tickets: i32,
    pub total_amount:      Decimal,
    pub payment_status:    PaymentStatus,
    pub payment_reference: Option<String>,
    pub payment_gateway:   String,
    pub payment_method:    PaymentMethod,
    pub payment_date:      Option<NaiveDateTime>,
    pub expires_at:        Option<NaiveDateTime>,
    pub qr_code_path:      Option<String>,
    pub created_at:        NaiveDateTime,
    pub updated_at:        NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending   => "pending",
            PaymentStatus::Paid      => "paid",
            PaymentStatus::Failed    => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded  => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Ewallet,
    BankTransfer,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::CreditCard   => "credit_card",
            PaymentMethod::DebitCard    => "debit_card",
            PaymentMethod::Ewallet      => "ewallet",
            PaymentMethod::BankTransfer => "bank_transfer",
        };
        write!(f, "{s}")
    }
}

// ── Staff accounts ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StaffUser {
    pub id:            Uuid,
    pub username:      String,
    pub password_hash: String,
    pub is_active:     bool,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffSession {
    pub id:         Uuid,
    pub staff_id:   Uuid,
    pub token:      String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}
