//! Seat availability ledger.
//!
//! Every mutation of a showtime's `seats_data` goes through this module.
//! Writers lock the showtime row (`SELECT ... FOR UPDATE`), rewrite the
//! whole JSON document and bump `seats_version`, so two concurrent bookings
//! cannot both claim the same seat.

use sqlx::{MySql, Transaction};

use crate::db::Db;
use crate::errors::{AppError, AppResult};
use crate::services::seatmap::SeatMap;

pub fn parse_seat_map(raw: &str) -> AppResult<SeatMap> {
    if raw.trim().is_empty() {
        return Ok(SeatMap::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt seat map document: {e}")))
}

pub fn serialize_seat_map(map: &SeatMap) -> AppResult<String> {
    serde_json::to_string(map)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode seat map: {e}")))
}

/// Flip the `available` flag for exactly the given codes.
///
/// Codes absent from the map are ignored: room layout changes are blocked
/// while seats are sold, so an absent code can only come from a stale client.
pub fn flip_seats(map: &mut SeatMap, seat_codes: &[String], available: bool) {
    for code in seat_codes {
        if let Some(seat) = map.get_mut(code) {
            seat.available = available;
        }
    }
}

pub fn available_count(map: &SeatMap) -> usize {
    map.values().filter(|s| s.available).count()
}

pub fn is_full(map: &SeatMap) -> bool {
    !map.is_empty() && map.values().all(|s| !s.available)
}

// ── Locked read / write ───────────────────────────────────────

#[derive(sqlx::FromRow)]
struct SeatDataRow {
    seats_data:    String,
    seats_version: i64,
}

/// Read a showtime's seat map inside `tx`, holding a row lock until commit.
pub async fn lock_seat_map(
    tx: &mut Transaction<'_, MySql>,
    showtime_id: &str,
) -> AppResult<(SeatMap, i64)> {
    let row: SeatDataRow = sqlx::query_as::<_, SeatDataRow>(
        "SELECT seats_data, seats_version FROM showtimes WHERE id = ? FOR UPDATE",
    )
    .bind(showtime_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok((parse_seat_map(&row.seats_data)?, row.seats_version))
}

/// Persist a seat map read via [`lock_seat_map`] in the same transaction.
/// The version guard rejects writes racing a mutation outside the lock.
pub async fn store_seat_map(
    tx: &mut Transaction<'_, MySql>,
    showtime_id: &str,
    map: &SeatMap,
    expected_version: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE showtimes
         SET seats_data = ?, seats_version = seats_version + 1, updated_at = UTC_TIMESTAMP()
         WHERE id = ? AND seats_version = ?",
    )
    .bind(serialize_seat_map(map)?)
    .bind(showtime_id)
    .bind(expected_version)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(AppError::Conflict(
            "Seat map was modified concurrently, please retry".into(),
        ));
    }
    Ok(())
}

async fn set_availability(
    tx: &mut Transaction<'_, MySql>,
    showtime_id: &str,
    seat_codes: &[String],
    available: bool,
) -> AppResult<()> {
    let (mut map, version) = lock_seat_map(tx, showtime_id).await?;
    flip_seats(&mut map, seat_codes, available);
    store_seat_map(tx, showtime_id, &map, version).await
}

/// Mark the given seats as sold. Used on the paid transition.
pub async fn mark_unavailable(pool: &Db, showtime_id: &str, seat_codes: &[String]) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    set_availability(&mut tx, showtime_id, seat_codes, false).await?;
    tx.commit().await?;
    Ok(())
}

/// Release previously sold seats. Used when a paid booking is cancelled.
pub async fn mark_available(pool: &Db, showtime_id: &str, seat_codes: &[String]) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    set_availability(&mut tx, showtime_id, seat_codes, true).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::seatmap;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flip_marks_only_requested_seats() {
        let mut map = seatmap::generate(12, 4);
        flip_seats(&mut map, &codes(&["A1", "B2"]), false);

        assert!(!map["A1"].available);
        assert!(!map["B2"].available);
        assert_eq!(available_count(&map), 10);
    }

    #[test]
    fn flip_ignores_unknown_codes() {
        let mut map = seatmap::generate(4, 2);
        flip_seats(&mut map, &codes(&["Z9", "A1"]), false);

        assert_eq!(map.len(), 4);
        assert!(!map["A1"].available);
        assert_eq!(available_count(&map), 3);
    }

    #[test]
    fn release_restores_exactly_the_booked_seats() {
        let mut map = seatmap::generate(6, 3);
        flip_seats(&mut map, &codes(&["A1", "A2", "B1"]), false);
        flip_seats(&mut map, &codes(&["A1", "A2"]), true);

        assert!(map["A1"].available);
        assert!(map["A2"].available);
        assert!(!map["B1"].available);
    }

    #[test]
    fn flip_is_idempotent() {
        let mut map = seatmap::generate(4, 2);
        flip_seats(&mut map, &codes(&["A1"]), false);
        flip_seats(&mut map, &codes(&["A1"]), false);

        assert!(!map["A1"].available);
        assert_eq!(available_count(&map), 3);
    }

    #[test]
    fn full_and_count_helpers() {
        let mut map = seatmap::generate(3, 3);
        assert!(!is_full(&map));

        let all = map.keys().cloned().collect::<Vec<_>>();
        flip_seats(&mut map, &all, false);
        assert!(is_full(&map));
        assert_eq!(available_count(&map), 0);

        assert!(!is_full(&SeatMap::new()));
    }

    #[test]
    fn parse_handles_empty_and_round_trips() {
        assert!(parse_seat_map("").unwrap().is_empty());

        let map = seatmap::generate(5, 5);
        let raw = serialize_seat_map(&map).unwrap();
        assert_eq!(parse_seat_map(&raw).unwrap(), map);
    }
}
