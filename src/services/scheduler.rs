//! Showtime scheduling validation.
//!
//! A showtime occupies its room for the movie's running time plus a fixed
//! turnover buffer. Two showtimes in the same room on the same date must not
//! have overlapping occupancy windows.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{MySql, Transaction};

use crate::errors::{AppError, AppResult};

/// Cleaning/turnover buffer added after every screening, in minutes.
pub const TURNOVER_MINUTES: i64 = 30;

/// An existing showtime's occupancy of a room, as fetched for validation.
#[derive(Debug, Clone)]
pub struct RoomOccupancy {
    pub movie_title: String,
    pub duration_minutes: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// The half-open window `[start, end)` a showtime holds the room for.
pub fn effective_window(
    show_date: NaiveDate,
    show_time: NaiveTime,
    duration_minutes: i64,
) -> (NaiveDateTime, NaiveDateTime) {
    let start = show_date.and_time(show_time);
    let end = start + Duration::minutes(duration_minutes + TURNOVER_MINUTES);
    (start, end)
}

/// Half-open interval overlap: touching endpoints do not conflict.
fn overlaps(s1: NaiveDateTime, e1: NaiveDateTime, s2: NaiveDateTime, e2: NaiveDateTime) -> bool {
    s1 < e2 && e1 > s2
}

/// Find the first existing occupancy that collides with `[start, end)`.
pub fn find_conflict<'a>(
    existing: &'a [RoomOccupancy],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<&'a RoomOccupancy> {
    existing.iter().find(|o| overlaps(start, end, o.start, o.end))
}

fn conflict_error(other: &RoomOccupancy) -> AppError {
    let minimum_gap = other.duration_minutes + TURNOVER_MINUTES;
    AppError::Conflict(format!(
        "Time conflict with \"{}\" running {} – {}: showtimes in this room must start at least {} minutes apart",
        other.movie_title,
        other.start.format("%H:%M"),
        other.end.format("%H:%M"),
        minimum_gap,
    ))
}

#[derive(sqlx::FromRow)]
struct OccupancyRow {
    id:               String,
    title:            String,
    duration_minutes: i32,
    show_date:        NaiveDate,
    show_time:        NaiveTime,
}

/// Reject the proposed showtime if it overlaps any other active showtime in
/// the same room on the same date.
///
/// Runs inside the caller's transaction so the check and the insert/update
/// commit together. `exclude_id` skips the row being updated.
pub async fn validate_no_overlap(
    tx: &mut Transaction<'_, MySql>,
    room_id: &str,
    show_date: NaiveDate,
    show_time: NaiveTime,
    movie_duration_minutes: i64,
    exclude_id: Option<&str>,
) -> AppResult<()> {
    let rows: Vec<OccupancyRow> = sqlx::query_as::<_, OccupancyRow>(
        "SELECT s.id, m.title, m.duration_minutes, s.show_date, s.show_time
         FROM showtimes s
         JOIN movies m ON m.id = s.movie_id
         WHERE s.room_id = ?
           AND s.show_date = ?
           AND s.is_active = 1
         ORDER BY s.show_time",
    )
    .bind(room_id)
    .bind(show_date)
    .fetch_all(&mut **tx)
    .await?;

    let existing: Vec<RoomOccupancy> = rows
        .into_iter()
        .filter(|r| exclude_id != Some(r.id.as_str()))
        .map(|r| {
            let (start, end) = effective_window(r.show_date, r.show_time, r.duration_minutes as i64);
            RoomOccupancy {
                movie_title: r.title,
                duration_minutes: r.duration_minutes as i64,
                start,
                end,
            }
        })
        .collect();

    let (start, end) = effective_window(show_date, show_time, movie_duration_minutes);
    match find_conflict(&existing, start, end) {
        Some(other) => Err(conflict_error(other)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn occupancy(title: &str, h: u32, m: u32, duration: i64) -> RoomOccupancy {
        let (start, end) = effective_window(date(), time(h, m), duration);
        RoomOccupancy {
            movie_title: title.into(),
            duration_minutes: duration,
            start,
            end,
        }
    }

    #[test]
    fn window_includes_turnover_buffer() {
        // 120 min movie at 14:00 occupies [14:00, 16:30)
        let (start, end) = effective_window(date(), time(14, 0), 120);
        assert_eq!(start, date().and_time(time(14, 0)));
        assert_eq!(end, date().and_time(time(16, 30)));
    }

    #[test]
    fn start_inside_existing_window_conflicts() {
        let existing = vec![occupancy("Long Feature", 14, 0, 120)]; // ends 16:30
        let (start, end) = effective_window(date(), time(16, 0), 90);
        assert!(find_conflict(&existing, start, end).is_some());
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let existing = vec![occupancy("Long Feature", 14, 0, 120)]; // ends 16:30
        let (start, end) = effective_window(date(), time(16, 30), 90);
        assert!(find_conflict(&existing, start, end).is_none());
    }

    #[test]
    fn new_show_ending_into_existing_conflicts() {
        let existing = vec![occupancy("Evening Show", 18, 0, 100)];
        // 90 min + 30 buffer at 16:30 occupies [16:30, 18:30) -> collides
        let (start, end) = effective_window(date(), time(16, 30), 90);
        assert!(find_conflict(&existing, start, end).is_some());
    }

    #[test]
    fn disjoint_windows_pass() {
        let existing = vec![
            occupancy("Matinee", 10, 0, 90),  // [10:00, 12:00)
            occupancy("Evening", 19, 0, 120), // [19:00, 21:30)
        ];
        let (start, end) = effective_window(date(), time(13, 0), 120); // [13:00, 15:30)
        assert!(find_conflict(&existing, start, end).is_none());
    }

    #[test]
    fn conflict_error_names_movie_and_minimum_gap() {
        let other = occupancy("The Heist", 14, 0, 120);
        let err = conflict_error(&other);
        match err {
            AppError::Conflict(msg) => {
                assert!(msg.contains("The Heist"));
                assert!(msg.contains("14:00"));
                assert!(msg.contains("16:30"));
                assert!(msg.contains("150"));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }
}
