//! Seat map generation.
//!
//! A room's layout is described by `capacity` and `seats_per_row`; the seat
//! map derived from it is stored on each showtime as a JSON document and
//! mutated only through the seat ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-seat availability entry, persisted as `{"available": <bool>}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatStatus {
    pub available: bool,
}

pub type SeatMap = BTreeMap<String, SeatStatus>;

/// Build the seat map for a room layout.
///
/// Rows are labelled 'A', 'B', … and numbered 1..=`seats_per_row`; generation
/// stops after `capacity` seats, so the last row may be partial. The same
/// layout always produces the same code set.
pub fn generate(capacity: u32, seats_per_row: u32) -> SeatMap {
    let mut seats = SeatMap::new();
    if capacity == 0 || seats_per_row == 0 {
        return seats;
    }

    let mut emitted = 0u32;
    let mut row = 0u8;
    'rows: loop {
        let letter = (b'A' + row) as char;
        for number in 1..=seats_per_row {
            if emitted == capacity {
                break 'rows;
            }
            seats.insert(format!("{letter}{number}"), SeatStatus { available: true });
            emitted += 1;
        }
        row += 1;
    }

    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_last_row() {
        // capacity 20, 6 per row -> A1-A6, B1-B6, C1-C6, D1-D2
        let map = generate(20, 6);
        assert_eq!(map.len(), 20);
        for code in ["A1", "A6", "B3", "C6", "D1", "D2"] {
            assert!(map.contains_key(code), "missing {code}");
        }
        assert!(!map.contains_key("D3"));
        assert!(!map.contains_key("E1"));
    }

    #[test]
    fn all_seats_start_available() {
        let map = generate(12, 4);
        assert_eq!(map.len(), 12);
        assert!(map.values().all(|s| s.available));
    }

    #[test]
    fn exact_rows_have_no_partial_tail() {
        let map = generate(18, 6);
        assert_eq!(map.len(), 18);
        assert!(map.contains_key("C6"));
        assert!(!map.contains_key("D1"));
    }

    #[test]
    fn capacity_smaller_than_row_yields_single_partial_row() {
        let map = generate(3, 10);
        assert_eq!(
            map.keys().cloned().collect::<Vec<_>>(),
            vec!["A1".to_string(), "A2".to_string(), "A3".to_string()]
        );
    }

    #[test]
    fn deterministic_for_same_layout() {
        assert_eq!(generate(50, 8), generate(50, 8));
    }
}
