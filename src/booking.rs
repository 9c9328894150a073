/*!
Visit reservations and administrator-blocked slots.

Dates are represented by the `time::Date` struct and travel over the
wire in `crate::DATE_FMT` ("YYYY-MM-DD") form. Visit times are one of a
small fixed set of slot strings.
*/
use serde::Serialize;
use time::Date;

use crate::DATE_FMT;

/// The time slots the museum offers for visits. Every reservation and
/// every blocked time is one of these strings.
pub const TIME_SLOTS: &[&str] = &["10:30", "13:30"];

/// A confirmed visit reservation. At most one reservation exists per
/// (date, time) pair system-wide; the store enforces this with a
/// uniqueness constraint.
#[derive(Clone, Debug, Serialize)]
pub struct Reservation {
    pub id: i64,
    pub visit_date: Date,
    pub visit_time: String,
    pub full_name: String,
    /// Visitor's account email, held by value (not a row reference).
    pub email: String,
    pub contact: String,
    pub party_size: i32,
}

/// One record per blocked calendar date, holding the blocked time
/// strings for that date. Appending times may produce duplicates in
/// `times`; availability checking treats the list as a set.
#[derive(Clone, Debug, Serialize)]
pub struct BlockedSlot {
    pub id: i64,
    pub day: Date,
    pub times: Vec<String>,
}

impl BlockedSlot {
    pub fn blocks(&self, day: Date, slot: &str) -> bool {
        self.day == day && self.times.iter().any(|t| t == slot)
    }
}

/// Parse a "YYYY-MM-DD" form value into a `Date`.
pub fn parse_date(s: &str) -> Result<Date, String> {
    // Datetime-local inputs send "YYYY-MM-DDThh:mm"; keep only the date.
    let s = s.split('T').next().unwrap_or(s);
    Date::parse(s, DATE_FMT)
        .map_err(|e| format!("{:?} is not a valid date: {}", s, e))
}

/// Check that a submitted visit time is one of the offered slots.
pub fn parse_slot(s: &str) -> Result<String, String> {
    let s = s.trim();
    if TIME_SLOTS.contains(&s) {
        Ok(s.to_owned())
    } else {
        Err(format!("{:?} is not an offered time slot.", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn date_parsing() {
        assert_eq!(parse_date("2025-06-01").unwrap(), date!(2025 - 06 - 01));
        // datetime-local values arrive with a time suffix
        assert_eq!(
            parse_date("2025-06-01T10:30").unwrap(),
            date!(2025 - 06 - 01)
        );
        assert!(parse_date("06/01/2025").is_err());
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn slot_parsing() {
        assert_eq!(parse_slot("10:30").unwrap(), "10:30");
        assert_eq!(parse_slot("13:30").unwrap(), "13:30");
        assert_eq!(parse_slot(" 13:30 ").unwrap(), "13:30");
        assert!(parse_slot("13:00").is_err());
        assert!(parse_slot("10:31").is_err());
        assert!(parse_slot("").is_err());
    }

    #[test]
    fn blocked_slot_membership() {
        let b = BlockedSlot {
            id: 1,
            day: date!(2025 - 06 - 01),
            times: vec!["10:30".to_owned(), "10:30".to_owned()],
        };
        assert!(b.blocks(date!(2025 - 06 - 01), "10:30"));
        assert!(!b.blocks(date!(2025 - 06 - 01), "13:30"));
        assert!(!b.blocks(date!(2025 - 06 - 02), "10:30"));
    }
}
