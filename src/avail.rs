/*!
The availability check: the read-only decision procedure determining
whether a (date, time) pair may be booked.

This is a pure cross-reference of a candidate slot against the current
reservations and blocked slots; the caller performs the actual write.
The store's uniqueness constraint on (date, time) backstops two
requests that both pass this check concurrently.
*/
use time::Date;

use crate::booking::{BlockedSlot, Reservation};

/// Why a candidate slot cannot be booked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SlotError {
    /// The requested date is before today.
    DateInPast,
    /// An administrator has blocked the requested date and time.
    SlotBlocked,
    /// Another reservation already holds the requested date and time.
    SlotTaken,
    /// The requesting account already holds a reservation (only under
    /// the one-reservation-per-account policy).
    AlreadyBooked,
}

impl std::fmt::Display for SlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match self {
            SlotError::DateInPast =>
                "Invalid visit date. Please choose a date equal to or greater than today.",
            SlotError::SlotBlocked =>
                "The selected date and time are blocked. Please choose a different date/time.",
            SlotError::SlotTaken =>
                "A reservation already exists for the selected date and time. Please choose a different date/time.",
            SlotError::AlreadyBooked =>
                "You already have an active reservation.",
        };

        write!(f, "{}", msg)
    }
}

/// Decide whether `(date, slot)` may be reserved.
///
/// `exclude` names a reservation id to skip when scanning for
/// collisions, so a rebooking doesn't collide with itself. Comparison
/// against `today` is by calendar date only.
pub fn check_slot(
    today: Date,
    date: Date,
    slot: &str,
    blocked: &[BlockedSlot],
    reservations: &[Reservation],
    exclude: Option<i64>,
) -> Result<(), SlotError> {
    if date < today {
        return Err(SlotError::DateInPast);
    }

    if blocked.iter().any(|b| b.blocks(date, slot)) {
        return Err(SlotError::SlotBlocked);
    }

    let taken = reservations.iter()
        .filter(|r| Some(r.id) != exclude)
        .any(|r| r.visit_date == date && r.visit_time == slot);
    if taken {
        return Err(SlotError::SlotTaken);
    }

    Ok(())
}

/// Under the one-reservation-per-account policy: does `email` already
/// hold any reservation (other than `exclude`)?
pub fn holds_reservation(
    email: &str,
    reservations: &[Reservation],
    exclude: Option<i64>,
) -> bool {
    reservations.iter()
        .filter(|r| Some(r.id) != exclude)
        .any(|r| r.email == email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn resv(id: i64, day: Date, slot: &str, email: &str) -> Reservation {
        Reservation {
            id,
            visit_date: day,
            visit_time: slot.to_owned(),
            full_name: "A Visitor".to_owned(),
            email: email.to_owned(),
            contact: "09171234567".to_owned(),
            party_size: 2,
        }
    }

    fn blocked(id: i64, day: Date, times: &[&str]) -> BlockedSlot {
        BlockedSlot {
            id,
            day,
            times: times.iter().map(|t| t.to_string()).collect(),
        }
    }

    const TODAY: Date = date!(2025 - 05 - 20);

    #[test]
    fn past_dates_rejected_regardless_of_state() {
        let b = vec![blocked(1, date!(2025 - 05 - 19), &["10:30"])];
        let r = vec![resv(1, date!(2025 - 05 - 19), "10:30", "a@x.com")];

        for day in [date!(2025 - 05 - 19), date!(2024 - 12 - 31)] {
            for slot in ["10:30", "13:30"] {
                assert_eq!(
                    check_slot(TODAY, day, slot, &b, &r, None),
                    Err(SlotError::DateInPast)
                );
                // with nothing on the books, still in the past
                assert_eq!(
                    check_slot(TODAY, day, slot, &[], &[], None),
                    Err(SlotError::DateInPast)
                );
            }
        }
    }

    #[test]
    fn today_is_bookable() {
        assert!(check_slot(TODAY, TODAY, "10:30", &[], &[], None).is_ok());
    }

    #[test]
    fn blocked_slot_rejected() {
        let b = vec![blocked(1, date!(2025 - 06 - 01), &["10:30"])];

        assert_eq!(
            check_slot(TODAY, date!(2025 - 06 - 01), "10:30", &b, &[], None),
            Err(SlotError::SlotBlocked)
        );
        // the other time on the same date stays open
        assert!(
            check_slot(TODAY, date!(2025 - 06 - 01), "13:30", &b, &[], None).is_ok()
        );
        // same time on another date stays open
        assert!(
            check_slot(TODAY, date!(2025 - 06 - 02), "10:30", &b, &[], None).is_ok()
        );
    }

    #[test]
    fn duplicated_blocked_times_act_as_a_set() {
        // appending the same times twice leaves duplicates in the list;
        // the check must behave exactly as if they appeared once
        let once = vec![blocked(1, date!(2025 - 06 - 01), &["10:30"])];
        let twice = vec![blocked(1, date!(2025 - 06 - 01), &["10:30", "10:30"])];

        for slot in ["10:30", "13:30"] {
            assert_eq!(
                check_slot(TODAY, date!(2025 - 06 - 01), slot, &once, &[], None),
                check_slot(TODAY, date!(2025 - 06 - 01), slot, &twice, &[], None),
            );
        }
    }

    #[test]
    fn taken_slot_rejected_for_other_visitors() {
        let r = vec![resv(7, date!(2025 - 06 - 01), "13:30", "a@x.com")];

        // a second booking for the same (date, time) from anyone
        assert_eq!(
            check_slot(TODAY, date!(2025 - 06 - 01), "13:30", &[], &r, None),
            Err(SlotError::SlotTaken)
        );
        assert!(
            check_slot(TODAY, date!(2025 - 06 - 01), "10:30", &[], &r, None).is_ok()
        );
    }

    #[test]
    fn rebooking_excludes_itself() {
        let r = vec![
            resv(7, date!(2025 - 06 - 01), "13:30", "a@x.com"),
            resv(8, date!(2025 - 06 - 02), "10:30", "b@y.com"),
        ];

        // rebooking 7 onto its own slot succeeds
        assert!(
            check_slot(TODAY, date!(2025 - 06 - 01), "13:30", &[], &r, Some(7)).is_ok()
        );
        // but not onto someone else's
        assert_eq!(
            check_slot(TODAY, date!(2025 - 06 - 02), "10:30", &[], &r, Some(7)),
            Err(SlotError::SlotTaken)
        );
    }

    #[test]
    fn blocked_takes_precedence_over_taken() {
        let b = vec![blocked(1, date!(2025 - 06 - 01), &["10:30"])];
        let r = vec![resv(7, date!(2025 - 06 - 01), "10:30", "a@x.com")];

        assert_eq!(
            check_slot(TODAY, date!(2025 - 06 - 01), "10:30", &b, &r, None),
            Err(SlotError::SlotBlocked)
        );
    }

    #[test]
    fn one_per_account_policy_scan() {
        let r = vec![resv(7, date!(2025 - 06 - 01), "13:30", "a@x.com")];

        assert!(holds_reservation("a@x.com", &r, None));
        assert!(!holds_reservation("b@y.com", &r, None));
        // rebooking your own reservation doesn't count against you
        assert!(!holds_reservation("a@x.com", &r, Some(7)));
    }
}
