/*
`Store` methods for the reservation ledger.

The (visit_date, visit_time) uniqueness constraint turns the
availability-check/write race into `SlotClash`, which callers surface
exactly like a failed availability check.
*/
use time::Date;
use tokio_postgres::Row;

use super::{is_unique_violation, DbError, Store};
use crate::booking::Reservation;

fn reservation_from_row(row: &Row) -> Result<Reservation, DbError> {
    Ok(Reservation {
        id: row.try_get("id")?,
        visit_date: row.try_get("visit_date")?,
        visit_time: row.try_get("visit_time")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        contact: row.try_get("contact")?,
        party_size: row.try_get("party_size")?,
    })
}

/// Outcome of a write that could collide with the one-per-slot
/// invariant.
#[derive(Debug, PartialEq)]
pub enum SlotWrite {
    Ok(i64),
    /// Another reservation got the (date, time) pair first.
    SlotClash,
    /// The reservation being updated no longer exists.
    Gone,
}

impl Store {
    /// Confirm a new reservation. The caller has already run the
    /// availability check; the constraint backstops it.
    pub async fn insert_reservation(
        &self,
        visit_date: Date,
        visit_time: &str,
        full_name: &str,
        email: &str,
        contact: &str,
        party_size: i32,
    ) -> Result<SlotWrite, DbError> {
        log::trace!(
            "Store::insert_reservation( {}, {:?}, {:?}, ... ) called.",
            visit_date, visit_time, email
        );

        let client = self.connect().await?;
        let res = client.query_one(
            "INSERT INTO reservations
                (visit_date, visit_time, full_name, email, contact, party_size)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id",
            &[&visit_date, &visit_time, &full_name, &email, &contact, &party_size]
        ).await;

        match res {
            Ok(row) => Ok(SlotWrite::Ok(row.try_get("id")?)),
            Err(ref e) if is_unique_violation(e) => Ok(SlotWrite::SlotClash),
            Err(e) => Err(DbError::from(e).annotate("Error inserting reservation")),
        }
    }

    pub async fn get_reservation(
        &self,
        id: i64
    ) -> Result<Option<Reservation>, DbError> {
        log::trace!("Store::get_reservation( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM reservations WHERE id = $1",
            &[&id]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(reservation_from_row(&row)?)),
        }
    }

    pub async fn get_reservations(&self) -> Result<Vec<Reservation>, DbError> {
        log::trace!("Store::get_reservations() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM reservations ORDER BY visit_date, visit_time",
            &[]
        ).await?;

        let mut reservations = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            reservations.push(reservation_from_row(row)?);
        }

        Ok(reservations)
    }

    /// The reservations held by one account (matched by email value).
    pub async fn reservations_for_email(
        &self,
        email: &str
    ) -> Result<Vec<Reservation>, DbError> {
        log::trace!("Store::reservations_for_email( {:?} ) called.", email);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM reservations WHERE email = $1
                ORDER BY visit_date, visit_time",
            &[&email]
        ).await?;

        let mut reservations = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            reservations.push(reservation_from_row(row)?);
        }

        Ok(reservations)
    }

    /// Rebook: move a reservation to a new slot and refresh contact
    /// details, preserving its identity.
    pub async fn rebook_reservation(
        &self,
        id: i64,
        visit_date: Date,
        visit_time: &str,
        contact: &str,
        party_size: i32,
    ) -> Result<SlotWrite, DbError> {
        log::trace!(
            "Store::rebook_reservation( {}, {}, {:?}, ... ) called.",
            id, visit_date, visit_time
        );

        let client = self.connect().await?;
        let res = client.execute(
            "UPDATE reservations
                SET visit_date = $2, visit_time = $3,
                    contact = $4, party_size = $5
                WHERE id = $1",
            &[&id, &visit_date, &visit_time, &contact, &party_size]
        ).await;

        match res {
            Ok(0) => Ok(SlotWrite::Gone),
            Ok(_) => Ok(SlotWrite::Ok(id)),
            Err(ref e) if is_unique_violation(e) => Ok(SlotWrite::SlotClash),
            Err(e) => Err(DbError::from(e).annotate("Error rebooking reservation")),
        }
    }

    /// Admin single-field edit: visit date.
    pub async fn update_visit_date(
        &self,
        id: i64,
        visit_date: Date,
    ) -> Result<SlotWrite, DbError> {
        log::trace!("Store::update_visit_date( {}, {} ) called.", id, visit_date);

        let client = self.connect().await?;
        let res = client.execute(
            "UPDATE reservations SET visit_date = $2 WHERE id = $1",
            &[&id, &visit_date]
        ).await;

        match res {
            Ok(0) => Ok(SlotWrite::Gone),
            Ok(_) => Ok(SlotWrite::Ok(id)),
            Err(ref e) if is_unique_violation(e) => Ok(SlotWrite::SlotClash),
            Err(e) => Err(DbError::from(e).annotate("Error updating visit date")),
        }
    }

    /// Admin single-field edit: visit time.
    pub async fn update_visit_time(
        &self,
        id: i64,
        visit_time: &str,
    ) -> Result<SlotWrite, DbError> {
        log::trace!("Store::update_visit_time( {}, {:?} ) called.", id, visit_time);

        let client = self.connect().await?;
        let res = client.execute(
            "UPDATE reservations SET visit_time = $2 WHERE id = $1",
            &[&id, &visit_time]
        ).await;

        match res {
            Ok(0) => Ok(SlotWrite::Gone),
            Ok(_) => Ok(SlotWrite::Ok(id)),
            Err(ref e) if is_unique_violation(e) => Ok(SlotWrite::SlotClash),
            Err(e) => Err(DbError::from(e).annotate("Error updating visit time")),
        }
    }

    /// Admin single-field edit: contact number.
    pub async fn update_contact(
        &self,
        id: i64,
        contact: &str,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_contact( {}, {:?} ) called.", id, contact);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE reservations SET contact = $2 WHERE id = $1",
            &[&id, &contact]
        ).await?;

        Ok(n == 1)
    }

    /// Admin single-field edit: party size.
    pub async fn update_party_size(
        &self,
        id: i64,
        party_size: i32,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_party_size( {}, {} ) called.", id, party_size);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE reservations SET party_size = $2 WHERE id = $1",
            &[&id, &party_size]
        ).await?;

        Ok(n == 1)
    }

    /// Cancellation is a hard delete, by the owner or an admin.
    pub async fn delete_reservation(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("Store::delete_reservation( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM reservations WHERE id = $1",
            &[&id]
        ).await?;

        Ok(n == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;
    use time::macros::date;

    use crate::store::tests::TEST_CONNECTION;
    use crate::tests::ensure_logging;

    async fn fresh_store() -> Store {
        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();
        db
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn slot_uniqueness_is_enforced_by_the_store() {
        ensure_logging();
        let db = fresh_store().await;

        let first = db.insert_reservation(
            date!(2025 - 06 - 01), "13:30",
            "Ana", "a@x.com", "09171234567", 2,
        ).await.unwrap();
        assert!(matches!(first, SlotWrite::Ok(_)));

        // same (date, time) from a different account loses
        let second = db.insert_reservation(
            date!(2025 - 06 - 01), "13:30",
            "Ben", "b@y.com", "09179999999", 4,
        ).await.unwrap();
        assert_eq!(second, SlotWrite::SlotClash);

        // a different slot the same day is fine
        let third = db.insert_reservation(
            date!(2025 - 06 - 01), "10:30",
            "Ben", "b@y.com", "09179999999", 4,
        ).await.unwrap();
        assert!(matches!(third, SlotWrite::Ok(_)));

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn rebook_preserves_identity() {
        ensure_logging();
        let db = fresh_store().await;

        let id = match db.insert_reservation(
            date!(2025 - 06 - 01), "13:30",
            "Ana", "a@x.com", "09171234567", 2,
        ).await.unwrap() {
            SlotWrite::Ok(id) => id,
            x => panic!("unexpected insert result: {:?}", x),
        };

        // rebooking onto its own slot is a no-op success
        assert_eq!(
            db.rebook_reservation(
                id, date!(2025 - 06 - 01), "13:30", "09171234567", 2
            ).await.unwrap(),
            SlotWrite::Ok(id)
        );

        assert_eq!(
            db.rebook_reservation(
                id, date!(2025 - 06 - 02), "10:30", "09170000000", 5
            ).await.unwrap(),
            SlotWrite::Ok(id)
        );
        let r = db.get_reservation(id).await.unwrap().unwrap();
        assert_eq!(r.visit_date, date!(2025 - 06 - 02));
        assert_eq!(r.visit_time, "10:30");
        assert_eq!(r.party_size, 5);
        assert_eq!(r.email, "a@x.com");

        assert_eq!(
            db.rebook_reservation(
                9999, date!(2025 - 06 - 03), "10:30", "x", 1
            ).await.unwrap(),
            SlotWrite::Gone
        );

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn per_account_listing_and_cancellation() {
        ensure_logging();
        let db = fresh_store().await;

        db.insert_reservation(
            date!(2025 - 06 - 01), "13:30", "Ana", "a@x.com", "0917", 2
        ).await.unwrap();
        db.insert_reservation(
            date!(2025 - 06 - 02), "13:30", "Ben", "b@y.com", "0918", 1
        ).await.unwrap();

        let mine = db.reservations_for_email("a@x.com").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].full_name, "Ana");

        assert!(db.delete_reservation(mine[0].id).await.unwrap());
        assert!(!db.delete_reservation(mine[0].id).await.unwrap());
        assert_eq!(db.get_reservations().await.unwrap().len(), 1);

        db.nuke_database().await.unwrap();
    }
}
