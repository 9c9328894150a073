/*
`Store` methods for the blocked-slot registry.

One row per blocked calendar date; the `times` array holds the blocked
slot strings for that date. Blocking an already-blocked date appends to
the array, duplicates and all; availability checking treats the array
as a set.
*/
use time::Date;
use tokio_postgres::Row;

use super::{is_unique_violation, DbError, Store};
use crate::booking::BlockedSlot;

fn blocked_from_row(row: &Row) -> Result<BlockedSlot, DbError> {
    Ok(BlockedSlot {
        id: row.try_get("id")?,
        day: row.try_get("day")?,
        times: row.try_get("times")?,
    })
}

impl Store {
    pub async fn get_blocked_slots(&self) -> Result<Vec<BlockedSlot>, DbError> {
        log::trace!("Store::get_blocked_slots() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM blocked ORDER BY day",
            &[]
        ).await?;

        let mut slots = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            slots.push(blocked_from_row(row)?);
        }

        Ok(slots)
    }

    /// Block `times` on every date in the inclusive range
    /// [start, end]. Upsert semantics per date: append to an existing
    /// record's array, otherwise create the record. Returns the number
    /// of dates touched.
    pub async fn block_dates(
        &self,
        start: Date,
        end: Date,
        times: &[String],
    ) -> Result<usize, DbError> {
        log::trace!(
            "Store::block_dates( {}, {}, {:?} ) called.",
            start, end, times
        );

        if end < start {
            return Err(DbError(format!(
                "Blocked range ends ({}) before it starts ({}).", end, start
            )));
        }

        let mut client = self.connect().await?;
        let t = client.transaction().await?;
        let upsert = t.prepare(
            "INSERT INTO blocked (day, times) VALUES ($1, $2)
                ON CONFLICT (day)
                DO UPDATE SET times = blocked.times || EXCLUDED.times",
        ).await?;

        let mut n_dates: usize = 0;
        let mut day = start;
        loop {
            t.execute(&upsert, &[&day, &times]).await?;
            n_dates += 1;

            if day == end { break; }
            day = day.next_day().ok_or_else(|| DbError(format!(
                "Calendar overflow stepping past {}.", day
            )))?;
        }

        t.commit().await?;
        Ok(n_dates)
    }

    /// Remove one time string from a date's blocked set. Every copy of
    /// the string goes, since duplicates may have accumulated.
    pub async fn unblock_time(
        &self,
        id: i64,
        slot: &str,
    ) -> Result<bool, DbError> {
        log::trace!("Store::unblock_time( {}, {:?} ) called.", id, slot);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE blocked SET times = array_remove(times, $2) WHERE id = $1",
            &[&id, &slot]
        ).await?;

        Ok(n == 1)
    }

    /// Re-date a blocked record, keeping its times.
    pub async fn update_blocked_date(
        &self,
        id: i64,
        day: Date,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_blocked_date( {}, {} ) called.", id, day);

        let client = self.connect().await?;
        let res = client.execute(
            "UPDATE blocked SET day = $2 WHERE id = $1",
            &[&id, &day]
        ).await;

        match res {
            Ok(n) => Ok(n == 1),
            Err(ref e) if is_unique_violation(e) => Err(DbError(format!(
                "{} already has a blocked record.", day
            ))),
            Err(e) => Err(DbError::from(e).annotate("Error updating blocked date")),
        }
    }

    /// Remove a whole blocked date.
    pub async fn unblock_date(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("Store::unblock_date( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM blocked WHERE id = $1",
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

    fn times(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn range_block_appends_per_date() {
        ensure_logging();
        let db = fresh_store().await;

        let n = db.block_dates(
            date!(2025 - 06 - 01), date!(2025 - 06 - 03), &times(&["10:30"])
        ).await.unwrap();
        assert_eq!(n, 3);

        // overlapping second block appends rather than replaces
        let n = db.block_dates(
            date!(2025 - 06 - 02), date!(2025 - 06 - 02), &times(&["13:30"])
        ).await.unwrap();
        assert_eq!(n, 1);

        let slots = db.get_blocked_slots().await.unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].times, times(&["10:30"]));
        assert_eq!(slots[1].times, times(&["10:30", "13:30"]));

        // backwards range is a validation error, not a silent no-op
        assert!(db.block_dates(
            date!(2025 - 06 - 03), date!(2025 - 06 - 01), &times(&["10:30"])
        ).await.is_err());

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn blocking_twice_leaves_duplicates_in_the_array() {
        ensure_logging();
        let db = fresh_store().await;

        for _ in 0..2 {
            db.block_dates(
                date!(2025 - 06 - 01), date!(2025 - 06 - 01), &times(&["10:30"])
            ).await.unwrap();
        }

        let slots = db.get_blocked_slots().await.unwrap();
        assert_eq!(slots[0].times, times(&["10:30", "10:30"]));
        // but availability still treats it as a set
        assert!(slots[0].blocks(date!(2025 - 06 - 01), "10:30"));

        // and unblocking removes every copy
        assert!(db.unblock_time(slots[0].id, "10:30").await.unwrap());
        let slots = db.get_blocked_slots().await.unwrap();
        assert!(slots[0].times.is_empty());

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn redate_and_remove() {
        ensure_logging();
        let db = fresh_store().await;

        db.block_dates(
            date!(2025 - 06 - 01), date!(2025 - 06 - 01), &times(&["10:30"])
        ).await.unwrap();
        let id = db.get_blocked_slots().await.unwrap()[0].id;

        assert!(db.update_blocked_date(id, date!(2025 - 06 - 05)).await.unwrap());
        let slots = db.get_blocked_slots().await.unwrap();
        assert_eq!(slots[0].day, date!(2025 - 06 - 05));
        assert_eq!(slots[0].times, times(&["10:30"]));

        assert!(db.unblock_date(id).await.unwrap());
        assert!(!db.unblock_date(id).await.unwrap());
        assert!(db.get_blocked_slots().await.unwrap().is_empty());

        db.nuke_database().await.unwrap();
    }
}
