/*!
Database interaction module.

The Postgres database to which this connects holds one table per
entity the application persists.

```sql
CREATE TABLE users (
    id       BIGSERIAL PRIMARY KEY,
    name     TEXT NOT NULL,
    email    TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    role     TEXT NOT NULL,   /* one of { 'Student', 'Teacher', 'Staff', 'Admin' } */
    verified BOOL NOT NULL,
    score    INTEGER,
    verification_code TEXT,
    reset_token       TEXT,
    reset_expires     TIMESTAMPTZ
);

CREATE TABLE reservations (
    id         BIGSERIAL PRIMARY KEY,
    visit_date DATE NOT NULL,
    visit_time TEXT NOT NULL,
    full_name  TEXT NOT NULL,
    email      TEXT NOT NULL,
    contact    TEXT NOT NULL,
    party_size INTEGER NOT NULL,
    UNIQUE (visit_date, visit_time)   /* at most one reservation per slot */
);

CREATE TABLE blocked (
    id    BIGSERIAL PRIMARY KEY,
    day   DATE UNIQUE NOT NULL,
    times TEXT[] NOT NULL
);

CREATE TABLE artifacts (
    id          BIGSERIAL PRIMARY KEY,
    title       TEXT NOT NULL,
    kind        TEXT NOT NULL,
    status      TEXT NOT NULL,
    description TEXT NOT NULL,
    image_url   TEXT,
    model_link  TEXT
);

CREATE TABLE questions (
    id      BIGSERIAL PRIMARY KEY,
    kind    TEXT NOT NULL,   /* 'multiple-choice' or 'fill-in-the-blank' */
    prompt  TEXT NOT NULL,
    options TEXT[] NOT NULL,
    answer  TEXT NOT NULL
);
```

The uniqueness constraint on `reservations (visit_date, visit_time)` is
load-bearing: the availability check and the subsequent insert are not
one transaction, so the constraint is what turns a lost race into a
catchable conflict instead of a double booking.
*/
use std::fmt::Write;

use tokio_postgres::{Client, NoTls};

pub mod artifacts;
pub mod blocked;
pub mod questions;
pub mod reservations;
pub mod users;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'users'",
        "CREATE TABLE users (
            id       BIGSERIAL PRIMARY KEY,
            name     TEXT NOT NULL,
            email    TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            role     TEXT NOT NULL,
            verified BOOL NOT NULL,
            score    INTEGER,
            verification_code TEXT,
            reset_token       TEXT,
            reset_expires     TIMESTAMPTZ
        )",
        "DROP TABLE users",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'reservations'",
        "CREATE TABLE reservations (
            id         BIGSERIAL PRIMARY KEY,
            visit_date DATE NOT NULL,
            visit_time TEXT NOT NULL,
            full_name  TEXT NOT NULL,
            email      TEXT NOT NULL,
            contact    TEXT NOT NULL,
            party_size INTEGER NOT NULL,
            UNIQUE (visit_date, visit_time)
        )",
        "DROP TABLE reservations",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'blocked'",
        "CREATE TABLE blocked (
            id    BIGSERIAL PRIMARY KEY,
            day   DATE UNIQUE NOT NULL,
            times TEXT[] NOT NULL
        )",
        "DROP TABLE blocked",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'artifacts'",
        "CREATE TABLE artifacts (
            id          BIGSERIAL PRIMARY KEY,
            title       TEXT NOT NULL,
            kind        TEXT NOT NULL,
            status      TEXT NOT NULL,
            description TEXT NOT NULL,
            image_url   TEXT,
            model_link  TEXT
        )",
        "DROP TABLE artifacts",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'questions'",
        "CREATE TABLE questions (
            id      BIGSERIAL PRIMARY KEY,
            kind    TEXT NOT NULL,
            prompt  TEXT NOT NULL,
            options TEXT[] NOT NULL,
            answer  TEXT NOT NULL
        )",
        "DROP TABLE questions",
    ),
];

#[derive(Debug, PartialEq)]
pub struct DbError(pub String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Store DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            write!(&mut s, "; {}", dbe).unwrap();
        }
        DbError(s)
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

/// Does this postgres error mean a uniqueness constraint fired?
fn is_unique_violation(e: &tokio_postgres::error::Error) -> bool {
    e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
}

pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( {:?} ) called.", &connection_string);

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!(
            "Store::connect() called w/connection string {:?}",
            &self.connection_string
        );

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("Store DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("Store DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(test_stmt.to_owned(), &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(create_stmt.to_owned(), &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(drop_stmt.to_owned(), &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ...nuking complete.");
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    /*!
    The store tests in this module tree assume you have a Postgres
    instance running on your local machine with resources named
    according to what you see in the `static TEST_CONNECTION &str`:

    ```text
    user: museo_test
    password: museo_test

    with write access to:

    database: museo_store_test
    ```

    They are `#[ignore]`d so the default test run doesn't require a
    database; run them with

    ```bash
    cargo test store -- --ignored --test-threads=1
    ```
    */
    use super::*;
    use crate::tests::ensure_logging;

    use serial_test::serial;

    pub static TEST_CONNECTION: &str =
        "host=localhost user=museo_test password='museo_test' dbname=museo_store_test";

    /**
    This function is for getting the database back in a blank slate state if
    a test panics partway through and leaves it munged.

    ```bash
    cargo test reset_store -- --ignored
    ```
    */
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn reset_store() {
        ensure_logging();
        let db = Store::new(TEST_CONNECTION.to_owned());
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn create_store() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();
        db.nuke_database().await.unwrap();
    }
}
