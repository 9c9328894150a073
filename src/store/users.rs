/*
`Store` methods for the credential store: account records, email
verification, and password-reset tokens.
*/
use time::OffsetDateTime;
use tokio_postgres::Row;

use super::{is_unique_violation, DbError, Store};
use crate::user::{Role, User};

fn user_from_row(row: &Row) -> Result<User, DbError> {
    let role_str: &str = row.try_get("role")?;
    let u = User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role_str.parse()?,
        verified: row.try_get("verified")?,
        score: row.try_get("score")?,
        password_hash: row.try_get("password")?,
        verification_code: row.try_get("verification_code")?,
        reset_token: row.try_get("reset_token")?,
        reset_expires: row.try_get("reset_expires")?,
    };

    Ok(u)
}

/// Outcome of attempting to create an account.
#[derive(Debug, PartialEq)]
pub enum UserInsert {
    Created(i64),
    /// The email address is already registered; no record was written.
    DuplicateEmail,
}

impl Store {
    /// Create an unverified account.
    ///
    /// The email column is UNIQUE, so a lost race between the
    /// existence check and the insert still comes back as
    /// `DuplicateEmail` rather than a second record.
    pub async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        verification_code: &str,
    ) -> Result<UserInsert, DbError> {
        log::trace!(
            "Store::insert_user( {:?}, {:?}, [ hash ], {} ) called.",
            name, email, role
        );

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        if t.query_opt(
            "SELECT id FROM users WHERE email = $1",
            &[&email]
        ).await?.is_some() {
            return Ok(UserInsert::DuplicateEmail);
        }

        let res = t.query_one(
            "INSERT INTO users
                (name, email, password, role, verified, verification_code)
                VALUES ($1, $2, $3, $4, FALSE, $5)
                RETURNING id",
            &[&name, &email, &password_hash, &role.to_string(), &verification_code]
        ).await;

        let row = match res {
            Ok(row) => row,
            Err(ref e) if is_unique_violation(e) => {
                return Ok(UserInsert::DuplicateEmail);
            },
            Err(e) => {
                return Err(DbError::from(e).annotate("Error inserting user"));
            },
        };

        t.commit().await?;

        let id: i64 = row.try_get("id")?;
        log::trace!("Inserted {} {:?} ({}) as user {}.", role, name, email, id);
        Ok(UserInsert::Created(id))
    }

    pub async fn get_user_by_email(
        &self,
        email: &str
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE email = $1",
            &[&email]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    pub async fn get_user_by_id(
        &self,
        id: i64
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_id( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE id = $1",
            &[&id]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    pub async fn get_users(&self) -> Result<Vec<User>, DbError> {
        log::trace!("Store::get_users() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM users ORDER BY name",
            &[]
        ).await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            users.push(user_from_row(row)?);
        }

        Ok(users)
    }

    /// Top quiz scorers for the games-page leaderboard.
    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<User>, DbError> {
        log::trace!("Store::leaderboard( {} ) called.", limit);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM users WHERE score IS NOT NULL
                ORDER BY score DESC LIMIT $1",
            &[&limit]
        ).await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            users.push(user_from_row(row)?);
        }

        Ok(users)
    }

    /// Redeem a verification code: mark the holder verified and clear
    /// the code, so a second redemption finds nothing.
    ///
    /// Returns the verified user, or `None` if no account holds the
    /// code (including codes already redeemed). The codes are random,
    /// not unique, so the update pins down one account in case two
    /// happen to hold the same code.
    pub async fn redeem_verification_code(
        &self,
        code: &str
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::redeem_verification_code( {:?} ) called.", code);

        let client = self.connect().await?;
        match client.query_opt(
            "UPDATE users SET verified = TRUE, verification_code = NULL
                WHERE id = (SELECT id FROM users
                    WHERE verification_code = $1
                    ORDER BY id LIMIT 1)
                RETURNING *",
            &[&code]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    /// Attach a password-reset token to the account holding `email`.
    /// Returns false if no such account exists.
    pub async fn set_reset_token(
        &self,
        email: &str,
        token: &str,
        expires: OffsetDateTime,
    ) -> Result<bool, DbError> {
        log::trace!("Store::set_reset_token( {:?}, ... ) called.", email);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE users SET reset_token = $2, reset_expires = $3
                WHERE email = $1",
            &[&email, &token, &expires]
        ).await?;

        Ok(n == 1)
    }

    /// Is `token` attached to some account and still unexpired as of
    /// `now`? Used to decide whether to show the reset form.
    pub async fn reset_token_usable(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<bool, DbError> {
        log::trace!("Store::reset_token_usable( ... ) called.");

        let client = self.connect().await?;
        let row = client.query_opt(
            "SELECT id FROM users
                WHERE reset_token = $1 AND reset_expires > $2",
            &[&token, &now]
        ).await?;

        Ok(row.is_some())
    }

    /// Redeem a reset token: install the new password hash and clear
    /// the token and its expiry in one statement. Fails (false) for an
    /// unknown token or one expired at or before `now`.
    pub async fn redeem_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<bool, DbError> {
        log::trace!("Store::redeem_reset_token( ... ) called.");

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE users SET password = $3,
                    reset_token = NULL, reset_expires = NULL
                WHERE reset_token = $1 AND reset_expires > $2",
            &[&token, &now, &new_password_hash]
        ).await?;

        Ok(n == 1)
    }

    /// Admin edit of name and/or email; absent fields are preserved.
    pub async fn update_user_details(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool, DbError> {
        log::trace!(
            "Store::update_user_details( {}, {:?}, {:?} ) called.",
            id, name, email
        );

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE users SET name = COALESCE($2, name),
                    email = COALESCE($3, email)
                WHERE id = $1",
            &[&id, &name, &email]
        ).await?;

        Ok(n == 1)
    }

    pub async fn update_user_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_user_password( {}, [ hash ] ) called.", id);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE users SET password = $2 WHERE id = $1",
            &[&id, &password_hash]
        ).await?;

        Ok(n == 1)
    }

    pub async fn update_user_score(
        &self,
        id: i64,
        score: i32,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_user_score( {}, {} ) called.", id, score);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE users SET score = $2 WHERE id = $1",
            &[&id, &score]
        ).await?;

        Ok(n == 1)
    }

    /// Quiz-page score save; returns the updated record so the session
    /// snapshot can be refreshed.
    pub async fn update_score_by_email(
        &self,
        email: &str,
        score: i32,
    ) -> Result<Option<User>, DbError> {
        log::trace!(
            "Store::update_score_by_email( {:?}, {} ) called.",
            email, score
        );

        let client = self.connect().await?;
        match client.query_opt(
            "UPDATE users SET score = $2 WHERE email = $1 RETURNING *",
            &[&email, &score]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("Store::delete_user( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM users WHERE id = $1",
            &[&id]
        ).await?;

        Ok(n == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

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
    async fn duplicate_email_is_a_conflict() {
        ensure_logging();
        let db = fresh_store().await;

        let first = db.insert_user(
            "Ana", "a@x.com", "hash-a", Role::Student, "111111"
        ).await.unwrap();
        assert!(matches!(first, UserInsert::Created(_)));

        let second = db.insert_user(
            "Also Ana", "a@x.com", "hash-b", Role::Teacher, "222222"
        ).await.unwrap();
        assert_eq!(second, UserInsert::DuplicateEmail);

        // no second record was created
        assert_eq!(db.get_users().await.unwrap().len(), 1);

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn verification_code_redeems_exactly_once() {
        ensure_logging();
        let db = fresh_store().await;

        db.insert_user("Ana", "a@x.com", "hash", Role::Student, "123456")
            .await.unwrap();

        let u = db.redeem_verification_code("123456").await.unwrap().unwrap();
        assert!(u.verified);
        assert!(u.verification_code.is_none());

        // the code was cleared on success, so it no longer matches
        assert!(db.redeem_verification_code("123456").await.unwrap().is_none());

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn colliding_verification_codes_redeem_one_account_at_a_time() {
        ensure_logging();
        let db = fresh_store().await;

        // the codes are random digits, so two accounts can end up
        // holding the same one
        db.insert_user("Ana", "a@x.com", "hash", Role::Student, "123456")
            .await.unwrap();
        db.insert_user("Ben", "b@y.com", "hash", Role::Student, "123456")
            .await.unwrap();

        let first = db.redeem_verification_code("123456").await.unwrap().unwrap();
        assert!(first.verified);

        // the other account is untouched and can still redeem
        let second = db.redeem_verification_code("123456").await.unwrap().unwrap();
        assert!(second.verified);
        assert_ne!(first.email, second.email);

        assert!(db.redeem_verification_code("123456").await.unwrap().is_none());

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn reset_token_expiry() {
        ensure_logging();
        let db = fresh_store().await;

        db.insert_user("Ana", "a@x.com", "hash", Role::Student, "123456")
            .await.unwrap();

        let issued = OffsetDateTime::now_utc();
        let expires = issued + crate::auth::RESET_TOKEN_TTL;
        assert!(db.set_reset_token("a@x.com", "tok", expires).await.unwrap());
        assert!(!db.set_reset_token("nobody@x.com", "tok", expires).await.unwrap());

        // just before expiry: usable
        let almost = expires - time::Duration::seconds(1);
        assert!(db.reset_token_usable("tok", almost).await.unwrap());
        // exactly at expiry and after: not usable
        assert!(!db.reset_token_usable("tok", expires).await.unwrap());
        assert!(!db.redeem_reset_token(
            "tok", expires + time::Duration::seconds(1), "new-hash"
        ).await.unwrap());

        // redeeming in time installs the hash and clears the token
        assert!(db.redeem_reset_token("tok", almost, "new-hash").await.unwrap());
        let u = db.get_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(u.password_hash, "new-hash");
        assert!(u.reset_token.is_none());
        assert!(u.reset_expires.is_none());
        assert!(!db.redeem_reset_token("tok", almost, "again").await.unwrap());

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn admin_edits_and_leaderboard() {
        ensure_logging();
        let db = fresh_store().await;

        let id = match db.insert_user(
            "Ana", "a@x.com", "hash", Role::Student, "111111"
        ).await.unwrap() {
            UserInsert::Created(id) => id,
            x => panic!("unexpected insert result: {:?}", x),
        };
        db.insert_user("Ben", "b@y.com", "hash", Role::Staff, "222222")
            .await.unwrap();

        assert!(db.update_user_details(id, Some("Ana Maria"), None).await.unwrap());
        assert!(db.update_user_score(id, 9).await.unwrap());
        let u = db.update_score_by_email("b@y.com", 7).await.unwrap().unwrap();
        assert_eq!(u.score, Some(7));

        let board = db.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].name, "Ana Maria");

        assert!(db.delete_user(id).await.unwrap());
        assert!(!db.delete_user(id).await.unwrap());

        db.nuke_database().await.unwrap();
    }
}
