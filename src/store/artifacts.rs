/*
`Store` methods for the artifact catalog.
*/
use tokio_postgres::Row;

use super::{DbError, Store};
use crate::catalog::Artifact;

fn artifact_from_row(row: &Row) -> Result<Artifact, DbError> {
    Ok(Artifact {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        kind: row.try_get("kind")?,
        status: row.try_get("status")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        model_link: row.try_get("model_link")?,
    })
}

impl Store {
    pub async fn insert_artifact(
        &self,
        title: &str,
        kind: &str,
        status: &str,
        description: &str,
        image_url: Option<&str>,
        model_link: Option<&str>,
    ) -> Result<i64, DbError> {
        log::trace!("Store::insert_artifact( {:?}, ... ) called.", title);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO artifacts
                (title, kind, status, description, image_url, model_link)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id",
            &[&title, &kind, &status, &description, &image_url, &model_link]
        ).await?;

        Ok(row.try_get("id")?)
    }

    pub async fn get_artifact(
        &self,
        id: i64
    ) -> Result<Option<Artifact>, DbError> {
        log::trace!("Store::get_artifact( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM artifacts WHERE id = $1",
            &[&id]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(artifact_from_row(&row)?)),
        }
    }

    pub async fn get_artifacts(&self) -> Result<Vec<Artifact>, DbError> {
        log::trace!("Store::get_artifacts() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM artifacts ORDER BY title",
            &[]
        ).await?;

        let mut artifacts = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            artifacts.push(artifact_from_row(row)?);
        }

        Ok(artifacts)
    }

    /// Full-record update. `image_url` here is the value to store;
    /// when no new upload arrived the caller passes the existing
    /// reference through unchanged.
    pub async fn update_artifact(
        &self,
        id: i64,
        title: &str,
        kind: &str,
        status: &str,
        description: &str,
        image_url: Option<&str>,
        model_link: Option<&str>,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_artifact( {}, {:?}, ... ) called.", id, title);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE artifacts
                SET title = $2, kind = $3, status = $4,
                    description = $5, image_url = $6, model_link = $7
                WHERE id = $1",
            &[&id, &title, &kind, &status, &description, &image_url, &model_link]
        ).await?;

        Ok(n == 1)
    }

    pub async fn delete_artifact(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("Store::delete_artifact( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM artifacts WHERE id = $1",
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

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn artifact_crud() {
        ensure_logging();
        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();

        let id = db.insert_artifact(
            "Manunggul Jar", "pottery", "on display",
            "Burial jar.", Some("/media/jar.png"), None,
        ).await.unwrap();

        let a = db.get_artifact(id).await.unwrap().unwrap();
        assert_eq!(a.title, "Manunggul Jar");
        assert_eq!(a.image_url.as_deref(), Some("/media/jar.png"));

        // an update without a new upload keeps the old reference
        assert!(db.update_artifact(
            id, "Manunggul Jar", "pottery", "in storage",
            "Burial jar, secondary.", a.image_url.as_deref(), None,
        ).await.unwrap());
        let a = db.get_artifact(id).await.unwrap().unwrap();
        assert_eq!(a.status, "in storage");
        assert_eq!(a.image_url.as_deref(), Some("/media/jar.png"));

        assert!(db.delete_artifact(id).await.unwrap());
        assert!(!db.delete_artifact(id).await.unwrap());
        assert!(db.get_artifact(id).await.unwrap().is_none());

        db.nuke_database().await.unwrap();
    }
}
