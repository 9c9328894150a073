/*
`Store` methods for the quiz question bank.
*/
use tokio_postgres::Row;

use super::{DbError, Store};
use crate::quiz::{Question, QuestionKind};

fn question_from_row(row: &Row) -> Result<Question, DbError> {
    let kind_str: &str = row.try_get("kind")?;
    Ok(Question {
        id: row.try_get("id")?,
        kind: kind_str.parse()?,
        prompt: row.try_get("prompt")?,
        options: row.try_get("options")?,
        answer: row.try_get("answer")?,
    })
}

impl Store {
    pub async fn insert_question(
        &self,
        kind: QuestionKind,
        prompt: &str,
        options: &[String],
        answer: &str,
    ) -> Result<i64, DbError> {
        log::trace!("Store::insert_question( {}, {:?}, ... ) called.", kind, prompt);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO questions (kind, prompt, options, answer)
                VALUES ($1, $2, $3, $4)
                RETURNING id",
            &[&kind.to_string(), &prompt, &options, &answer]
        ).await?;

        Ok(row.try_get("id")?)
    }

    pub async fn get_questions(&self) -> Result<Vec<Question>, DbError> {
        log::trace!("Store::get_questions() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM questions ORDER BY id",
            &[]
        ).await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            questions.push(question_from_row(row)?);
        }

        Ok(questions)
    }

    pub async fn update_question(
        &self,
        id: i64,
        kind: QuestionKind,
        prompt: &str,
        options: &[String],
        answer: &str,
    ) -> Result<bool, DbError> {
        log::trace!("Store::update_question( {}, {}, ... ) called.", id, kind);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE questions
                SET kind = $2, prompt = $3, options = $4, answer = $5
                WHERE id = $1",
            &[&id, &kind.to_string(), &prompt, &options, &answer]
        ).await?;

        Ok(n == 1)
    }

    pub async fn delete_question(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("Store::delete_question( {} ) called.", id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM questions WHERE id = $1",
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
    async fn question_crud() {
        ensure_logging();
        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();

        let options: Vec<String> =
            ["jar", "bowl", "lid"].iter().map(|s| s.to_string()).collect();
        let id = db.insert_question(
            QuestionKind::MultipleChoice,
            "Which vessel is from Palawan?",
            &options,
            "jar",
        ).await.unwrap();

        let qs = db.get_questions().await.unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(qs[0].options, options);

        assert!(db.update_question(
            id, QuestionKind::FillInTheBlank,
            "The Manunggul ___ is from Palawan.", &[], "jar",
        ).await.unwrap());
        let qs = db.get_questions().await.unwrap();
        assert_eq!(qs[0].kind, QuestionKind::FillInTheBlank);
        assert!(qs[0].options.is_empty());

        assert!(db.delete_question(id).await.unwrap());
        assert!(!db.delete_question(id).await.unwrap());

        db.nuke_database().await.unwrap();
    }
}
