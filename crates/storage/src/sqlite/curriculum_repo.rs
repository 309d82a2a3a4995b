use std::collections::BTreeMap;

use speech_core::model::{Chapter, ChapterNumber, Word};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    chapter_number_from_i64, conn, id_i64, invalid, placeholders, ser, word_id_from_i64, write_err,
};
use crate::repository::{CurriculumRepository, StorageError};

fn map_word_row(row: &SqliteRow) -> Result<Word, StorageError> {
    Word::new(
        word_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        chapter_number_from_i64(row.try_get::<i64, _>("chapter_number").map_err(ser)?)?,
        row.try_get::<String, _>("word").map_err(ser)?,
        row.try_get::<i32, _>("ord").map_err(ser)?,
    )
    .map_err(invalid)
}

impl SqliteRepository {
    async fn words_by_chapter(
        &self,
        number: Option<ChapterNumber>,
    ) -> Result<BTreeMap<ChapterNumber, Vec<Word>>, StorageError> {
        let mut sql = String::from("SELECT id, chapter_number, word, ord FROM words");
        if number.is_some() {
            sql.push_str(" WHERE chapter_number = ?1");
        }
        sql.push_str(" ORDER BY chapter_number ASC, ord ASC, id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(number) = number {
            query = query.bind(i64::from(number.value()));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut grouped: BTreeMap<ChapterNumber, Vec<Word>> = BTreeMap::new();
        for row in rows {
            let word = map_word_row(&row)?;
            grouped.entry(word.chapter()).or_default().push(word);
        }
        Ok(grouped)
    }
}

#[async_trait::async_trait]
impl CurriculumRepository for SqliteRepository {
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        let number = i64::from(chapter.number().value());
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO chapters (chapter_number, name)
                VALUES (?1, ?2)
                ON CONFLICT(chapter_number) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(number)
        .bind(chapter.name())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        for word in chapter.words() {
            // the WHERE guard leaves words owned by another chapter untouched
            let res = sqlx::query(
                r"
                    INSERT INTO words (id, chapter_number, word, ord)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET
                        word = excluded.word,
                        ord = excluded.ord
                    WHERE words.chapter_number = excluded.chapter_number
                ",
            )
            .bind(id_i64("word_id", word.id().value())?)
            .bind(number)
            .bind(word.text())
            .bind(word.order())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

            if res.rows_affected() == 0 {
                return Err(StorageError::Conflict);
            }
        }

        let ids = chapter.word_ids();
        let mut sql = String::from("DELETE FROM words WHERE chapter_number = ?1");
        if !ids.is_empty() {
            sql.push_str(" AND id NOT IN (");
            sql.push_str(&placeholders(2, ids.len()));
            sql.push(')');
        }
        let mut query = sqlx::query(&sql).bind(number);
        for id in &ids {
            query = query.bind(id_i64("word_id", id.value())?);
        }
        query.execute(&mut *tx).await.map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query("SELECT chapter_number, name FROM chapters ORDER BY chapter_number ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        let mut words = self.words_by_chapter(None).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let number =
                chapter_number_from_i64(row.try_get::<i64, _>("chapter_number").map_err(ser)?)?;
            let name: String = row.try_get("name").map_err(ser)?;
            let chapter_words = words.remove(&number).unwrap_or_default();
            out.push(Chapter::new(number, name, chapter_words).map_err(invalid)?);
        }
        Ok(out)
    }

    async fn get_chapter(&self, number: ChapterNumber) -> Result<Option<Chapter>, StorageError> {
        let Some(row) = sqlx::query("SELECT name FROM chapters WHERE chapter_number = ?1")
            .bind(i64::from(number.value()))
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };

        let name: String = row.try_get("name").map_err(ser)?;
        let words = self
            .words_by_chapter(Some(number))
            .await?
            .remove(&number)
            .unwrap_or_default();
        Chapter::new(number, name, words).map(Some).map_err(invalid)
    }
}
