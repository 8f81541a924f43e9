//! Audit log entries.
//!
//! A thin consumer of the row operations: one `AUDIT` row per recorded action,
//! optionally pointing at the content page or file it concerns. The acting user
//! is passed in as an opaque id; resolving it to a user is the caller's job.

use crate::clause::Selection;
use crate::connection::Connection;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::params::Params;
use crate::row::Row;
use chrono::NaiveDateTime;

const TABLE: &str = "AUDIT";

/// What an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMedia {
    Content(u64),
    File(u64),
}

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: u64,
    pub description: String,
    pub actor_id: u64,
    pub media: Option<AuditMedia>,
    pub date: NaiveDateTime,
    pub action: String,
}

impl AuditEntry {
    /// Record `action` by `actor_id`. The store assigns the id and timestamp.
    pub async fn log<C: Connection>(
        db: &mut Database<C>,
        description: &str,
        actor_id: u64,
        media: Option<AuditMedia>,
        action: &str,
    ) -> DbResult<Self> {
        let mut params = Params::new()
            .bind(":description", description)
            .bind(":actorID", actor_id)
            .bind(":action", action);
        let (content, file) = match media {
            Some(AuditMedia::Content(id)) => {
                params = params.bind(":mediaID", id);
                (":mediaID", "NULL")
            }
            Some(AuditMedia::File(id)) => {
                params = params.bind(":mediaID", id);
                ("NULL", ":mediaID")
            }
            None => ("NULL", "NULL"),
        };

        let row = db
            .insert_row(
                TABLE,
                [
                    ("AUDIT_DESCRIPTION", ":description"),
                    ("USER_ID", ":actorID"),
                    ("CONTENT_ID", content),
                    ("FILE_ID", file),
                    ("AUDIT_ACTION", ":action"),
                ],
                &params,
                Some(Selection::from([
                    ("AUDIT_ID", "id"),
                    ("AUDIT_DATETIME", "dateTimeValue"),
                ])),
            )
            .await?
            .ok_or_else(|| DbError::Other("inserted audit entry could not be read back".into()))?;

        Ok(Self {
            id: row.try_get("id")?,
            description: description.to_string(),
            actor_id,
            media,
            date: row.try_get("dateTimeValue")?,
            action: action.to_string(),
        })
    }

    /// Load an entry by id.
    pub async fn from_id<C: Connection>(db: &mut Database<C>, id: u64) -> DbResult<Option<Self>> {
        let row = db
            .select_row(
                TABLE,
                [
                    ("AUDIT_DESCRIPTION", "description"),
                    ("USER_ID", "actorID"),
                    ("CONTENT_ID", "contentID"),
                    ("FILE_ID", "fileID"),
                    ("AUDIT_DATETIME", "dateTimeValue"),
                    ("AUDIT_ACTION", "action"),
                ],
                Some("`AUDIT_ID` = :id"),
                &Params::new().bind(":id", id),
                0,
            )
            .await?;
        row.map(|row| Self::from_row(id, &row)).transpose()
    }

    fn from_row(id: u64, row: &Row) -> DbResult<Self> {
        let media = match (
            row.try_get::<Option<u64>>("contentID")?,
            row.try_get::<Option<u64>>("fileID")?,
        ) {
            (Some(content), _) => Some(AuditMedia::Content(content)),
            (None, Some(file)) => Some(AuditMedia::File(file)),
            (None, None) => None,
        };
        Ok(Self {
            id,
            description: row.try_get("description")?,
            actor_id: row.try_get("actorID")?,
            media,
            date: row.try_get("dateTimeValue")?,
            action: row.try_get("action")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::value::Value;
    use chrono::NaiveDate;

    /// Answers every query with `rows` and records the SQL it was sent.
    #[derive(Default)]
    struct Recorder {
        rows: Vec<Row>,
        sql: Vec<String>,
    }

    impl Connection for Recorder {
        async fn query(&mut self, sql: &str) -> DbResult<Vec<Row>> {
            self.sql.push(sql.to_string());
            Ok(self.rows.clone())
        }

        async fn execute(&mut self, sql: &str) -> DbResult<u64> {
            self.sql.push(sql.to_string());
            Ok(1)
        }

        fn last_insert_id(&self) -> Option<u64> {
            Some(41)
        }
    }

    fn db(rows: Vec<Row>) -> Database<Recorder> {
        Database::with_connection(DatabaseConfig::new(), Recorder { rows, sql: Vec::new() })
            .unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn log_links_content_and_reads_back_generated_columns() {
        // One scripted row serves both the key lookup and the read-back.
        let mut db = db(vec![
            Row::new()
                .with("Field", "AUDIT_ID")
                .with("Type", "int unsigned")
                .with("id", "41")
                .with("dateTimeValue", "2024-05-01 12:00:00"),
        ]);
        let entry = AuditEntry::log(
            &mut db,
            "Renamed page to \"Home\"",
            3,
            Some(AuditMedia::Content(9)),
            "update",
        )
        .await
        .unwrap();

        assert_eq!(entry.id, 41);
        assert_eq!(entry.date, noon());
        assert_eq!(
            db.conn.sql[1],
            "INSERT INTO `AUDIT` (`AUDIT_DESCRIPTION`, `USER_ID`, `CONTENT_ID`, `FILE_ID`, \
             `AUDIT_ACTION`) VALUES ('Renamed page to \\\"Home\\\"', 3, 9, NULL, 'update')"
        );
        assert_eq!(
            db.conn.sql[2],
            "SELECT AUDIT_ID AS `id`, AUDIT_DATETIME AS `dateTimeValue` FROM `AUDIT` \
             WHERE `AUDIT_ID` = 41 LIMIT 1"
        );
    }

    #[tokio::test]
    async fn log_without_media_stores_nulls() {
        let mut db = db(vec![
            Row::new()
                .with("Field", "AUDIT_ID")
                .with("Type", "int unsigned")
                .with("id", "1")
                .with("dateTimeValue", "2024-05-01 12:00:00"),
        ]);
        AuditEntry::log(&mut db, "Signed in", 3, None, "login")
            .await
            .unwrap();
        assert!(db.conn.sql[1].ends_with("VALUES ('Signed in', 3, NULL, NULL, 'login')"));
    }

    #[tokio::test]
    async fn from_id_maps_media_columns() {
        let mut db = db(vec![
            Row::new()
                .with("description", "Uploaded report.pdf")
                .with("actorID", "3")
                .with("contentID", Value::Null)
                .with("fileID", "12")
                .with("dateTimeValue", "2024-05-01 12:00:00")
                .with("action", "create"),
        ]);
        let entry = AuditEntry::from_id(&mut db, 5).await.unwrap().unwrap();
        assert_eq!(
            entry,
            AuditEntry {
                id: 5,
                description: "Uploaded report.pdf".into(),
                actor_id: 3,
                media: Some(AuditMedia::File(12)),
                date: noon(),
                action: "create".into(),
            }
        );
        assert!(db.conn.sql[0].ends_with("FROM `AUDIT` WHERE `AUDIT_ID` = 5 LIMIT 0, 1"));
    }

    #[tokio::test]
    async fn from_id_of_missing_entry_is_none() {
        let mut db = db(Vec::new());
        assert!(AuditEntry::from_id(&mut db, 5).await.unwrap().is_none());
    }
}
