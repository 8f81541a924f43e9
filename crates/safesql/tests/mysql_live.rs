//! Round trips against a live MySQL server.
//!
//! Configure with `DATABASE_DRIVER`, `DATABASE_HOST`, `DATABASE_USER`,
//! `DATABASE_PASSWORD`, `DATABASE_SCHEMA` (a `.env` file works too). Every test
//! returns early when the configuration is absent.

use chrono::NaiveDate;
use safesql::{Database, DatabaseConfig, DbResult, Params, Selection};

fn config() -> Option<DatabaseConfig> {
    dotenvy::dotenv().ok();
    // RUST_LOG=safesql.sql=debug shows every statement sent.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    DatabaseConfig::from_env().ok()
}

async fn connect() -> Option<Database> {
    let config = config()?;
    Some(Database::connect(config).await.expect("connect to test database"))
}

/// A scratch table unique to one test run.
async fn scratch_table(db: &mut Database) -> DbResult<String> {
    let table = format!("safesql_{}", uuid::Uuid::new_v4().simple());
    db.execute(
        &format!(
            "CREATE TABLE `{table}` (
                ID INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                NAME VARCHAR(40) NOT NULL,
                SCORE DECIMAL(5,2) NULL,
                BORN DATE NULL,
                CREATED DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"
        ),
        &Params::new(),
    )
    .await?;
    Ok(table)
}

async fn drop_table(db: &mut Database, table: &str) {
    db.execute(&format!("DROP TABLE IF EXISTS `{table}`"), &Params::new())
        .await
        .expect("drop scratch table");
}

#[tokio::test]
async fn crud_round_trip() -> DbResult<()> {
    let Some(mut db) = connect().await else {
        return Ok(());
    };
    db.health_check().await?;
    let table = scratch_table(&mut db).await?;

    let inserted = db
        .insert_row(
            &table,
            [("NAME", ":name"), ("SCORE", ":score"), ("BORN", ":born")],
            &Params::new()
                .bind(":name", "O'Brien")
                .bind_typed(":score", 12.345, "DECIMAL(5,2)")
                .bind(":born", NaiveDate::from_ymd_opt(1990, 7, 1).unwrap()),
            Some(Selection::from([("ID", "id"), ("NAME", "name"), ("SCORE", "score")])),
        )
        .await?
        .expect("inserted row");
    let id: u64 = inserted.try_get("id")?;
    assert_eq!(inserted.try_get::<String>("name")?, "O'Brien");
    assert_eq!(inserted.try_get::<String>("score")?, "12.35");

    let updated = db
        .update_row(
            &table,
            [("NAME", ":name")],
            "ID = :id",
            &Params::new().bind(":id", id).bind(":name", "Smith"),
            Some(Selection::from([("NAME", "name")])),
        )
        .await?
        .expect("updated row");
    assert_eq!(updated.try_get::<String>("name")?, "Smith");
    assert!(!db.in_transaction());

    let missing = db
        .update_row(
            &table,
            [("NAME", "'nobody'")],
            "ID = :id",
            &Params::new().bind(":id", id + 1000),
            Some(Selection::all()),
        )
        .await?;
    assert!(missing.is_none());

    let deleted = db
        .delete_row(
            &table,
            "NAME = :name",
            &Params::new().bind(":name", "Smith"),
            Some(Selection::from([("ID", "id")])),
        )
        .await?
        .expect("deleted row");
    assert_eq!(deleted.try_get::<u64>("id")?, id);
    assert!(
        db.select_row(&table, Selection::all(), None, &Params::new(), 0)
            .await?
            .is_none()
    );

    drop_table(&mut db, &table).await;
    db.close().await
}

async fn score_by_name(
    db: &mut Database,
    table: &str,
    name: &str,
) -> DbResult<Option<safesql::Row>> {
    db.update_row(
        table,
        [("SCORE", ":s")],
        "NAME = :n",
        &Params::new()
            .bind(":n", name)
            .bind_typed(":s", 1, "DECIMAL(5,2)"),
        Some(Selection::from([("NAME", "name")])),
    )
    .await
}

#[tokio::test]
async fn concurrent_updates_of_disjoint_rows() -> DbResult<()> {
    let (Some(mut a), Some(mut b)) = (connect().await, connect().await) else {
        return Ok(());
    };
    let table = scratch_table(&mut a).await?;
    for name in ["left", "right"] {
        a.insert_row(&table, [("NAME", ":n")], &Params::new().bind(":n", name), None)
            .await?;
    }

    let (left, right) = tokio::join!(
        score_by_name(&mut a, &table, "left"),
        score_by_name(&mut b, &table, "right")
    );
    assert_eq!(left?.expect("left row").try_get::<String>("name")?, "left");
    assert_eq!(right?.expect("right row").try_get::<String>("name")?, "right");

    drop_table(&mut a, &table).await;
    Ok(())
}

#[tokio::test]
async fn inserted_row_reads_back_by_its_returned_key() -> DbResult<()> {
    let Some(mut db) = connect().await else {
        return Ok(());
    };
    let table = scratch_table(&mut db).await?;
    let columns = || Selection::from([("NAME", "name"), ("SCORE", "score"), ("BORN", "born")]);

    let inserted = db
        .insert_row(
            &table,
            [("NAME", ":name"), ("SCORE", ":score"), ("BORN", ":born")],
            &Params::new()
                .bind(":name", "' OR 1=1 -- \\")
                .bind_typed(":score", 99.5, "DECIMAL(5,2)")
                .bind(":born", NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()),
            Some(Selection::from([("ID", "id")])),
        )
        .await?
        .expect("inserted row");
    let id: u64 = inserted.try_get("id")?;

    let by_key = Params::new().bind(":id", id);
    let first = db
        .select_row(&table, columns(), Some("ID = :id"), &by_key, 0)
        .await?
        .expect("row by key");
    assert_eq!(first.try_get::<String>("name")?, "' OR 1=1 -- \\");
    assert_eq!(first.try_get::<String>("score")?, "99.50");
    assert_eq!(
        first.try_get::<NaiveDate>("born")?,
        NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()
    );

    let second = db
        .select_row(&table, columns(), Some("ID = :id"), &by_key, 0)
        .await?;
    assert_eq!(second.as_ref(), Some(&first));

    drop_table(&mut db, &table).await;
    Ok(())
}

#[tokio::test]
async fn explicit_key_is_returned_even_after_a_generated_one() -> DbResult<()> {
    let Some(mut db) = connect().await else {
        return Ok(());
    };
    let table = scratch_table(&mut db).await?;
    db.insert_row(&table, [("NAME", "'first'")], &Params::new(), None)
        .await?;

    let row = db
        .insert_row(
            &table,
            [("ID", ":id"), ("NAME", ":n")],
            &Params::new().bind(":id", 500).bind(":n", "chosen"),
            Some(Selection::from([("ID", "id"), ("NAME", "name")])),
        )
        .await?
        .expect("inserted row");
    assert_eq!(row.try_get::<u64>("id")?, 500);
    assert_eq!(row.try_get::<String>("name")?, "chosen");

    drop_table(&mut db, &table).await;
    Ok(())
}

#[tokio::test]
async fn session_keeps_backslash_escapes() -> DbResult<()> {
    let Some(mut db) = connect().await else {
        return Ok(());
    };
    let rows = db
        .query("SELECT @@SESSION.sql_mode AS mode", &Params::new())
        .await?;
    let mode: String = rows[0].try_get("mode")?;
    assert!(!mode.contains("NO_BACKSLASH_ESCAPES"), "{mode}");
    db.close().await
}
