use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::fs;
use std::path::PathBuf;

use crate::api::models::{Report, ReportStatus};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("No data dir")]
    NoDataDir,
    #[error("Cache directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache database: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A report the admin opened recently, as shown in the sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentReport {
    pub id: String,
    pub title: String,
    pub status: ReportStatus,
    pub conversation_id: Option<String>,
    pub opened_at: DateTime<Utc>,
}

fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "crowdship", "CrowdshipAdmin")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

pub fn open() -> Result<Connection, StorageError> {
    let path = db_path().ok_or(StorageError::NoDataDir)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    init(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS recent_reports (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            conversation_id TEXT,
            opened_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

pub fn upsert_report(conn: &Connection, report: &Report, opened_at: DateTime<Utc>) -> Result<(), StorageError> {
    conn.execute(
        r#"
        INSERT INTO recent_reports (id, title, status, conversation_id, opened_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(id) DO UPDATE SET
            title=excluded.title,
            status=excluded.status,
            conversation_id=excluded.conversation_id,
            opened_at=excluded.opened_at
        "#,
        params![
            report.id,
            report.title(),
            report.status.as_str(),
            report.conversation_id,
            opened_at
        ],
    )?;
    Ok(())
}

pub fn recent_reports(conn: &Connection, limit: usize) -> Result<Vec<RecentReport>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, conversation_id, opened_at FROM recent_reports \
         ORDER BY opened_at DESC, id ASC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, DateTime<Utc>>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, title, status, conversation_id, opened_at) = row?;
        match status.parse::<ReportStatus>() {
            Ok(status) => out.push(RecentReport {
                id,
                title,
                status,
                conversation_id,
                opened_at,
            }),
            Err(e) => log::warn!("Skipping cached report {id}: {e}"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        conn
    }

    fn report(id: &str, status: ReportStatus) -> Report {
        Report {
            id: id.into(),
            status,
            booking_id: None,
            reporter: None,
            subject: Some(format!("Issue {id}")),
            conversation_id: Some(format!("c-{id}")),
        }
    }

    #[test]
    fn most_recently_opened_first() {
        let conn = memory();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        upsert_report(&conn, &report("r1", ReportStatus::Pending), t).unwrap();
        upsert_report(&conn, &report("r2", ReportStatus::Resolved), t + Duration::minutes(5)).unwrap();

        let list = recent_reports(&conn, 10).unwrap();
        let ids: Vec<_> = list.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r2", "r1"]);
        assert_eq!(list[0].status, ReportStatus::Resolved);
        assert_eq!(list[1].conversation_id.as_deref(), Some("c-r1"));
        assert_eq!(list[1].opened_at, t);
    }

    #[test]
    fn reopening_updates_in_place() {
        let conn = memory();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        upsert_report(&conn, &report("r1", ReportStatus::Pending), t).unwrap();
        upsert_report(&conn, &report("r2", ReportStatus::Pending), t + Duration::minutes(1)).unwrap();
        upsert_report(&conn, &report("r1", ReportStatus::Escalated), t + Duration::minutes(2)).unwrap();

        let list = recent_reports(&conn, 10).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "r1");
        assert_eq!(list[0].status, ReportStatus::Escalated);
    }

    #[test]
    fn limit_is_respected() {
        let conn = memory();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        for i in 0..5 {
            upsert_report(&conn, &report(&format!("r{i}"), ReportStatus::Pending), t + Duration::minutes(i)).unwrap();
        }
        assert_eq!(recent_reports(&conn, 3).unwrap().len(), 3);
    }
}
